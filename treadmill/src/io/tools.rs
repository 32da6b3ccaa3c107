//! External collaborator commands: vendoring, build, and checks.
//!
//! Commands inherit the terminal so the operator sees their output as it
//! happens. There is no timeout; a hung tool hangs the run.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

/// A resolved command ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequest {
    /// Short operator-facing name ("build", "re-vendor", ...).
    pub label: String,
    pub argv: Vec<String>,
    pub workdir: PathBuf,
}

impl ToolRequest {
    pub fn new(label: &str, argv: Vec<String>, workdir: &Path) -> Self {
        Self {
            label: label.to_string(),
            argv,
            workdir: workdir.to_path_buf(),
        }
    }

    pub fn display(&self) -> String {
        self.argv.join(" ")
    }
}

/// Abstraction over command execution.
pub trait ToolRunner {
    /// Run the command; `Ok(true)` if it exited successfully.
    fn run(&self, request: &ToolRequest) -> Result<bool>;
}

/// Spawns real processes.
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    #[instrument(skip_all, fields(label = %request.label))]
    fn run(&self, request: &ToolRequest) -> Result<bool> {
        let (program, args) = request
            .argv
            .split_first()
            .ok_or_else(|| anyhow!("{}: empty command", request.label))?;
        debug!(command = %request.display(), workdir = %request.workdir.display(), "spawning tool");
        let status = Command::new(program)
            .args(args)
            .current_dir(&request.workdir)
            .status()
            .with_context(|| format!("spawn {} ({})", request.label, request.display()))?;
        if !status.success() {
            warn!(exit_code = ?status.code(), "tool failed");
        }
        Ok(status.success())
    }
}

/// Run a command whose failure is fatal.
pub fn run_required<R: ToolRunner>(runner: &R, request: &ToolRequest) -> Result<()> {
    if runner.run(request)? {
        return Ok(());
    }
    Err(anyhow!(
        "{} failed: `{}` exited non-zero",
        request.label,
        request.display()
    ))
}

/// Substitute `{module}` and `{ref}` in each argument.
pub fn expand_argv(template: &[String], module: &str, git_ref: &str) -> Vec<String> {
    template
        .iter()
        .map(|arg| arg.replace("{module}", module).replace("{ref}", git_ref))
        .collect()
}
