//! Post-change verification shared by sync and pick.

use std::path::Path;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::error::Halt;
use crate::io::config::TreadmillConfig;
use crate::io::tools::{ToolRequest, ToolRunner, expand_argv, run_required};
use crate::options::Mode;
use crate::report;

/// Build (fatal), then run the two auxiliary checks (counted).
#[instrument(skip_all, fields(mode = ?mode))]
pub fn verify<R: ToolRunner>(
    root: &Path,
    cfg: &TreadmillConfig,
    mode: Mode,
    tools: &R,
) -> Result<()> {
    let expand = |template: &[String]| {
        expand_argv(template, &cfg.dependency.module, &cfg.dependency.dev_ref)
    };

    report::step("Building");
    run_required(tools, &ToolRequest::new("build", expand(&cfg.commands.build), root))?;

    let checks = [
        ToolRequest::new("docs cross-reference", expand(&cfg.commands.docs_xref), root),
        ToolRequest::new(
            "integration dry run",
            expand(&cfg.commands.integration_dry_run),
            root,
        ),
    ];
    let mut failed = Vec::new();
    for check in &checks {
        report::step(&format!("Running {}", check.label));
        if tools.run(check)? {
            info!(check = %check.label, "check passed");
        } else {
            warn!(check = %check.label, "check failed");
            report::warn(&format!("{} failed: `{}`", check.label, check.display()));
            failed.push(check.label.clone());
        }
    }

    if !failed.is_empty() {
        return Err(Halt::VerificationFailed {
            failed,
            procedure: remediation(mode),
        }
        .into());
    }

    report::success("All checks passed.");
    report::note("Review the result, then push the branch.");
    Ok(())
}

/// Numbered manual procedure for fixing a failed verification.
pub fn remediation(mode: Mode) -> String {
    let steps: &[&str] = match mode {
        Mode::Sync => &[
            "Fix the failures above in the working tree.",
            "Commit the fix: `git commit -a -m fixup`.",
            "Squash it into the treadmill commit: `git rebase -i HEAD~2` and mark it `fixup`.",
            "Leave the junk vendor commit (HEAD^ after squashing) untouched.",
            "Rerun `treadmill --sync --force` to verify again.",
        ],
        Mode::Pick => &[
            "Fix the failures above in the working tree.",
            "Amend the fix into the picked commit: `git commit -a --amend --no-edit`.",
            "Rerun the build and checks, then push.",
        ],
    };
    let mut text = String::from("To fix this by hand:\n");
    for (idx, step) in steps.iter().enumerate() {
        text.push_str(&format!("  {}. {step}\n", idx + 1));
    }
    text.trim_end().to_string()
}
