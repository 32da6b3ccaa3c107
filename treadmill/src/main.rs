//! Vendor treadmill CLI.
//!
//! `treadmill --sync` advances the treadmill branch; `treadmill --pick`
//! harvests the treadmill PR onto a fresh vendor commit.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing::debug;

use treadmill::error::exit_code_for;
use treadmill::io::config::{DEFAULT_CONFIG_FILE, load_config};
use treadmill::io::git::Git;
use treadmill::io::github::GraphqlSearch;
use treadmill::io::tools::ProcessRunner;
use treadmill::logging::{self, Verbosity};
use treadmill::options::{Mode, Options};
use treadmill::pick::{PickOutcome, run_pick};
use treadmill::preflight::ensure_clean;
use treadmill::report;
use treadmill::sync::{SyncOutcome, run_sync};

#[derive(Parser, Debug)]
#[command(
    name = "treadmill",
    version,
    about = "Keep a vendored dependency on a rebased treadmill branch, then harvest it"
)]
#[command(group(ArgGroup::new("mode").required(true).args(["sync", "pick"])))]
struct Cli {
    /// Rebase the treadmill branch and re-vendor the dependency at its development head.
    #[arg(long)]
    sync: bool,

    /// Cherry-pick the treadmill PR's commit onto a fresh vendor commit.
    #[arg(long)]
    pick: bool,

    /// Pick even if the treadmill PR is based on newer integration history.
    #[arg(long, requires = "pick")]
    accept_stale_base: bool,

    /// Verify even when sync finds nothing changed.
    #[arg(long, requires = "sync")]
    force: bool,

    /// Show what would happen without changing the repository.
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Log progress details to stderr.
    #[arg(short, long)]
    verbose: bool,

    /// Log debugging details (every git command) to stderr.
    #[arg(long)]
    debug: bool,

    /// Config file (default: treadmill.toml in the repository root).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Repository root (default: current directory).
    #[arg(short = 'C', long = "repo", value_name = "DIR")]
    repo: Option<PathBuf>,
}

impl Cli {
    fn verbosity(&self) -> Verbosity {
        if self.debug {
            Verbosity::Debug
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Quiet
        }
    }

    fn options(&self) -> Options {
        let mode = if self.pick { Mode::Pick } else { Mode::Sync };
        Options {
            force: self.force,
            accept_stale_base: self.accept_stale_base,
            dry_run: self.dry_run,
            ..Options::new(mode)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbosity());
    report::init_color();
    if let Err(err) = run(&cli) {
        report::error(&format!("{err:#}"));
        std::process::exit(exit_code_for(&err));
    }
}

fn run(cli: &Cli) -> Result<()> {
    let root = match &cli.repo {
        Some(dir) => dir.clone(),
        None => env::current_dir().context("resolve current directory")?,
    };
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| root.join(DEFAULT_CONFIG_FILE));
    let cfg = load_config(&config_path)?;
    let opts = cli.options();
    debug!(?opts, root = %root.display(), "starting");

    ensure_clean(&root, &Git::new(&root), &cfg)?;

    match opts.mode {
        Mode::Sync => match run_sync(&root, &cfg, &opts, &ProcessRunner)? {
            SyncOutcome::DryRun => report::note("Dry run: nothing was changed."),
            SyncOutcome::Unchanged { pin } => debug!(%pin, "sync was a no-op"),
            SyncOutcome::Updated(summary) => report::note(&format!(
                "Push {} with `git push --force` to refresh the treadmill PR.",
                summary.branch
            )),
        },
        Mode::Pick => {
            let search = GraphqlSearch::from_config(&cfg.upstream)?;
            match run_pick(&root, &cfg, &opts, &search, &ProcessRunner)? {
                PickOutcome::DryRun { .. } => report::note("Dry run: nothing was changed."),
                PickOutcome::Picked { pr, relation } => {
                    debug!(pr, ?relation, "picked");
                }
            }
        }
    }
    Ok(())
}
