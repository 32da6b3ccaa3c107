//! `treadmill --sync`: advance the treadmill branch.
//!
//! The branch carries two commits on top of the integration branch: a junk
//! commit holding the re-vendored dependency and, above it, the treadmill
//! commit with whatever hand-made changes the new dependency needs. A sync
//! throws the junk commit away, rebases onto the integration branch,
//! re-vendors the dependency at its development head and re-applies the
//! treadmill commit.
//!
//! Between saving the treadmill commit to the sentinel file and re-applying
//! it, the branch does not contain that commit. Any failure in that window
//! stops the run with recovery instructions and leaves the sentinel file in
//! place so the next run refuses to start.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{debug, info, instrument, warn};

use crate::core::ci_order::rewrite_task_order;
use crate::core::commit_shape::CommitShape;
use crate::core::manifest::PinnedVersion;
use crate::core::message::JunkMessage;
use crate::error::Halt;
use crate::io::config::TreadmillConfig;
use crate::io::git::Git;
use crate::io::manifest::read_pinned_worktree;
use crate::io::sentinel::Sentinel;
use crate::io::tools::{ToolRequest, ToolRunner, expand_argv, run_required};
use crate::options::{Mode, Options};
use crate::preflight::ensure_treadmill_pair;
use crate::report;
use crate::verify::verify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Plan printed, nothing touched.
    DryRun,
    /// Same pin, same base, same content; HEAD is back on the original commit.
    Unchanged { pin: PinnedVersion },
    /// The treadmill pair was rebuilt and verified.
    Updated(SyncSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub branch: String,
    pub old: PinnedVersion,
    pub new: PinnedVersion,
    pub rebased: bool,
    /// HEAD's tree differs from the one before the sync.
    pub changed: bool,
}

/// State captured before the history rewrite starts.
struct Snapshot {
    branch: String,
    upstream: String,
    head: String,
    junk: String,
    old: PinnedVersion,
}

/// Result of the guarded phase.
struct Rebuild {
    new: PinnedVersion,
    rebased: bool,
}

#[instrument(skip_all, fields(root = %root.display()))]
pub fn run_sync<R: ToolRunner>(
    root: &Path,
    cfg: &TreadmillConfig,
    opts: &Options,
    tools: &R,
) -> Result<SyncOutcome> {
    let git = Git::new(root);
    let shape = CommitShape::new(&cfg.treadmill.subject_pattern)?;
    let integration = cfg.integration_branch.as_str();

    let branch = git.working_branch(integration)?;
    ensure_treadmill_pair(&git, cfg, &shape)?;
    let snapshot = Snapshot {
        upstream: git.upstream_remote(&cfg.upstream.repo)?,
        head: git.rev_parse("HEAD")?,
        junk: git.rev_parse("HEAD^")?,
        old: read_pinned_worktree(root, &cfg.manifest.lock_file, &cfg.dependency.module)?,
        branch,
    };
    info!(
        branch = %snapshot.branch,
        head = %snapshot.head,
        pin = %snapshot.old,
        "treadmill state"
    );

    if opts.dry_run {
        print_plan(cfg, &snapshot);
        return Ok(SyncOutcome::DryRun);
    }

    report::step(&format!(
        "Updating {integration} from {}",
        snapshot.upstream
    ));
    git.checkout_branch(integration)?;
    let pulled = git
        .pull_ff_only(&snapshot.upstream, integration)
        .with_context(|| format!("fast-forward {integration} from {}", snapshot.upstream));
    let restored = git.checkout_branch(&snapshot.branch);
    settle_pull(pulled, restored, integration, &snapshot.branch)?;

    let sentinel = Sentinel::new(root, &cfg.sentinel_file);
    report::step(&format!(
        "Saving the treadmill commit to {}",
        sentinel.path().display()
    ));
    sentinel.export(&git, "HEAD^..HEAD")?;

    let attempt = (|| -> Result<Rebuild> {
        let fork_point = git.fork_point(integration, "HEAD")?;
        let integration_tip = git.rev_parse(integration)?;
        git.reset_hard("HEAD~2")?;

        let rebased = fork_point != integration_tip;
        if rebased {
            report::step(&format!("Rebasing onto {integration}"));
            git.rebase_keep_empty(integration)?;
        } else {
            debug!(fork_point = %fork_point, "already on the integration tip");
        }

        report::step(&format!(
            "Vendoring {} @ {}",
            cfg.dependency.module, cfg.dependency.dev_ref
        ));
        revendor(root, cfg, tools)?;
        let new = read_pinned_worktree(root, &cfg.manifest.lock_file, &cfg.dependency.module)?;

        rewrite_ci_order(root, cfg)?;

        let untracked = git.untracked_under(&cfg.manifest.vendor_dir)?;
        debug!(count = untracked.len(), "adding new vendored files");
        git.add_paths(&untracked)?;

        let date = Local::now().format("%Y-%m-%d").to_string();
        let message = JunkMessage {
            module: &cfg.dependency.module,
            old: &snapshot.old,
            new: &new,
            integration_branch: integration,
            rebased,
            date: &date,
        }
        .render();
        git.commit_all(&message)?;

        report::step("Re-applying the treadmill commit");
        sentinel.apply(&git)?;
        Ok(Rebuild { new, rebased })
    })();

    let rebuild = attempt.map_err(|cause| Halt::GuardedPhase {
        guidance: recovery_guidance(&snapshot, sentinel.path()),
        sentinel: sentinel.path().to_path_buf(),
        cause,
    })?;
    sentinel.remove()?;

    let changed = git.tree_id("HEAD")? != git.tree_id(&snapshot.head)?;
    if rebuild.new == snapshot.old && !rebuild.rebased && !changed {
        git.reset_hard(&snapshot.head)?;
        info!(head = %snapshot.head, "nothing changed, restored original HEAD");
        report::success(&format!(
            "Nothing changed (same pin, same base, same tree): {} is still at {}.",
            snapshot.branch, snapshot.old
        ));
        if opts.force {
            report::note("--force given, verifying anyway.");
            verify(root, cfg, Mode::Sync, tools)?;
        }
        return Ok(SyncOutcome::Unchanged { pin: snapshot.old });
    }

    if rebuild.new == snapshot.old {
        report::note(&format!("{} unchanged", snapshot.old));
    } else {
        report::note(&format!("{} -> {}", snapshot.old, rebuild.new.version()));
    }
    verify(root, cfg, Mode::Sync, tools)?;

    Ok(SyncOutcome::Updated(SyncSummary {
        branch: snapshot.branch,
        old: snapshot.old,
        new: rebuild.new,
        rebased: rebuild.rebased,
        changed,
    }))
}

/// Combine the pull with the checkout back to the working branch, keeping
/// both errors when both fail.
fn settle_pull(
    pulled: Result<()>,
    restored: Result<()>,
    integration: &str,
    branch: &str,
) -> Result<()> {
    match (pulled, restored) {
        (Ok(()), restored) => restored,
        (Err(pull), Ok(())) => Err(pull),
        (Err(pull), Err(checkout)) => Err(pull.context(format!(
            "could not check out {branch} again, still on {integration}: {checkout:#}"
        ))),
    }
}

fn revendor<R: ToolRunner>(root: &Path, cfg: &TreadmillConfig, tools: &R) -> Result<()> {
    let module = &cfg.dependency.module;
    let dev_ref = &cfg.dependency.dev_ref;
    run_required(
        tools,
        &ToolRequest::new("re-pin", expand_argv(&cfg.commands.repin, module, dev_ref), root),
    )?;
    run_required(
        tools,
        &ToolRequest::new(
            "re-vendor",
            expand_argv(&cfg.commands.revendor, module, dev_ref),
            root,
        ),
    )
}

/// Make the integration test task run right after validation.
fn rewrite_ci_order(root: &Path, cfg: &TreadmillConfig) -> Result<()> {
    let path = root.join(&cfg.ci.path);
    if !path.exists() {
        warn!(path = %path.display(), "no CI file");
        report::warn(&format!(
            "{} not found, leaving CI task order alone",
            cfg.ci.path
        ));
        return Ok(());
    }
    let contents = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let rewritten = rewrite_task_order(&contents, &cfg.task_order());
    if rewritten == contents {
        debug!("CI task order already rewritten");
        return Ok(());
    }
    fs::write(&path, rewritten).with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), "rewrote CI task order");
    Ok(())
}

fn print_plan(cfg: &TreadmillConfig, snapshot: &Snapshot) {
    let integration = &cfg.integration_branch;
    report::dry_run(&format!(
        "would fast-forward {integration} from {}",
        snapshot.upstream
    ));
    report::dry_run(&format!(
        "would save {} (HEAD) to {}",
        snapshot.head, cfg.sentinel_file
    ));
    report::dry_run(&format!(
        "would drop junk commit {} and rebase {} onto {integration} if needed",
        snapshot.junk, snapshot.branch
    ));
    report::dry_run(&format!(
        "would re-vendor {} @ {} (currently {})",
        cfg.dependency.module, cfg.dependency.dev_ref, snapshot.old
    ));
    report::dry_run("would commit the vendor tree and re-apply the treadmill commit, then build and check");
}

fn recovery_guidance(snapshot: &Snapshot, sentinel: &Path) -> String {
    let sentinel = sentinel.display();
    format!(
        "Manual recovery required. The treadmill commit is saved in {sentinel}.\n\
         Before this sync, {branch} was at {head} (junk vendor commit {junk}).\n\
         \n\
         \x20 1. Abort any git operation still in progress: `git rebase --abort` or `git am --abort`.\n\
         \x20 2. To start over: `git reset --hard {head}`.\n\
         \x20    To finish by hand instead: fix the problem, commit the vendor tree with a\n\
         \x20    DO NOT MERGE / JUNK COMMIT message, then `git am {sentinel}`.\n\
         \x20 3. Delete {sentinel} once the treadmill commit is back on {branch}.",
        branch = snapshot.branch,
        head = snapshot.head,
        junk = snapshot.junk,
    )
}
