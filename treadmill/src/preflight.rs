//! Preconditions checked before any operation touches the repository.
//!
//! [`ensure_clean`] is the only mutual-exclusion check the tool has: a
//! leftover sentinel file, an interrupted git operation, or stray edits all
//! mean somebody (possibly an earlier run) is mid-flight.

use std::path::Path;

use anyhow::{Result, anyhow, bail};
use tracing::{debug, instrument};

use crate::core::commit_shape::CommitShape;
use crate::core::vendor_commit::{describe_missing, missing_vendor_changes};
use crate::io::config::TreadmillConfig;
use crate::io::git::Git;
use crate::io::sentinel::Sentinel;

/// Git-dir entries that mean a history-rewriting command was interrupted.
const INTERRUPTED_OPERATIONS: [(&str, &str); 3] = [
    ("rebase-merge", "git rebase --abort"),
    ("rebase-apply", "git rebase --abort` or `git am --abort"),
    ("CHERRY_PICK_HEAD", "git cherry-pick --abort"),
];

/// Refuse to run on contaminated repository state.
///
/// The sentinel check happens before the first git command.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn ensure_clean(root: &Path, git: &Git, cfg: &TreadmillConfig) -> Result<()> {
    let sentinel = Sentinel::new(root, &cfg.sentinel_file);
    if sentinel.exists() {
        bail!(
            "found {}: an earlier sync stopped in the middle of rewriting history.\n\
             Recover the treadmill commit from that file (see `git am {0}` and `git reflog`),\n\
             then delete it before running treadmill again.",
            sentinel.path().display()
        );
    }

    for (name, abort) in INTERRUPTED_OPERATIONS {
        if git.git_path(name)?.exists() {
            bail!("a git operation is in progress ({name}); finish it or run `{abort}` first");
        }
    }

    let dirty: Vec<String> = git
        .status_porcelain()?
        .into_iter()
        .filter(|entry| !entry.is_untracked())
        .map(|entry| entry.path)
        .collect();
    if !dirty.is_empty() {
        bail!(
            "tracked files have uncommitted changes: {}\n\
             Commit or stash them (`git stash`) before running treadmill.",
            dirty.join(", ")
        );
    }

    let stray = git.untracked_under(&cfg.manifest.vendor_dir)?;
    if !stray.is_empty() {
        bail!(
            "untracked files under {}/: {}\n\
             Remove them (`git clean -fd {0}`) or commit them before running treadmill.",
            cfg.manifest.vendor_dir.trim_end_matches('/'),
            stray.join(", ")
        );
    }

    debug!("repository is clean");
    Ok(())
}

/// Fail unless `rev` satisfies the vendor-commit heuristic.
#[instrument(skip_all, fields(rev))]
pub fn ensure_vendor_commit(git: &Git, cfg: &TreadmillConfig, rev: &str) -> Result<()> {
    let changed = git.changed_paths(rev)?;
    let missing = missing_vendor_changes(&changed, &cfg.vendor_layout());
    if missing.is_empty() {
        return Ok(());
    }
    Err(anyhow!(
        "{rev} is not a vendor commit: missing changes to {}",
        describe_missing(&missing)
    ))
}

/// Fail unless HEAD^..HEAD is a junk vendor commit followed by the treadmill commit.
pub fn ensure_treadmill_pair(git: &Git, cfg: &TreadmillConfig, shape: &CommitShape) -> Result<()> {
    let subject = git.subject("HEAD")?;
    if !shape.is_treadmill_subject(&subject) {
        bail!(
            "HEAD does not look like the treadmill commit: subject '{subject}' does not match /{}/\n\
             Check out the treadmill branch first.",
            shape.subject_pattern()
        );
    }
    let body = git.body("HEAD^")?;
    if !shape.is_junk_body(&body) {
        bail!(
            "HEAD^ is not the junk vendor commit: its message lacks the DO NOT MERGE / JUNK COMMIT marker"
        );
    }
    ensure_vendor_commit(git, cfg, "HEAD^")
}
