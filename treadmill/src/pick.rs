//! `treadmill --pick`: harvest the treadmill PR into the current branch.
//!
//! Run on a branch whose HEAD is a fresh vendor commit. The treadmill commit
//! from the open treadmill PR is cherry-picked on top, with its message
//! trimmed down to the part a reviewer cares about.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use rand::{Rng, distributions::Alphanumeric};
use tracing::{info, instrument};

use crate::core::base::{BaseDecision, BaseRelation, classify_base, decide};
use crate::core::message::PickMessage;
use crate::error::Halt;
use crate::io::config::TreadmillConfig;
use crate::io::git::Git;
use crate::io::github::{SearchApi, locate_treadmill_pr};
use crate::io::manifest::{read_pinned_at, read_pinned_worktree};
use crate::io::tools::ToolRunner;
use crate::options::{Mode, Options};
use crate::preflight::ensure_vendor_commit;
use crate::report;
use crate::verify::verify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    DryRun { pr: u64 },
    Picked { pr: u64, relation: BaseRelation },
}

/// Fork points of both branches and how they relate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseComparison {
    pub local: String,
    pub remote: String,
    pub relation: BaseRelation,
}

/// Compare where `local` and `remote` forked from `base`.
#[instrument(skip_all, fields(base, local, remote))]
pub fn compare_bases(git: &Git, base: &str, local: &str, remote: &str) -> Result<BaseComparison> {
    let local_fp = git.fork_point(base, local)?;
    let remote_fp = git.fork_point(base, remote)?;
    let relation = classify_base(&local_fp, &remote_fp, || {
        git.is_ancestor(&local_fp, &remote_fp)
    })?;
    info!(?relation, local = %local_fp, remote = %remote_fp, "fork points");
    Ok(BaseComparison {
        local: local_fp,
        remote: remote_fp,
        relation,
    })
}

#[instrument(skip_all, fields(root = %root.display()))]
pub fn run_pick<S: SearchApi, R: ToolRunner>(
    root: &Path,
    cfg: &TreadmillConfig,
    opts: &Options,
    search: &S,
    tools: &R,
) -> Result<PickOutcome> {
    let git = Git::new(root);
    let integration = cfg.integration_branch.as_str();

    let branch = git.working_branch(integration)?;
    ensure_vendor_commit(&git, cfg, "HEAD")
        .context("--pick must run on top of a fresh vendor commit")?;
    let upstream = git.upstream_remote(&cfg.upstream.repo)?;

    report::step(&format!(
        "Looking for the treadmill PR in {}",
        cfg.upstream.repo
    ));
    let pr = locate_treadmill_pr(search, &cfg.upstream.repo, &cfg.treadmill.pr_title)?;
    report::note(&format!("found PR #{pr}"));

    if opts.dry_run {
        report::dry_run(&format!(
            "would fetch PR #{pr} from {upstream} and compare its base with {branch}"
        ));
        report::dry_run(&format!(
            "would cherry-pick its treadmill commit onto {branch}, then build and check"
        ));
        return Ok(PickOutcome::DryRun { pr });
    }

    let temp = temp_branch_name();
    report::step(&format!("Fetching PR #{pr} into {temp}"));
    git.fetch(&upstream, &format!("pull/{pr}/head:{temp}"))?;

    let remote_base = format!("refs/remotes/{upstream}/{integration}");
    git.fetch(&upstream, &format!("{integration}:{remote_base}"))?;

    let bases = compare_bases(&git, &remote_base, "HEAD", &temp)?;
    match decide(bases.relation, opts.accept_stale_base) {
        BaseDecision::Proceed => {}
        BaseDecision::ProceedWithNote => match bases.relation {
            BaseRelation::RemoteNewer => report::warn(&format!(
                "PR #{pr} is based on newer {integration}; picking anyway (--accept-stale-base)"
            )),
            _ => report::note(&format!(
                "{branch} is based on newer {integration} than PR #{pr}"
            )),
        },
        BaseDecision::Stop => {
            git.delete_branch(&temp)?;
            return Err(Halt::StaleBase {
                pr,
                integration: integration.to_string(),
                local: bases.local,
                remote: bases.remote,
            }
            .into());
        }
    }

    let ours = read_pinned_worktree(root, &cfg.manifest.lock_file, &cfg.dependency.module)?;
    let theirs = read_pinned_at(&git, &temp, &cfg.manifest.lock_file, &cfg.dependency.module)?;
    if ours != theirs {
        report::warn(&format!(
            "PR #{pr} was vendored with {theirs}, this branch has {ours}; the picked changes may not fit"
        ));
    }

    let original = git.message(&temp)?;
    report::step(&format!("Cherry-picking the treadmill commit from PR #{pr}"));
    git.cherry_pick_allow_empty(&temp).with_context(|| {
        format!(
            "cherry-pick of PR #{pr} failed; resolve it or run `git cherry-pick --abort`, \
             then `git branch -D {temp}`"
        )
    })?;
    let date = Local::now().format("%Y-%m-%d").to_string();
    let message = PickMessage {
        original: &original,
        pr_number: pr,
        module: &cfg.dependency.module,
        tool_version: env!("CARGO_PKG_VERSION"),
        date: &date,
    }
    .render();
    git.amend_message(&message)?;
    git.delete_branch(&temp)?;
    info!(pr, branch = %branch, "picked treadmill commit");

    verify(root, cfg, Mode::Pick, tools)?;
    Ok(PickOutcome::Picked {
        pr,
        relation: bases.relation,
    })
}

fn temp_branch_name() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase();
    format!(
        "treadmill-pick-{}-{suffix}",
        Utc::now().format("%Y%m%d%H%M%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn temp_branch_names_are_unique_and_valid() {
        let pattern = Regex::new(r"^treadmill-pick-\d{14}-[a-z0-9]{6}$").expect("regex");
        let a = temp_branch_name();
        let b = temp_branch_name();
        assert!(pattern.is_match(&a), "{a}");
        assert_ne!(a, b);
    }
}
