//! Git adapter for treadmill operations.
//!
//! Every repository query and mutation goes through this wrapper, so exit
//! status handling lives in one place. Nothing is cached: callers re-query
//! whenever they need repository state.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use tracing::{debug, instrument, warn};

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

impl StatusEntry {
    pub fn is_untracked(&self) -> bool {
        self.code == "??"
    }
}

/// One `git remote -v` fetch entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Return the current branch name (errors on detached HEAD).
    #[instrument(skip_all)]
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!("detached HEAD (refuse to run)"));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    /// Current branch, refusing to operate directly on the integration branch.
    pub fn working_branch(&self, integration: &str) -> Result<String> {
        let branch = self.current_branch()?;
        if branch == integration {
            return Err(anyhow!(
                "refuse to run on '{integration}': check out a treadmill or vendor branch first"
            ));
        }
        Ok(branch)
    }

    /// Resolve a revision to its full commit id.
    pub fn rev_parse(&self, rev: &str) -> Result<String> {
        let arg = format!("{rev}^{{commit}}");
        let out = self.run_capture(&["rev-parse", "--verify", &arg])?;
        Ok(out.trim().to_string())
    }

    /// Tree id for a commit (compares content across commits).
    pub fn tree_id(&self, rev: &str) -> Result<String> {
        let arg = format!("{rev}^{{tree}}");
        let out = self.run_capture(&["rev-parse", &arg])?;
        Ok(out.trim().to_string())
    }

    pub fn subject(&self, rev: &str) -> Result<String> {
        let out = self.run_capture(&["log", "-1", "--format=%s", rev])?;
        Ok(out.trim().to_string())
    }

    pub fn body(&self, rev: &str) -> Result<String> {
        let out = self.run_capture(&["log", "-1", "--format=%b", rev])?;
        Ok(out.trim_end().to_string())
    }

    /// Full commit message (subject + body).
    pub fn message(&self, rev: &str) -> Result<String> {
        let out = self.run_capture(&["log", "-1", "--format=%B", rev])?;
        Ok(out.trim_end().to_string())
    }

    /// Paths changed by `rev` relative to its first parent.
    #[instrument(skip_all, fields(rev))]
    pub fn changed_paths(&self, rev: &str) -> Result<Vec<String>> {
        let parent = format!("{rev}^");
        let out = self.run_capture(&["diff", "--name-only", &parent, rev])?;
        let paths: Vec<String> = out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        debug!(count = paths.len(), "changed paths");
        Ok(paths)
    }

    /// Commit where `branch` diverged from `base`.
    #[instrument(skip_all, fields(base, branch))]
    pub fn fork_point(&self, base: &str, branch: &str) -> Result<String> {
        let out = self.run_capture(&["merge-base", base, branch])?;
        let sha = out.trim().to_string();
        debug!(fork_point = %sha, "merge-base");
        Ok(sha)
    }

    /// True if `ancestor` is reachable from `descendant`.
    ///
    /// Exit 0 = ancestor, exit 1 = not ancestor, anything else is an error.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let args = ["merge-base", "--is-ancestor", ancestor, descendant];
        let output = self.run(&args)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()))
            }
        }
    }

    /// Configured remotes (fetch URLs only).
    pub fn remotes(&self) -> Result<Vec<Remote>> {
        let out = self.run_capture(&["remote", "-v"])?;
        let mut remotes = Vec::new();
        for line in out.lines() {
            let mut parts = line.split_whitespace();
            let (Some(name), Some(url), Some(kind)) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            if kind != "(fetch)" {
                continue;
            }
            remotes.push(Remote {
                name: name.to_string(),
                url: url.to_string(),
            });
        }
        Ok(remotes)
    }

    /// Local alias of the remote pointing at the upstream `owner/name` repository.
    #[instrument(skip_all, fields(slug))]
    pub fn upstream_remote(&self, slug: &str) -> Result<String> {
        let remotes = self.remotes()?;
        for remote in &remotes {
            if url_matches_slug(&remote.url, slug) {
                debug!(remote = %remote.name, url = %remote.url, "found upstream remote");
                return Ok(remote.name.clone());
            }
        }
        Err(anyhow!(
            "no git remote points at '{slug}' (add one with `git remote add upstream <url>`)"
        ))
    }

    /// Contents of `path` as recorded at `rev`, without checking it out.
    pub fn show_file(&self, rev: &str, path: &str) -> Result<String> {
        let spec = format!("{rev}:{path}");
        self.run_capture(&["show", &spec])
    }

    /// Resolve a path inside the git directory (e.g. `rebase-merge`).
    pub fn git_path(&self, name: &str) -> Result<PathBuf> {
        let out = self.run_capture(&["rev-parse", "--git-path", name])?;
        let path = PathBuf::from(out.trim());
        if path.is_absolute() {
            return Ok(path);
        }
        Ok(self.workdir.join(path))
    }

    /// Get status entries (including untracked) in porcelain format.
    ///
    /// Uses `-z` so paths come back verbatim instead of C-quoted.
    pub fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(&["status", "--porcelain=v1", "-z", "-uall"])?;
        parse_status_z(&out)
    }

    /// Untracked paths under `dir`.
    pub fn untracked_under(&self, dir: &str) -> Result<Vec<String>> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        Ok(self
            .status_porcelain()?
            .into_iter()
            .filter(|entry| entry.is_untracked() && entry.path.starts_with(&prefix))
            .map(|entry| entry.path)
            .collect())
    }

    /// Checkout an existing branch.
    #[instrument(skip_all, fields(branch))]
    pub fn checkout_branch(&self, branch: &str) -> Result<()> {
        debug!(branch, "checking out branch");
        self.run_checked(&["checkout", "-q", branch])?;
        Ok(())
    }

    /// Fast-forward the current branch from `remote`.
    #[instrument(skip_all, fields(remote, branch))]
    pub fn pull_ff_only(&self, remote: &str, branch: &str) -> Result<()> {
        self.run_checked(&["pull", "-q", "--ff-only", remote, branch])?;
        Ok(())
    }

    pub fn fetch(&self, remote: &str, refspec: &str) -> Result<()> {
        self.run_checked(&["fetch", "-q", "-f", remote, refspec])?;
        Ok(())
    }

    /// Write `range` as an mbox patch series to `path`.
    #[instrument(skip_all, fields(range, path = %path.display()))]
    pub fn format_patch_to(&self, range: &str, path: &Path) -> Result<()> {
        let series = self.run_capture(&["format-patch", "--stdout", range])?;
        if series.trim().is_empty() {
            return Err(anyhow!("git format-patch {range} produced no patches"));
        }
        fs::write(path, series).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    #[instrument(skip_all, fields(rev))]
    pub fn reset_hard(&self, rev: &str) -> Result<()> {
        self.run_checked(&["reset", "-q", "--hard", rev])?;
        Ok(())
    }

    /// Rebase the current branch onto `onto`, keeping commits that become empty.
    #[instrument(skip_all, fields(onto))]
    pub fn rebase_keep_empty(&self, onto: &str) -> Result<()> {
        self.run_checked(&["rebase", "-q", "--keep-empty", "--empty=keep", onto])?;
        Ok(())
    }

    pub fn add_paths(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["--literal-pathspecs", "add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run_checked(&args)?;
        Ok(())
    }

    /// Commit all tracked changes, even if nothing changed.
    #[instrument(skip_all)]
    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.run_checked(&["commit", "-q", "-a", "--allow-empty", "-m", message])?;
        Ok(())
    }

    /// Apply an mbox patch series on top of HEAD.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn am(&self, path: &Path) -> Result<()> {
        let arg = path.to_string_lossy();
        self.run_checked(&["am", "-q", &arg])?;
        Ok(())
    }

    #[instrument(skip_all, fields(rev))]
    pub fn cherry_pick_allow_empty(&self, rev: &str) -> Result<()> {
        self.run_checked(&["cherry-pick", "--allow-empty", "--keep-redundant-commits", rev])?;
        Ok(())
    }

    /// Replace HEAD's commit message.
    pub fn amend_message(&self, message: &str) -> Result<()> {
        self.run_checked(&["commit", "-q", "--amend", "--allow-empty", "-m", message])?;
        Ok(())
    }

    pub fn delete_branch(&self, branch: &str) -> Result<()> {
        self.run_checked(&["branch", "-q", "-D", branch])?;
        Ok(())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        debug!(args = %args.join(" "), "git");
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

/// True if `url` names the `owner/name` repository.
///
/// Accepts https, ssh, scp-like (`git@host:owner/name`) and local paths, with
/// or without a trailing `.git`.
pub fn url_matches_slug(url: &str, slug: &str) -> bool {
    let pattern = format!(r"(^|[/:]){}(\.git)?/?$", regex::escape(slug));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(url),
        Err(_) => false,
    }
}

/// Parse NUL-separated `status --porcelain=v1 -z` output.
///
/// Renames and copies carry a second field with the source path, which is
/// skipped; the entry keeps the destination.
fn parse_status_z(out: &str) -> Result<Vec<StatusEntry>> {
    let mut entries = Vec::new();
    let mut fields = out.split('\0').filter(|field| !field.is_empty());
    while let Some(field) = fields.next() {
        let entry = parse_status_entry(field)?;
        if entry.code.contains(['R', 'C']) {
            fields
                .next()
                .ok_or_else(|| anyhow!("rename entry without source path: '{field}'"))?;
        }
        entries.push(entry);
    }
    Ok(entries)
}

fn parse_status_entry(field: &str) -> Result<StatusEntry> {
    let (Some(code), Some(path)) = (field.get(..2), field.get(3..)) else {
        return Err(anyhow!("unexpected porcelain entry: '{field}'"));
    };
    if path.is_empty() {
        return Err(anyhow!("unexpected porcelain entry: '{field}'"));
    }
    Ok(StatusEntry {
        code: code.to_string(),
        path: path.to_string(),
    })
}
