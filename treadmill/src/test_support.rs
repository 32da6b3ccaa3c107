//! Test-only fixtures: a throwaway upstream, a clone to run treadmill in, and
//! shell scripts standing in for the vendoring tools.
//!
//! Layout under one temp dir:
//!
//! ```text
//! acme/widget.git   bare upstream (matches the `acme/widget` slug)
//! seed/             clone used to push new integration commits
//! work/             clone treadmill operates on
//! dep-head          version the fake dependency's development head is at
//! repin.sh          rewrites go.mod / go.sum from dep-head
//! revendor.sh       rewrites vendor/ from dep-head
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::core::ci_order::rewrite_task_order;
use crate::core::manifest::PinnedVersion;
use crate::core::message::JunkMessage;
use crate::io::config::TreadmillConfig;
use crate::io::github::SearchApi;

pub const MODULE: &str = "example.com/dep";
pub const BASE_VERSION: &str = "v1.0.0";
pub const DEV_VERSION: &str = "v1.1.0-dev.1";
pub const PR_TITLE: &str = "DO NOT MERGE: dep vendor treadmill";
pub const TREADMILL_SUBJECT: &str = "Vendor treadmill: keep widget building";

/// CI file on the integration branch, in its natural order.
pub const CIRRUS: &str = "---
validate_task:
    script: make validate

build_task:
    depends_on:
        - validate
    script: make

buildah_bud_test_task:
    depends_on:
        - build
    script: run-bud

success_task:
    depends_on:
        - validate
        - build
        - buildah_bud_test
    script: true
";

pub struct TestRepo {
    _temp: TempDir,
    base: PathBuf,
    seed: PathBuf,
    work: PathBuf,
}

impl TestRepo {
    /// Upstream with one integration commit pinning `BASE_VERSION`, cloned
    /// into `work/`; the dependency head starts at `DEV_VERSION`.
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp dir")?;
        let base = temp.path().to_path_buf();
        let upstream = base.join("acme").join("widget.git");
        let seed = base.join("seed");
        let work = base.join("work");
        fs::create_dir_all(&upstream).context("create upstream dir")?;
        fs::create_dir_all(&seed).context("create seed dir")?;

        git_in(&upstream, &["init", "-q", "--bare"])?;
        git_in(&upstream, &["symbolic-ref", "HEAD", "refs/heads/main"])?;

        git_in(&seed, &["init", "-q"])?;
        git_in(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
        configure_identity(&seed)?;
        write_baseline(&seed)?;
        git_in(&seed, &["add", "-A"])?;
        git_in(&seed, &["commit", "-q", "-m", "Initial widget"])?;
        let upstream_url = upstream.to_string_lossy().to_string();
        git_in(&seed, &["remote", "add", "origin", &upstream_url])?;
        git_in(&seed, &["push", "-q", "origin", "main"])?;

        let work_arg = work.to_string_lossy().to_string();
        git_in(&base, &["clone", "-q", &upstream_url, &work_arg])?;
        configure_identity(&work)?;

        let repo = Self {
            _temp: temp,
            base,
            seed,
            work,
        };
        repo.set_dependency_head(DEV_VERSION)?;
        repo.write_scripts()?;
        Ok(repo)
    }

    /// Working clone treadmill runs in.
    pub fn path(&self) -> &Path {
        &self.work
    }

    /// Config wired to the fixture's scripts; checks always pass.
    pub fn config(&self) -> TreadmillConfig {
        let mut cfg = TreadmillConfig::default();
        cfg.upstream.repo = "acme/widget".to_string();
        cfg.dependency.module = MODULE.to_string();
        cfg.treadmill.pr_title = PR_TITLE.to_string();
        cfg.commands.repin = vec![
            "sh".to_string(),
            self.base.join("repin.sh").to_string_lossy().to_string(),
        ];
        cfg.commands.revendor = vec![
            "sh".to_string(),
            self.base.join("revendor.sh").to_string_lossy().to_string(),
        ];
        cfg.commands.build = vec!["true".to_string()];
        cfg.commands.docs_xref = vec!["true".to_string()];
        cfg.commands.integration_dry_run = vec!["true".to_string()];
        cfg
    }

    /// Write `cfg` as TOML outside the working tree and return its path.
    pub fn write_config(&self, cfg: &TreadmillConfig) -> Result<PathBuf> {
        let path = self.base.join("treadmill.toml");
        let text = toml::to_string(cfg).context("serialize config")?;
        fs::write(&path, text).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Run git in the working clone.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        git_in(&self.work, args)
    }

    pub fn head(&self) -> Result<String> {
        Ok(self.git(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    pub fn rev(&self, rev: &str) -> Result<String> {
        Ok(self.git(&["rev-parse", rev])?.trim().to_string())
    }

    /// Move the dependency's development head to `version`.
    pub fn set_dependency_head(&self, version: &str) -> Result<()> {
        let path = self.base.join("dep-head");
        fs::write(&path, format!("{version}\n")).with_context(|| format!("write {}", path.display()))
    }

    /// Commit `contents` to `file` on the upstream integration branch.
    ///
    /// Returns the new integration tip.
    pub fn advance_upstream(&self, file: &str, contents: &str) -> Result<String> {
        fs::write(self.seed.join(file), contents).with_context(|| format!("write {file}"))?;
        git_in(&self.seed, &["add", "-A"])?;
        git_in(&self.seed, &["commit", "-q", "-m", &format!("Update {file}")])?;
        git_in(&self.seed, &["push", "-q", "origin", "main"])?;
        Ok(git_in(&self.seed, &["rev-parse", "HEAD"])?.trim().to_string())
    }

    /// Fetch upstream into the working clone's remote-tracking refs.
    pub fn fetch(&self) -> Result<()> {
        self.git(&["fetch", "-q", "origin"])?;
        Ok(())
    }

    /// Run the fake re-pin and re-vendor scripts in the working clone.
    pub fn revendor(&self) -> Result<()> {
        for script in ["repin.sh", "revendor.sh"] {
            let path = self.base.join(script);
            let status = Command::new("sh")
                .arg(&path)
                .current_dir(&self.work)
                .status()
                .with_context(|| format!("spawn {script}"))?;
            if !status.success() {
                return Err(anyhow!("{script} failed"));
            }
        }
        Ok(())
    }

    /// Check out `name` at `start` holding a vendor commit for the current
    /// dependency head.
    pub fn make_vendor_branch(&self, name: &str, start: &str) -> Result<()> {
        self.git(&["checkout", "-q", "-B", name, start])?;
        self.revendor()?;
        self.git(&["add", "-A", "go.mod", "go.sum", "vendor"])?;
        self.git(&["commit", "-q", "-m", &format!("Vendor {MODULE}")])?;
        Ok(())
    }

    /// Check out `name` at `start` with the junk vendor commit and the
    /// treadmill commit on top, as a sync would leave it.
    pub fn make_treadmill_branch(&self, name: &str, start: &str) -> Result<()> {
        self.git(&["checkout", "-q", "-B", name, start])?;
        self.revendor()?;
        let cfg = self.config();
        let ci_path = self.work.join(&cfg.ci.path);
        let ci = fs::read_to_string(&ci_path).context("read CI file")?;
        fs::write(&ci_path, rewrite_task_order(&ci, &cfg.task_order())).context("write CI file")?;

        let head = fs::read_to_string(self.base.join("dep-head")).context("read dep-head")?;
        let old = PinnedVersion::new(MODULE, BASE_VERSION);
        let new = PinnedVersion::new(MODULE, head.trim());
        let junk = JunkMessage {
            module: MODULE,
            old: &old,
            new: &new,
            integration_branch: "main",
            rebased: false,
            date: "2026-10-01",
        }
        .render();
        self.git(&["add", "-A", "."])?;
        self.git(&["commit", "-q", "-m", &junk])?;

        fs::write(
            self.work.join("widget.go"),
            "package widget\n\n// Uses the new dep API.\nconst DepAPI = 2\n",
        )
        .context("write widget.go")?;
        let message = format!(
            "{TREADMILL_SUBJECT}\n\n\
             Maintained by treadmill; amend fixes for the new dependency here.\n\n\
             Changes as of 2026-10-01:\n\n - switch widget to the new dep API\n"
        );
        self.git(&["commit", "-q", "-a", "-m", &message])?;
        Ok(())
    }

    /// Publish `rev` as the head of pull request `number` on the upstream.
    pub fn publish_pr(&self, number: u64, rev: &str) -> Result<()> {
        let refspec = format!("{rev}:refs/pull/{number}/head");
        self.git(&["push", "-q", "-f", "origin", &refspec])?;
        Ok(())
    }

    pub fn sentinel_path(&self) -> PathBuf {
        self.work.join(TreadmillConfig::default().sentinel_file)
    }

    fn write_scripts(&self) -> Result<()> {
        let dep_head = self.base.join("dep-head");
        let dep_head = dep_head.to_string_lossy();
        let repin = format!(
            "set -e\n\
             v=$(cat '{dep_head}')\n\
             printf 'module example.com/widget\\n\\ngo 1.22\\n\\nrequire (\\n\\t{MODULE} %s\\n\\texample.com/other v0.3.0 // indirect\\n)\\n' \"$v\" > go.mod\n\
             printf '{MODULE} %s h1:fake\\n' \"$v\" > go.sum\n"
        );
        let revendor = format!(
            "set -e\n\
             v=$(cat '{dep_head}')\n\
             mkdir -p vendor/{MODULE}\n\
             printf '# {MODULE} %s\\n' \"$v\" > vendor/modules.txt\n\
             printf 'package dep // %s\\n' \"$v\" > vendor/{MODULE}/dep.go\n\
             printf 'package dep\\n\\nconst Extra = true\\n' > vendor/{MODULE}/extra.go\n"
        );
        fs::write(self.base.join("repin.sh"), repin).context("write repin.sh")?;
        fs::write(self.base.join("revendor.sh"), revendor).context("write revendor.sh")?;
        Ok(())
    }
}

fn write_baseline(dir: &Path) -> Result<()> {
    let files = [
        (
            "go.mod",
            format!(
                "module example.com/widget\n\ngo 1.22\n\nrequire (\n\t{MODULE} {BASE_VERSION}\n\texample.com/other v0.3.0 // indirect\n)\n"
            ),
        ),
        ("go.sum", format!("{MODULE} {BASE_VERSION} h1:fake\n")),
        ("vendor/modules.txt", format!("# {MODULE} {BASE_VERSION}\n")),
        (
            "vendor/example.com/dep/dep.go",
            format!("package dep // {BASE_VERSION}\n"),
        ),
        ("widget.go", "package widget\n".to_string()),
        (".cirrus.yml", CIRRUS.to_string()),
        ("README.md", "widget\n".to_string()),
    ];
    for (name, contents) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    }
    Ok(())
}

fn configure_identity(dir: &Path) -> Result<()> {
    git_in(dir, &["config", "user.name", "Treadmill Test"])?;
    git_in(dir, &["config", "user.email", "treadmill@example.com"])?;
    git_in(dir, &["config", "commit.gpgsign", "false"])?;
    Ok(())
}

fn git_in(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Search API fake returning a fixed document.
pub struct CannedSearch {
    pub response: Value,
}

impl CannedSearch {
    /// One open PR titled [`PR_TITLE`].
    pub fn single_open(number: u64) -> Self {
        Self {
            response: json!({ "data": { "search": { "edges": [
                { "node": { "number": number, "title": PR_TITLE, "state": "OPEN" } }
            ] } } }),
        }
    }
}

impl SearchApi for CannedSearch {
    fn search(&self, _query: &str) -> Result<Value> {
        Ok(self.response.clone())
    }
}
