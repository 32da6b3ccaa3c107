//! CLI tests for the `treadmill` binary.
//!
//! Spawns the binary against fixture repositories and checks exit codes and
//! that refused runs leave the repository untouched.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use treadmill::exit_codes;
use treadmill::test_support::TestRepo;

fn treadmill(repo: &TestRepo, config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_treadmill"))
        .arg("-C")
        .arg(repo.path())
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run treadmill")
}

fn treadmill_repo() -> (TestRepo, std::path::PathBuf) {
    let repo = TestRepo::new().expect("repo");
    repo.make_treadmill_branch("treadmill", "origin/main")
        .expect("treadmill branch");
    let config = repo.write_config(&repo.config()).expect("config");
    (repo, config)
}

#[test]
fn mode_is_required_and_exclusive() {
    let (repo, config) = treadmill_repo();

    let none = treadmill(&repo, &config, &[]);
    assert_eq!(none.status.code(), Some(exit_codes::USAGE));

    let both = treadmill(&repo, &config, &["--sync", "--pick"]);
    assert_eq!(both.status.code(), Some(exit_codes::USAGE));
}

#[test]
fn sentinel_aborts_before_touching_git() {
    let (repo, config) = treadmill_repo();
    repo.set_dependency_head("v1.1.0-dev.2").expect("dep head");
    fs::write(repo.sentinel_path(), "From 0000\n").expect("write sentinel");
    let head = repo.head().expect("head");
    let reflog = repo.git(&["reflog"]).expect("reflog");

    let out = treadmill(&repo, &config, &["--sync"]);

    assert_eq!(out.status.code(), Some(exit_codes::FAILED));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("treadmill-recovery.patch"), "{stderr}");
    assert_eq!(repo.head().expect("head"), head);
    assert_eq!(repo.git(&["reflog"]).expect("reflog"), reflog);
    assert!(repo.sentinel_path().exists());
}

#[test]
fn dirty_tree_aborts() {
    let (repo, config) = treadmill_repo();
    fs::write(repo.path().join("go.mod"), "module example.com/widget\n").expect("write");
    let reflog = repo.git(&["reflog"]).expect("reflog");

    let out = treadmill(&repo, &config, &["--sync"]);

    assert_eq!(out.status.code(), Some(exit_codes::FAILED));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("uncommitted changes"), "{stderr}");
    assert_eq!(repo.git(&["reflog"]).expect("reflog"), reflog);
}

#[test]
fn sync_twice_reports_nothing_changed() {
    let (repo, config) = treadmill_repo();
    repo.set_dependency_head("v1.1.0-dev.2").expect("dep head");

    let first = treadmill(&repo, &config, &["--sync"]);
    assert_eq!(
        first.status.code(),
        Some(exit_codes::OK),
        "{}",
        String::from_utf8_lossy(&first.stderr)
    );
    let head = repo.head().expect("head");

    let second = treadmill(&repo, &config, &["--sync"]);
    assert_eq!(second.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&second.stdout);
    assert!(
        stdout.contains("Nothing changed (same pin, same base, same tree)"),
        "{stdout}"
    );
    assert_eq!(repo.head().expect("head"), head);
}

#[test]
fn dry_run_exits_cleanly() {
    let (repo, config) = treadmill_repo();
    repo.set_dependency_head("v1.1.0-dev.2").expect("dep head");
    let head = repo.head().expect("head");

    let out = treadmill(&repo, &config, &["--sync", "--dry-run"]);

    assert_eq!(out.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&out.stdout).contains("[dry-run]"));
    assert_eq!(repo.head().expect("head"), head);
}

#[test]
fn verification_failure_has_its_own_code() {
    let (repo, _) = treadmill_repo();
    repo.set_dependency_head("v1.1.0-dev.2").expect("dep head");
    let mut cfg = repo.config();
    cfg.commands.docs_xref = vec!["false".to_string()];
    let config = repo.write_config(&cfg).expect("config");

    let out = treadmill(&repo, &config, &["--sync"]);

    assert_eq!(out.status.code(), Some(exit_codes::VERIFY_FAILED));
    assert!(String::from_utf8_lossy(&out.stderr).contains("post-change check(s) failed"));
}
