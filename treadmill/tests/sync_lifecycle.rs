//! End-to-end `--sync` scenarios against a real upstream and working clone.
//!
//! Vendoring is done by the fixture's shell scripts, which write the
//! dependency version found in `dep-head`; build and checks are `true`
//! unless a test swaps them out.

use std::fs;

use treadmill::error::{Halt, exit_code_for};
use treadmill::exit_codes;
use treadmill::io::tools::ProcessRunner;
use treadmill::options::{Mode, Options};
use treadmill::sync::{SyncOutcome, run_sync};
use treadmill::test_support::{DEV_VERSION, TREADMILL_SUBJECT, TestRepo};

fn treadmill_repo() -> TestRepo {
    let repo = TestRepo::new().expect("repo");
    repo.make_treadmill_branch("treadmill", "origin/main")
        .expect("treadmill branch");
    repo
}

fn sync_opts() -> Options {
    Options::new(Mode::Sync)
}

fn subject(repo: &TestRepo, rev: &str) -> String {
    repo.git(&["log", "-1", "--format=%s", rev])
        .expect("log")
        .trim()
        .to_string()
}

#[test]
fn unchanged_dependency_is_a_no_op() {
    let repo = treadmill_repo();
    let before = repo.head().expect("head");

    let outcome = run_sync(repo.path(), &repo.config(), &sync_opts(), &ProcessRunner).expect("sync");

    match outcome {
        SyncOutcome::Unchanged { pin } => {
            assert_eq!(pin.as_str(), format!("example.com/dep {DEV_VERSION}"));
        }
        other => panic!("expected no-op, got {other:?}"),
    }
    assert_eq!(repo.head().expect("head"), before);
    assert_eq!(repo.git(&["rev-parse", "--abbrev-ref", "HEAD"]).expect("branch").trim(), "treadmill");
    assert!(!repo.sentinel_path().exists());
}

#[test]
fn new_dependency_head_rebuilds_the_pair_then_settles() {
    let repo = treadmill_repo();
    let before = repo.head().expect("head");
    let main = repo.rev("main").expect("main");
    repo.set_dependency_head("v1.1.0-dev.2").expect("dep head");

    let outcome = run_sync(repo.path(), &repo.config(), &sync_opts(), &ProcessRunner).expect("sync");

    let SyncOutcome::Updated(summary) = outcome else {
        panic!("expected an update, got {outcome:?}");
    };
    assert_eq!(summary.branch, "treadmill");
    assert_eq!(summary.old.version(), DEV_VERSION);
    assert_eq!(summary.new.version(), "v1.1.0-dev.2");
    assert!(!summary.rebased);
    assert!(summary.changed);

    let after = repo.head().expect("head");
    assert_ne!(after, before);
    assert_eq!(subject(&repo, "HEAD"), TREADMILL_SUBJECT);
    assert_eq!(
        subject(&repo, "HEAD^"),
        "[DO NOT MERGE] vendor in example.com/dep @ v1.1.0-dev.2"
    );
    let junk_body = repo.git(&["log", "-1", "--format=%b", "HEAD^"]).expect("body");
    assert!(junk_body.contains("JUNK COMMIT"));
    assert!(junk_body.contains(&format!(" - example.com/dep {DEV_VERSION} -> v1.1.0-dev.2")));
    assert_eq!(repo.rev("HEAD~2").expect("base"), main);

    let vendored = fs::read_to_string(repo.path().join("vendor/example.com/dep/dep.go")).expect("read");
    assert_eq!(vendored, "package dep // v1.1.0-dev.2\n");
    let widget = fs::read_to_string(repo.path().join("widget.go")).expect("read");
    assert!(widget.contains("DepAPI"), "treadmill commit must be re-applied");
    assert!(!repo.sentinel_path().exists());

    // A second run with nothing new leaves HEAD alone.
    let again = run_sync(repo.path(), &repo.config(), &sync_opts(), &ProcessRunner).expect("sync");
    assert!(matches!(again, SyncOutcome::Unchanged { .. }));
    assert_eq!(repo.head().expect("head"), after);
}

#[test]
fn integration_progress_rebases_the_pair() {
    let repo = treadmill_repo();
    let tip = repo.advance_upstream("README.md", "widget, now with docs\n").expect("advance");

    let outcome = run_sync(repo.path(), &repo.config(), &sync_opts(), &ProcessRunner).expect("sync");

    let SyncOutcome::Updated(summary) = outcome else {
        panic!("expected an update, got {outcome:?}");
    };
    assert!(summary.rebased);
    assert_eq!(summary.old, summary.new);
    assert_eq!(repo.rev("main").expect("main"), tip);
    assert_eq!(repo.rev("HEAD~2").expect("base"), tip);
    assert_eq!(subject(&repo, "HEAD"), TREADMILL_SUBJECT);
    let junk_body = repo.git(&["log", "-1", "--format=%b", "HEAD^"]).expect("body");
    assert!(junk_body.contains(" - rebased onto main"));
    let ci = fs::read_to_string(repo.path().join(".cirrus.yml")).expect("read ci");
    let expected = treadmill::core::ci_order::rewrite_task_order(
        treadmill::test_support::CIRRUS,
        &repo.config().task_order(),
    );
    assert_eq!(ci, expected);
}

#[test]
fn force_verifies_a_no_op() {
    let repo = treadmill_repo();
    let before = repo.head().expect("head");
    let mut cfg = repo.config();
    cfg.commands.build = vec!["false".to_string()];

    // Without --force the broken build is never reached.
    run_sync(repo.path(), &cfg, &sync_opts(), &ProcessRunner).expect("sync");

    let opts = Options {
        force: true,
        ..sync_opts()
    };
    let err = run_sync(repo.path(), &cfg, &opts, &ProcessRunner).unwrap_err();
    assert!(err.to_string().contains("build failed"));
    assert_eq!(repo.head().expect("head"), before);
}

#[test]
fn failed_check_reports_remediation() {
    let repo = treadmill_repo();
    repo.set_dependency_head("v1.1.0-dev.3").expect("dep head");
    let mut cfg = repo.config();
    cfg.commands.integration_dry_run = vec!["false".to_string()];

    let err = run_sync(repo.path(), &cfg, &sync_opts(), &ProcessRunner).unwrap_err();

    assert_eq!(exit_code_for(&err), exit_codes::VERIFY_FAILED);
    let text = format!("{err:#}");
    assert!(text.contains("integration dry run"), "{text}");
    assert!(text.contains("git rebase -i HEAD~2"));
    // The pair itself was rebuilt.
    assert_eq!(subject(&repo, "HEAD"), TREADMILL_SUBJECT);
    assert!(!repo.sentinel_path().exists());
}

#[test]
fn failure_inside_guarded_phase_keeps_sentinel() {
    let repo = treadmill_repo();
    let before = repo.head().expect("head");
    repo.set_dependency_head("v1.1.0-dev.4").expect("dep head");
    let mut cfg = repo.config();
    cfg.commands.revendor = vec!["false".to_string()];

    let err = run_sync(repo.path(), &cfg, &sync_opts(), &ProcessRunner).unwrap_err();

    assert_eq!(exit_code_for(&err), exit_codes::FAILED);
    let Some(Halt::GuardedPhase { sentinel, .. }) = err.downcast_ref::<Halt>() else {
        panic!("expected a guarded-phase failure, got {err:#}");
    };
    assert_eq!(sentinel, &repo.sentinel_path());
    assert!(repo.sentinel_path().exists());
    let text = err.to_string();
    assert!(text.contains("re-vendor failed"), "{text}");
    assert!(text.contains("Manual recovery required"));
    assert!(text.contains(&format!("git reset --hard {before}")));

    // The saved patch is enough to restore the treadmill commit by hand.
    repo.git(&["reset", "-q", "--hard", &before]).expect("reset");
    let patch = fs::read_to_string(repo.sentinel_path()).expect("read sentinel");
    assert!(patch.contains(TREADMILL_SUBJECT));
}

fn expect_guarded(err: &anyhow::Error, repo: &TestRepo) {
    assert_eq!(exit_code_for(err), exit_codes::FAILED);
    let Some(Halt::GuardedPhase { sentinel, .. }) = err.downcast_ref::<Halt>() else {
        panic!("expected a guarded-phase failure, got {err:#}");
    };
    assert_eq!(sentinel, &repo.sentinel_path());
    assert!(repo.sentinel_path().exists());
    assert!(err.to_string().contains("Manual recovery required"));
}

#[test]
fn treadmill_commit_that_no_longer_applies_keeps_sentinel() {
    let repo = treadmill_repo();
    let before = repo.head().expect("head");
    repo.advance_upstream("widget.go", "package widget\n\nconst DepAPI = 1\n")
        .expect("advance");

    let err = run_sync(repo.path(), &repo.config(), &sync_opts(), &ProcessRunner).unwrap_err();

    expect_guarded(&err, &repo);
    let text = err.to_string();
    assert!(text.contains("git am -q"), "{text}");
    assert!(text.contains(&format!("git reset --hard {before}")));
    let patch = fs::read_to_string(repo.sentinel_path()).expect("read sentinel");
    assert!(patch.contains("const DepAPI = 2"));
}

#[test]
fn rebase_conflict_keeps_sentinel() {
    let repo = TestRepo::new().expect("repo");
    repo.git(&["checkout", "-q", "-b", "local-base", "origin/main"]).expect("checkout");
    fs::write(repo.path().join("README.md"), "widget, local notes\n").expect("write");
    repo.git(&["commit", "-q", "-a", "-m", "Local notes"]).expect("commit");
    repo.make_treadmill_branch("treadmill", "local-base").expect("treadmill branch");
    repo.advance_upstream("README.md", "widget, upstream notes\n").expect("advance");

    let err = run_sync(repo.path(), &repo.config(), &sync_opts(), &ProcessRunner).unwrap_err();

    expect_guarded(&err, &repo);
    let text = err.to_string();
    assert!(text.contains("git rebase -q"), "{text}");
    assert!(text.contains("git rebase --abort"));
}

#[test]
fn failed_pull_returns_to_the_working_branch() {
    let repo = treadmill_repo();
    repo.git(&["checkout", "-q", "main"]).expect("checkout");
    fs::write(repo.path().join("README.md"), "widget, diverged\n").expect("write");
    repo.git(&["commit", "-q", "-a", "-m", "Local main commit"]).expect("commit");
    repo.git(&["checkout", "-q", "treadmill"]).expect("checkout");
    let before = repo.head().expect("head");
    repo.advance_upstream("README.md", "widget, upstream\n").expect("advance");

    let err = run_sync(repo.path(), &repo.config(), &sync_opts(), &ProcessRunner).unwrap_err();

    assert_eq!(exit_code_for(&err), exit_codes::FAILED);
    assert!(err.downcast_ref::<Halt>().is_none(), "{err:#}");
    assert!(err.to_string().contains("fast-forward main from origin"), "{err:#}");
    assert_eq!(
        repo.git(&["rev-parse", "--abbrev-ref", "HEAD"]).expect("branch").trim(),
        "treadmill"
    );
    assert_eq!(repo.head().expect("head"), before);
    assert!(!repo.sentinel_path().exists());
}

#[test]
fn missing_upstream_remote_is_reported() {
    let repo = treadmill_repo();
    let before = repo.head().expect("head");
    let mut cfg = repo.config();
    cfg.upstream.repo = "acme/other".to_string();

    let err = run_sync(repo.path(), &cfg, &sync_opts(), &ProcessRunner).unwrap_err();

    let text = err.to_string();
    assert!(text.contains("no git remote points at 'acme/other'"), "{text}");
    assert!(text.contains("git remote add upstream"));
    assert_eq!(repo.head().expect("head"), before);
    assert!(!repo.sentinel_path().exists());
}

#[test]
fn new_vendored_files_with_spaced_names_are_committed() {
    let repo = treadmill_repo();
    let name = "vendor/example.com/dep/new file \u{e9}.go";
    let mut cfg = repo.config();
    let script = cfg.commands.revendor[1].clone();
    cfg.commands.revendor = vec![
        "sh".to_string(),
        "-c".to_string(),
        format!("sh '{script}' && printf 'package dep\\n' > '{name}'"),
    ];

    let outcome = run_sync(repo.path(), &cfg, &sync_opts(), &ProcessRunner).expect("sync");

    let SyncOutcome::Updated(summary) = outcome else {
        panic!("expected an update, got {outcome:?}");
    };
    assert!(summary.changed);
    let junk_files = repo
        .git(&["ls-tree", "-r", "-z", "--name-only", "HEAD^", "vendor"])
        .expect("ls-tree");
    assert!(junk_files.split('\0').any(|path| path == name), "{junk_files:?}");
    assert!(repo.git(&["status", "--porcelain"]).expect("status").trim().is_empty());
    assert_eq!(subject(&repo, "HEAD"), TREADMILL_SUBJECT);
}

#[test]
fn dry_run_touches_nothing() {
    let repo = treadmill_repo();
    let before = repo.head().expect("head");
    repo.set_dependency_head("v1.1.0-dev.5").expect("dep head");
    let opts = Options {
        dry_run: true,
        ..sync_opts()
    };

    let outcome = run_sync(repo.path(), &repo.config(), &opts, &ProcessRunner).expect("sync");

    assert_eq!(outcome, SyncOutcome::DryRun);
    assert_eq!(repo.head().expect("head"), before);
    assert!(!repo.sentinel_path().exists());
    assert!(repo.git(&["status", "--porcelain"]).expect("status").trim().is_empty());
}

#[test]
fn refuses_the_integration_branch() {
    let repo = treadmill_repo();
    repo.git(&["checkout", "-q", "main"]).expect("checkout");
    let err = run_sync(repo.path(), &repo.config(), &sync_opts(), &ProcessRunner).unwrap_err();
    assert!(err.to_string().contains("refuse to run on 'main'"));
}
