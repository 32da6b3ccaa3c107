//! Stable exit codes for the treadmill CLI.

/// Operation finished (including "nothing changed" and dry runs).
pub const OK: i32 = 0;
/// Precondition violation, git/tool failure, or guarded-phase failure.
pub const FAILED: i32 = 1;
/// Bad command line (reported by clap).
pub const USAGE: i32 = 2;
/// `--pick` refused: the treadmill PR is based on newer integration history.
pub const STALE_BASE: i32 = 3;
/// The change landed but post-change verification failed.
pub const VERIFY_FAILED: i32 = 4;
