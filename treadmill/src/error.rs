//! Outcomes that end a run with a dedicated exit code.
//!
//! Everything else travels as a plain `anyhow::Error` and exits with
//! [`exit_codes::FAILED`](crate::exit_codes::FAILED).

use std::path::PathBuf;

use thiserror::Error;

use crate::exit_codes;

#[derive(Debug, Error)]
pub enum Halt {
    /// A step between saving and re-applying the treadmill commit failed.
    #[error("{cause:#}\n\n{guidance}")]
    GuardedPhase {
        cause: anyhow::Error,
        sentinel: PathBuf,
        guidance: String,
    },

    /// The treadmill PR is based on newer history than the current branch.
    #[error(
        "treadmill PR #{pr} is based on newer {integration} ({remote}) than this branch ({local}).\n\
         Rebase this branch onto {integration} and re-vendor, or pass --accept-stale-base to pick anyway."
    )]
    StaleBase {
        pr: u64,
        integration: String,
        local: String,
        remote: String,
    },

    /// The change was made but did not verify.
    #[error("{} post-change check(s) failed: {}\n\n{procedure}", .failed.len(), .failed.join(", "))]
    VerificationFailed {
        failed: Vec<String>,
        procedure: String,
    },
}

impl Halt {
    pub fn exit_code(&self) -> i32 {
        match self {
            Halt::GuardedPhase { .. } => exit_codes::FAILED,
            Halt::StaleBase { .. } => exit_codes::STALE_BASE,
            Halt::VerificationFailed { .. } => exit_codes::VERIFY_FAILED,
        }
    }
}

/// Exit code for any error returned by an operation.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<Halt>()
        .map_or(exit_codes::FAILED, Halt::exit_code)
}
