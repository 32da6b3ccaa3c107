//! Vendor treadmill for a Go dependency.
//!
//! Keeps a never-merged "treadmill" branch rebased on the integration branch
//! with the dependency vendored at its development head, and later harvests
//! the fixes accumulated there into a real change. The architecture follows
//! a strict split:
//!
//! - **[`core`]**: Pure, deterministic rules (commit shapes, the vendor-commit
//!   heuristic, CI task order, messages, base comparison).
//! - **[`io`]**: Side-effecting adapters (git, the search API, external tools,
//!   config and the sentinel file). Traits at the seams enable fakes in tests.
//!
//! Orchestration modules ([`preflight`], [`sync`], [`pick`], [`verify`])
//! combine the two to implement the CLI operations.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod options;
pub mod pick;
pub mod preflight;
pub mod report;
pub mod sync;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod verify;
