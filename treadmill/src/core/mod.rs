//! Pure treadmill logic.
//!
//! Core modules must be free of I/O side effects. They operate on strings and
//! small value types so every rule can be tested without a repository.

pub mod base;
pub mod ci_order;
pub mod commit_shape;
pub mod manifest;
pub mod message;
pub mod pr_filter;
pub mod vendor_commit;
