//! Side-effecting adapters: git, the search API, external tools and files.

pub mod config;
pub mod git;
pub mod github;
pub mod manifest;
pub mod sentinel;
pub mod tools;
