//! The vendor-commit heuristic.
//!
//! A commit counts as a dependency vendor commit iff, relative to its parent,
//! it changes the lock manifest, the checksum manifest and the vendor
//! metadata file, and touches at least one path under the tracked
//! dependency's vendored copy. This is path matching only; it does not look
//! at what the changes are.

use std::fmt;

/// File layout the heuristic checks against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorLayout {
    pub lock_file: String,
    pub checksum_file: String,
    pub vendor_metadata: String,
    /// Directory prefix of the tracked dependency, with trailing `/`.
    pub dependency_dir: String,
}

/// One unmet condition of the heuristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingChange {
    LockFile(String),
    ChecksumFile(String),
    VendorMetadata(String),
    DependencyTree(String),
}

impl fmt::Display for MissingChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingChange::LockFile(path)
            | MissingChange::ChecksumFile(path)
            | MissingChange::VendorMetadata(path) => write!(f, "{path}"),
            MissingChange::DependencyTree(dir) => write!(f, "anything under {dir}"),
        }
    }
}

/// Conditions `changed_paths` fails to meet, in a fixed order.
///
/// An empty result means the commit is a vendor commit.
pub fn missing_vendor_changes(changed_paths: &[String], layout: &VendorLayout) -> Vec<MissingChange> {
    let touched = |path: &str| changed_paths.iter().any(|p| p == path);
    let mut missing = Vec::new();
    if !touched(&layout.lock_file) {
        missing.push(MissingChange::LockFile(layout.lock_file.clone()));
    }
    if !touched(&layout.checksum_file) {
        missing.push(MissingChange::ChecksumFile(layout.checksum_file.clone()));
    }
    if !touched(&layout.vendor_metadata) {
        missing.push(MissingChange::VendorMetadata(layout.vendor_metadata.clone()));
    }
    if !changed_paths
        .iter()
        .any(|p| p.starts_with(&layout.dependency_dir))
    {
        missing.push(MissingChange::DependencyTree(layout.dependency_dir.clone()));
    }
    missing
}

/// Render missing conditions as `a, b, c`.
pub fn describe_missing(missing: &[MissingChange]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
