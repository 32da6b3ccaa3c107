//! Manifest reader: the pinned dependency version in the working tree or at a ref.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::core::manifest::{PinnedVersion, parse_pinned_version};
use crate::io::git::Git;

/// Pinned version of `module` in the working tree's manifest.
pub fn read_pinned_worktree(root: &Path, manifest: &str, module: &str) -> Result<PinnedVersion> {
    let path = root.join(manifest);
    let contents =
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let pin = parse_pinned_version(&contents, module)
        .ok_or_else(|| anyhow!("{} does not require {module}", path.display()))?;
    debug!(pin = %pin, "pinned version (working tree)");
    Ok(pin)
}

/// Pinned version of `module` in `rev`'s manifest, without checking it out.
pub fn read_pinned_at(git: &Git, rev: &str, manifest: &str, module: &str) -> Result<PinnedVersion> {
    let contents = git
        .show_file(rev, manifest)
        .with_context(|| format!("read {manifest} at {rev}"))?;
    let pin = parse_pinned_version(&contents, module)
        .ok_or_else(|| anyhow!("{manifest} at {rev} does not require {module}"))?;
    debug!(rev, pin = %pin, "pinned version (ref)");
    Ok(pin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worktree_pin_reads_manifest() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join("go.mod"),
            "module x\n\nrequire example.com/dep v1.2.3\n",
        )
        .expect("write");
        let pin = read_pinned_worktree(temp.path(), "go.mod", "example.com/dep").expect("pin");
        assert_eq!(pin.as_str(), "example.com/dep v1.2.3");
    }

    #[test]
    fn missing_dependency_line_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("go.mod"), "module x\n").expect("write");
        let err = read_pinned_worktree(temp.path(), "go.mod", "example.com/dep").unwrap_err();
        assert!(err.to_string().contains("does not require example.com/dep"));
    }
}
