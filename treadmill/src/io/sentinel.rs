//! The sentinel patch file.
//!
//! Sync exports the treadmill commit here before it starts rewriting history
//! and deletes it only once the commit has been re-applied. Finding the file
//! at any other time means an earlier sync died halfway.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::io::git::Git;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentinel {
    path: PathBuf,
}

impl Sentinel {
    pub fn new(root: &Path, file_name: &str) -> Self {
        Self {
            path: root.join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Save `range` as a patch series.
    pub fn export(&self, git: &Git, range: &str) -> Result<()> {
        git.format_patch_to(range, &self.path)
            .with_context(|| format!("save {range} to {}", self.path.display()))?;
        info!(path = %self.path.display(), range, "saved patches");
        Ok(())
    }

    /// Re-apply the saved series on top of HEAD.
    pub fn apply(&self, git: &Git) -> Result<()> {
        git.am(&self.path)
            .with_context(|| format!("re-apply {}", self.path.display()))
    }

    /// Close the guarded window.
    pub fn remove(&self) -> Result<()> {
        fs::remove_file(&self.path)
            .with_context(|| format!("remove {}", self.path.display()))?;
        debug!(path = %self.path.display(), "removed sentinel");
        Ok(())
    }
}
