//! Per-invocation options, fixed once the command line is parsed.

/// Primary operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Advance the treadmill.
    Sync,
    /// Harvest the treadmill PR.
    Pick,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub mode: Mode,
    /// Verify even when sync finds nothing changed.
    pub force: bool,
    /// Pick over a treadmill PR based on newer integration history.
    pub accept_stale_base: bool,
    /// Report planned actions without touching the repository.
    pub dry_run: bool,
}

impl Options {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            force: false,
            accept_stale_base: false,
            dry_run: false,
        }
    }
}
