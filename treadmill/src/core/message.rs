//! Commit message synthesis for sync and pick.

use crate::core::manifest::PinnedVersion;

/// Line prefix that opens the section pick keeps.
pub const CHANGES_MARKER: &str = "Changes as of";

/// Inputs for the junk vendor commit message.
#[derive(Debug, Clone)]
pub struct JunkMessage<'a> {
    pub module: &'a str,
    pub old: &'a PinnedVersion,
    pub new: &'a PinnedVersion,
    pub integration_branch: &'a str,
    pub rebased: bool,
    /// Human-readable date, e.g. `2026-10-18`.
    pub date: &'a str,
}

impl JunkMessage<'_> {
    pub fn render(&self) -> String {
        let mut buf = format!(
            "[DO NOT MERGE] vendor in {} @ {}\n\n",
            self.module,
            self.new.version()
        );
        buf.push_str("DO NOT MERGE! This is a JUNK COMMIT, regenerated by every\n");
        buf.push_str("`treadmill --sync` run. It only exists to keep the vendored copy\n");
        buf.push_str("current so that CI can tell us what breaks.\n\n");
        buf.push_str(&format!("{CHANGES_MARKER} {}:\n\n", self.date));
        if self.old == self.new {
            buf.push_str(&format!(" - {} unchanged\n", self.new));
        } else {
            buf.push_str(&format!(" - {} -> {}\n", self.old, self.new.version()));
        }
        if self.rebased {
            buf.push_str(&format!(" - rebased onto {}\n", self.integration_branch));
        }
        buf
    }
}

/// Inputs for the harvested commit's message.
#[derive(Debug, Clone)]
pub struct PickMessage<'a> {
    /// Message of the treadmill commit being cherry-picked.
    pub original: &'a str,
    pub pr_number: u64,
    pub module: &'a str,
    pub tool_version: &'a str,
    pub date: &'a str,
}

impl PickMessage<'_> {
    /// Drop the automated preamble, keep everything from the first
    /// `Changes as of` line on, and prepend a provenance note.
    ///
    /// Without a marker line the whole body (everything after the subject) is
    /// kept.
    pub fn render(&self) -> String {
        let kept = changes_section(self.original)
            .unwrap_or_else(|| body_without_subject(self.original));
        let mut buf = format!("Changes needed for updated {} vendoring\n\n", self.module);
        buf.push_str(&format!(
            "Cherry-picked from treadmill PR #{} by treadmill {} on {}.\n",
            self.pr_number, self.tool_version, self.date
        ));
        let kept = kept.trim();
        if !kept.is_empty() {
            buf.push('\n');
            buf.push_str(kept);
            buf.push('\n');
        }
        buf
    }
}

fn changes_section(message: &str) -> Option<&str> {
    let mut offset = 0;
    for line in message.split_inclusive('\n') {
        if line.trim_start().starts_with(CHANGES_MARKER) {
            return Some(&message[offset..]);
        }
        offset += line.len();
    }
    None
}

fn body_without_subject(message: &str) -> &str {
    match message.split_once('\n') {
        Some((_, body)) => body,
        None => "",
    }
}
