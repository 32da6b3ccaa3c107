//! Shape checks for the treadmill commit pair.
//!
//! HEAD is the treadmill commit, recognized by its subject. HEAD^ is the junk
//! vendor commit, recognized by the `DO NOT MERGE ... JUNK COMMIT` marker in
//! its body.

use anyhow::{Context, Result};
use regex::Regex;

/// Marker the junk commit body must carry.
pub const JUNK_BODY_PATTERN: &str = r"(?s)DO NOT MERGE.*JUNK COMMIT";

#[derive(Debug, Clone)]
pub struct CommitShape {
    subject: Regex,
    junk_body: Regex,
}

impl CommitShape {
    pub fn new(subject_pattern: &str) -> Result<Self> {
        let subject = Regex::new(subject_pattern)
            .with_context(|| format!("compile subject pattern '{subject_pattern}'"))?;
        let junk_body = Regex::new(JUNK_BODY_PATTERN).context("compile junk body pattern")?;
        Ok(Self { subject, junk_body })
    }

    pub fn subject_pattern(&self) -> &str {
        self.subject.as_str()
    }

    pub fn is_treadmill_subject(&self, subject: &str) -> bool {
        self.subject.is_match(subject)
    }

    pub fn is_junk_body(&self, body: &str) -> bool {
        self.junk_body.is_match(body)
    }
}
