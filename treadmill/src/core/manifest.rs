//! Pinned dependency version parsing for Go-style module manifests.

use std::fmt;

/// A pin token: `"<module> <version>"`, compared by string equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedVersion(String);

impl PinnedVersion {
    pub fn new(module: &str, version: &str) -> Self {
        Self(format!("{module} {version}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Version part of the token.
    pub fn version(&self) -> &str {
        self.0.rsplit(' ').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for PinnedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Find the pinned version of `module` in manifest `contents`.
///
/// Understands `require <module> <version>` lines and `require ( ... )`
/// blocks. Trailing `//` comments are ignored. Returns `None` if the module is
/// not required.
pub fn parse_pinned_version(contents: &str, module: &str) -> Option<PinnedVersion> {
    let mut in_require_block = false;
    for raw in contents.lines() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        if in_require_block {
            if line == ")" {
                in_require_block = false;
                continue;
            }
            if let Some(pin) = match_requirement(line, module) {
                return Some(pin);
            }
            continue;
        }
        let Some(rest) = line.strip_prefix("require") else {
            continue;
        };
        let rest = rest.trim();
        if rest == "(" {
            in_require_block = true;
            continue;
        }
        if let Some(pin) = match_requirement(rest, module) {
            return Some(pin);
        }
    }
    None
}

fn match_requirement(line: &str, module: &str) -> Option<PinnedVersion> {
    let mut parts = line.split_whitespace();
    let name = parts.next()?;
    let version = parts.next()?;
    if name != module {
        return None;
    }
    Some(PinnedVersion::new(name, version))
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}
