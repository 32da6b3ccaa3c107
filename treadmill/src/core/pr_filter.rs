//! Filtering of search results down to the single treadmill pull request.

use thiserror::Error;

/// One search result node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub number: u64,
    pub title: String,
    /// Forge state, e.g. `OPEN`, `CLOSED`, `MERGED`.
    pub state: String,
}

impl SearchHit {
    pub fn is_open(&self) -> bool {
        self.state.eq_ignore_ascii_case("open")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocateError {
    #[error("no pull requests found matching '{title}'")]
    NoResults { title: String },
    #[error("search returned {count} result(s) but none titled exactly '{title}'")]
    NoExactTitle { title: String, count: usize },
    #[error("no open pull request titled '{title}' (found only closed/merged ones)")]
    NoneOpen { title: String },
    #[error("multiple open pull requests titled '{title}': {}", format_numbers(.numbers))]
    Multiple { title: String, numbers: Vec<u64> },
}

fn format_numbers(numbers: &[u64]) -> String {
    numbers
        .iter()
        .map(|n| format!("#{n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Apply the pipeline: non-empty, exact title, open, exactly one.
pub fn select_treadmill_pr(hits: &[SearchHit], title: &str) -> Result<u64, LocateError> {
    if hits.is_empty() {
        return Err(LocateError::NoResults {
            title: title.to_string(),
        });
    }
    let titled: Vec<&SearchHit> = hits.iter().filter(|hit| hit.title == title).collect();
    if titled.is_empty() {
        return Err(LocateError::NoExactTitle {
            title: title.to_string(),
            count: hits.len(),
        });
    }
    let open: Vec<&SearchHit> = titled.into_iter().filter(|hit| hit.is_open()).collect();
    match open.as_slice() {
        [] => Err(LocateError::NoneOpen {
            title: title.to_string(),
        }),
        [only] => Ok(only.number),
        many => Err(LocateError::Multiple {
            title: title.to_string(),
            numbers: many.iter().map(|hit| hit.number).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE: &str = "DO NOT MERGE: buildah vendor treadmill";

    fn hit(number: u64, title: &str, state: &str) -> SearchHit {
        SearchHit {
            number,
            title: title.to_string(),
            state: state.to_string(),
        }
    }

    #[test]
    fn empty_results() {
        assert_eq!(
            select_treadmill_pr(&[], TITLE),
            Err(LocateError::NoResults {
                title: TITLE.to_string()
            })
        );
    }

    #[test]
    fn fuzzy_title_matches_are_rejected() {
        let hits = [hit(1, "Re: DO NOT MERGE: buildah vendor treadmill", "OPEN")];
        let err = select_treadmill_pr(&hits, TITLE).unwrap_err();
        assert!(matches!(err, LocateError::NoExactTitle { count: 1, .. }));
    }

    #[test]
    fn closed_only() {
        let hits = [hit(3, TITLE, "CLOSED"), hit(4, TITLE, "MERGED")];
        assert!(matches!(
            select_treadmill_pr(&hits, TITLE),
            Err(LocateError::NoneOpen { .. })
        ));
    }

    #[test]
    fn single_open_match_wins() {
        let hits = [hit(3, TITLE, "CLOSED"), hit(17, TITLE, "OPEN"), hit(5, "other", "OPEN")];
        assert_eq!(select_treadmill_pr(&hits, TITLE), Ok(17));
    }

    #[test]
    fn two_open_matches() {
        let hits = [hit(17, TITLE, "OPEN"), hit(18, TITLE, "OPEN")];
        let err = select_treadmill_pr(&hits, TITLE).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("multiple open pull requests titled '{TITLE}': #17, #18")
        );
    }
}
