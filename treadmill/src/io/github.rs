//! Remote PR locator backed by the GitHub GraphQL search API.
//!
//! The [`SearchApi`] trait keeps the HTTP transport out of the lookup logic;
//! tests feed canned JSON responses through a fake.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::core::pr_filter::{SearchHit, select_treadmill_pr};
use crate::io::config::UpstreamConfig;

const SEARCH_QUERY: &str = "query($q: String!) {
  search(query: $q, type: ISSUE, first: 10) {
    edges { node { ... on PullRequest { number title state } } }
  }
}";

/// Transport for a single search request.
pub trait SearchApi {
    /// Run `query` and return the raw JSON response document.
    fn search(&self, query: &str) -> Result<Value>;
}

/// GraphQL POST over HTTPS with an optional bearer token.
pub struct GraphqlSearch {
    client: Client,
    url: String,
}

impl GraphqlSearch {
    /// Build a client; the token is read from `upstream.token_env` if set.
    pub fn from_config(upstream: &UpstreamConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("treadmill/", env!("CARGO_PKG_VERSION"))),
        );
        match std::env::var(&upstream.token_env) {
            Ok(token) if !token.trim().is_empty() => {
                let value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                    .with_context(|| format!("${} is not a valid header value", upstream.token_env))?;
                headers.insert(AUTHORIZATION, value);
                debug!(env = %upstream.token_env, "using bearer token");
            }
            _ => debug!(env = %upstream.token_env, "no token, searching anonymously"),
        }

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(15))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            url: upstream.api_url.clone(),
        })
    }
}

impl SearchApi for GraphqlSearch {
    #[instrument(skip_all, fields(url = %self.url))]
    fn search(&self, query: &str) -> Result<Value> {
        let payload = json!({ "query": SEARCH_QUERY, "variables": { "q": query } });
        let resp = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .with_context(|| format!("POST {}", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(anyhow!("search API error {status}: {}", text.trim()));
        }
        resp.json::<Value>().context("decode search response")
    }
}

/// Search query for open PRs titled `title` in `repo`.
pub fn treadmill_query(repo: &str, title: &str) -> String {
    format!("repo:{repo} is:pr is:open in:title \"{title}\"")
}

/// Navigate `data.search.edges[].node{number,title,state}`.
///
/// Each missing field is its own error.
pub fn parse_search_response(doc: &Value) -> Result<Vec<SearchHit>> {
    if let Some(errors) = doc.get("errors").filter(|e| !e.is_null()) {
        return Err(anyhow!("search API returned errors: {errors}"));
    }
    let data = doc
        .get("data")
        .ok_or_else(|| anyhow!("search response has no 'data'"))?;
    let search = data
        .get("search")
        .ok_or_else(|| anyhow!("search response has no 'data.search'"))?;
    let edges = search
        .get("edges")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("search response has no 'data.search.edges' array"))?;

    let mut hits = Vec::with_capacity(edges.len());
    for (idx, edge) in edges.iter().enumerate() {
        let node = edge
            .get("node")
            .ok_or_else(|| anyhow!("search result {idx} has no 'node'"))?;
        // Issues match the query too but come back as empty fragments.
        if node.as_object().is_some_and(|obj| obj.is_empty()) {
            continue;
        }
        let number = node
            .get("number")
            .and_then(Value::as_u64)
            .ok_or_else(|| anyhow!("search result {idx} has no 'number'"))?;
        let title = node
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("search result {idx} has no 'title'"))?;
        let state = node
            .get("state")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("search result {idx} has no 'state'"))?;
        hits.push(SearchHit {
            number,
            title: title.to_string(),
            state: state.to_string(),
        });
    }
    Ok(hits)
}

/// Find the number of the single open treadmill PR.
#[instrument(skip_all, fields(repo = %repo, title = %title))]
pub fn locate_treadmill_pr<S: SearchApi>(api: &S, repo: &str, title: &str) -> Result<u64> {
    let query = treadmill_query(repo, title);
    let doc = api.search(&query)?;
    let hits = parse_search_response(&doc)?;
    debug!(hits = hits.len(), "search results");
    let number = select_treadmill_pr(&hits, title)?;
    info!(pr = number, "found treadmill PR");
    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pr_filter::LocateError;

    const TITLE: &str = "DO NOT MERGE: buildah vendor treadmill";

    struct CannedSearch {
        response: Value,
    }

    impl SearchApi for CannedSearch {
        fn search(&self, query: &str) -> Result<Value> {
            assert!(query.contains("repo:containers/podman"));
            assert!(query.contains(TITLE));
            Ok(self.response.clone())
        }
    }

    fn response(nodes: Vec<Value>) -> Value {
        let edges: Vec<Value> = nodes.into_iter().map(|node| json!({ "node": node })).collect();
        json!({ "data": { "search": { "edges": edges } } })
    }

    fn locate(nodes: Vec<Value>) -> Result<u64> {
        let api = CannedSearch {
            response: response(nodes),
        };
        locate_treadmill_pr(&api, "containers/podman", TITLE)
    }

    #[test]
    fn zero_matches_reports_no_pr() {
        let err = locate(Vec::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LocateError>(),
            Some(LocateError::NoResults { .. })
        ));
    }

    #[test]
    fn one_open_exact_match_returns_number() {
        let number = locate(vec![
            json!({ "number": 12, "title": TITLE, "state": "CLOSED" }),
            json!({ "number": 13, "title": TITLE, "state": "OPEN" }),
            json!({}),
        ])
        .expect("locate");
        assert_eq!(number, 13);
    }

    #[test]
    fn two_open_matches_is_ambiguous() {
        let err = locate(vec![
            json!({ "number": 13, "title": TITLE, "state": "OPEN" }),
            json!({ "number": 14, "title": TITLE, "state": "OPEN" }),
        ])
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LocateError>(),
            Some(LocateError::Multiple { numbers, .. }) if numbers == &vec![13, 14]
        ));
    }

    #[test]
    fn missing_fields_are_distinct_errors() {
        let err = parse_search_response(&json!({})).unwrap_err();
        assert!(err.to_string().contains("no 'data'"));
        let err = parse_search_response(&json!({ "data": {} })).unwrap_err();
        assert!(err.to_string().contains("no 'data.search'"));
        let err = parse_search_response(&json!({ "data": { "search": {} } })).unwrap_err();
        assert!(err.to_string().contains("'data.search.edges'"));
        let err = parse_search_response(&response(vec![json!({ "title": TITLE, "state": "OPEN" })]))
            .unwrap_err();
        assert!(err.to_string().contains("no 'number'"));
        let err = parse_search_response(&response(vec![json!({ "number": 1, "state": "OPEN" })]))
            .unwrap_err();
        assert!(err.to_string().contains("no 'title'"));
    }

    #[test]
    fn graphql_errors_are_reported() {
        let err = parse_search_response(&json!({ "errors": [{ "message": "rate limited" }] }))
            .unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }
}
