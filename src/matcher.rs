//! Request matching logic.
//!
//! Matches incoming requests against stub definitions.
//!
//! A stub path is a partial regular expression, anchored at both ends and
//! compiled case-insensitively when the stub is built. Literal query
//! constraints may follow an escaped question mark:
//!
//! ```text
//! test/.*/expres\?asdf=asdf
//! ```
//!
//! Without the `\?` delimiter the pattern is read as a URL and only its path
//! component takes part in matching.
//!
//! Note that the delimiter is ambiguous: a path that really contains a
//! backslash followed by `?` cannot be expressed.

use crate::error::PatternError;
use crate::stub::StubDefinition;
use regex::{Regex, RegexBuilder};
use std::borrow::Cow;
use std::collections::HashMap;
use url::Url;

const QUERY_DELIMITER: &str = "\\?";

/// An already-parsed HTTP request, as handed over by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingRequest {
    pub method: String,
    pub path: String,
    pub query_params: HashMap<String, String>,
}

impl IncomingRequest {
    /// Create a request without query parameters.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query_params: HashMap::new(),
        }
    }

    /// Create a request from a path and a raw (undecoded) query string.
    pub fn from_parts(method: impl Into<String>, path: &str, query_string: Option<&str>) -> Self {
        Self {
            method: method.into(),
            path: decode(path).into_owned(),
            query_params: parse_query_string(query_string.unwrap_or("")),
        }
    }

    /// Add a query parameter.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }
}

/// Compiled path and query constraints of a single stub.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    partial_path: String,
    regex: Regex,
    query: HashMap<String, String>,
}

impl PathMatcher {
    /// Compile a raw stub path pattern.
    ///
    /// Fails if the path portion is empty or is not a valid regular
    /// expression, so that bad patterns surface when the stub is loaded.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let (partial_path, query) = match pattern.split_once(QUERY_DELIMITER) {
            Some((path, _)) if !path.is_empty() => {
                let query_string = pattern.rsplit(QUERY_DELIMITER).next().unwrap_or("");
                (path.to_string(), parse_query_constraints(query_string))
            }
            _ => (url_path(pattern), HashMap::new()),
        };

        if partial_path.is_empty() {
            return Err(PatternError::Empty);
        }

        let regex = RegexBuilder::new(&format!("^(?:{})$", partial_path))
            .case_insensitive(true)
            .build()
            .map_err(|source| PatternError::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            partial_path,
            regex,
            query,
        })
    }

    /// The regex body the request path is matched against.
    pub fn partial_path(&self) -> &str {
        &self.partial_path
    }

    /// Literal query parameters the request must carry.
    pub fn query_constraints(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// Check the request path. A leading `/` on the request is optional
    /// against a pattern written without one.
    pub fn matches_path(&self, path: &str) -> bool {
        self.regex.is_match(path)
            || path
                .strip_prefix('/')
                .is_some_and(|relative| self.regex.is_match(relative))
    }

    /// Check that every constrained parameter is present with the same value.
    /// Unconstrained parameters are ignored.
    pub fn matches_query(&self, query_params: &HashMap<String, String>) -> bool {
        self.query
            .iter()
            .all(|(name, value)| query_params.get(name) == Some(value))
    }
}

/// Whether `stub` accepts `request` by method, path and query.
///
/// Preconditions on shared state are not checked here; see
/// [`StubRegistry::dispatch`](crate::registry::StubRegistry::dispatch).
pub fn matches(stub: &StubDefinition, request: &IncomingRequest) -> bool {
    if !stub.method().accepts(&request.method) {
        return false;
    }

    let path_matcher = stub.path_matcher();
    path_matcher.matches_path(&request.path) && path_matcher.matches_query(&request.query_params)
}

/// Path component of a pattern that carries no escaped query delimiter.
fn url_path(pattern: &str) -> String {
    if let Ok(url) = Url::parse(pattern) {
        if url.has_host() {
            return decode(url.path()).into_owned();
        }
    }

    let end = pattern.find(&['?', '#'][..]).unwrap_or(pattern.len());
    decode(&pattern[..end]).into_owned()
}

/// Query constraints declared after `\?`. Items without a value are ignored.
fn parse_query_constraints(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|part| part.split_once('='))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (decode(key).into_owned(), decode(value).into_owned()))
        .collect()
}

/// Parse a query string into key-value pairs.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        if let Some((key, value)) = part.split_once('=') {
            params.insert(decode(key).into_owned(), decode(value).into_owned());
        } else {
            params.insert(decode(part).into_owned(), String::new());
        }
    }

    params
}

fn decode(s: &str) -> Cow<'_, str> {
    urlencoding::decode(s).unwrap_or(Cow::Borrowed(s))
}
