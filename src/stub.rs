//! Stub definitions.
//!
//! A [`StubDefinition`] is immutable once built. The directive headers are
//! pulled out of the declared response headers at build time, and the path
//! pattern is compiled then as well, so a malformed pattern fails the load
//! instead of a later request.

use crate::directives;
use crate::error::DefinitionError;
use crate::matcher::PathMatcher;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// HTTP method a stub answers to.
#[derive(Debug, Clone, Eq)]
pub enum Method {
    /// Wildcard, written `*` or `ANY` in stub files.
    Any,
    /// A method token such as `GET`, compared case-insensitively.
    Token(String),
}

impl Method {
    /// Parse a method token. Tokens are upper-cased; `*` and `ANY` become
    /// [`Method::Any`].
    pub fn parse(token: &str) -> Result<Self, DefinitionError> {
        let token = token.trim();
        if token == "*" || token.eq_ignore_ascii_case("any") {
            return Ok(Method::Any);
        }
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_alphabetic() || b == b'-') {
            return Err(DefinitionError::InvalidMethod(token.to_string()));
        }
        Ok(Method::Token(token.to_ascii_uppercase()))
    }

    /// Whether a request with `method` is accepted.
    pub fn accepts(&self, method: &str) -> bool {
        match self {
            Method::Any => true,
            Method::Token(token) => token.eq_ignore_ascii_case(method),
        }
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Method::Any, Method::Any) => true,
            (Method::Token(a), Method::Token(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Any => f.write_str("*"),
            Method::Token(token) => f.write_str(token),
        }
    }
}

/// Identity of a registered stub: method plus raw path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubKey {
    pub method: Method,
    pub path_pattern: String,
}

impl fmt::Display for StubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path_pattern)
    }
}

/// A single stub definition.
#[derive(Debug, Clone)]
pub struct StubDefinition {
    method: Method,
    path_pattern: String,
    path_matcher: PathMatcher,
    response_status: u16,
    response_headers: HashMap<String, String>,
    response_body: Option<Bytes>,
    delay: Option<Duration>,
    pre_conditions: HashMap<String, String>,
    post_conditions: HashMap<String, String>,
}

impl StubDefinition {
    /// Start building a stub for `method` and `path_pattern`.
    pub fn builder(method: Method, path_pattern: impl Into<String>) -> StubBuilder {
        StubBuilder {
            method,
            path_pattern: path_pattern.into(),
            status: 200,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path_pattern(&self) -> &str {
        &self.path_pattern
    }

    pub fn path_matcher(&self) -> &PathMatcher {
        &self.path_matcher
    }

    /// Literal query parameters the request must carry.
    pub fn query_constraints(&self) -> &HashMap<String, String> {
        self.path_matcher.query_constraints()
    }

    pub fn response_status(&self) -> u16 {
        self.response_status
    }

    /// Response headers, without the directive headers.
    pub fn response_headers(&self) -> &HashMap<String, String> {
        &self.response_headers
    }

    pub fn response_body(&self) -> Option<&Bytes> {
        self.response_body.as_ref()
    }

    /// Delay declared by `stub-delay`, if any.
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// Variables that must hold before this stub may match (`stub-only-if`).
    pub fn pre_conditions(&self) -> &HashMap<String, String> {
        &self.pre_conditions
    }

    /// Variables written when this stub wins (`stub-set`).
    pub fn post_conditions(&self) -> &HashMap<String, String> {
        &self.post_conditions
    }

    /// Registry key used for removal.
    pub fn key(&self) -> StubKey {
        StubKey {
            method: self.method.clone(),
            path_pattern: self.path_pattern.clone(),
        }
    }

    /// Whether this stub has the given method and raw pattern.
    pub fn has_key(&self, key: &StubKey) -> bool {
        self.method == key.method && self.path_pattern == key.path_pattern
    }
}

/// Builder for [`StubDefinition`].
#[derive(Debug, Clone)]
pub struct StubBuilder {
    method: Method,
    path_pattern: String,
    status: u16,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

impl StubBuilder {
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Add a response header. Directive headers are accepted here and
    /// consumed by [`build`](Self::build). A repeated name replaces the
    /// earlier value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Validate the parts and build the immutable definition.
    pub fn build(self) -> Result<StubDefinition, DefinitionError> {
        if !(100..=599).contains(&self.status) {
            return Err(DefinitionError::InvalidStatus(self.status));
        }

        let path_matcher = PathMatcher::compile(&self.path_pattern)?;

        let mut response_headers = HashMap::new();
        let mut pre_conditions = HashMap::new();
        let mut post_conditions = HashMap::new();
        let mut delay = None;

        for (name, value) in self.headers {
            if !directives::is_directive_header(&name) {
                response_headers.insert(name, value);
                continue;
            }
            match name.to_ascii_lowercase().as_str() {
                directives::ONLY_IF => pre_conditions = directives::parse_conditions(&value),
                directives::SET => post_conditions = directives::parse_conditions(&value),
                _ => delay = Some(parse_delay(&value)?),
            }
        }

        Ok(StubDefinition {
            method: self.method,
            path_pattern: self.path_pattern,
            path_matcher,
            response_status: self.status,
            response_headers,
            response_body: self.body.filter(|body| !body.is_empty()),
            delay,
            pre_conditions,
            post_conditions,
        })
    }
}

/// Parse a `stub-delay` value in (possibly fractional) seconds.
fn parse_delay(value: &str) -> Result<Duration, DefinitionError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| DefinitionError::InvalidDelay(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!(Method::parse("get").unwrap(), Method::Token("GET".to_string()));
        assert_eq!(Method::parse("*").unwrap(), Method::Any);
        assert_eq!(Method::parse("Any").unwrap(), Method::Any);
        assert!(Method::parse("GE T").is_err());
        assert!(Method::parse("").is_err());
    }

    #[test]
    fn test_directives_extracted() {
        let stub = StubDefinition::builder(Method::parse("GET").unwrap(), "test/path/expres")
            .header("Content-Type", "application/json")
            .header("stub-only-if", "variable1=value1,variable3=value3")
            .header("Stub-Set", "done")
            .header("stub-delay", "1.5")
            .build()
            .unwrap();

        assert_eq!(stub.response_headers().len(), 1);
        assert_eq!(stub.response_headers()["Content-Type"], "application/json");
        assert_eq!(stub.pre_conditions()["variable1"], "value1");
        assert_eq!(stub.pre_conditions()["variable3"], "value3");
        assert_eq!(stub.post_conditions()["done"], "");
        assert_eq!(stub.delay(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_invalid_delay_rejected() {
        for value in ["soon", "-1", "NaN", "inf"] {
            let result = StubDefinition::builder(Method::Any, "p")
                .header("stub-delay", value)
                .build();
            assert!(
                matches!(result, Err(DefinitionError::InvalidDelay(_))),
                "delay {value:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_invalid_status_rejected() {
        let result = StubDefinition::builder(Method::Any, "p").status(42).build();
        assert!(matches!(result, Err(DefinitionError::InvalidStatus(42))));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = StubDefinition::builder(Method::Any, "test/[a-").build();
        assert!(matches!(result, Err(DefinitionError::Pattern(_))));
    }

    #[test]
    fn test_empty_body_is_absent() {
        let stub = StubDefinition::builder(Method::Any, "p").body("").build().unwrap();
        assert!(stub.response_body().is_none());
    }

    #[test]
    fn test_key_identity() {
        let get = StubDefinition::builder(Method::parse("get").unwrap(), "a/b")
            .status(200)
            .build()
            .unwrap();
        let other = StubDefinition::builder(Method::parse("GET").unwrap(), "a/b")
            .status(404)
            .build()
            .unwrap();
        let post = StubDefinition::builder(Method::parse("POST").unwrap(), "a/b")
            .build()
            .unwrap();

        assert!(get.has_key(&other.key()));
        assert!(!get.has_key(&post.key()));
        assert_eq!(get.key().to_string(), "GET a/b");
    }
}
