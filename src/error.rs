//! Error types for stub loading and serving.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning a raw path pattern into a matcher.
#[derive(Debug, Error)]
pub enum PatternError {
    /// The pattern is empty after stripping its query portion.
    #[error("path pattern is empty")]
    Empty,

    /// The partial path is not a valid regular expression.
    #[error("invalid regex in path pattern `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors raised while loading a stub definition.
#[derive(Debug, Error)]
pub enum StubError {
    /// The stub source could not be read.
    #[error("failed to read stub file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The stub source could not be parsed into a valid definition.
    #[error("invalid stub definition `{source_id}`: {reason}")]
    InvalidStubDefinition { source_id: String, reason: String },
}

impl StubError {
    pub(crate) fn invalid(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        StubError::InvalidStubDefinition {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the HTTP stub server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Stub(#[from] StubError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("stub server is already running on {0}")]
    AlreadyRunning(SocketAddr),
}

/// Errors raised while building a stub definition from its parts.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("unsupported HTTP method `{0}`")]
    InvalidMethod(String),

    #[error("invalid status code: {0}")]
    InvalidStatus(u16),

    #[error("invalid stub-delay `{0}`: expected non-negative seconds")]
    InvalidDelay(String),
}
