//! Loader for Mocktail stub files.
//!
//! A `.tail` file is line oriented:
//!
//! ```text
//! GET
//! test/path/expres\?asdf=asdf
//! 200
//! Content-Type: application/json
//! stub-set: loggedIn=true
//!
//! {
//! "asdf" : "adsfasd"
//! }
//! ```
//!
//! Method, path pattern and status code come first, one per line. Header
//! lines follow until the first blank line; everything after it is the body,
//! byte for byte.

use crate::error::StubError;
use crate::stub::{Method, StubDefinition};
use std::path::Path;

/// Read and parse the stub file at `path`.
pub fn load_stub(path: &Path) -> Result<StubDefinition, StubError> {
    let text = std::fs::read_to_string(path).map_err(|source| StubError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_stub(&path.display().to_string(), &text)
}

/// Parse stub file contents. `source_id` names the source in errors.
pub fn parse_stub(source_id: &str, text: &str) -> Result<StubDefinition, StubError> {
    let invalid = |reason: String| StubError::invalid(source_id, reason);
    let mut rest = text;

    let method_line = take_line(&mut rest).ok_or_else(|| invalid("missing method line".into()))?;
    let method = Method::parse(method_line).map_err(|e| invalid(e.to_string()))?;

    let path = take_line(&mut rest)
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .ok_or_else(|| invalid("missing path line".into()))?;

    let status_line = take_line(&mut rest).ok_or_else(|| invalid("missing status line".into()))?;
    let status: u16 = status_line
        .trim()
        .parse()
        .map_err(|_| invalid(format!("invalid status line `{}`", status_line.trim())))?;

    let mut builder = StubDefinition::builder(method, path).status(status);

    while let Some(line) = take_line(&mut rest) {
        if line.trim().is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .filter(|(name, _)| !name.trim().is_empty())
            .ok_or_else(|| invalid(format!("invalid header line `{}`", line)))?;
        builder = builder.header(name.trim(), value.trim());
    }

    if !rest.is_empty() {
        builder = builder.body(rest.to_string());
    }

    builder.build().map_err(|e| invalid(e.to_string()))
}

/// Split off the next line, without its terminator.
fn take_line<'a>(rest: &mut &'a str) -> Option<&'a str> {
    if rest.is_empty() {
        return None;
    }
    let (line, tail) = match rest.find('\n') {
        Some(end) => (&rest[..end], &rest[end + 1..]),
        None => (*rest, ""),
    };
    *rest = tail;
    Some(line.strip_suffix('\r').unwrap_or(line))
}
