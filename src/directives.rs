//! Directive headers carried by stub definitions.
//!
//! A stub declares its state behaviour through three reserved response
//! headers. They are consumed when the stub is built and are never sent to
//! clients:
//!
//! - `stub-only-if`: variables that must hold before the stub may match
//! - `stub-set`: variables written when the stub wins a dispatch
//! - `stub-delay`: seconds to wait before the response body is written
//!
//! Condition lists use a comma-separated `key=value` grammar. A bare `key`
//! stands for `key=` (the empty value) and the last occurrence of a key wins.

use std::collections::HashMap;

/// Precondition list header.
pub const ONLY_IF: &str = "stub-only-if";
/// Postcondition list header.
pub const SET: &str = "stub-set";
/// Body delay header, in seconds.
pub const DELAY: &str = "stub-delay";

/// Returns true if `name` is one of the reserved directive headers.
pub fn is_directive_header(name: &str) -> bool {
    [ONLY_IF, SET, DELAY]
        .iter()
        .any(|directive| directive.eq_ignore_ascii_case(name))
}

/// Parse a directive value into `(key, value)` pairs in declaration order.
pub fn parse_pairs(value: &str) -> Vec<(String, String)> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once('=') {
            Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
            None => (item.to_string(), String::new()),
        })
        .collect()
}

/// Parse a directive value into a map, later keys overwriting earlier ones.
pub fn parse_conditions(value: &str) -> HashMap<String, String> {
    parse_pairs(value).into_iter().collect()
}
