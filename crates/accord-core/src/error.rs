//! Error types raised while constructing core values.

use miette::Diagnostic;
use thiserror::Error;

/// Malformed version, constraint, or marker text.
///
/// Carries the offending input and the byte offset where parsing stopped so
/// callers can render a precise diagnostic without re-parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("Failed to parse `{text}` at offset {position}: {message}")]
#[diagnostic(help("Check the version or marker expression for typos"))]
pub struct ParseError {
    /// The full input that failed to parse.
    pub text: String,
    /// Byte offset of the first unparseable character.
    pub position: usize,
    /// What the parser expected or rejected.
    pub message: String,
}

impl ParseError {
    pub fn new(text: impl Into<String>, position: usize, message: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            position,
            message: message.into(),
        }
    }
}

/// A requirement source that cannot be constructed: malformed URL,
/// nonexistent path, or unsupported VCS kind.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("Invalid source `{value}`: {reason}")]
#[diagnostic(help("URL sources need a scheme and host; path sources must exist"))]
pub struct InvalidSource {
    /// The URL or path as given by the caller.
    pub value: String,
    /// Why construction was rejected.
    pub reason: String,
}

impl InvalidSource {
    pub fn new(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            reason: reason.into(),
        }
    }
}
