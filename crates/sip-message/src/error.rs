use thiserror::Error;

/// A type alias for handling `Result`s with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while parsing or constructing SIP messages.
///
/// These map onto the design-level `NetworkProblem` / `BadParam` kinds of
/// the wider transaction engine: a parse failure here is always reported
/// up as `NetworkProblem` by the caller, never panics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("empty message")]
    Empty,

    #[error("invalid start line: {0}")]
    InvalidStartLine(String),

    #[error("invalid status code: {0}")]
    InvalidStatusCode(String),

    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid header: {0}: {1}")]
    InvalidHeader(&'static str, String),

    #[error("Content-Length mismatch: expected {expected}, got {actual}")]
    ContentLengthMismatch { expected: usize, actual: usize },

    #[error("invalid URI: {0}")]
    InvalidUri(String),
}
