//! Error types for argforge.
//!
//! Three families, one per stage:
//! - [`TemplateError`]: the template could not be turned into fragments
//! - [`BuildError`]: fragments could not be merged into a task
//! - [`SandboxViolation`]: a path escapes its trusted sandbox prefix
//!
//! None of them is retryable: construction is a pure function of its input.

use thiserror::Error;

use crate::parse::Stream;

/// Failure while merging fragments or building redirects and tasks.
///
/// Any of these aborts assembly of the current task. No partially built
/// task is ever returned alongside one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Reserving an output buffer failed
    #[error("out of memory reserving {requested} bytes")]
    OutOfMemory { requested: usize },

    /// A redirect target resolved to a glob pattern
    #[error("redirect target must name one file, not a glob pattern: {target}")]
    UnsupportedGlobRedirect { target: String },

    /// Pass-1 accounting disagrees with pass-2 output
    #[error("internal invariant violated in {what}: expected {expected} bytes, got {actual}")]
    InvariantViolation {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A file redirect was requested without file fragments
    #[error("file redirect for {stream} has no target")]
    MissingRedirectFile { stream: Stream },

    /// File fragments were supplied for a stream or pipe redirect
    #[error("redirect for {stream} does not take a file target")]
    UnexpectedRedirectFile { stream: Stream },

    /// Merge options are unusable
    #[error("invalid merge options: {reason}")]
    InvalidOptions { reason: String },
}

/// Failure while parsing a command template.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("conversion {conversion} at byte {offset} has no value")]
    MissingValue { conversion: String, offset: usize },

    #[error("{count} value(s) not consumed by the template")]
    UnusedValues { count: usize },

    #[error("conversion {conversion} expects {expected}, value {index} is not")]
    TypeMismatch {
        conversion: String,
        expected: &'static str,
        index: usize,
    },

    #[error("unknown conversion %{conversion} at byte {offset}")]
    UnknownConversion { conversion: String, offset: usize },

    #[error("template ends with a dangling escape")]
    TrailingEscape,

    #[error("redirect {operator} has no target")]
    MissingRedirectTarget { operator: &'static str },

    #[error("empty command at byte {offset}")]
    EmptyCommand { offset: usize },
}

/// A path falls outside the sandbox prefix it was built under.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SandboxViolation {
    #[error("{path} is outside sandbox prefix {prefix:?}")]
    OutsidePrefix { path: String, prefix: String },

    #[error("{path} climbs out of its sandbox prefix")]
    Traversal { path: String },
}

/// Combined error type for the parse-and-build flow.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Sandbox(#[from] SandboxViolation),

    #[error("configuration error: {reason}")]
    Config { reason: String },
}
