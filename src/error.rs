//! Crate-wide error type.
//!
//! Every failure surfaced to callers carries one of two coarse kinds
//! ([`ErrorKind::InvalidArgument`] for rejected input, [`ErrorKind::Generic`]
//! for everything else) plus a human-readable message.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MedialibError>;

/// Coarse classification reported alongside every error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller supplied malformed input (fetch spec, collection, property).
    InvalidArgument,
    /// Any other failure.
    Generic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "invalid argument"),
            ErrorKind::Generic => write!(f, "generic"),
        }
    }
}

/// Errors produced by the store, the query engine and the session façade.
#[derive(Debug, Error)]
pub enum MedialibError {
    /// Malformed fetch spec, collection or property request.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Store-internal or otherwise unclassified failure.
    #[error("{0}")]
    Generic(String),
    /// Referenced entry does not exist.
    #[error("no such entry: {0}")]
    NoSuchEntry(i32),
    /// Operation not permitted in the session's current state.
    #[error("session: {0}")]
    SessionState(&'static str),
    /// Configuration file could not be parsed.
    #[error("config: {0}")]
    Config(#[from] toml::de::Error),
    /// I/O error while reading configuration or library files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// JSON input could not be parsed.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl MedialibError {
    /// Builds an [`MedialibError::InvalidArgument`] from any message.
    pub fn invalid(msg: impl Into<String>) -> Self {
        MedialibError::InvalidArgument(msg.into())
    }

    /// Builds an [`MedialibError::Generic`] from any message.
    pub fn generic(msg: impl Into<String>) -> Self {
        MedialibError::Generic(msg.into())
    }

    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MedialibError::InvalidArgument(_)
            | MedialibError::NoSuchEntry(_)
            | MedialibError::SessionState(_)
            | MedialibError::Json(_) => ErrorKind::InvalidArgument,
            MedialibError::Generic(_) | MedialibError::Config(_) | MedialibError::Io(_) => {
                ErrorKind::Generic
            }
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            MedialibError::InvalidArgument(_) => "InvalidArgument",
            MedialibError::Generic(_) => "Generic",
            MedialibError::NoSuchEntry(_) => "NoSuchEntry",
            MedialibError::SessionState(_) => "SessionState",
            MedialibError::Config(_) => "Config",
            MedialibError::Io(_) => "Io",
            MedialibError::Json(_) => "Json",
        }
    }
}

/// Convenience wrapper that formats errors with their codes.
pub struct ErrorWithCode<'a>(pub &'a MedialibError);

impl fmt::Display for ErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}
