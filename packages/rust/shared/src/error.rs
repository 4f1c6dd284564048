//! Error types for FrameContext.
//!
//! Library crates use [`FrameContextError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Note that neither the context builder nor the metadata reader ever hands
//! one of these to its caller: both degrade to absent fields or to the
//! fallback bundle. Errors surface only from collaborators, channel writes,
//! configuration, and the CLI.

use std::path::PathBuf;

/// Top-level error type for all FrameContext operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameContextError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Channel payload could not be decoded into a context bundle.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// Transport channel misuse (e.g. a second write).
    #[error("channel error: {0}")]
    Channel(String),

    /// An ambient-state collaborator could not produce its value.
    #[error("collaborator `{name}` failed: {message}")]
    Collaborator { name: &'static str, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad URL, unknown selector, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FrameContextError>;

impl FrameContextError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a decode error from any displayable message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    /// Create a collaborator error tagged with the collaborator's name.
    pub fn collaborator(name: &'static str, msg: impl Into<String>) -> Self {
        Self::Collaborator {
            name,
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for FrameContextError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(err.to_string())
    }
}
