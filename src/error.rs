use std::path::PathBuf;

use thiserror::Error;

/// Library error type for wallflow operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A wallpaper or data directory is missing, not a directory, or not creatable.
    #[error("filesystem error at {path}: {reason}")]
    Filesystem { path: PathBuf, reason: String },

    /// An OS-level resource (file handle, memory mapping) could not be acquired.
    #[error("resource error: {0}")]
    Resource(String),

    /// A wallpaper image could not be decoded into the canvas.
    #[error("decode error for {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// Unknown scratch buffer key or resolution group.
    #[error("not found: {0}")]
    NotFound(String),

    /// A candidate image does not fit its resolution group. Only used to drive
    /// exclusion during population; never returned from a public operation.
    #[error("invalid candidate {path}: {reason}")]
    Validation { path: PathBuf, reason: String },

    /// Configuration or layout file could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The desktop background could not be applied.
    #[error("could not apply wallpaper: {0}")]
    Apply(String),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON (config, aliases, layout) error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Filesystem {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn validation(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Validation {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
