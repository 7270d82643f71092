//! Domain error taxonomy for coordinate parsing, dependency resolution and
//! conversion. Command runners wrap these in `anyhow` with context.

use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required configuration file or key is missing or unreadable
    #[error("config error in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// Path does not follow the root/area/module/version convention
    #[error("invalid module path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("rootless coordinate has no path: {0}")]
    Rootless(String),

    #[error("cannot find dependencies of a module with unspecified version: {0}")]
    UnspecifiedVersion(String),

    /// Structural error in a release manifest
    #[error("failed to parse manifest {path} (line {line}): {reason}")]
    Manifest {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// External converter returned nonzero or could not be started
    #[error("conversion of {path} failed: {reason}")]
    Conversion { path: PathBuf, reason: String },

    /// Converted display could not be read or written as XML
    #[error("invalid display document {path}: {reason}")]
    Document { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
