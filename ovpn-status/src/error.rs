//! Error types for ovpn-status.

use std::path::PathBuf;

use thiserror::Error;

/// Failures reading the status log. Bad records are never errors.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("status log not found: {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown time zone '{name}'")]
    InvalidTimezone { name: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StatusError {
    StatusError::Io {
        path: path.into(),
        source,
    }
}
