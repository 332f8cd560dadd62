//! Error types for ovpn-store.

use std::path::PathBuf;

use thiserror::Error;

/// Hard failures of config file operations.
///
/// Charset ambiguity and unencodable lines are not errors: they are absorbed
/// with a fallback and reported through `tracing` warnings.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The config file does not exist.
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    /// `restore_from_backup` found no `<config>_bak`.
    #[error("backup not found: {path}")]
    BackupMissing { path: PathBuf },

    /// `reset_to_default` found no `<config>_default`.
    #[error("default config not found: {path}")]
    DefaultMissing { path: PathBuf },

    /// Writing failed in the resolved charset and again in UTF-8.
    #[error("failed to write config file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The advisory lock next to the config file could not be taken.
    #[error("failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A route for the same destination is already pushed.
    #[error("route already present: {existing}")]
    DuplicateRoute { existing: String },

    #[error("failed to resolve '{host}': {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{host}' has no IPv4 address")]
    NoIpv4 { host: String },
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
