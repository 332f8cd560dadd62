//! Error types for ovpn-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from settings operations.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Underlying I/O failure, with the path that was being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with file path and line context from serde_yaml.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`, so we cannot locate `~/.ovpnctl/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// An explicitly requested settings file did not exist.
    #[error("settings file not found at {path}")]
    NotFound { path: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SettingsError {
    SettingsError::Io {
        path: path.into(),
        source,
    }
}
