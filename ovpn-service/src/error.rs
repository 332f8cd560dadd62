//! Error types for ovpn-service.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of service control and client profile operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The service manager exited non-zero.
    #[error("restart of {unit} failed (exit code {}): {output}", code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    RestartFailed {
        unit: String,
        code: Option<i32>,
        output: String,
    },

    #[error("client template not found: {path}")]
    TemplateMissing { path: PathBuf },

    #[error("certificate artifact not found: {path}")]
    ArtifactMissing { path: PathBuf },
}

/// Certificate issuance failures.
#[derive(Debug, Error)]
pub enum IssueError {
    /// At least one of `<name>.{csr,key,crt}` is already present.
    #[error("certificate '{name}' already exists")]
    AlreadyExists { name: String, existing: Vec<PathBuf> },

    /// build-key exited non-zero or left artifacts missing.
    #[error("failed to issue certificate '{name}' (exit code {}, missing: {})",
        exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()),
        display_paths(missing))]
    Failed {
        name: String,
        exit_code: Option<i32>,
        missing: Vec<PathBuf>,
        output: String,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "none".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ServiceError {
    ServiceError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn issue_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> IssueError {
    IssueError::Io {
        path: path.into(),
        source,
    }
}
