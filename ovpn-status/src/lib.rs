//! # ovpn-status
//!
//! Read-only view of the OpenVPN status log: who is connected, from where,
//! and for how long. Timestamps in the log are UTC; everything returned is
//! expressed in one target zone (Europe/Moscow by default).

pub mod error;
pub mod parser;
pub mod time;

use std::path::Path;

use ovpn_charset::{decode_lossy, resolve_label};

pub use error::StatusError;
pub use parser::{ClientConnection, StatusLogParser, StatusSnapshot};
pub use time::TimeNormalizer;

use crate::error::io_err;

/// Decode the status log at `path` and parse it.
///
/// `encoding` is an explicit charset label; without one the log is read as
/// UTF-8, replacing invalid sequences.
pub fn read_status_file(
    path: &Path,
    encoding: Option<&str>,
    normalizer: TimeNormalizer,
) -> Result<StatusSnapshot, StatusError> {
    let text = read_status_text(path, encoding)?;
    Ok(StatusLogParser::new(normalizer).parse(&text))
}

/// The status log as text, decoded as described on [`read_status_file`].
pub fn read_status_text(path: &Path, encoding: Option<&str>) -> Result<String, StatusError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StatusError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(io_err(path, e)),
    };

    let label = encoding.map(str::trim).filter(|s| !s.is_empty());
    let resolved = label.and_then(|l| {
        let found = resolve_label(l);
        if found.is_none() {
            tracing::warn!(label = l, "unknown status log charset, reading as UTF-8");
        }
        found
    });

    match resolved {
        Some(encoding) => Ok(decode_lossy(&bytes, encoding).into_owned()),
        None => {
            let text = String::from_utf8_lossy(&bytes);
            if matches!(text, std::borrow::Cow::Owned(_)) {
                tracing::warn!(path = %path.display(), "status log is not valid UTF-8");
            }
            Ok(text.into_owned())
        }
    }
}
