//! The easy-rsa certificate index (`keys/index.txt`).

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{io_err, ServiceError};

static CN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"/CN=([^/]+)").expect("valid regex"));

/// First column of an index line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    Valid,
    Revoked,
    Expired,
    Unknown,
}

impl CertificateStatus {
    fn from_flag(flag: &str) -> Self {
        match flag {
            "V" => Self::Valid,
            "R" => Self::Revoked,
            "E" => Self::Expired,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }
}

/// One issued certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateEntry {
    pub name: String,
    pub status: CertificateStatus,
    /// Both `<name>.crt` and `<name>.key` are present in `keys/`.
    pub has_files: bool,
}

/// `(status, common name)` for every index line with a CN.
///
/// ```text
/// V	270111231001Z		02	unknown	/C=RU/ST=CFO/L=Moscow/O=rs/CN=office-laptop/name=EasyRSA
/// ```
pub fn parse_index(text: &str) -> Vec<(CertificateStatus, String)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let Some(captures) = CN_PATTERN.captures(line) else {
                tracing::warn!(line, "index line without CN");
                return None;
            };
            let name = captures[1].trim().to_string();
            if name.is_empty() {
                return None;
            }
            let flag = line.split_whitespace().next().unwrap_or_default();
            Some((CertificateStatus::from_flag(flag), name))
        })
        .collect()
}

/// Certificates listed in `keys_dir/index.txt`. A missing index is an empty
/// list.
pub fn list_certificates(keys_dir: &Path) -> Result<Vec<CertificateEntry>, ServiceError> {
    let index = keys_dir.join("index.txt");
    let text = match std::fs::read(&index) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %index.display(), "certificate index not found");
            return Ok(Vec::new());
        }
        Err(e) => return Err(io_err(&index, e)),
    };

    Ok(parse_index(&text)
        .into_iter()
        .map(|(status, name)| {
            let has_files = keys_dir.join(format!("{name}.crt")).exists()
                && keys_dir.join(format!("{name}.key")).exists();
            CertificateEntry {
                name,
                status,
                has_files,
            }
        })
        .collect())
}
