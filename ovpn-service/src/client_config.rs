//! Client `.ovpn` profiles rendered from templates in the OpenVPN root.

use std::path::{Path, PathBuf};

use ovpn_core::paths::{ROUTES_TEMPLATE, TUNNEL_TEMPLATE};
use ovpn_core::{CertificateName, ServerPaths};

use crate::error::{io_err, ServiceError};

/// Which template a profile is rendered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientProfile {
    /// All traffic through the tunnel.
    Tunnel,
    /// Only the pushed routes.
    Routes,
}

impl ClientProfile {
    pub fn template_file(&self) -> &'static str {
        match self {
            Self::Tunnel => TUNNEL_TEMPLATE,
            Self::Routes => ROUTES_TEMPLATE,
        }
    }

    pub fn file_suffix(&self) -> &'static str {
        match self {
            Self::Tunnel => "_tun",
            Self::Routes => "",
        }
    }

    /// `<cn><suffix>.ovpn`.
    pub fn file_name(&self, name: &CertificateName) -> String {
        format!("{name}{}.ovpn", self.file_suffix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedProfile {
    pub file_name: String,
    pub contents: String,
}

/// Fill `{key}` and `{cert}` in the profile template with the client's key
/// and certificate.
pub fn render_profile(
    paths: &ServerPaths,
    name: &CertificateName,
    profile: ClientProfile,
) -> Result<RenderedProfile, ServiceError> {
    let template_path = paths.client_template(profile.template_file());
    if !template_path.exists() {
        tracing::error!(path = %template_path.display(), "client template not found");
        return Err(ServiceError::TemplateMissing {
            path: template_path,
        });
    }
    let template = read_text(&template_path)?;
    let key = read_artifact(&paths.artifact(name, "key"))?;
    let cert = read_artifact(&paths.artifact(name, "crt"))?;

    Ok(RenderedProfile {
        file_name: profile.file_name(name),
        contents: template.replace("{key}", &key).replace("{cert}", &cert),
    })
}

/// Render a profile and write it into `out_dir`. Returns the written path.
pub fn export_profile(
    paths: &ServerPaths,
    name: &CertificateName,
    profile: ClientProfile,
    out_dir: &Path,
) -> Result<PathBuf, ServiceError> {
    let rendered = render_profile(paths, name, profile)?;
    std::fs::create_dir_all(out_dir).map_err(|e| io_err(out_dir, e))?;
    let target = out_dir.join(&rendered.file_name);
    std::fs::write(&target, rendered.contents).map_err(|e| io_err(&target, e))?;
    tracing::info!(path = %target.display(), "client profile written");
    Ok(target)
}

/// Sorted `*.ovpn` / `*.conf` file names in `clients_dir`; empty if the
/// directory does not exist.
pub fn list_client_configs(clients_dir: &Path) -> Result<Vec<String>, ServiceError> {
    let entries = match std::fs::read_dir(clients_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %clients_dir.display(), "clients directory not found");
            return Ok(Vec::new());
        }
        Err(e) => return Err(io_err(clients_dir, e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(clients_dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_profile = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("ovpn") | Some("conf")
        );
        if is_profile {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn read_artifact(path: &Path) -> Result<String, ServiceError> {
    if !path.exists() {
        tracing::error!(path = %path.display(), "certificate artifact not found");
        return Err(ServiceError::ArtifactMissing {
            path: path.to_path_buf(),
        });
    }
    read_text(path)
}

fn read_text(path: &Path) -> Result<String, ServiceError> {
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
