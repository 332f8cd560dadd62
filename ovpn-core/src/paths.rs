//! Every file location the tool touches, derived from [`Settings`].

use std::path::{Path, PathBuf};

use crate::settings::Settings;
use crate::types::CertificateName;

pub const BACKUP_SUFFIX: &str = "_bak";
pub const DEFAULT_SUFFIX: &str = "_default";
pub const LOCK_SUFFIX: &str = ".lock";

pub const TUNNEL_TEMPLATE: &str = "client_template_tun.ovpn";
pub const ROUTES_TEMPLATE: &str = "client_template.ovpn";

/// `<file>_bak` next to `config`.
pub fn backup_path_for(config: &Path) -> PathBuf {
    sibling_with_suffix(config, BACKUP_SUFFIX)
}

/// `<file>_default` next to `config`.
pub fn default_path_for(config: &Path) -> PathBuf {
    sibling_with_suffix(config, DEFAULT_SUFFIX)
}

/// `<file>.lock` next to `config`.
pub fn lock_path_for(config: &Path) -> PathBuf {
    sibling_with_suffix(config, LOCK_SUFFIX)
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}{suffix}"))
}

/// Resolved server layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPaths {
    pub root: PathBuf,
    pub config: PathBuf,
    pub backup: PathBuf,
    pub default_template: PathBuf,
    pub status_log: PathBuf,
    pub easy_rsa: PathBuf,
    pub keys_dir: PathBuf,
    pub clients_dir: PathBuf,
}

impl ServerPaths {
    pub fn from_settings(settings: &Settings) -> Self {
        let root = settings.openvpn_root.clone();
        let config = root.join(&settings.config_file_name);
        let easy_rsa = settings.easy_rsa_path.clone();
        Self {
            backup: backup_path_for(&config),
            default_template: default_path_for(&config),
            status_log: root.join(&settings.status_file_name),
            keys_dir: easy_rsa.join("keys"),
            clients_dir: root.join("clients"),
            easy_rsa,
            config,
            root,
        }
    }

    /// `keys/index.txt` maintained by easy-rsa.
    pub fn certificate_index(&self) -> PathBuf {
        self.keys_dir.join("index.txt")
    }

    /// Artifact path `keys/<cn>.<ext>`.
    pub fn artifact(&self, name: &CertificateName, ext: &str) -> PathBuf {
        self.keys_dir.join(format!("{name}.{ext}"))
    }

    pub fn client_template(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Config file name without its extension (`server.conf` → `server`).
    pub fn config_stem(&self) -> String {
        self.config
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
