pub mod cert;
pub mod clients;
pub mod config;
pub mod restart;
pub mod route;
pub mod settings;
pub mod status;

use std::path::Path;

use anyhow::{Context, Result};

use ovpn_core::{settings as core_settings, Settings};
use ovpn_store::ConfigFileStore;

/// Settings from `--settings`, or `~/.ovpnctl/settings.yaml` (defaults when
/// that file does not exist).
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let settings = match explicit {
        Some(path) => core_settings::load_from(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => core_settings::load().context("failed to load ~/.ovpnctl/settings.yaml")?,
    };
    tracing::debug!(
        openvpn_root = %settings.openvpn_root.display(),
        config = %settings.config_file_name,
        "settings loaded"
    );
    Ok(settings)
}

pub fn config_store(settings: &Settings) -> ConfigFileStore {
    ConfigFileStore::from_settings(settings)
}
