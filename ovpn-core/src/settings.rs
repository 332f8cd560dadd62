//! YAML settings document.
//!
//! # Storage layout
//!
//! ```text
//! ~/.ovpnctl/
//!   settings.yaml   (mode 0600, written by `init`)
//! ```
//!
//! # API pattern
//!
//! Every function that touches the home directory has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! A missing settings file is not an error: callers get [`Settings::default`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, SettingsError};

/// How the OpenVPN systemd unit is restarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service-manager binary (`systemctl`).
    pub manager: String,
    /// Prefix the command with `sudo`.
    pub use_sudo: bool,
    /// Unit name prefix; the config file stem is appended (`openvpn@server`).
    pub unit_prefix: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            manager: "systemctl".to_string(),
            use_sudo: true,
            unit_prefix: "openvpn@".to_string(),
        }
    }
}

/// Root settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the server config, its siblings and the status log.
    pub openvpn_root: PathBuf,
    pub config_file_name: String,
    /// Explicit charset for the config file; `None` means auto-detect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_encoding: Option<String>,
    /// easy-rsa 2.x directory (contains `vars`, `build-key`, `keys/`).
    pub easy_rsa_path: PathBuf,
    pub status_file_name: String,
    /// IANA zone that status timestamps are rendered in.
    pub target_timezone: String,
    pub service: ServiceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openvpn_root: PathBuf::from("/etc/openvpn"),
            config_file_name: "server.conf".to_string(),
            config_encoding: None,
            easy_rsa_path: PathBuf::from("/etc/openvpn/easy-rsa/2.0"),
            status_file_name: "openvpn-status1194.log".to_string(),
            target_timezone: "Europe/Moscow".to_string(),
            service: ServiceSettings::default(),
        }
    }
}

impl Settings {
    /// The explicit encoding override, ignoring blank values.
    pub fn encoding_override(&self) -> Option<&str> {
        self.config_encoding
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.ovpnctl/settings.yaml`. Pure, no I/O.
pub fn settings_path_at(home: &Path) -> PathBuf {
    home.join(".ovpnctl").join("settings.yaml")
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load settings from `<home>/.ovpnctl/settings.yaml`, or defaults if absent.
pub fn load_at(home: &Path) -> Result<Settings, SettingsError> {
    let path = settings_path_at(home);
    if !path.exists() {
        return Ok(Settings::default());
    }
    load_from(&path)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, SettingsError> {
    load_at(&home()?)
}

/// Load settings from an explicit file. Unlike [`load_at`], absence is an error.
pub fn load_from(path: &Path) -> Result<Settings, SettingsError> {
    if !path.exists() {
        return Err(SettingsError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    // An empty document is a valid "all defaults" file.
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| SettingsError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save settings to `<home>/.ovpnctl/settings.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, settings: &Settings) -> Result<PathBuf, SettingsError> {
    let path = settings_path_at(home);
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| home.to_path_buf());
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        set_dir_permissions(&dir)?;
    }

    let yaml = serde_yaml::to_string(settings)?;
    let tmp = path.with_file_name("settings.yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

/// Write a default settings file if none exists yet.
///
/// Idempotent: an existing file is loaded and returned unchanged.
pub fn init_at(home: &Path) -> Result<(PathBuf, Settings), SettingsError> {
    let path = settings_path_at(home);
    if path.exists() {
        return Ok((path.clone(), load_from(&path)?));
    }
    let settings = Settings::default();
    let path = save_at(home, &settings)?;
    Ok((path, settings))
}

/// `init_at` convenience wrapper.
pub fn init() -> Result<(PathBuf, Settings), SettingsError> {
    init_at(&home()?)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, SettingsError> {
    dirs::home_dir().ok_or(SettingsError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), SettingsError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), SettingsError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), SettingsError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), SettingsError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
