//! ovpnctl core library: settings, derived server paths, shared newtypes.
//!
//! - [`settings`]: YAML settings document with load, save and init
//! - [`paths`]: [`ServerPaths`], every file location derived from settings
//! - [`types`]: [`CertificateName`]
//! - [`error`]: [`SettingsError`]

pub mod error;
pub mod paths;
pub mod settings;
pub mod types;

pub use error::SettingsError;
pub use paths::ServerPaths;
pub use settings::{ServiceSettings, Settings};
pub use types::{CertificateName, InvalidCertificateName};
