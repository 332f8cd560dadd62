//! Restarting the OpenVPN systemd unit.

use std::process::Command;

use ovpn_core::{ServerPaths, ServiceSettings, Settings};

use crate::error::{io_err, ServiceError};

/// Completed restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartReport {
    pub unit: String,
    /// Combined stdout and stderr of the manager.
    pub output: String,
}

pub trait ServiceManager {
    fn restart(&self, unit: &str) -> Result<RestartReport, ServiceError>;
}

/// `openvpn@` + config stem, e.g. `openvpn@server`.
pub fn unit_name(settings: &Settings) -> String {
    let stem = ServerPaths::from_settings(settings).config_stem();
    format!("{}{}", settings.service.unit_prefix, stem)
}

/// `[sudo] systemctl restart <unit>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemctlManager {
    manager: String,
    use_sudo: bool,
}

impl SystemctlManager {
    pub fn new(manager: impl Into<String>, use_sudo: bool) -> Self {
        Self {
            manager: manager.into(),
            use_sudo,
        }
    }

    pub fn from_settings(settings: &ServiceSettings) -> Self {
        Self::new(settings.manager.clone(), settings.use_sudo)
    }

    /// The argv that [`ServiceManager::restart`] runs.
    pub fn command_line(&self, unit: &str) -> Vec<String> {
        let mut argv = Vec::with_capacity(4);
        if self.use_sudo {
            argv.push("sudo".to_string());
        }
        argv.push(self.manager.clone());
        argv.push("restart".to_string());
        argv.push(unit.to_string());
        argv
    }
}

impl ServiceManager for SystemctlManager {
    fn restart(&self, unit: &str) -> Result<RestartReport, ServiceError> {
        let argv = self.command_line(unit);
        tracing::info!(command = %argv.join(" "), "restarting service");

        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .output()
            .map_err(|e| io_err(&argv[0], e))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !stderr.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        if output.status.success() {
            tracing::info!(unit, "service restarted");
            return Ok(RestartReport {
                unit: unit.to_string(),
                output: combined,
            });
        }

        tracing::error!(unit, status = %output.status, "service restart failed");
        Err(ServiceError::RestartFailed {
            unit: unit.to_string(),
            code: output.status.code(),
            output: combined,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_name_uses_config_stem() {
        let settings = Settings {
            config_file_name: "office.conf".to_string(),
            ..Settings::default()
        };
        assert_eq!(unit_name(&settings), "openvpn@office");
    }

    #[test]
    fn command_line_prefixes_sudo() {
        let manager = SystemctlManager::new("systemctl", true);
        assert_eq!(
            manager.command_line("openvpn@server"),
            vec!["sudo", "systemctl", "restart", "openvpn@server"]
        );
        let manager = SystemctlManager::new("systemctl", false);
        assert_eq!(manager.command_line("x")[0], "systemctl");
    }

    #[test]
    #[cfg(unix)]
    fn successful_manager_reports_unit() {
        let report = SystemctlManager::new("true", false)
            .restart("openvpn@server")
            .unwrap();
        assert_eq!(report.unit, "openvpn@server");
    }

    #[test]
    #[cfg(unix)]
    fn failing_manager_reports_exit_code() {
        let err = SystemctlManager::new("false", false)
            .restart("openvpn@server")
            .unwrap_err();
        match err {
            ServiceError::RestartFailed { code, unit, .. } => {
                assert_eq!(code, Some(1));
                assert_eq!(unit, "openvpn@server");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_manager_is_io_error() {
        let err = SystemctlManager::new("definitely-not-a-service-manager", false)
            .restart("x")
            .unwrap_err();
        assert!(matches!(err, ServiceError::Io { .. }));
    }
}
