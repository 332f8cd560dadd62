//! `ovpnctl settings show|init`

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use ovpn_core::{settings as core_settings, ServerPaths, Settings};

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Print the effective settings and the paths derived from them.
    Show,

    /// Write ~/.ovpnctl/settings.yaml with defaults if it does not exist.
    Init,
}

pub fn run(cmd: SettingsCommand, settings: &Settings, explicit: Option<&Path>) -> Result<()> {
    match cmd {
        SettingsCommand::Show => show(settings, explicit),
        SettingsCommand::Init => {
            let (path, _) = core_settings::init().context("failed to initialise settings")?;
            println!("{} {}", "Settings:".green().bold(), path.display());
            Ok(())
        }
    }
}

fn show(settings: &Settings, explicit: Option<&Path>) -> Result<()> {
    let source = match explicit {
        Some(path) => path.display().to_string(),
        None => match dirs::home_dir() {
            Some(home) => {
                let path = core_settings::settings_path_at(&home);
                if path.exists() {
                    path.display().to_string()
                } else {
                    format!("{} (not found, using defaults)", path.display())
                }
            }
            None => "defaults".to_string(),
        },
    };
    println!("# source: {source}");
    print!(
        "{}",
        serde_yaml::to_string(settings).context("failed to serialize settings")?
    );

    let paths = ServerPaths::from_settings(settings);
    println!("# config:      {}", paths.config.display());
    println!("# backup:      {}", paths.backup.display());
    println!("# default:     {}", paths.default_template.display());
    println!("# status log:  {}", paths.status_log.display());
    println!("# keys:        {}", paths.keys_dir.display());
    println!("# clients:     {}", paths.clients_dir.display());
    Ok(())
}
