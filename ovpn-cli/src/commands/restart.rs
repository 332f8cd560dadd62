//! `ovpnctl restart`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use ovpn_core::Settings;
use ovpn_service::{unit_name, ServiceManager, SystemctlManager};

#[derive(Args, Debug)]
pub struct RestartArgs {
    /// Print the command instead of running it.
    #[arg(long)]
    pub dry_run: bool,
}

impl RestartArgs {
    pub fn run(self, settings: &Settings) -> Result<()> {
        let unit = unit_name(settings);
        let manager = SystemctlManager::from_settings(&settings.service);

        if self.dry_run {
            println!("{}", manager.command_line(&unit).join(" "));
            return Ok(());
        }

        let report = manager
            .restart(&unit)
            .with_context(|| format!("failed to restart {unit}"))?;
        if !report.output.is_empty() {
            println!("{}", report.output);
        }
        println!("{} {}", "Restarted".green().bold(), report.unit);
        Ok(())
    }
}
