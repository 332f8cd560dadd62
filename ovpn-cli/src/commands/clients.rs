//! `ovpnctl clients list`

use anyhow::{Context, Result};
use clap::Subcommand;

use ovpn_core::{ServerPaths, Settings};
use ovpn_service::list_client_configs;

#[derive(Subcommand, Debug)]
pub enum ClientsCommand {
    /// List client config files in the `clients/` directory.
    List,
}

pub fn run(cmd: ClientsCommand, settings: &Settings) -> Result<()> {
    match cmd {
        ClientsCommand::List => {
            let paths = ServerPaths::from_settings(settings);
            let names = list_client_configs(&paths.clients_dir)
                .with_context(|| format!("failed to list {}", paths.clients_dir.display()))?;
            if names.is_empty() {
                println!("No client configs in {}.", paths.clients_dir.display());
                return Ok(());
            }
            for name in names {
                println!("{name}");
            }
            Ok(())
        }
    }
}
