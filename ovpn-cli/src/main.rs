//! ovpnctl: OpenVPN server administration from the command line.
//!
//! # Usage
//!
//! ```text
//! ovpnctl [--settings <path>] config show [-n]|get|set|append|remove|find|encoding|info|diff|restore|reset
//! ovpnctl route add-ip <ip> [--comment <text>]
//! ovpnctl route add-domain <domain>
//! ovpnctl status [--json]
//! ovpnctl restart [--dry-run]
//! ovpnctl cert list [--json] | issue <name> | export <name> [--profile tunnel|routes] [--out <dir>]
//! ovpnctl clients list
//! ovpnctl settings show|init
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    cert::CertCommand, clients::ClientsCommand, config::ConfigCommand, restart::RestartArgs,
    route::RouteCommand, settings::SettingsCommand, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ovpnctl",
    version,
    about = "Administer an OpenVPN server: config file, routes, clients and certificates",
    long_about = None,
)]
struct Cli {
    /// Settings file to use instead of ~/.ovpnctl/settings.yaml.
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read and edit the server config file.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Push routes to clients.
    Route {
        #[command(subcommand)]
        command: RouteCommand,
    },

    /// Show connected clients from the status log.
    Status(StatusArgs),

    /// Restart the OpenVPN service.
    Restart(RestartArgs),

    /// List, issue and export client certificates.
    Cert {
        #[command(subcommand)]
        command: CertCommand,
    },

    /// Inspect generated client configs.
    Clients {
        #[command(subcommand)]
        command: ClientsCommand,
    },

    /// Show or create the ovpnctl settings file.
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings_path = cli.settings.as_deref();
    let settings = commands::load_settings(settings_path)?;

    match cli.command {
        Commands::Config { command } => commands::config::run(command, &settings),
        Commands::Route { command } => commands::route::run(command, &settings),
        Commands::Status(args) => args.run(&settings),
        Commands::Restart(args) => args.run(&settings),
        Commands::Cert { command } => commands::cert::run(command, &settings),
        Commands::Clients { command } => commands::clients::run(command, &settings),
        Commands::Settings { command } => commands::settings::run(command, &settings, settings_path),
    }
}

/// Diagnostics go to stderr so stdout stays parseable; `RUST_LOG` overrides
/// the default `warn` level.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
