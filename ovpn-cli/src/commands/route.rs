//! `ovpnctl route add-ip` and `ovpnctl route add-domain`

use std::net::Ipv4Addr;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use ovpn_core::Settings;
use ovpn_store::{resolve_ipv4, ConfigLineEditor, RouteAdded};

use super::config_store;

#[derive(Subcommand, Debug)]
pub enum RouteCommand {
    /// Push the /24 network containing IP.
    AddIp {
        ip: Ipv4Addr,

        /// Comment line written above the route.
        #[arg(long, short = 'c')]
        comment: Option<String>,
    },

    /// Resolve DOMAIN and push a host route to its first IPv4 address.
    AddDomain {
        domain: String,
    },
}

pub fn run(cmd: RouteCommand, settings: &Settings) -> Result<()> {
    let store = config_store(settings);
    let editor = ConfigLineEditor::new(&store);

    let added = match cmd {
        RouteCommand::AddIp { ip, comment } => editor
            .add_subnet_route(ip, comment.as_deref())
            .with_context(|| format!("failed to add route for {ip}"))?,
        RouteCommand::AddDomain { domain } => {
            let ip = resolve_ipv4(&domain).with_context(|| format!("cannot resolve {domain}"))?;
            println!("{domain} → {ip}");
            editor
                .add_host_route(&domain, ip)
                .with_context(|| format!("failed to add route for {domain}"))?
        }
    };

    print_added(&added);
    println!("Run 'ovpnctl restart' to apply.");
    Ok(())
}

fn print_added(added: &RouteAdded) {
    if let Some(comment) = &added.comment {
        println!("{} {comment}", "+".green().bold());
    }
    println!("{} {}", "+".green().bold(), added.route);
}
