//! `ovpnctl cert list|issue|export`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use ovpn_core::{CertificateName, ServerPaths, Settings};
use ovpn_service::{
    export_profile, list_certificates, CertificateEntry, CertificateIssuer, ClientProfile,
    EasyRsaIssuer,
};

#[derive(Subcommand, Debug)]
pub enum CertCommand {
    /// List certificates from the easy-rsa index.
    List(ListArgs),

    /// Issue a new client certificate with easy-rsa build-key.
    Issue {
        /// Common name of the new certificate.
        name: String,
    },

    /// Write a client .ovpn profile with the certificate embedded.
    Export(ExportArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Common name of an issued certificate.
    pub name: String,

    /// Which client template to render.
    #[arg(long, value_enum, default_value_t = ProfileArg::Tunnel)]
    pub profile: ProfileArg,

    /// Output directory.
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProfileArg {
    /// All traffic through the VPN (`client_template_tun.ovpn`).
    Tunnel,
    /// Pushed routes only (`client_template.ovpn`).
    Routes,
}

impl From<ProfileArg> for ClientProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Tunnel => ClientProfile::Tunnel,
            ProfileArg::Routes => ClientProfile::Routes,
        }
    }
}

pub fn run(cmd: CertCommand, settings: &Settings) -> Result<()> {
    let paths = ServerPaths::from_settings(settings);
    match cmd {
        CertCommand::List(args) => list(&paths, args),
        CertCommand::Issue { name } => issue(&paths, &name),
        CertCommand::Export(args) => export(&paths, args),
    }
}

#[derive(Tabled)]
struct CertRow {
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "key + crt")]
    files: String,
}

#[derive(Serialize)]
struct CertListJson {
    index: String,
    certificates: Vec<CertificateEntry>,
}

fn list(paths: &ServerPaths, args: ListArgs) -> Result<()> {
    let entries = list_certificates(&paths.keys_dir)
        .with_context(|| format!("failed to read {}", paths.certificate_index().display()))?;

    if args.json {
        let payload = CertListJson {
            index: paths.certificate_index().display().to_string(),
            certificates: entries,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("failed to serialize certificate JSON")?
        );
        return Ok(());
    }

    if entries.is_empty() {
        println!("No certificates in {}.", paths.certificate_index().display());
        return Ok(());
    }
    let rows: Vec<CertRow> = entries
        .into_iter()
        .map(|e| CertRow {
            status: e.status.as_str().to_string(),
            files: if e.has_files {
                "yes".green().to_string()
            } else {
                "missing".red().to_string()
            },
            name: e.name,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn issue(paths: &ServerPaths, raw: &str) -> Result<()> {
    let name = CertificateName::new(raw).context("invalid certificate name")?;
    println!("Issuing {name} (this takes about 15 seconds)...");
    let issued = EasyRsaIssuer::from_paths(paths)
        .issue(&name)
        .with_context(|| format!("failed to issue certificate '{name}'"))?;
    println!("{} certificate '{}'", "Issued".green().bold(), issued.name);
    for path in [&issued.csr, &issued.key, &issued.crt] {
        println!("  {}", path.display());
    }
    Ok(())
}

fn export(paths: &ServerPaths, args: ExportArgs) -> Result<()> {
    let name = CertificateName::new(args.name.as_str()).context("invalid certificate name")?;
    let written = export_profile(paths, &name, args.profile.into(), &args.out)
        .with_context(|| format!("failed to export profile for '{name}'"))?;
    println!("{} {}", "Wrote".green().bold(), written.display());
    Ok(())
}
