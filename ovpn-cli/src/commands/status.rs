//! `ovpnctl status`: connected clients from the OpenVPN status log.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use ovpn_core::{ServerPaths, Settings};
use ovpn_status::{read_status_file, StatusSnapshot, TimeNormalizer};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ConnectionRow {
    #[tabled(rename = "client")]
    client: String,
    #[tabled(rename = "ip")]
    ip: String,
    #[tabled(rename = "received")]
    received: String,
    #[tabled(rename = "sent")]
    sent: String,
    #[tabled(rename = "connected since")]
    since: String,
    #[tabled(rename = "duration")]
    duration: String,
}

impl StatusArgs {
    pub fn run(self, settings: &Settings) -> Result<()> {
        let paths = ServerPaths::from_settings(settings);
        let normalizer = TimeNormalizer::for_zone(&settings.target_timezone)
            .context("invalid target_timezone in settings")?;
        let snapshot = read_status_file(&paths.status_log, settings.encoding_override(), normalizer)
            .with_context(|| format!("failed to read {}", paths.status_log.display()))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&snapshot).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(snapshot);
        Ok(())
    }
}

fn print_table(snapshot: StatusSnapshot) {
    println!(
        "Updated: {} | {} connected",
        snapshot.last_update.as_deref().unwrap_or("unknown"),
        snapshot.connections.len()
    );
    if snapshot.skipped_records > 0 {
        eprintln!(
            "{} skipped {} malformed record(s)",
            "warning:".yellow().bold(),
            snapshot.skipped_records
        );
    }
    if snapshot.connections.is_empty() {
        println!("No clients connected.");
        return;
    }

    let rows: Vec<ConnectionRow> = snapshot
        .connections
        .into_iter()
        .map(|c| ConnectionRow {
            client: c.client_name,
            ip: c.client_ip,
            received: format_bytes(c.bytes_received),
            sent: format_bytes(c.bytes_sent),
            since: c.connected_since,
            duration: c.duration,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn format_bytes(bytes: Option<u64>) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let Some(bytes) = bytes else {
        return "-".to_string();
    };
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::format_bytes;

    #[test]
    fn bytes_are_humanised() {
        assert_eq!(format_bytes(None), "-");
        assert_eq!(format_bytes(Some(512)), "512 B");
        assert_eq!(format_bytes(Some(1536)), "1.5 KiB");
        assert_eq!(format_bytes(Some(5 * 1024 * 1024)), "5.0 MiB");
    }
}
