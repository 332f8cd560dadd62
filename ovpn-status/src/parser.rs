//! Single-pass scanner for the OpenVPN status log (version 1 layout).
//!
//! ```text
//! OpenVPN CLIENT LIST
//! Updated,2025-01-01 10:00:00
//! Common Name,Real Address,Bytes Received,Bytes Sent,Connected Since
//! alice,10.0.0.5:5000,100,200,2025-01-01 09:00:00
//! ROUTING TABLE
//! ...
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::time::TimeNormalizer;

pub const UPDATED_PREFIX: &str = "Updated,";
pub const CLIENT_LIST_MARKER: &str = "OpenVPN CLIENT LIST";
pub const ROUTING_TABLE_MARKER: &str = "ROUTING TABLE";
pub const CLIENT_LIST_HEADER: &str =
    "Common Name,Real Address,Bytes Received,Bytes Sent,Connected Since";

const MIN_FIELDS: usize = 5;

/// One connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientConnection {
    pub client_name: String,
    /// Real address with the port stripped.
    pub client_ip: String,
    pub bytes_received: Option<u64>,
    pub bytes_sent: Option<u64>,
    /// Start time in the target zone, `dd.mm.yyyy HH:MM:SS`.
    pub connected_since: String,
    pub duration: String,
}

/// Everything parsed from one read of the status log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub last_update: Option<String>,
    pub connections: Vec<ClientConnection>,
    /// Records dropped as malformed.
    pub skipped_records: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Seeking,
    InClientList,
}

/// Parses status log text into a [`StatusSnapshot`].
#[derive(Debug, Clone, Copy)]
pub struct StatusLogParser {
    normalizer: TimeNormalizer,
}

impl StatusLogParser {
    pub fn new(normalizer: TimeNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn parse(&self, text: &str) -> StatusSnapshot {
        self.parse_at(text, Utc::now())
    }

    /// Parse with durations measured up to `now`.
    pub fn parse_at(&self, text: &str, now: DateTime<Utc>) -> StatusSnapshot {
        let mut snapshot = StatusSnapshot::default();
        let mut state = ScanState::Seeking;

        for line in text.lines().map(str::trim) {
            if let Some(rest) = line.strip_prefix(UPDATED_PREFIX) {
                snapshot.last_update = Some(self.normalizer.to_target_zone(rest));
                continue;
            }
            if line == CLIENT_LIST_MARKER {
                state = ScanState::InClientList;
                continue;
            }
            if line == ROUTING_TABLE_MARKER {
                break;
            }
            if state != ScanState::InClientList || line == CLIENT_LIST_HEADER {
                continue;
            }
            if line.is_empty() || !line.contains(',') {
                continue;
            }

            match self.parse_record(line, now) {
                Some(connection) => snapshot.connections.push(connection),
                None => {
                    tracing::warn!(line, "skipping malformed client record");
                    snapshot.skipped_records += 1;
                }
            }
        }

        tracing::debug!(
            connections = snapshot.connections.len(),
            skipped = snapshot.skipped_records,
            "parsed status log"
        );
        snapshot
    }

    fn parse_record(&self, line: &str, now: DateTime<Utc>) -> Option<ClientConnection> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < MIN_FIELDS {
            return None;
        }
        let started = fields[4];
        if started.is_empty() {
            return None;
        }
        let address = fields[1];
        let client_ip = address.split(':').next().unwrap_or(address);

        Some(ClientConnection {
            client_name: fields[0].to_string(),
            client_ip: client_ip.to_string(),
            bytes_received: fields[2].parse().ok(),
            bytes_sent: fields[3].parse().ok(),
            connected_since: self.normalizer.to_target_zone(started),
            duration: self.normalizer.duration_between(started, now),
        })
    }
}
