//! Integration tests for reading and parsing the status log.

use std::fs;

use chrono::{TimeZone, Utc};
use encoding_rs::WINDOWS_1251;
use ovpn_status::{read_status_file, read_status_text, StatusError, StatusLogParser, TimeNormalizer};
use tempfile::TempDir;

const STATUS_LOG: &str = "\
OpenVPN CLIENT LIST
Updated,2025-01-01 10:00:00
Common Name,Real Address,Bytes Received,Bytes Sent,Connected Since
alice,10.0.0.5:5000,100,200,2025-01-01 09:00:00
ROUTING TABLE
Virtual Address,Common Name,Real Address,Last Ref
bob,10.0.0.6:6000,1,2,2025-01-01 09:30:00
GLOBAL STATS
END
";

fn moscow() -> TimeNormalizer {
    TimeNormalizer::for_zone("Europe/Moscow").expect("zone")
}

#[test]
fn parses_client_list_and_stops_at_routing_table() {
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 10, 15, 0).unwrap();
    let snapshot = StatusLogParser::new(moscow()).parse_at(STATUS_LOG, now);

    assert_eq!(snapshot.last_update.as_deref(), Some("01.01.2025 13:00:00"));
    assert_eq!(snapshot.connections.len(), 1);

    let alice = &snapshot.connections[0];
    assert_eq!(alice.client_name, "alice");
    assert_eq!(alice.client_ip, "10.0.0.5");
    assert_eq!(alice.bytes_received, Some(100));
    assert_eq!(alice.bytes_sent, Some(200));
    assert_eq!(alice.connected_since, "01.01.2025 12:00:00");
    assert_eq!(alice.duration, "0 дней, 01 часов 15 минут");
}

#[test]
fn updated_line_may_follow_client_list_marker_or_precede_it() {
    let text = "Updated,2025-06-01 00:00:00\nOpenVPN CLIENT LIST\n";
    let snapshot = StatusLogParser::new(moscow()).parse(text);
    assert_eq!(snapshot.last_update.as_deref(), Some("01.06.2025 03:00:00"));
    assert!(snapshot.connections.is_empty());
}

#[test]
fn crlf_and_padding_are_tolerated() {
    let text = "OpenVPN CLIENT LIST\r\n  alice , 10.0.0.5:5000 ,1,2, 2025-01-01 09:00:00 \r\nROUTING TABLE\r\n";
    let snapshot = StatusLogParser::new(moscow()).parse(text);
    assert_eq!(snapshot.connections[0].client_name, "alice");
    assert_eq!(snapshot.connections[0].client_ip, "10.0.0.5");
    assert_eq!(snapshot.connections[0].connected_since, "01.01.2025 12:00:00");
}

#[test]
fn live_duration_is_not_empty() {
    let snapshot = StatusLogParser::new(moscow()).parse(STATUS_LOG);
    assert!(snapshot.connections[0].duration.ends_with("минут"));
}

#[test]
fn missing_log_is_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let err = read_status_file(&dir.path().join("absent.log"), None, moscow()).unwrap_err();
    assert!(matches!(err, StatusError::NotFound { .. }));
}

#[test]
fn reads_log_from_disk() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("openvpn-status1194.log");
    fs::write(&path, STATUS_LOG).expect("write");

    let snapshot = read_status_file(&path, None, moscow()).expect("read");
    assert_eq!(snapshot.connections.len(), 1);
}

#[test]
fn explicit_charset_decodes_cyrillic_names() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("status.log");
    let (bytes, _, _) = WINDOWS_1251.encode("OpenVPN CLIENT LIST\nсклад,10.0.0.5:1,1,2,2025-01-01 09:00:00\n");
    fs::write(&path, &bytes).expect("write");

    let snapshot = read_status_file(&path, Some("windows-1251"), moscow()).expect("read");
    assert_eq!(snapshot.connections[0].client_name, "склад");

    let lossy = read_status_text(&path, None).expect("lossy");
    assert!(lossy.contains('\u{FFFD}'));
}

#[test]
fn snapshot_serialises_to_json() {
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
    let snapshot = StatusLogParser::new(moscow()).parse_at(STATUS_LOG, now);
    let json = serde_json::to_value(&snapshot).expect("json");
    assert_eq!(json["connections"][0]["client_ip"], "10.0.0.5");
    assert_eq!(json["last_update"], "01.01.2025 13:00:00");
}
