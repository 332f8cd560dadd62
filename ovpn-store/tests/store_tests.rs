//! Integration tests for the backup/restore/reset lifecycle and charset
//! preservation of `ConfigFileStore`.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use encoding_rs::{Encoding, IBM866, KOI8_R, WINDOWS_1251};
use ovpn_charset::NoOracle;
use ovpn_store::{BackupOutcome, ConfigFileStore, StoreError};
use rstest::rstest;
use tempfile::TempDir;

const CONFIG: &str = "\
# Основной сервер
port 1194
proto udp
dev tun
# Маршруты офиса
push \"route 10.0.0.0 255.255.255.0\"
";

fn setup(encoding: Option<&str>) -> (TempDir, ConfigFileStore) {
    let dir = TempDir::new().expect("tempdir");
    let store = ConfigFileStore::new(dir.path().join("server.conf"), encoding.map(str::to_string))
        .with_oracle(Arc::new(NoOracle));
    (dir, store)
}

fn owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Round trip
// ---------------------------------------------------------------------------

#[test]
fn write_then_read_round_trips() {
    let (_dir, store) = setup(None);
    let lines = owned(&["# Привет", "", "port 1194", "  indented  "]);
    store.write(&lines).expect("write");
    assert_eq!(store.read().expect("read"), lines);
}

#[rstest]
#[case(WINDOWS_1251)]
#[case(KOI8_R)]
#[case(IBM866)]
fn legacy_charset_is_preserved_across_edits(#[case] encoding: &'static Encoding) {
    let (_dir, store) = setup(Some(encoding.name()));
    let (bytes, _, _) = encoding.encode(CONFIG);
    fs::write(store.path(), &bytes).expect("seed");

    let mut lines = store.read().expect("read");
    assert_eq!(lines[0], "# Основной сервер");
    lines.push("# Новая строка".to_string());
    let report = store.write(&lines).expect("write");
    assert_eq!(report.charset, encoding.name());

    let raw = fs::read(store.path()).expect("raw");
    let edited = format!("{CONFIG}# Новая строка\n");
    let (expected, _, _) = encoding.encode(&edited);
    assert_eq!(raw, expected.into_owned());
}

#[test]
fn detected_windows_1251_is_written_back_as_windows_1251() {
    let (_dir, store) = setup(None);
    let (bytes, _, _) = WINDOWS_1251.encode(CONFIG);
    fs::write(store.path(), &bytes).expect("seed");

    let lines = store.read().expect("read");
    let report = store.write(&lines).expect("write");
    assert_eq!(report.charset, "windows-1251");
    assert_eq!(fs::read(store.path()).expect("raw"), bytes.into_owned());
}

#[test]
fn crlf_file_reads_without_carriage_returns() {
    let (_dir, store) = setup(None);
    fs::write(store.path(), "port 1194\r\ndev tun\r\n").expect("seed");
    assert_eq!(store.read().expect("read"), owned(&["port 1194", "dev tun"]));
}

// ---------------------------------------------------------------------------
// Backup invariant
// ---------------------------------------------------------------------------

#[test]
fn backup_holds_previous_bytes_after_write() {
    let (_dir, store) = setup(None);
    let (before, _, _) = WINDOWS_1251.encode(CONFIG);
    fs::write(store.path(), &before).expect("seed");

    let report = store.write(&owned(&["dev tap"])).expect("write");
    assert!(matches!(report.backup, BackupOutcome::Created { .. }));
    assert_eq!(fs::read(store.backup_path()).expect("bak"), before.into_owned());
}

#[test]
fn backup_is_a_single_slot() {
    let (_dir, store) = setup(None);
    fs::write(store.path(), "v1\n").expect("seed");
    store.write(&owned(&["v2"])).expect("write v2");
    store.write(&owned(&["v3"])).expect("write v3");
    assert_eq!(fs::read_to_string(store.backup_path()).expect("bak"), "v2\n");
}

#[test]
#[cfg(unix)]
fn failed_backup_does_not_block_write() {
    let (_dir, store) = setup(None);
    fs::write(store.path(), "dev tun\n").expect("seed");
    // A directory where the backup file should go makes the copy fail.
    fs::create_dir(store.backup_path()).expect("blocker");

    let report = store.write(&owned(&["dev tap"])).expect("write");
    assert!(matches!(report.backup, BackupOutcome::Failed { .. }));
    assert_eq!(store.read().expect("read"), owned(&["dev tap"]));
}

// ---------------------------------------------------------------------------
// Restore / reset
// ---------------------------------------------------------------------------

#[test]
fn restore_without_backup_fails() {
    let (_dir, store) = setup(None);
    fs::write(store.path(), "dev tun\n").expect("seed");
    let err = store.restore_from_backup().unwrap_err();
    assert!(matches!(err, StoreError::BackupMissing { .. }));
    assert_eq!(fs::read_to_string(store.path()).expect("live"), "dev tun\n");
}

#[test]
fn restore_undoes_last_write() {
    let (_dir, store) = setup(None);
    let (before, _, _) = KOI8_R.encode(CONFIG);
    fs::write(store.path(), &before).expect("seed");
    store.write(&owned(&["dev tap"])).expect("write");

    store.restore_from_backup().expect("restore");
    assert_eq!(fs::read(store.path()).expect("live"), before.into_owned());
}

#[test]
fn reset_without_default_fails() {
    let (_dir, store) = setup(None);
    fs::write(store.path(), "dev tun\n").expect("seed");
    let err = store.reset_to_default().unwrap_err();
    assert!(matches!(err, StoreError::DefaultMissing { .. }));
}

#[test]
fn reset_copies_default_and_backs_up_live() {
    let (_dir, store) = setup(None);
    fs::write(store.path(), "customised\n").expect("seed");
    fs::write(store.default_path(), "factory\n").expect("default");

    let backup = store.reset_to_default().expect("reset");
    assert!(matches!(backup, BackupOutcome::Created { .. }));
    assert_eq!(fs::read_to_string(store.path()).expect("live"), "factory\n");
    assert_eq!(fs::read_to_string(store.backup_path()).expect("bak"), "customised\n");
    assert_eq!(fs::read_to_string(store.default_path()).expect("default"), "factory\n");
}

#[test]
fn reset_creates_missing_live_file() {
    let (_dir, store) = setup(None);
    fs::write(store.default_path(), "factory\n").expect("default");
    let backup = store.reset_to_default().expect("reset");
    assert_eq!(backup, BackupOutcome::Skipped);
    assert!(store.config_file_exists());
}

#[test]
fn failed_write_and_retry_leave_live_file_untouched() {
    let (dir, store) = setup(None);
    fs::write(store.path(), "port 1194\n").expect("seed");
    fs::create_dir(dir.path().join("server.conf.ovpnctl.tmp")).expect("blocking dir");

    let err = store.write(&owned(&["port 443"])).unwrap_err();
    match err {
        StoreError::WriteFailed { path, .. } => assert_eq!(path, store.path()),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fs::read_to_string(store.path()).expect("live"), "port 1194\n");
}

// ---------------------------------------------------------------------------
// Locking
// ---------------------------------------------------------------------------

#[test]
fn concurrent_appends_are_not_lost() {
    let (_dir, store) = setup(None);
    fs::write(store.path(), "dev tun\n").expect("seed");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            std::thread::spawn(move || {
                store
                    .transaction(|lines| {
                        lines.push(format!("# writer {i}"));
                        Ok(ovpn_store::Mutation::Changed(()))
                    })
                    .expect("transaction");
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("join");
    }

    let lines = store.read().expect("read");
    assert_eq!(lines.len(), 9);
    for i in 0..8 {
        assert!(lines.contains(&format!("# writer {i}")), "writer {i} lost");
    }
}

#[test]
fn lock_file_sits_next_to_config() {
    let (dir, store) = setup(None);
    fs::write(store.path(), "dev tun\n").expect("seed");
    store.write(&owned(&["dev tap"])).expect("write");
    let lock: PathBuf = dir.path().join("server.conf.lock");
    assert!(lock.exists());
}
