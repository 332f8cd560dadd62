//! The config file store.
//!
//! ## `write` protocol
//!
//! 1. Copy the live file to `<config>_bak` (best-effort, failure is logged).
//! 2. Create parent directories.
//! 3. Resolve the write charset: explicit override > detected from the live
//!    file > windows-1251.
//! 4. Replace every non-ASCII character of a line the charset cannot
//!    represent with `?`.
//! 5. Write to `<config>.ovpnctl.tmp` and rename over the live file. If that
//!    fails, retry once with the unmodified lines in UTF-8.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use encoding_rs::{Encoding, UTF_8};

use ovpn_charset::{
    decode_clean, decode_lossy, detect_with, resolve_label, CharsetChoice, CharsetOracle,
    FileCommandOracle, DEFAULT_ENCODING, READ_FALLBACKS,
};
use ovpn_core::paths::{backup_path_for, default_path_for, ServerPaths};
use ovpn_core::Settings;

use crate::error::{io_err, StoreError};
use crate::lock::PathLock;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// The config file as ordered lines, for the duration of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDocument {
    pub path: PathBuf,
    pub lines: Vec<String>,
    pub encoding_override: Option<String>,
    /// Charset the bytes were decoded with.
    pub charset: &'static str,
}

/// What happened to `<config>_bak` before a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Created { path: PathBuf },
    /// There was no live file to back up.
    Skipped,
    /// Copying failed; the write went ahead anyway.
    Failed { reason: String },
}

/// Outcome of a successful [`ConfigFileStore::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub path: PathBuf,
    /// Charset the file ended up in.
    pub charset: &'static str,
    pub backup: BackupOutcome,
    /// Lines that had non-ASCII characters replaced with `?`.
    pub substituted_lines: usize,
    /// The first attempt failed and the file was rewritten as UTF-8.
    pub utf8_fallback: bool,
}

/// Result of an edit closure passed to [`ConfigFileStore::transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<T> {
    /// Lines were modified; write them back.
    Changed(T),
    /// Nothing to write.
    Unchanged(T),
}

/// Size and age of `<config>_bak`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// ConfigFileStore
// ---------------------------------------------------------------------------

/// Read/write/backup/restore/reset of one config file.
#[derive(Clone)]
pub struct ConfigFileStore {
    path: PathBuf,
    backup_path: PathBuf,
    default_path: PathBuf,
    encoding_override: Option<String>,
    oracle: Arc<dyn CharsetOracle>,
}

impl std::fmt::Debug for ConfigFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigFileStore")
            .field("path", &self.path)
            .field("encoding_override", &self.encoding_override)
            .finish_non_exhaustive()
    }
}

impl ConfigFileStore {
    /// Store for `path`, with `<path>_bak` and `<path>_default` as siblings.
    pub fn new(path: impl Into<PathBuf>, encoding_override: Option<String>) -> Self {
        let path = path.into();
        Self {
            backup_path: backup_path_for(&path),
            default_path: default_path_for(&path),
            encoding_override: encoding_override
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            oracle: Arc::new(FileCommandOracle),
            path,
        }
    }

    /// Store for the config file named by `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        let paths = ServerPaths::from_settings(settings);
        Self::new(paths.config, settings.encoding_override().map(str::to_string))
    }

    /// Replace the last-resort charset oracle (`file -bi` by default).
    pub fn with_oracle(mut self, oracle: Arc<dyn CharsetOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub fn default_path(&self) -> &Path {
        &self.default_path
    }

    pub fn encoding_override(&self) -> Option<&str> {
        self.encoding_override.as_deref()
    }

    pub fn config_file_exists(&self) -> bool {
        self.path.exists()
    }

    pub fn backup_exists(&self) -> bool {
        self.backup_path.exists()
    }

    pub fn default_file_exists(&self) -> bool {
        self.default_path.exists()
    }

    // -----------------------------------------------------------------------
    // Read
    // -----------------------------------------------------------------------

    /// The config file as lines.
    pub fn read(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.load()?.lines)
    }

    /// The config file as a [`ConfigDocument`].
    ///
    /// Fails only if the file is missing or unreadable; undecodable content
    /// degrades through the fallback charsets instead.
    pub fn load(&self) -> Result<ConfigDocument, StoreError> {
        let bytes = self.read_bytes()?;
        let (text, encoding) = self.decode(&bytes);
        tracing::info!("read {} as {}", self.path.display(), encoding.name());
        Ok(ConfigDocument {
            path: self.path.clone(),
            lines: split_lines(&text),
            encoding_override: self.encoding_override.clone(),
            charset: encoding.name(),
        })
    }

    /// Run charset detection on the live file.
    pub fn detect_encoding(&self) -> Result<CharsetChoice, StoreError> {
        let bytes = self.read_bytes()?;
        Ok(self.detect(&bytes))
    }

    fn read_bytes(&self) -> Result<Vec<u8>, StoreError> {
        if !self.path.exists() {
            tracing::warn!("config file does not exist: {}", self.path.display());
            return Err(StoreError::NotFound {
                path: self.path.clone(),
            });
        }
        std::fs::read(&self.path).map_err(|e| io_err(&self.path, e))
    }

    fn detect(&self, bytes: &[u8]) -> CharsetChoice {
        detect_with(bytes, self.encoding_override.as_deref(), self.oracle.as_ref())
    }

    fn decode(&self, bytes: &[u8]) -> (String, &'static Encoding) {
        let first = self.detect(bytes).encoding();
        if let Some(text) = decode_clean(bytes, first) {
            return (text.into_owned(), first);
        }
        tracing::warn!(
            charset = first.name(),
            "detected charset left replacement characters, trying fallbacks"
        );

        for &fallback in READ_FALLBACKS.iter() {
            if fallback == first {
                continue;
            }
            if let Some(text) = decode_clean(bytes, fallback) {
                tracing::warn!(charset = fallback.name(), "decoded with fallback charset");
                return (text.into_owned(), fallback);
            }
        }

        tracing::warn!(
            charset = DEFAULT_ENCODING.name(),
            "no charset decoded cleanly, forcing default"
        );
        (decode_lossy(bytes, DEFAULT_ENCODING).into_owned(), DEFAULT_ENCODING)
    }

    // -----------------------------------------------------------------------
    // Write
    // -----------------------------------------------------------------------

    /// Replace the config file with `lines`, backing up the previous version.
    pub fn write(&self, lines: &[String]) -> Result<WriteReport, StoreError> {
        let _lock = PathLock::acquire(&self.path)?;
        self.write_unlocked(lines)
    }

    pub(crate) fn write_unlocked(&self, lines: &[String]) -> Result<WriteReport, StoreError> {
        tracing::info!("writing {}", self.path.display());
        let backup = self.backup_live_file();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        let encoding = self.resolve_write_encoding();
        let (safe_lines, substituted_lines) = substitute_unencodable(lines, encoding);
        let text = join_lines(&safe_lines);
        let (bytes, _, _) = encoding.encode(&text);

        match self.replace_contents(&bytes) {
            Ok(()) => {
                tracing::info!("wrote {} as {}", self.path.display(), encoding.name());
                Ok(WriteReport {
                    path: self.path.clone(),
                    charset: encoding.name(),
                    backup,
                    substituted_lines,
                    utf8_fallback: false,
                })
            }
            Err(first) => {
                tracing::error!(
                    charset = encoding.name(),
                    "write failed, retrying as UTF-8: {first}"
                );
                let utf8 = join_lines(lines);
                self.replace_contents(utf8.as_bytes()).map_err(|source| {
                    tracing::error!("write failed again: {source}");
                    StoreError::WriteFailed {
                        path: self.path.clone(),
                        source,
                    }
                })?;
                tracing::info!("wrote {} as UTF-8", self.path.display());
                Ok(WriteReport {
                    path: self.path.clone(),
                    charset: UTF_8.name(),
                    backup,
                    substituted_lines: 0,
                    utf8_fallback: true,
                })
            }
        }
    }

    fn resolve_write_encoding(&self) -> &'static Encoding {
        if let Some(label) = self.encoding_override.as_deref() {
            return resolve_label(label).unwrap_or_else(|| {
                tracing::warn!(
                    label,
                    fallback = DEFAULT_ENCODING.name(),
                    "explicit charset is unknown, using default"
                );
                DEFAULT_ENCODING
            });
        }

        match std::fs::read(&self.path) {
            Ok(bytes) => self.detect(&bytes).encoding(),
            Err(_) => DEFAULT_ENCODING,
        }
    }

    /// Atomically replace the live file: `.tmp` sibling, then rename.
    fn replace_contents(&self, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = PathBuf::from(format!("{}.ovpnctl.tmp", self.path.display()));
        std::fs::write(&tmp, bytes)?;

        if let Ok(meta) = std::fs::metadata(&self.path) {
            let _ = std::fs::set_permissions(&tmp, meta.permissions());
        }

        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(())
    }

    fn backup_live_file(&self) -> BackupOutcome {
        if !self.path.exists() {
            return BackupOutcome::Skipped;
        }
        match std::fs::copy(&self.path, &self.backup_path) {
            Ok(_) => {
                tracing::info!("backup created: {}", self.backup_path.display());
                BackupOutcome::Created {
                    path: self.backup_path.clone(),
                }
            }
            Err(e) => {
                tracing::warn!("failed to create backup {}: {e}", self.backup_path.display());
                BackupOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Locked read → edit → write.
    ///
    /// `edit` receives the current lines; the store writes them back only if
    /// it returns [`Mutation::Changed`].
    pub fn transaction<T, F>(&self, edit: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Vec<String>) -> Result<Mutation<T>, StoreError>,
    {
        if !self.config_file_exists() {
            return Err(StoreError::NotFound {
                path: self.path.clone(),
            });
        }
        let _lock = PathLock::acquire(&self.path)?;
        let mut lines = self.read()?;
        match edit(&mut lines)? {
            Mutation::Changed(value) => {
                self.write_unlocked(&lines)?;
                Ok(value)
            }
            Mutation::Unchanged(value) => Ok(value),
        }
    }

    // -----------------------------------------------------------------------
    // Backup / default lifecycle
    // -----------------------------------------------------------------------

    /// Overwrite the live file with `<config>_bak`.
    pub fn restore_from_backup(&self) -> Result<(), StoreError> {
        let _lock = PathLock::acquire(&self.path)?;
        if !self.backup_exists() {
            return Err(StoreError::BackupMissing {
                path: self.backup_path.clone(),
            });
        }
        let bytes =
            std::fs::read(&self.backup_path).map_err(|e| io_err(&self.backup_path, e))?;
        self.replace_contents(&bytes)
            .map_err(|e| io_err(&self.path, e))?;
        tracing::info!("restored from backup: {}", self.backup_path.display());
        Ok(())
    }

    /// Overwrite the live file with `<config>_default`, backing up first.
    pub fn reset_to_default(&self) -> Result<BackupOutcome, StoreError> {
        let _lock = PathLock::acquire(&self.path)?;
        if !self.default_file_exists() {
            return Err(StoreError::DefaultMissing {
                path: self.default_path.clone(),
            });
        }
        let bytes =
            std::fs::read(&self.default_path).map_err(|e| io_err(&self.default_path, e))?;
        let backup = self.backup_live_file();
        self.replace_contents(&bytes)
            .map_err(|e| io_err(&self.path, e))?;
        tracing::info!("reset to default from {}", self.default_path.display());
        Ok(backup)
    }

    /// Size and modification time of the backup, if there is one.
    pub fn backup_info(&self) -> Result<Option<BackupInfo>, StoreError> {
        let meta = match std::fs::metadata(&self.backup_path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&self.backup_path, e)),
        };
        Ok(Some(BackupInfo {
            path: self.backup_path.clone(),
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        }))
    }

    /// Decode the backup the same way the live file is decoded.
    pub(crate) fn read_backup_text(&self) -> Result<String, StoreError> {
        if !self.backup_exists() {
            return Err(StoreError::BackupMissing {
                path: self.backup_path.clone(),
            });
        }
        let bytes =
            std::fs::read(&self.backup_path).map_err(|e| io_err(&self.backup_path, e))?;
        Ok(self.decode(&bytes).0)
    }

    pub(crate) fn read_text(&self) -> Result<String, StoreError> {
        let bytes = self.read_bytes()?;
        Ok(self.decode(&bytes).0)
    }
}

// ---------------------------------------------------------------------------
// Line helpers
// ---------------------------------------------------------------------------

/// Split on `\n` / `\r\n`. A trailing newline does not add an empty line.
pub(crate) fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_owned).collect()
}

/// Every line terminated by `\n`.
pub(crate) fn join_lines(lines: &[String]) -> String {
    let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn substitute_unencodable(lines: &[String], encoding: &'static Encoding) -> (Vec<String>, usize) {
    let mut substituted = 0;
    let safe = lines
        .iter()
        .map(|line| {
            if ovpn_charset::can_encode(line, encoding) {
                return line.clone();
            }
            substituted += 1;
            tracing::warn!(
                charset = encoding.name(),
                line = %line,
                "line not representable, replacing non-ASCII characters"
            );
            line.chars()
                .map(|c| if c.is_ascii() { c } else { '?' })
                .collect()
        })
        .collect();
    (safe, substituted)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1251;
    use ovpn_charset::NoOracle;
    use std::fs;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir, encoding: Option<&str>) -> ConfigFileStore {
        ConfigFileStore::new(dir.path().join("server.conf"), encoding.map(str::to_string))
            .with_oracle(Arc::new(NoOracle))
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn split_handles_both_newline_styles() {
        assert_eq!(split_lines("a\r\nb\nc"), lines(&["a", "b", "c"]));
        assert_eq!(split_lines("a\n\n"), lines(&["a", ""]));
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn join_terminates_every_line() {
        assert_eq!(join_lines(&lines(&["a", "b"])), "a\nb\n");
        assert_eq!(join_lines(&[]), "");
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = store_in(&tmp, None).read().unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn reads_windows_1251_file() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp, None);
        let (bytes, _, _) = WINDOWS_1251.encode("# Сервер офиса\r\nport 1194\r\n");
        fs::write(store.path(), &bytes).unwrap();

        let doc = store.load().unwrap();
        assert_eq!(doc.lines, lines(&["# Сервер офиса", "port 1194"]));
        assert_eq!(doc.charset, "windows-1251");
    }

    #[test]
    fn override_that_leaves_garbage_falls_back() {
        let tmp = TempDir::new().unwrap();
        // windows-1251 bytes are not valid UTF-8; the next fallback wins.
        let store = store_in(&tmp, Some("utf-8"));
        let (bytes, _, _) = WINDOWS_1251.encode("# Привет\n");
        fs::write(store.path(), &bytes).unwrap();

        let doc = store.load().unwrap();
        assert_eq!(doc.charset, WINDOWS_1251.name());
        assert_eq!(doc.lines, lines(&["# Привет"]));
    }

    #[test]
    fn first_write_skips_backup_and_uses_default_charset() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp, None);
        let report = store.write(&lines(&["# Новый", "port 1194"])).unwrap();
        assert_eq!(report.backup, BackupOutcome::Skipped);
        assert_eq!(report.charset, "windows-1251");
        assert!(!store.backup_exists());

        let raw = fs::read(store.path()).unwrap();
        let (expected, _, _) = WINDOWS_1251.encode("# Новый\nport 1194\n");
        assert_eq!(raw, expected.into_owned());
    }

    #[test]
    fn write_keeps_detected_utf8() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp, None);
        fs::write(store.path(), "# Привет\n").unwrap();

        let report = store.write(&lines(&["# Пока"])).unwrap();
        assert_eq!(report.charset, "UTF-8");
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "# Пока\n");
    }

    #[test]
    fn unencodable_line_gets_question_marks() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp, Some("windows-1251"));
        let report = store
            .write(&lines(&["# ok Привет", "# bad ✓ Привет"]))
            .unwrap();
        assert_eq!(report.substituted_lines, 1);

        let read = store.read().unwrap();
        assert_eq!(read, lines(&["# ok Привет", "# bad ? ??????"]));
    }

    #[test]
    fn unknown_override_writes_default_charset() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp, Some("x-nonsense"));
        let report = store.write(&lines(&["port 1194"])).unwrap();
        assert_eq!(report.charset, "windows-1251");
    }

    #[test]
    fn write_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let store = ConfigFileStore::new(tmp.path().join("nested/dir/server.conf"), None)
            .with_oracle(Arc::new(NoOracle));
        store.write(&lines(&["dev tun"])).unwrap();
        assert!(store.config_file_exists());
    }

    #[test]
    fn tmp_file_removed_after_write() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp, None);
        store.write(&lines(&["dev tun"])).unwrap();
        let tmp_path = PathBuf::from(format!("{}.ovpnctl.tmp", store.path().display()));
        assert!(!tmp_path.exists());
    }

    #[test]
    fn empty_write_is_valid() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp, None);
        fs::write(store.path(), "dev tun\n").unwrap();
        store.write(&[]).unwrap();
        assert_eq!(fs::read(store.path()).unwrap().len(), 0);
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn write_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp, None);
        fs::write(store.path(), "dev tun\n").unwrap();
        fs::set_permissions(store.path(), fs::Permissions::from_mode(0o640)).unwrap();

        store.write(&lines(&["dev tap"])).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn transaction_without_change_does_not_write() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp, None);
        fs::write(store.path(), "dev tun\n").unwrap();

        let count = store
            .transaction(|lines| Ok(Mutation::Unchanged(lines.len())))
            .unwrap();
        assert_eq!(count, 1);
        assert!(!store.backup_exists(), "no write means no backup");
    }

    #[test]
    fn backup_info_reports_size() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp, None);
        assert!(store.backup_info().unwrap().is_none());

        fs::write(store.path(), "dev tun\n").unwrap();
        store.write(&lines(&["dev tap"])).unwrap();
        let info = store.backup_info().unwrap().expect("backup");
        assert_eq!(info.size, "dev tun\n".len() as u64);
        assert!(info.modified.is_some());
    }
}
