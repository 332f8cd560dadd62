//! Unified diff between `<config>_bak` and the live config file.

use std::path::PathBuf;

use similar::TextDiff;

use crate::store::{join_lines, split_lines, ConfigFileStore};
use crate::StoreError;

/// Backup → live diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupDiff {
    pub backup_path: PathBuf,
    pub path: PathBuf,
    pub unified_diff: String,
}

impl ConfigFileStore {
    /// What the last write changed. `None` when backup and live file match.
    ///
    /// Both sides are decoded to text first, so a charset change alone does
    /// not show up as a difference.
    pub fn diff_against_backup(&self) -> Result<Option<BackupDiff>, StoreError> {
        let old = normalize(&self.read_backup_text()?);
        let new = normalize(&self.read_text()?);
        if old == new {
            return Ok(None);
        }

        let old_header = format!("a/{}", file_label(self.backup_path()));
        let new_header = format!("b/{}", file_label(self.path()));
        let unified = TextDiff::from_lines(&old, &new)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string();

        Ok(Some(BackupDiff {
            backup_path: self.backup_path().to_path_buf(),
            path: self.path().to_path_buf(),
            unified_diff: unified,
        }))
    }
}

fn normalize(content: &str) -> String {
    join_lines(&split_lines(content))
}

fn file_label(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
