//! Line-level edits on top of [`ConfigFileStore`].
//!
//! Every mutating operation runs as one [`ConfigFileStore::transaction`], so
//! the read and the write happen under the same lock.

use crate::error::StoreError;
use crate::store::{ConfigFileStore, Mutation, WriteReport};

/// Line edits on one config file.
#[derive(Debug, Clone, Copy)]
pub struct ConfigLineEditor<'s> {
    pub(crate) store: &'s ConfigFileStore,
}

impl<'s> ConfigLineEditor<'s> {
    pub fn new(store: &'s ConfigFileStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'s ConfigFileStore {
        self.store
    }

    /// Append `line` at the end of the file.
    pub fn append_line(&self, line: &str) -> Result<(), StoreError> {
        self.append_lines(&[line])
    }

    /// Append several lines in a single write.
    pub fn append_lines(&self, new_lines: &[&str]) -> Result<(), StoreError> {
        self.store.transaction(|lines| {
            lines.extend(new_lines.iter().map(|l| l.to_string()));
            Ok(Mutation::Changed(()))
        })?;
        tracing::info!(count = new_lines.len(), "appended lines");
        Ok(())
    }

    /// Replace the first line whose trimmed text starts with `prefix`.
    ///
    /// Returns `false`, without writing, when no line matches.
    pub fn replace_line_by_prefix(&self, prefix: &str, new_line: &str) -> Result<bool, StoreError> {
        let replaced = self.store.transaction(|lines| {
            match lines.iter().position(|l| l.trim().starts_with(prefix)) {
                Some(idx) => {
                    lines[idx] = new_line.to_string();
                    Ok(Mutation::Changed(true))
                }
                None => Ok(Mutation::Unchanged(false)),
            }
        })?;
        if replaced {
            tracing::info!(prefix, "replaced line");
        } else {
            tracing::warn!(prefix, "no line to replace");
        }
        Ok(replaced)
    }

    /// Remove every line whose trimmed text starts with `prefix`.
    ///
    /// Returns the number of removed lines; nothing is written when it is 0.
    pub fn remove_line_by_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let removed = self.store.transaction(|lines| {
            let before = lines.len();
            lines.retain(|l| !l.trim().starts_with(prefix));
            let removed = before - lines.len();
            if removed > 0 {
                Ok(Mutation::Changed(removed))
            } else {
                Ok(Mutation::Unchanged(0))
            }
        })?;
        if removed > 0 {
            tracing::info!(prefix, removed, "removed lines");
        } else {
            tracing::warn!(prefix, "no lines to remove");
        }
        Ok(removed)
    }

    /// The first line containing `substring`, untrimmed.
    pub fn find_line_containing(&self, substring: &str) -> Result<Option<String>, StoreError> {
        let lines = self.store.read()?;
        Ok(lines.into_iter().find(|l| l.contains(substring)))
    }

    /// Value of directive `key`: the second whitespace-delimited token of the
    /// first trimmed line that starts with `key` and carries a value.
    ///
    /// `port 1194` → `Some("1194")`; a bare `port` line is skipped.
    pub fn get_config_value(&self, key: &str) -> Result<Option<String>, StoreError> {
        let lines = self.store.read()?;
        Ok(lines.iter().find_map(|line| {
            let trimmed = line.trim();
            if !trimmed.starts_with(key) {
                return None;
            }
            let mut words = trimmed.split_whitespace();
            words.next()?;
            words.next().map(str::to_owned)
        }))
    }

    /// Replace the whole file.
    pub fn write_all(&self, lines: &[String]) -> Result<WriteReport, StoreError> {
        self.store.write(lines)
    }
}
