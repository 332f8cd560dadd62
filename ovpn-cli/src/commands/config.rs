//! `ovpnctl config …`: read, edit, diff and roll back the server config.

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use ovpn_core::Settings;
use ovpn_store::{BackupOutcome, ConfigFileStore, ConfigLineEditor};

use super::config_store;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the config file.
    Show(ShowArgs),

    /// Print the value of a directive (`port`, `proto`, …).
    Get {
        key: String,
    },

    /// Replace the first line starting with PREFIX.
    Set {
        prefix: String,
        line: String,
    },

    /// Append a line at the end of the file.
    Append {
        line: String,
    },

    /// Remove every line starting with PREFIX.
    Remove {
        prefix: String,
    },

    /// Print the first line containing TEXT.
    Find {
        text: String,
    },

    /// Show the detected charset of the config file.
    Encoding,

    /// Show config, backup and default file locations.
    Info,

    /// Show what the last write changed (backup → live).
    Diff,

    /// Overwrite the config file with its backup.
    Restore,

    /// Overwrite the config file with the `_default` copy.
    Reset,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Prefix each line with its number.
    #[arg(long, short = 'n')]
    pub numbered: bool,
}

pub fn run(cmd: ConfigCommand, settings: &Settings) -> Result<()> {
    let store = config_store(settings);
    let editor = ConfigLineEditor::new(&store);

    match cmd {
        ConfigCommand::Show(args) => show(&store, args),
        ConfigCommand::Get { key } => {
            let value = editor
                .get_config_value(&key)
                .with_context(|| format!("failed to read {}", store.path().display()))?;
            match value {
                Some(value) => {
                    println!("{value}");
                    Ok(())
                }
                None => bail!("no value for '{key}' in {}", store.path().display()),
            }
        }
        ConfigCommand::Set { prefix, line } => {
            let replaced = editor
                .replace_line_by_prefix(&prefix, &line)
                .with_context(|| format!("failed to update {}", store.path().display()))?;
            if !replaced {
                bail!("no line starts with '{prefix}'; nothing changed");
            }
            println!("{} {line}", "Replaced:".green().bold());
            Ok(())
        }
        ConfigCommand::Append { line } => {
            editor
                .append_line(&line)
                .with_context(|| format!("failed to append to {}", store.path().display()))?;
            println!("{} {line}", "Appended:".green().bold());
            Ok(())
        }
        ConfigCommand::Remove { prefix } => {
            let removed = editor
                .remove_line_by_prefix(&prefix)
                .with_context(|| format!("failed to update {}", store.path().display()))?;
            if removed == 0 {
                println!("No lines start with '{prefix}'.");
            } else {
                println!("{} {removed} line(s)", "Removed".green().bold());
            }
            Ok(())
        }
        ConfigCommand::Find { text } => {
            let found = editor
                .find_line_containing(&text)
                .with_context(|| format!("failed to read {}", store.path().display()))?;
            match found {
                Some(line) => {
                    println!("{line}");
                    Ok(())
                }
                None => bail!("no line contains '{text}'"),
            }
        }
        ConfigCommand::Encoding => {
            let choice = store
                .detect_encoding()
                .with_context(|| format!("failed to read {}", store.path().display()))?;
            println!("{choice}");
            Ok(())
        }
        ConfigCommand::Info => info(&store),
        ConfigCommand::Diff => diff(&store),
        ConfigCommand::Restore => {
            store
                .restore_from_backup()
                .context("restore from backup failed")?;
            println!(
                "{} {} from {}",
                "Restored".green().bold(),
                store.path().display(),
                store.backup_path().display()
            );
            Ok(())
        }
        ConfigCommand::Reset => {
            let backup = store.reset_to_default().context("reset to default failed")?;
            println!(
                "{} {} from {}",
                "Reset".green().bold(),
                store.path().display(),
                store.default_path().display()
            );
            print_backup_outcome(&backup);
            Ok(())
        }
    }
}

fn show(store: &ConfigFileStore, args: ShowArgs) -> Result<()> {
    let lines = store
        .read()
        .with_context(|| format!("failed to read {}", store.path().display()))?;
    let width = lines.len().to_string().len();
    for (idx, line) in lines.iter().enumerate() {
        if args.numbered {
            println!("{:>width$}  {line}", idx + 1);
        } else {
            println!("{line}");
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct InfoRow {
    #[tabled(rename = "file")]
    file: &'static str,
    #[tabled(rename = "path")]
    path: String,
    #[tabled(rename = "state")]
    state: String,
}

fn info(store: &ConfigFileStore) -> Result<()> {
    let config_state = if store.config_file_exists() {
        let choice = store
            .detect_encoding()
            .with_context(|| format!("failed to read {}", store.path().display()))?;
        format!("present, {choice}")
    } else {
        "missing".to_string()
    };

    let backup_state = match store.backup_info().context("failed to inspect backup")? {
        Some(info) => {
            let modified = info
                .modified
                .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "unknown time".to_string());
            format!("{} bytes, {modified}", info.size)
        }
        None => "none".to_string(),
    };

    let default_state = if store.default_file_exists() {
        "present"
    } else {
        "missing"
    };

    let rows = vec![
        InfoRow {
            file: "config",
            path: store.path().display().to_string(),
            state: config_state,
        },
        InfoRow {
            file: "backup",
            path: store.backup_path().display().to_string(),
            state: backup_state,
        },
        InfoRow {
            file: "default",
            path: store.default_path().display().to_string(),
            state: default_state.to_string(),
        },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    if let Some(label) = store.encoding_override() {
        println!("Charset override: {label}");
    }
    Ok(())
}

fn diff(store: &ConfigFileStore) -> Result<()> {
    let diff = store
        .diff_against_backup()
        .context("failed to diff against backup")?;
    match diff {
        Some(diff) => print!("{}", colorize_diff(&diff.unified_diff)),
        None => println!("No differences between backup and config."),
    }
    Ok(())
}

fn colorize_diff(diff: &str) -> String {
    let mut out = String::with_capacity(diff.len());
    for line in diff.lines() {
        let painted = if line.starts_with("+++") || line.starts_with("---") {
            line.bold().to_string()
        } else if line.starts_with('+') {
            line.green().to_string()
        } else if line.starts_with('-') {
            line.red().to_string()
        } else if line.starts_with("@@") {
            line.cyan().to_string()
        } else {
            line.to_string()
        };
        out.push_str(&painted);
        out.push('\n');
    }
    out
}

fn print_backup_outcome(outcome: &BackupOutcome) {
    match outcome {
        BackupOutcome::Created { path } => println!("Backup: {}", path.display()),
        BackupOutcome::Skipped => {}
        BackupOutcome::Failed { reason } => {
            eprintln!("{} backup was not created: {reason}", "warning:".yellow().bold())
        }
    }
}
