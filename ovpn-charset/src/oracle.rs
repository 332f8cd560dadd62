//! Last-resort charset oracles.

use std::io::Write;
use std::process::{Command, Stdio};

/// An external source of charset guesses, consulted only after the UTF-8 and
/// legacy scoring steps came up empty.
pub trait CharsetOracle: Send + Sync {
    /// A charset label for `bytes`, or `None` if the oracle has no opinion.
    fn guess(&self, bytes: &[u8]) -> Option<String>;
}

/// Never has an opinion. Keeps detection free of subprocesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOracle;

impl CharsetOracle for NoOracle {
    fn guess(&self, _bytes: &[u8]) -> Option<String> {
        None
    }
}

/// Asks `file -bi -`, feeding the bytes on stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCommandOracle;

impl CharsetOracle for FileCommandOracle {
    fn guess(&self, bytes: &[u8]) -> Option<String> {
        let mut child = match Command::new("file")
            .args(["-b", "-i", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(error = %e, "file utility unavailable");
                return None;
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            // `file` may stop reading early; a broken pipe here is expected.
            let _ = stdin.write_all(bytes);
        }

        let output = match child.wait_with_output() {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!(error = %e, "file utility failed");
                return None;
            }
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_charset_token(stdout.lines().next()?)
    }
}

/// Extract the value of a `charset=` token (`text/plain; charset=koi8-r`).
pub fn parse_charset_token(line: &str) -> Option<String> {
    let (_, rest) = line.split_once("charset=")?;
    let value = rest
        .split(|c: char| c == ';' || c.is_whitespace())
        .next()
        .unwrap_or_default()
        .trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mime_output() {
        assert_eq!(
            parse_charset_token("text/plain; charset=iso-8859-1"),
            Some("iso-8859-1".to_string())
        );
        assert_eq!(
            parse_charset_token("text/plain; charset=utf-8; extra"),
            Some("utf-8".to_string())
        );
    }

    #[test]
    fn missing_or_empty_token_is_none() {
        assert_eq!(parse_charset_token("application/octet-stream"), None);
        assert_eq!(parse_charset_token("text/plain; charset="), None);
    }

    #[test]
    fn no_oracle_never_answers() {
        assert_eq!(NoOracle.guess(b"\xff\xfe"), None);
    }
}
