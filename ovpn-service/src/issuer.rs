//! Client certificate issuance through easy-rsa 2.x `build-key`.
//!
//! `build-key` is interactive: ten prompts for the subject fields (all
//! accepted with their defaults by an empty answer) followed by "Sign the
//! certificate? [y/n]" and "commit? [y/n]". The prompts are not parsed;
//! answers are written on a fixed schedule ([`AnswerScript`]) while the
//! combined output is collected until EOF.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};

use ovpn_core::{CertificateName, ServerPaths};

use crate::error::{issue_io_err, IssueError};

const ARTIFACT_EXTENSIONS: [&str; 3] = ["csr", "key", "crt"];

/// Timed answers fed to `build-key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerScript {
    /// Wait for key generation before the first prompt.
    pub initial_delay: Duration,
    /// Empty answers for the subject prompts.
    pub blank_answers: usize,
    pub blank_interval: Duration,
    /// Pause before "Sign the certificate?".
    pub sign_delay: Duration,
    /// Pause before "commit?".
    pub commit_delay: Duration,
    pub settle: Duration,
}

impl Default for AnswerScript {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            blank_answers: 10,
            blank_interval: Duration::from_millis(400),
            sign_delay: Duration::from_secs(3),
            commit_delay: Duration::from_secs(2),
            settle: Duration::from_millis(500),
        }
    }
}

impl AnswerScript {
    /// Same answers, no pauses.
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            blank_interval: Duration::ZERO,
            sign_delay: Duration::ZERO,
            commit_delay: Duration::ZERO,
            settle: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Artifacts of a successfully issued certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub name: CertificateName,
    pub csr: PathBuf,
    pub key: PathBuf,
    pub crt: PathBuf,
    pub output: String,
}

pub trait CertificateIssuer {
    fn issue(&self, name: &CertificateName) -> Result<IssuedCertificate, IssueError>;
}

/// Runs `build-key` from an easy-rsa 2.x directory.
#[derive(Debug, Clone)]
pub struct EasyRsaIssuer {
    easy_rsa: PathBuf,
    keys_dir: PathBuf,
    script: AnswerScript,
    line_buffered: bool,
}

impl EasyRsaIssuer {
    pub fn new(easy_rsa: impl Into<PathBuf>) -> Self {
        let easy_rsa = easy_rsa.into();
        Self {
            keys_dir: easy_rsa.join("keys"),
            easy_rsa,
            script: AnswerScript::default(),
            line_buffered: true,
        }
    }

    pub fn from_paths(paths: &ServerPaths) -> Self {
        Self {
            easy_rsa: paths.easy_rsa.clone(),
            keys_dir: paths.keys_dir.clone(),
            script: AnswerScript::default(),
            line_buffered: true,
        }
    }

    pub fn with_script(mut self, script: AnswerScript) -> Self {
        self.script = script;
        self
    }

    /// Run `build-key` under `stdbuf -oL -eL` when the host has `stdbuf`
    /// (on by default).
    pub fn line_buffered(mut self, enabled: bool) -> Self {
        self.line_buffered = enabled;
        self
    }

    pub fn keys_dir(&self) -> &Path {
        &self.keys_dir
    }

    fn artifact(&self, name: &CertificateName, ext: &str) -> PathBuf {
        self.keys_dir.join(format!("{name}.{ext}"))
    }

    fn artifacts(&self, name: &CertificateName) -> Vec<PathBuf> {
        ARTIFACT_EXTENSIONS
            .iter()
            .map(|ext| self.artifact(name, ext))
            .collect()
    }

    fn shell_command(&self, name: &CertificateName) -> String {
        let run = if self.line_buffered {
            format!(
                "if command -v stdbuf >/dev/null 2>&1; \
                 then stdbuf -oL -eL ./build-key {name}; \
                 else ./build-key {name}; fi"
            )
        } else {
            format!("./build-key {name}")
        };
        format!(
            "exec 2>&1; cd {} && . ./vars && {run}",
            shell_quote(&self.easy_rsa)
        )
    }

    async fn run_build_key(&self, name: &CertificateName) -> Result<(Option<i32>, String), IssueError> {
        let command = self.shell_command(name);
        tracing::info!(%name, "running build-key");
        tracing::debug!(command = %command);

        let mut child = Command::new("bash")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| issue_io_err("bash", e))?;

        let answers = child
            .stdin
            .take()
            .map(|stdin| tokio::spawn(feed_answers(stdin, self.script.clone())));

        let mut output = String::new();
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines
                .next_line()
                .await
                .map_err(|e| issue_io_err("build-key stdout", e))?
            {
                tracing::info!("build-key: {line}");
                output.push_str(&line);
                output.push('\n');
            }
        }

        // Output closed: the remaining answers have nobody to read them.
        if let Some(answers) = answers {
            answers.abort();
        }

        let status = child
            .wait()
            .await
            .map_err(|e| issue_io_err("build-key", e))?;
        Ok((status.code(), output))
    }
}

impl CertificateIssuer for EasyRsaIssuer {
    fn issue(&self, name: &CertificateName) -> Result<IssuedCertificate, IssueError> {
        let artifacts = self.artifacts(name);
        let existing: Vec<PathBuf> = artifacts.iter().filter(|p| p.exists()).cloned().collect();
        if !existing.is_empty() {
            tracing::warn!(%name, "certificate already exists");
            return Err(IssueError::AlreadyExists {
                name: name.to_string(),
                existing,
            });
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| issue_io_err("tokio-runtime", e))?;
        let (exit_code, output) = runtime.block_on(self.run_build_key(name))?;

        let missing: Vec<PathBuf> = artifacts.iter().filter(|p| !p.exists()).cloned().collect();
        if exit_code != Some(0) || !missing.is_empty() {
            tracing::error!(%name, ?exit_code, missing = missing.len(), "build-key failed");
            return Err(IssueError::Failed {
                name: name.to_string(),
                exit_code,
                missing,
                output,
            });
        }

        tracing::info!(%name, "certificate issued");
        Ok(IssuedCertificate {
            name: name.clone(),
            csr: self.artifact(name, "csr"),
            key: self.artifact(name, "key"),
            crt: self.artifact(name, "crt"),
            output,
        })
    }
}

async fn feed_answers(mut stdin: ChildStdin, script: AnswerScript) {
    tokio::time::sleep(script.initial_delay).await;
    for _ in 0..script.blank_answers {
        if send(&mut stdin, "").await.is_err() {
            return;
        }
        tokio::time::sleep(script.blank_interval).await;
    }

    tokio::time::sleep(script.sign_delay).await;
    if send(&mut stdin, "y").await.is_err() {
        return;
    }
    tokio::time::sleep(script.commit_delay).await;
    if send(&mut stdin, "y").await.is_err() {
        return;
    }
    tokio::time::sleep(script.settle).await;
}

async fn send(stdin: &mut ChildStdin, answer: &str) -> std::io::Result<()> {
    let result = async {
        stdin.write_all(answer.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await
    }
    .await;
    if let Err(e) = &result {
        tracing::debug!("build-key stopped reading answers: {e}");
    }
    result
}

/// Single-quote `path` for `bash -c`.
fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_script_matches_build_key_prompts() {
        let script = AnswerScript::default();
        assert_eq!(script.blank_answers, 10);
        assert_eq!(script.initial_delay, Duration::from_secs(3));
        assert_eq!(script.blank_interval, Duration::from_millis(400));
    }

    #[test]
    fn command_sources_vars_and_runs_build_key() {
        let issuer = EasyRsaIssuer::new("/etc/openvpn/easy-rsa/2.0");
        let name = CertificateName::new("office-laptop").unwrap();
        assert_eq!(
            issuer.shell_command(&name),
            "exec 2>&1; cd '/etc/openvpn/easy-rsa/2.0' && . ./vars && \
             if command -v stdbuf >/dev/null 2>&1; \
             then stdbuf -oL -eL ./build-key office-laptop; \
             else ./build-key office-laptop; fi"
        );
    }

    #[test]
    fn unbuffered_command_runs_build_key_directly() {
        let issuer = EasyRsaIssuer::new("/srv/easy-rsa").line_buffered(false);
        let name = CertificateName::new("office").unwrap();
        assert_eq!(
            issuer.shell_command(&name),
            "exec 2>&1; cd '/srv/easy-rsa' && . ./vars && ./build-key office"
        );
    }

    #[test]
    fn quotes_single_quotes_in_paths() {
        assert_eq!(shell_quote(Path::new("/tmp/it's")), r"'/tmp/it'\''s'");
    }
}
