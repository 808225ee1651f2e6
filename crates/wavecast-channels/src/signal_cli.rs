//! Signal channel driven through the local `signal-cli` binary.
//!
//! signal-cli writes connection banners and housekeeping notices to stderr
//! even when a send succeeds. Known notices are tolerated; any other
//! diagnostic line fails the send and is surfaced verbatim.

use async_trait::async_trait;
use std::time::Duration;
use wavecast_core::config::SignalChannelConfig;
use wavecast_core::error::{Result, WavecastError};
use wavecast_core::traits::Channel;
use wavecast_core::types::{ChannelKind, OutgoingMessage};

/// Replacement for `"` in message bodies handed to the CLI.
const QUOTE_SUBSTITUTE: char = '\'';

pub struct SignalCliChannel {
    config: SignalChannelConfig,
}

impl SignalCliChannel {
    pub fn new(config: SignalChannelConfig) -> Result<Self> {
        if config.account.is_empty() {
            return Err(WavecastError::Config("signal account not configured".into()));
        }
        Ok(Self { config })
    }

    /// Argument vector for `signal-cli -a <account> send -m <text> <number>`.
    fn build_args(&self, message: &OutgoingMessage) -> Vec<String> {
        vec![
            "-a".to_string(),
            self.config.account.clone(),
            "send".to_string(),
            "-m".to_string(),
            sanitize_content(&message.content),
            message.to.clone(),
        ]
    }
}

/// Swap embedded double quotes so the invocation cannot be split.
pub fn sanitize_content(content: &str) -> String {
    content.replace('"', &QUOTE_SUBSTITUTE.to_string())
}

/// Split a `LEVEL  Logger - message` line into its level and message.
/// Lines without that prefix come back whole, with no level.
fn split_log_prefix(line: &str) -> (Option<&str>, &str) {
    let Some((head, message)) = line.split_once(" - ") else {
        return (None, line);
    };
    let mut fields = head.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(level), Some(_logger), None) if level.chars().all(|c| c.is_ascii_uppercase()) => {
            (Some(level), message.trim())
        }
        _ => (None, line),
    }
}

/// Return the stderr lines not covered by the allow-list.
///
/// A line is benign only when its whole message equals an allow-listed
/// notice. `ERROR` lines never are.
pub fn unexpected_diagnostics<'a>(stderr: &'a str, benign: &[String]) -> Vec<&'a str> {
    stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            let (level, message) = split_log_prefix(line);
            level == Some("ERROR") || !benign.iter().any(|b| message == b.trim())
        })
        .collect()
}

#[async_trait]
impl Channel for SignalCliChannel {
    fn name(&self) -> &str {
        "signal"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Signal
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        let args = self.build_args(message);
        let timeout = Duration::from_secs(self.config.timeout_secs);

        let output = tokio::time::timeout(
            timeout,
            tokio::process::Command::new(&self.config.binary)
                .args(&args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            WavecastError::channel(format!(
                "{} timed out after {}s; delivery state unknown",
                self.config.binary, self.config.timeout_secs
            ))
        })?
        .map_err(|e| {
            WavecastError::channel(format!("'{}' not found or not executable: {e}", self.config.binary))
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let unexpected = unexpected_diagnostics(&stderr, &self.config.benign_stderr);
        if !unexpected.is_empty() {
            tracing::error!("📵 signal-cli diagnostics for {}:\n{}", message.to, stderr);
            return Err(WavecastError::channel(format!("signal-cli: {}", unexpected.join("\n"))));
        }
        if !output.status.success() {
            return Err(WavecastError::channel(format!(
                "signal-cli exited with {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        tracing::debug!("📨 Signal message sent → {}", message.to);
        Ok(())
    }
}
