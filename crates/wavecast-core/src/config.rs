//! Wavecast configuration system.
//!
//! Loaded once at startup from TOML, overlaid with environment variables for
//! secrets and endpoints, then validated. The engine never reads the
//! environment itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, WavecastError};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WavecastConfig {
    #[serde(default)]
    pub campaign: CampaignConfig,
    #[serde(default)]
    pub languages: LanguageConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
}

impl WavecastConfig {
    /// Load config from the default path (~/.wavecast/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WavecastError::Config(format!("Failed to read config {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| WavecastError::Config(format!("Failed to parse config: {e}")))
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Wavecast home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wavecast")
    }

    /// Expand `~` in a user supplied path.
    pub fn expand_path(p: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(p).to_string())
    }

    /// Overlay secrets and endpoints from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary lookup. Empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = Vec::new();
        for key in [
            "RECIPIENTS_URL",
            "MESSAGES_URL",
            "AUTHORS_URL",
            "PROMPTS_URL",
            "LOG_URL",
            "HTTPSMS_API_KEY",
            "SMS_FROM",
            "SIGNAL_ACCOUNT",
            "HOT_SEND",
            "HOT_UPDATE",
        ] {
            let Some(v) = lookup(key).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            match key {
                "RECIPIENTS_URL" => self.store.recipients_url = v,
                "MESSAGES_URL" => self.store.messages_url = v,
                "AUTHORS_URL" => self.store.authors_url = v,
                "PROMPTS_URL" => self.store.prompts_url = v,
                "LOG_URL" => self.store.log_url = v,
                "HTTPSMS_API_KEY" => self.channel.sms.api_key = v,
                "SMS_FROM" => self.channel.sms.from = v,
                "SIGNAL_ACCOUNT" => self.channel.signal.account = v,
                "HOT_SEND" => self.campaign.hot_send = v.trim().eq_ignore_ascii_case("true"),
                "HOT_UPDATE" => self.campaign.hot_update = v.trim().eq_ignore_ascii_case("true"),
                _ => continue,
            }
            applied.push(key);
        }
        if !applied.is_empty() {
            tracing::debug!("⚙️ Environment overrides: {}", applied.join(", "));
        }
    }

    /// Fail fast on settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let c = &self.campaign;
        if c.loops == 0 {
            return Err(WavecastError::Config("campaign.loops must be at least 1".into()));
        }
        if c.concurrency == 0 {
            return Err(WavecastError::Config("campaign.concurrency must be at least 1".into()));
        }
        for (name, url) in [
            ("recipients_url", &self.store.recipients_url),
            ("messages_url", &self.store.messages_url),
            ("authors_url", &self.store.authors_url),
            ("prompts_url", &self.store.prompts_url),
            ("log_url", &self.store.log_url),
        ] {
            if url.trim().is_empty() {
                return Err(WavecastError::Config(format!("store.{name} is not set")));
            }
        }
        if self.languages.supported.contains_key(&self.languages.default) {
            return Err(WavecastError::Config(format!(
                "default language '{}' must not be listed as a supported translation",
                self.languages.default
            )));
        }
        if c.hot_send && !self.channel.sms.enabled && !self.channel.signal.enabled {
            return Err(WavecastError::Config(
                "hot_send is on but no channel is enabled".into(),
            ));
        }
        Ok(())
    }

    /// Copy with secrets and sender numbers masked, for printing.
    pub fn redacted(&self) -> Self {
        let mask = |s: &str| if s.is_empty() { String::new() } else { "***".to_string() };
        let mut copy = self.clone();
        copy.llm.api_key = mask(&copy.llm.api_key);
        copy.channel.sms.api_key = mask(&copy.channel.sms.api_key);
        copy.channel.sms.from = mask(&copy.channel.sms.from);
        copy.channel.signal.account = mask(&copy.channel.signal.account);
        copy
    }
}

/// Campaign loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Actually deliver messages.
    #[serde(default)]
    pub hot_send: bool,
    /// Actually persist progression and append to the log.
    #[serde(default)]
    pub hot_update: bool,
    #[serde(default = "default_loops")]
    pub loops: u32,
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_deadline")]
    pub deadline: DateTime<Utc>,
    /// Restrict the run to this single number.
    #[serde(default)]
    pub canary: Option<String>,
    #[serde(default)]
    pub max_recipients: Option<usize>,
    /// Drop catalog entries above this wave.
    #[serde(default)]
    pub max_wave: Option<u32>,
    /// When true, non-priority messages only go to high-intensity recipients.
    #[serde(default)]
    pub priority_gating: bool,
    /// Handles that never get an author line.
    #[serde(default = "default_excluded_handles")]
    pub excluded_handles: Vec<String>,
    #[serde(default = "default_marker")]
    pub marker: String,
}

fn default_loops() -> u32 { 1 }
fn default_wait_secs() -> u64 { 60 }
fn default_concurrency() -> usize { 1 }
fn default_deadline() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-12-07T11:00:00+01:00")
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_default()
}
fn default_excluded_handles() -> Vec<String> {
    vec!["invitation", "bot-intro"]
        .into_iter().map(String::from).collect()
}
fn default_marker() -> String { "🌊".into() }

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            hot_send: false,
            hot_update: false,
            loops: default_loops(),
            wait_secs: default_wait_secs(),
            concurrency: default_concurrency(),
            deadline: default_deadline(),
            canary: None,
            max_recipients: None,
            max_wave: None,
            priority_gating: false,
            excluded_handles: default_excluded_handles(),
            marker: default_marker(),
        }
    }
}

/// Localization settings. `supported` maps a language code to the English
/// name used in the response directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    #[serde(default = "default_language")]
    pub default: String,
    #[serde(default = "default_supported_languages")]
    pub supported: BTreeMap<String, String>,
}

fn default_language() -> String { "en".into() }
fn default_supported_languages() -> BTreeMap<String, String> {
    [("de", "German"), ("it", "Italian"), ("fr", "French"), ("es", "Spanish")]
        .into_iter()
        .map(|(code, name)| (code.to_string(), name.to_string()))
        .collect()
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            default: default_language(),
            supported: default_supported_languages(),
        }
    }
}

/// Generation provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    /// Overrides the registry base URL.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Providers tried in order when the primary fails.
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

fn default_provider() -> String { "openai".into() }
fn default_model() -> String { "gpt-3.5-turbo".into() }
fn default_max_tokens() -> u32 { 512 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: String::new(),
            endpoint: String::new(),
            max_tokens: default_max_tokens(),
            fallbacks: vec![],
        }
    }
}

/// Spreadsheet API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub recipients_url: String,
    #[serde(default)]
    pub messages_url: String,
    #[serde(default)]
    pub authors_url: String,
    #[serde(default)]
    pub prompts_url: String,
    #[serde(default)]
    pub log_url: String,
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_store_timeout() -> u64 { 30 }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            recipients_url: String::new(),
            messages_url: String::new(),
            authors_url: String::new(),
            prompts_url: String::new(),
            log_url: String::new(),
            timeout_secs: default_store_timeout(),
        }
    }
}

/// Channel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub sms: SmsChannelConfig,
    #[serde(default)]
    pub signal: SignalChannelConfig,
}

/// httpSMS gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsChannelConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    /// Sending phone number registered with the gateway.
    #[serde(default)]
    pub from: String,
    #[serde(default = "default_sms_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_sms_timeout")]
    pub timeout_secs: u64,
}

fn bool_true() -> bool { true }
fn default_sms_endpoint() -> String { "https://api.httpsms.com/v1/messages/send".into() }
fn default_sms_timeout() -> u64 { 15 }

impl Default for SmsChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            from: String::new(),
            endpoint: default_sms_endpoint(),
            timeout_secs: default_sms_timeout(),
        }
    }
}

/// signal-cli driven messenger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_signal_binary")]
    pub binary: String,
    /// Registered account number passed via `-a`.
    #[serde(default)]
    pub account: String,
    /// Diagnostic lines containing any of these are not failures.
    #[serde(default = "default_benign_stderr")]
    pub benign_stderr: Vec<String>,
    #[serde(default = "default_signal_timeout")]
    pub timeout_secs: u64,
}

fn default_signal_binary() -> String { "signal-cli".into() }
fn default_benign_stderr() -> Vec<String> {
    vec![
        "The Signal protocol expects that incoming messages are regularly received.",
        "Failed to get sender certificate, ignoring",
        "Connection closed unexpectedly, reconnecting",
    ]
    .into_iter().map(String::from).collect()
}
fn default_signal_timeout() -> u64 { 60 }

impl Default for SignalChannelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            binary: default_signal_binary(),
            account: String::new(),
            benign_stderr: default_benign_stderr(),
            timeout_secs: default_signal_timeout(),
        }
    }
}
