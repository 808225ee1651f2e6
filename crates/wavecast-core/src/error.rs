//! Error taxonomy shared by every Wavecast crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WavecastError>;

#[derive(Debug, Error)]
pub enum WavecastError {
    /// Bulk retrieval of recipients, catalog, prompts or authors failed.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// The generation capability answered, but without usable text.
    #[error("Empty completion for '{handle}': {raw}")]
    EmptyCompletion { handle: String, raw: String },

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("No channel configured for '{0}'")]
    ChannelUnavailable(String),

    /// The store rejected an update or log append. The message was already delivered.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("API key missing for provider: {0}")]
    ApiKeyMissing(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid row: {0}")]
    Validation(String),
}

impl WavecastError {
    /// Errors that stop the whole run rather than a single recipient.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Config(_))
    }

    /// Create a provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a channel send error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelSend(msg.into())
    }
}
