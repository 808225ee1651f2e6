//! # Wavecast Providers
//!
//! Text generation for prompt and reminder messages.
//!
//! Every supported backend speaks the OpenAI chat-completions dialect and is
//! served by a single `OpenAiCompatibleProvider`; backends differ only by
//! endpoint, auth style and API key. `llm.fallbacks` wraps the primary in a
//! `FailoverProvider`.

pub mod failover;
pub mod openai_compatible;
pub mod registry;

use wavecast_core::config::LlmConfig;
use wavecast_core::error::{Result, WavecastError};
use wavecast_core::traits::Provider;

/// Create a single provider by name.
pub fn create_named_provider(name: &str, config: &LlmConfig) -> Result<Box<dyn Provider>> {
    match name {
        // Custom endpoint: "custom:https://my-server.com/v1"
        other if other.starts_with("custom:") => Ok(Box::new(
            openai_compatible::OpenAiCompatibleProvider::custom(other, config)?,
        )),
        _ => {
            let backend = registry::lookup(name).ok_or_else(|| WavecastError::ProviderNotFound(name.into()))?;
            Ok(Box::new(openai_compatible::OpenAiCompatibleProvider::from_backend(backend, config)?))
        }
    }
}

/// Create the configured provider, wrapped in a failover chain when
/// fallbacks are listed.
pub fn create_provider(config: &LlmConfig) -> Result<Box<dyn Provider>> {
    let primary = create_named_provider(&config.provider, config)?;
    if config.fallbacks.is_empty() {
        return Ok(primary);
    }

    // Fallbacks use their registry endpoint and env key, never the primary's overrides.
    let fallback_config = LlmConfig {
        api_key: String::new(),
        endpoint: String::new(),
        ..config.clone()
    };
    let mut chain = vec![primary];
    for name in &config.fallbacks {
        chain.push(create_named_provider(name, &fallback_config)?);
    }
    let chain = failover::FailoverProvider::new(chain)?;
    tracing::info!(
        "🔗 Failover chain of {} providers: {} → {}",
        chain.chain_len(),
        config.provider,
        config.fallbacks.join(" → ")
    );
    Ok(Box::new(chain))
}

/// List all available provider names.
pub fn available_providers() -> Vec<&'static str> {
    let mut names = registry::ids();
    names.push("custom");
    names
}
