//! Chat-completions client shared by every registered backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wavecast_core::config::LlmConfig;
use wavecast_core::error::{Result, WavecastError};
use wavecast_core::traits::provider::{GenerateParams, Provider};
use wavecast_core::types::{ChatMessage, ProviderResponse, Usage};

use crate::registry::{Auth, Backend, CHAT_COMPLETIONS};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

pub struct OpenAiCompatibleProvider {
    name: String,
    url: String,
    auth: Auth,
    api_key: String,
    client: reqwest::Client,
}

/// `host[:port]` style overrides get the `/v1` suffix the API base needs.
fn with_v1(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("/v1") { base.to_string() } else { format!("{base}/v1") }
}

impl OpenAiCompatibleProvider {
    /// Key: `llm.api_key`, else the backend's env vars.
    /// Base: `llm.endpoint`, else the backend's env override, else its default.
    pub fn from_backend(backend: &Backend, config: &LlmConfig) -> Result<Self> {
        Self::from_backend_with(backend, config, |var| std::env::var(var).ok())
    }

    fn from_backend_with<F>(backend: &Backend, config: &LlmConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = Some(config.api_key.clone())
            .filter(|k| !k.is_empty())
            .or_else(|| backend.key_vars.iter().find_map(|var| env(var)))
            .unwrap_or_default();

        let base = if config.endpoint.is_empty() {
            backend
                .base_var
                .and_then(|var| env(var))
                .map(|v| with_v1(&v))
                .unwrap_or_else(|| backend.api_base.to_string())
        } else {
            config.endpoint.trim_end_matches('/').to_string()
        };

        Ok(Self {
            name: backend.id.to_string(),
            url: format!("{base}{CHAT_COMPLETIONS}"),
            auth: backend.auth,
            api_key,
            client: reqwest::Client::new(),
        })
    }

    /// `custom:<base-url>`; the key comes from `llm.api_key` or `CUSTOM_API_KEY`
    /// and is optional.
    pub fn custom(spec: &str, config: &LlmConfig) -> Result<Self> {
        let base = spec.strip_prefix("custom:").unwrap_or(spec).trim_end_matches('/');
        if base.is_empty() {
            return Err(WavecastError::Config("custom provider needs an endpoint URL".into()));
        }
        let api_key = Some(config.api_key.clone())
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("CUSTOM_API_KEY").ok())
            .unwrap_or_default();

        Ok(Self {
            name: "custom".to_string(),
            url: format!("{base}{CHAT_COMPLETIONS}"),
            auth: if api_key.is_empty() { Auth::Anonymous } else { Auth::Bearer },
            api_key,
            client: reqwest::Client::new(),
        })
    }
}

/// Convert a decoded reply. Missing choices and null content both come back
/// as `content: None` for the caller to judge.
fn into_response(reply: ChatReply) -> ProviderResponse {
    let (content, finish_reason) = match reply.choices.into_iter().next() {
        Some(choice) => (choice.message.and_then(|m| m.content), choice.finish_reason),
        None => (None, None),
    };
    ProviderResponse { content, finish_reason, usage: reply.usage }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, messages: &[ChatMessage], params: &GenerateParams) -> Result<ProviderResponse> {
        let mut req = self.client.post(&self.url).json(&ChatRequest {
            model: &params.model,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            messages,
        });
        if self.auth == Auth::Bearer {
            if self.api_key.is_empty() {
                return Err(WavecastError::ApiKeyMissing(self.name.clone()));
            }
            req = req.bearer_auth(&self.api_key);
        }

        tracing::debug!("🧠 POST {} ({} messages)", self.url, messages.len());
        let resp = req
            .send()
            .await
            .map_err(|e| WavecastError::Http(format!("{}: {e}", self.name)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WavecastError::provider(format!("{} returned {status}: {body}", self.name)));
        }

        let reply: ChatReply = resp
            .json()
            .await
            .map_err(|e| WavecastError::provider(format!("{}: undecodable reply: {e}", self.name)))?;
        Ok(into_response(reply))
    }
}
