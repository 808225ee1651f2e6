//! Text generation capability.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatMessage, ProviderResponse};

/// Parameters for a single generation request.
#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".into(),
            temperature: 1.0,
            max_tokens: 512,
        }
    }
}

/// A chat-completion style text generator.
///
/// `Err` means the request failed; `Ok` with `content: None` means the
/// provider answered without text. Callers treat the two differently.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, messages: &[ChatMessage], params: &GenerateParams) -> Result<ProviderResponse>;
}
