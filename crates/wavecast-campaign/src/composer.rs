//! Content composer: template source → substitution → optional generation → author wrap.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use wavecast_core::config::{LanguageConfig, WavecastConfig};
use wavecast_core::error::{Result, WavecastError};
use wavecast_core::traits::Provider;
use wavecast_core::traits::provider::GenerateParams;
use wavecast_core::types::{ChatMessage, CommonPromptSet, Message, MessageKind, Recipient};

use crate::template::{self, TemplateVars};

/// Immutable composer settings, built once from config.
#[derive(Debug, Clone)]
pub struct ComposerSettings {
    pub model: String,
    pub max_tokens: u32,
    pub deadline: DateTime<Utc>,
    pub languages: LanguageConfig,
    pub excluded_handles: Vec<String>,
    pub marker: String,
}

impl ComposerSettings {
    pub fn from_config(config: &WavecastConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            deadline: config.campaign.deadline,
            languages: config.languages.clone(),
            excluded_handles: config.campaign.excluded_handles.clone(),
            marker: config.campaign.marker.clone(),
        }
    }
}

pub struct ContentComposer {
    provider: Arc<dyn Provider>,
    settings: ComposerSettings,
}

impl ContentComposer {
    pub fn new(provider: Arc<dyn Provider>, settings: ComposerSettings) -> Self {
        Self { provider, settings }
    }

    /// Render the body for `message` addressed to `recipient`, as seen at `now`.
    pub async fn render(
        &self,
        message: &Message,
        recipient: &Recipient,
        prompts: &CommonPromptSet,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let source = match message.kind {
            MessageKind::Reminder => prompts.reminder.as_str(),
            _ => message.content.as_str(),
        };
        let vars = TemplateVars::for_recipient(recipient, prompts, self.settings.deadline, now);
        let substituted = template::render(source, &vars);

        if message.kind == MessageKind::Template {
            return Ok(substituted);
        }

        let user = self.user_content(substituted, message, recipient, &vars);
        self.generate(message, &prompts.system, user).await
    }

    /// User turn for the generation request: language directive first,
    /// then the substituted text, then the condition directive.
    fn user_content(&self, body: String, message: &Message, recipient: &Recipient, vars: &TemplateVars) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(directive) = language_directive(&recipient.language, &self.settings.languages) {
            parts.push(directive);
        }
        parts.push(body);
        if let Some(tag) = message.condition.as_deref() {
            if let Some(directive) = condition_directive(tag, vars) {
                parts.push(directive);
            }
        }
        parts.join("\n\n")
    }

    async fn generate(&self, message: &Message, system: &str, user: String) -> Result<String> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let params = GenerateParams {
            model: self.settings.model.clone(),
            temperature: message.temperature,
            max_tokens: self.settings.max_tokens,
        };

        tracing::debug!(
            "🧠 Generating '{}' via {} (model={}, temperature={})",
            message.handle,
            self.provider.name(),
            params.model,
            params.temperature
        );
        let response = self.provider.chat(&messages, &params).await?;

        match response.content.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => {
                let raw = format!("{response:?}");
                tracing::warn!("🕳️ Empty completion for '{}': {raw}", message.handle);
                Err(WavecastError::EmptyCompletion { handle: message.handle.clone(), raw })
            }
        }
    }

    /// Prefix the marker line and, unless `handle` is excluded, append a
    /// uniformly chosen author line.
    pub fn wrap<R: Rng + ?Sized>(&self, content: &str, handle: &str, authors: &[String], rng: &mut R) -> String {
        let mut wrapped = format!("{}\n{}", self.settings.marker, content);
        if self.settings.excluded_handles.iter().any(|h| h == handle) {
            return wrapped;
        }
        if let Some(author) = authors.choose(rng) {
            wrapped.push('\n');
            wrapped.push_str(author);
        }
        wrapped
    }
}

/// "Respond in German." for any supported non-default language.
pub fn language_directive(language: &str, languages: &LanguageConfig) -> Option<String> {
    if language.is_empty() || language == languages.default {
        return None;
    }
    match languages.supported.get(language) {
        Some(name) => Some(format!("Respond in {name}.")),
        None => {
            tracing::warn!("🌐 No language name for '{language}', generating in the default language");
            None
        }
    }
}

/// Extra instruction for a catalog condition tag.
pub fn condition_directive(tag: &str, vars: &TemplateVars) -> Option<String> {
    match tag {
        "slots" => match vars.get("slots") {
            Some(slots) => Some(format!("Mention that only {slots} places are left.")),
            None => {
                tracing::warn!("🎟️ Condition 'slots' set but no slot count is known");
                None
            }
        },
        "intense" => Some("Write with a more urgent, motivating tone.".to_string()),
        other => {
            tracing::warn!("❓ Unknown condition tag '{other}' ignored");
            None
        }
    }
}
