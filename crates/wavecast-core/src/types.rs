//! Domain records shared between the store, the engine and the transports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WavecastError;

/// Zero-based record index of a recipient row in the store.
pub type RowId = usize;

/// Delivery channel a recipient prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    #[default]
    Sms,
    Signal,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Sms => write!(f, "sms"),
            ChannelKind::Signal => write!(f, "signal"),
        }
    }
}

impl FromStr for ChannelKind {
    type Err = WavecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "sms" => Ok(ChannelKind::Sms),
            "signal" => Ok(ChannelKind::Signal),
            other => Err(WavecastError::Validation(format!("unknown channel '{other}'"))),
        }
    }
}

/// How a catalog entry turns into message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Sent as written after placeholder substitution.
    Template,
    /// Content is a prompt for the generation capability.
    Prompt,
    /// The shared reminder prompt is used instead of the row content.
    Reminder,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Template => write!(f, "template"),
            MessageKind::Prompt => write!(f, "prompt"),
            MessageKind::Reminder => write!(f, "reminder"),
        }
    }
}

impl FromStr for MessageKind {
    type Err = WavecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "template" => Ok(MessageKind::Template),
            "prompt" => Ok(MessageKind::Prompt),
            "reminder" => Ok(MessageKind::Reminder),
            other => Err(WavecastError::Validation(format!("unknown message type '{other}'"))),
        }
    }
}

/// A campaign participant, read fresh from the store each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RowId,
    /// E.164 number, always `+` prefixed.
    pub number: String,
    pub name: String,
    pub active: bool,
    /// Wave of the last message successfully delivered.
    pub last_wave: u32,
    pub language: String,
    pub channel: ChannelKind,
    pub high_intensity: bool,
    pub slots_remaining: Option<u32>,
}

impl Recipient {
    /// The recipient as it stands after `message` was delivered and recorded.
    pub fn advanced_to(&self, message: &Message) -> Recipient {
        Recipient {
            last_wave: self.last_wave.max(message.wave),
            ..self.clone()
        }
    }
}

/// One entry of the message catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Catalog identifier ("caption" in the sheet).
    pub handle: String,
    pub content: String,
    pub kind: MessageKind,
    /// Progression gate; always positive for active messages.
    pub wave: u32,
    pub high_priority: bool,
    pub condition: Option<String>,
    pub temperature: f32,
    pub active: bool,
}

/// Prompts shared by every generated message of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommonPromptSet {
    pub system: String,
    pub reminder: String,
    /// Campaign-wide places left, used when a recipient has no own value.
    pub slots_remaining: Option<u32>,
}

/// Audit entry appended after a successful, recorded send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub name: String,
    pub number: String,
    pub timestamp: DateTime<Utc>,
    pub handle: String,
    pub content: String,
}

/// Keyed progression update for one recipient row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientUpdate {
    pub id: RowId,
    pub wave: u32,
    pub handle: String,
    pub content: String,
}

/// A rendered message addressed to one number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub to: String,
    pub content: String,
}

/// Chat role for generation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single chat message sent to a generation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// What a provider returned. `content` is `None` when the provider answered
/// without text, which is distinct from a failed request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub content: Option<String>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}
