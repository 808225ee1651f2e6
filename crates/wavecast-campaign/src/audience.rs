//! Pre-engine narrowing of the recipient set and message catalog.

use wavecast_core::config::CampaignConfig;
use wavecast_core::types::{Message, Recipient};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Audience {
    /// Only this number, compared on digits.
    pub canary: Option<String>,
    /// Hard cap on recipients per pass, in sheet order.
    pub max_recipients: Option<usize>,
    /// Drop catalog entries beyond this wave.
    pub max_wave: Option<u32>,
}

fn digits(number: &str) -> String {
    number.chars().filter(char::is_ascii_digit).collect()
}

impl Audience {
    pub fn from_config(config: &CampaignConfig) -> Self {
        Self {
            canary: config.canary.clone(),
            max_recipients: config.max_recipients,
            max_wave: config.max_wave,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        *self == Self::default()
    }

    pub fn narrow_recipients(&self, recipients: Vec<Recipient>) -> Vec<Recipient> {
        let mut recipients = recipients;
        if let Some(canary) = &self.canary {
            let wanted = digits(canary);
            recipients.retain(|r| digits(&r.number) == wanted);
            if recipients.is_empty() {
                tracing::warn!("🐤 Canary {canary} is not an active recipient");
            }
        }
        if let Some(cap) = self.max_recipients {
            recipients.truncate(cap);
        }
        recipients
    }

    pub fn narrow_messages(&self, messages: Vec<Message>) -> Vec<Message> {
        match self.max_wave {
            Some(max) => messages.into_iter().filter(|m| m.wave <= max).collect(),
            None => messages,
        }
    }
}
