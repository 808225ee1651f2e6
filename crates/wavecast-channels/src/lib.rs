//! # Wavecast Channels
//! Delivery transports and the dispatcher that routes a recipient to one.
//!
//! - `sms`: httpSMS gateway (HTTP)
//! - `signal_cli`: local signal-cli process

pub mod signal_cli;
pub mod sms;

use std::collections::HashMap;
use std::sync::Arc;

use wavecast_core::config::ChannelConfig;
use wavecast_core::error::{Result, WavecastError};
use wavecast_core::traits::Channel;
use wavecast_core::types::{ChannelKind, OutgoingMessage, Recipient};

pub use signal_cli::SignalCliChannel;
pub use sms::SmsChannel;

/// Routes each recipient to the transport for their preferred channel.
#[derive(Default, Clone)]
pub struct Dispatcher {
    channels: HashMap<ChannelKind, Arc<dyn Channel>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from channel config. Disabled channels are not registered.
    pub fn from_config(config: &ChannelConfig) -> Result<Self> {
        let mut dispatcher = Self::new();
        if config.sms.enabled {
            dispatcher.register(Arc::new(SmsChannel::new(config.sms.clone())?));
        }
        if config.signal.enabled {
            dispatcher.register(Arc::new(SignalCliChannel::new(config.signal.clone())?));
        }
        tracing::info!("📡 Channels ready: {:?}", dispatcher.kinds());
        Ok(dispatcher)
    }

    /// Register a transport, replacing any previous one of the same kind.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        self.channels.insert(channel.kind(), channel);
    }

    pub fn kinds(&self) -> Vec<ChannelKind> {
        let mut kinds: Vec<_> = self.channels.keys().copied().collect();
        kinds.sort_by_key(|k| k.to_string());
        kinds
    }

    /// Deliver `content` to `recipient` over their preferred channel.
    pub async fn dispatch(&self, recipient: &Recipient, content: &str) -> Result<()> {
        let channel = self
            .channels
            .get(&recipient.channel)
            .ok_or_else(|| WavecastError::ChannelUnavailable(recipient.channel.to_string()))?;
        let message = OutgoingMessage {
            to: recipient.number.clone(),
            content: content.to_string(),
        };
        channel.send(&message).await
    }
}
