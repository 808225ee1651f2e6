//! Outbound delivery transport.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChannelKind, OutgoingMessage};

/// One way of getting a rendered message to a phone number.
///
/// `send` returns only after the transport acknowledged the message.
/// Any non-success acknowledgement is a `ChannelSend` error. Transports
/// never retry on their own.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ChannelKind;

    async fn send(&self, message: &OutgoingMessage) -> Result<()>;
}
