//! httpSMS channel.
//!
//! Queues a text through the httpSMS gateway, which relays it from a paired
//! Android phone. Requires: API key + the sending phone number.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wavecast_core::config::SmsChannelConfig;
use wavecast_core::error::{Result, WavecastError};
use wavecast_core::traits::Channel;
use wavecast_core::types::{ChannelKind, OutgoingMessage};

/// Request body accepted by `POST /v1/messages/send`.
#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    content: &'a str,
    from: &'a str,
    to: &'a str,
}

/// The part of the gateway acknowledgement we look at.
#[derive(Debug, Deserialize)]
struct SendAck {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

pub struct SmsChannel {
    config: SmsChannelConfig,
    client: reqwest::Client,
}

impl SmsChannel {
    pub fn new(config: SmsChannelConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(WavecastError::Config("httpSMS api_key not configured".into()));
        }
        if config.from.is_empty() {
            return Err(WavecastError::Config("httpSMS sending number (from) not configured".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WavecastError::Http(e.to_string()))?;
        Ok(Self { config, client })
    }
}

/// Anything but `status == "success"` is a failed send.
fn check_ack(body: &str) -> Result<()> {
    let ack: SendAck = serde_json::from_str(body)
        .map_err(|e| WavecastError::channel(format!("httpSMS returned unreadable ack ({e}): {body}")))?;
    if ack.status == "success" {
        Ok(())
    } else {
        tracing::error!("📵 httpSMS rejected message: {}", body);
        Err(WavecastError::channel(format!(
            "Queueing SMS was not successful: status='{}' {}",
            ack.status, ack.message
        )))
    }
}

#[async_trait]
impl Channel for SmsChannel {
    fn name(&self) -> &str {
        "sms"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        let body = SendRequest {
            content: &message.content,
            from: &self.config.from,
            to: &message.to,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", &self.config.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| WavecastError::channel(format!("httpSMS request failed: {e}")))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() && text.is_empty() {
            return Err(WavecastError::channel(format!("httpSMS API error {status}")));
        }

        check_ack(&text)?;
        tracing::debug!("📨 SMS queued → {}", message.to);
        Ok(())
    }
}
