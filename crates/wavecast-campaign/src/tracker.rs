//! Progress tracker: persist the new wave, then append the audit log.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use wavecast_core::error::{Result, WavecastError};
use wavecast_core::traits::RowStore;
use wavecast_core::types::{DispatchRecord, Message, Recipient, RecipientUpdate};

pub struct ProgressTracker {
    store: Arc<dyn RowStore>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    /// Record a confirmed delivery. Returns the recipient as it now stands.
    ///
    /// Call exactly once per successful send. The recipient value passed in
    /// is left untouched.
    pub async fn commit(
        &self,
        recipient: &Recipient,
        message: &Message,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Recipient> {
        let update = RecipientUpdate {
            id: recipient.id,
            wave: message.wave,
            handle: message.handle.clone(),
            content: content.to_string(),
        };
        self.store.update_recipient(&update).await?;

        let record = DispatchRecord {
            name: recipient.name.clone(),
            number: recipient.number.clone(),
            timestamp,
            handle: message.handle.clone(),
            content: content.to_string(),
        };
        if let Err(e) = self.store.append_log(&record).await {
            return Err(WavecastError::Persistence(format!(
                "wave {} saved for row {} but log append failed: {e}",
                message.wave, recipient.id
            )));
        }

        tracing::info!("💾 Row {} advanced to wave {} ({})", recipient.id, message.wave, message.handle);
        Ok(recipient.advanced_to(message))
    }
}
