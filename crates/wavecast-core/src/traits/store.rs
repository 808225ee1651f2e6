//! Row store holding recipients, catalog, prompts, authors and the send log.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CommonPromptSet, DispatchRecord, Message, Recipient, RecipientUpdate};

#[async_trait]
pub trait RowStore: Send + Sync {
    /// Active recipients with normalised numbers.
    async fn fetch_active_recipients(&self) -> Result<Vec<Recipient>>;

    /// Active messages sorted ascending by wave.
    async fn fetch_active_messages(&self) -> Result<Vec<Message>>;

    async fn fetch_authors(&self) -> Result<Vec<String>>;

    async fn fetch_common_prompts(&self) -> Result<CommonPromptSet>;

    /// Keyed update of one recipient's progression marker.
    async fn update_recipient(&self, update: &RecipientUpdate) -> Result<()>;

    /// Append-only audit entry.
    async fn append_log(&self, record: &DispatchRecord) -> Result<()>;
}
