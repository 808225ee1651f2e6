//! HTTP client for the spreadsheet API.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use wavecast_core::config::{LanguageConfig, StoreConfig};
use wavecast_core::error::{Result, WavecastError};
use wavecast_core::traits::RowStore;
use wavecast_core::types::{CommonPromptSet, DispatchRecord, Message, Recipient, RecipientUpdate};

use crate::rows;

pub struct SheetStore {
    config: StoreConfig,
    languages: LanguageConfig,
    client: reqwest::Client,
}

impl SheetStore {
    pub fn new(config: StoreConfig, languages: LanguageConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WavecastError::Http(e.to_string()))?;
        Ok(Self { config, languages, client })
    }

    /// GET a sheet as an array of records.
    async fn fetch_records(&self, what: &str, url: &str) -> Result<Vec<Value>> {
        let resp = self
            .client
            .get(url)
            .query(&[("_format", "records")])
            .send()
            .await
            .map_err(|e| WavecastError::Fetch(format!("{what}: request to {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WavecastError::Fetch(format!("{what}: HTTP {status}: {body}")));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| WavecastError::Fetch(format!("{what}: invalid JSON: {e}")))?;
        records_from(what, json)
    }

    /// Send a write and map any rejection to a persistence error.
    async fn write(&self, what: &str, req: reqwest::RequestBuilder) -> Result<()> {
        let resp = req
            .send()
            .await
            .map_err(|e| WavecastError::Persistence(format!("{what}: request failed: {e}")))?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!("{what}: HTTP {status} {body}");
        check_write_response(what, status.is_success(), &body)
    }
}

fn records_from(what: &str, json: Value) -> Result<Vec<Value>> {
    match json {
        Value::Array(rows) => Ok(rows),
        other => Err(WavecastError::Fetch(format!("{what}: expected a list of records, got {other}"))),
    }
}

/// A write is rejected when the HTTP status fails or the body carries `detail`.
fn check_write_response(what: &str, http_ok: bool, body: &str) -> Result<()> {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    if let Some(detail) = parsed.as_ref().and_then(|v| v.get("detail")) {
        let detail = detail.as_str().map(String::from).unwrap_or_else(|| detail.to_string());
        return Err(WavecastError::Persistence(format!("{what}: {detail}")));
    }
    if !http_ok {
        return Err(WavecastError::Persistence(format!("{what}: {body}")));
    }
    Ok(())
}

fn update_body(update: &RecipientUpdate) -> Value {
    json!({
        "level": update.wave,
        "lastCaption": update.handle,
        "lastContent": update.content,
    })
}

fn log_body(record: &DispatchRecord) -> Value {
    json!({
        "name": record.name,
        "number": record.number,
        "timestamp": record.timestamp.to_rfc3339(),
        "caption": record.handle,
        "content": record.content,
    })
}

#[async_trait]
impl RowStore for SheetStore {
    async fn fetch_active_recipients(&self) -> Result<Vec<Recipient>> {
        let rows = self.fetch_records("recipients", &self.config.recipients_url).await?;
        let recipients = rows::parse_recipients(&rows, &self.languages);
        tracing::debug!("📋 {} of {} recipient rows active", recipients.len(), rows.len());
        Ok(recipients)
    }

    async fn fetch_active_messages(&self) -> Result<Vec<Message>> {
        let rows = self.fetch_records("messages", &self.config.messages_url).await?;
        Ok(rows::parse_messages(&rows))
    }

    async fn fetch_authors(&self) -> Result<Vec<String>> {
        let rows = self.fetch_records("authors", &self.config.authors_url).await?;
        Ok(rows::parse_authors(&rows))
    }

    async fn fetch_common_prompts(&self) -> Result<CommonPromptSet> {
        let rows = self.fetch_records("prompts", &self.config.prompts_url).await?;
        rows::parse_prompts(&rows)
    }

    async fn update_recipient(&self, update: &RecipientUpdate) -> Result<()> {
        let url = format!("{}/{}", self.config.recipients_url.trim_end_matches('/'), update.id);
        tracing::info!("✏️ PATCH {url}");
        let req = self.client.patch(&url).json(&update_body(update));
        self.write("update recipient", req).await
    }

    async fn append_log(&self, record: &DispatchRecord) -> Result<()> {
        let req = self.client.post(&self.config.log_url).json(&log_body(record));
        self.write("append log", req).await
    }
}
