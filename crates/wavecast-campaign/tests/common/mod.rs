#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};

use wavecast_campaign::{CampaignEngine, ComposerSettings, ContentComposer, EngineSettings};
use wavecast_channels::Dispatcher;
use wavecast_core::config::WavecastConfig;
use wavecast_core::error::{Result, WavecastError};
use wavecast_core::traits::provider::GenerateParams;
use wavecast_core::traits::{Channel, Provider, RowStore};
use wavecast_core::types::{
    ChannelKind, ChatMessage, CommonPromptSet, DispatchRecord, Message, MessageKind, OutgoingMessage,
    ProviderResponse, Recipient, RecipientUpdate,
};

/// In-memory store. Updates are applied to the recipient list so later
/// passes see the new wave.
#[derive(Default)]
pub struct FakeStore {
    pub recipients: Mutex<Vec<Recipient>>,
    pub messages: Vec<Message>,
    pub prompts: CommonPromptSet,
    pub authors: Vec<String>,
    pub fail_fetch: bool,
    pub reject_update: bool,
    pub updates: Mutex<Vec<RecipientUpdate>>,
    pub log: Mutex<Vec<DispatchRecord>>,
}

impl FakeStore {
    pub fn new(recipients: Vec<Recipient>, messages: Vec<Message>) -> Self {
        Self {
            recipients: Mutex::new(recipients),
            messages,
            prompts: CommonPromptSet {
                system: "You write short campaign messages.".into(),
                reminder: "Remind {name}: {days} days left".into(),
                slots_remaining: Some(12),
            },
            ..Default::default()
        }
    }

    pub async fn wave_of(&self, id: usize) -> Option<u32> {
        self.recipients.lock().await.iter().find(|r| r.id == id).map(|r| r.last_wave)
    }
}

#[async_trait]
impl RowStore for FakeStore {
    async fn fetch_active_recipients(&self) -> Result<Vec<Recipient>> {
        if self.fail_fetch {
            return Err(WavecastError::Fetch("recipients: HTTP 503".into()));
        }
        Ok(self.recipients.lock().await.clone())
    }

    async fn fetch_active_messages(&self) -> Result<Vec<Message>> {
        Ok(self.messages.clone())
    }

    async fn fetch_authors(&self) -> Result<Vec<String>> {
        Ok(self.authors.clone())
    }

    async fn fetch_common_prompts(&self) -> Result<CommonPromptSet> {
        Ok(self.prompts.clone())
    }

    async fn update_recipient(&self, update: &RecipientUpdate) -> Result<()> {
        if self.reject_update {
            return Err(WavecastError::Persistence("Row not found".into()));
        }
        if let Some(r) = self.recipients.lock().await.iter_mut().find(|r| r.id == update.id) {
            r.last_wave = update.wave;
        }
        self.updates.lock().await.push(update.clone());
        Ok(())
    }

    async fn append_log(&self, record: &DispatchRecord) -> Result<()> {
        self.log.lock().await.push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeProvider {
    pub reply: Option<String>,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeProvider {
    pub fn replying(text: &str) -> Self {
        Self { reply: Some(text.into()), ..Default::default() }
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn chat(&self, messages: &[ChatMessage], _params: &GenerateParams) -> Result<ProviderResponse> {
        self.calls.lock().await.push(messages.to_vec());
        Ok(ProviderResponse { content: self.reply.clone(), ..Default::default() })
    }
}

/// Records every send. Numbers in `failing` are rejected.
pub struct FakeChannel {
    pub kind: ChannelKind,
    pub failing: Vec<String>,
    pub sent: Mutex<Vec<OutgoingMessage>>,
    /// When each send began.
    pub started: Mutex<Vec<DateTime<Utc>>>,
    /// Time each send takes.
    pub latency: Duration,
    /// Raised once the first send completes.
    pub stop_after_first: Option<watch::Sender<bool>>,
}

impl FakeChannel {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            failing: vec![],
            sent: Mutex::new(vec![]),
            started: Mutex::new(vec![]),
            latency: Duration::ZERO,
            stop_after_first: None,
        }
    }
}

#[async_trait]
impl Channel for FakeChannel {
    fn name(&self) -> &str {
        "fake"
    }

    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        self.started.lock().await.push(Utc::now());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.contains(&message.to) {
            return Err(WavecastError::channel(format!("status=failed for {}", message.to)));
        }
        self.sent.lock().await.push(message.clone());
        if let Some(stop) = &self.stop_after_first {
            let _ = stop.send(true);
        }
        Ok(())
    }
}

pub fn recipient(id: usize, name: &str, last_wave: u32) -> Recipient {
    Recipient {
        id,
        number: format!("+4915100000{id:03}"),
        name: name.into(),
        active: true,
        last_wave,
        language: "en".into(),
        channel: ChannelKind::Sms,
        high_intensity: false,
        slots_remaining: None,
    }
}

pub fn message(handle: &str, wave: u32, kind: MessageKind, content: &str) -> Message {
    Message {
        handle: handle.into(),
        content: content.into(),
        kind,
        wave,
        high_priority: false,
        condition: None,
        temperature: 1.0,
        active: true,
    }
}

pub fn settings(hot_send: bool, hot_update: bool) -> EngineSettings {
    let mut config = WavecastConfig::default();
    config.campaign.hot_send = hot_send;
    config.campaign.hot_update = hot_update;
    config.campaign.wait_secs = 0;
    EngineSettings::from_config(&config)
}

pub fn composer(provider: Arc<FakeProvider>) -> ContentComposer {
    ContentComposer::new(provider, ComposerSettings::from_config(&WavecastConfig::default()))
}

pub fn engine(
    store: Arc<FakeStore>,
    provider: Arc<FakeProvider>,
    channel: Arc<FakeChannel>,
    settings: EngineSettings,
) -> CampaignEngine {
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(channel);
    CampaignEngine::new(store, composer(provider), dispatcher, settings).with_rng(StdRng::seed_from_u64(42))
}
