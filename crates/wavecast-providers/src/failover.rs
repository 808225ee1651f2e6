//! Ordered fallback across providers.
//!
//! A request walks the chain until one provider answers. Only request errors
//! move it along; an answer with empty content is still an answer. A provider
//! that fails `TRIP_AFTER` times in a row is benched for `BENCH_SECS`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use wavecast_core::error::{Result, WavecastError};
use wavecast_core::traits::provider::{GenerateParams, Provider};
use wavecast_core::types::{ChatMessage, ProviderResponse};

const TRIP_AFTER: u32 = 3;
const BENCH_SECS: u64 = 60;

fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

struct Link {
    provider: Box<dyn Provider>,
    strikes: AtomicU32,
    /// Epoch seconds of the latest failure.
    struck_at: AtomicU64,
}

impl Link {
    fn new(provider: Box<dyn Provider>) -> Self {
        Self { provider, strikes: AtomicU32::new(0), struck_at: AtomicU64::new(0) }
    }

    fn strikes(&self) -> u32 {
        self.strikes.load(Ordering::Relaxed)
    }

    fn available_at(&self, now: u64) -> bool {
        self.strikes() < TRIP_AFTER || now.saturating_sub(self.struck_at.load(Ordering::Relaxed)) > BENCH_SECS
    }

    fn settle(&self, outcome: &Result<ProviderResponse>) {
        match outcome {
            Ok(_) => self.strikes.store(0, Ordering::Relaxed),
            Err(_) => {
                self.strikes.fetch_add(1, Ordering::Relaxed);
                self.struck_at.store(epoch_secs(), Ordering::Relaxed);
            }
        }
    }
}

pub struct FailoverProvider {
    chain: Vec<Link>,
}

impl FailoverProvider {
    /// The first provider is primary; the rest are tried in order.
    pub fn new(providers: Vec<Box<dyn Provider>>) -> Result<Self> {
        if providers.is_empty() {
            return Err(WavecastError::Config("failover chain needs at least one provider".into()));
        }
        Ok(Self { chain: providers.into_iter().map(Link::new).collect() })
    }

    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }
}

#[async_trait]
impl Provider for FailoverProvider {
    fn name(&self) -> &str {
        self.chain.first().map_or("failover", |l| l.provider.name())
    }

    async fn chat(&self, messages: &[ChatMessage], params: &GenerateParams) -> Result<ProviderResponse> {
        let now = epoch_secs();
        let mut last_error = None;

        for (position, link) in self.chain.iter().enumerate() {
            let name = link.provider.name();
            if !link.available_at(now) {
                tracing::debug!("⏭️ {name} benched after {} failures", link.strikes());
                continue;
            }

            let outcome = link.provider.chat(messages, params).await;
            link.settle(&outcome);
            match outcome {
                Ok(response) => {
                    if position > 0 {
                        tracing::info!("🔄 {} unavailable, answered by {name}", self.name());
                    }
                    return Ok(response);
                }
                Err(e) => {
                    tracing::warn!("⚠️ {name} failed ({} in a row): {e}", link.strikes());
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| WavecastError::provider("every provider in the chain is benched")))
    }
}
