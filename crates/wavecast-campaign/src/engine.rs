//! Campaign engine: the loop controller that runs passes over the audience.
//!
//! Each pass fetches fresh data, narrows it, then drives every recipient
//! through select → render → dispatch → commit. A failure after selection
//! only ends that recipient's pipeline for the pass.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tracing::Instrument;
use uuid::Uuid;

use wavecast_channels::Dispatcher;
use wavecast_core::config::WavecastConfig;
use wavecast_core::error::{Result, WavecastError};
use wavecast_core::traits::RowStore;
use wavecast_core::types::{CommonPromptSet, Message, Recipient, RowId};

use crate::audience::Audience;
use crate::composer::ContentComposer;
use crate::selection::{PriorityGate, select_next};
use crate::tracker::ProgressTracker;

/// Immutable run settings, built once from config.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub hot_send: bool,
    pub hot_update: bool,
    pub loops: u32,
    pub wait: Duration,
    pub concurrency: usize,
    pub priority_gate: PriorityGate,
    pub audience: Audience,
}

impl EngineSettings {
    pub fn from_config(config: &WavecastConfig) -> Self {
        let campaign = &config.campaign;
        Self {
            hot_send: campaign.hot_send,
            hot_update: campaign.hot_update,
            loops: campaign.loops.max(1),
            wait: Duration::from_secs(campaign.wait_secs),
            concurrency: campaign.concurrency.max(1),
            priority_gate: PriorityGate::from_flag(campaign.priority_gating),
            audience: Audience::from_config(campaign),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&WavecastConfig::default())
    }
}

/// Everything a pass reads from the store, fetched before any recipient work.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub recipients: Vec<Recipient>,
    pub messages: Vec<Message>,
    pub prompts: CommonPromptSet,
    pub authors: Vec<String>,
}

/// Pipeline step at which a recipient failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Render,
    Dispatch,
    Commit,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render => write!(f, "render"),
            Self::Dispatch => write!(f, "dispatch"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// What happened to the progression record after a send.
#[derive(Debug, Clone, PartialEq)]
pub enum Commit {
    Recorded,
    /// `hot_update` is off.
    Skipped,
    Failed(String),
}

/// Terminal state of one recipient in one pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    NothingToSend,
    DryRun { handle: String, content: String },
    Sent { handle: String, wave: u32, commit: Commit },
    Failed { step: Step, error: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub row: RowId,
    pub number: String,
    pub step: Step,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub row: RowId,
    pub number: String,
    pub handle: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub pass: u32,
    pub recipients: usize,
    pub selected: usize,
    pub skipped: usize,
    pub dry_run: usize,
    pub sent: usize,
    pub committed: usize,
    pub cancelled: usize,
    pub failures: Vec<Failure>,
    pub previews: Vec<Preview>,
}

impl PassReport {
    fn new(pass: u32) -> Self {
        Self { pass, ..Default::default() }
    }

    fn record(&mut self, recipient: &Recipient, outcome: Outcome) {
        self.recipients += 1;
        let failure = |step, error| Failure {
            row: recipient.id,
            number: recipient.number.clone(),
            step,
            error,
        };
        match outcome {
            Outcome::NothingToSend => self.skipped += 1,
            Outcome::Cancelled => self.cancelled += 1,
            Outcome::DryRun { handle, content } => {
                self.selected += 1;
                self.dry_run += 1;
                self.previews.push(Preview {
                    row: recipient.id,
                    number: recipient.number.clone(),
                    handle,
                    content,
                });
            }
            Outcome::Sent { commit, .. } => {
                self.selected += 1;
                self.sent += 1;
                match commit {
                    Commit::Recorded => self.committed += 1,
                    Commit::Skipped => {}
                    Commit::Failed(error) => self.failures.push(failure(Step::Commit, error)),
                }
            }
            Outcome::Failed { step, error } => {
                self.selected += 1;
                self.failures.push(failure(step, error));
            }
        }
    }

    /// Failures at `step`.
    pub fn failed_at(&self, step: Step) -> usize {
        self.failures.iter().filter(|f| f.step == step).count()
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pass {}: {} recipients, {} selected, {} skipped, {} dry-run, {} sent, {} committed, \
             failed render/dispatch/commit {}/{}/{}",
            self.pass,
            self.recipients,
            self.selected,
            self.skipped,
            self.dry_run,
            self.sent,
            self.committed,
            self.failed_at(Step::Render),
            self.failed_at(Step::Dispatch),
            self.failed_at(Step::Commit),
        )?;
        if self.cancelled > 0 {
            write!(f, ", {} not started (cancelled)", self.cancelled)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub passes: Vec<PassReport>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = &Failure> {
        self.passes.iter().flat_map(|p| p.failures.iter())
    }

    pub fn previews(&self) -> impl Iterator<Item = &Preview> {
        self.passes.iter().flat_map(|p| p.previews.iter())
    }

    pub fn sent(&self) -> usize {
        self.passes.iter().map(|p| p.sent).sum()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {}{}", self.run_id, if self.cancelled { " (cancelled)" } else { "" })?;
        for pass in &self.passes {
            writeln!(f, "  {pass}")?;
        }
        for failure in self.failures() {
            writeln!(f, "  ✗ row {} {} [{}]: {}", failure.row, failure.number, failure.step, failure.error)?;
        }
        Ok(())
    }
}

/// Sleep for `wait`, returning early with `true` if shutdown is signalled.
async fn wait_or_shutdown(wait: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(wait);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    // Sender gone: nobody can cancel any more.
                    (&mut sleep).await;
                    return false;
                }
                if *shutdown.borrow() {
                    return true;
                }
            }
        }
    }
}

pub struct CampaignEngine {
    store: Arc<dyn RowStore>,
    composer: ContentComposer,
    dispatcher: Dispatcher,
    tracker: ProgressTracker,
    settings: EngineSettings,
    rng: Mutex<StdRng>,
}

impl CampaignEngine {
    pub fn new(
        store: Arc<dyn RowStore>,
        composer: ContentComposer,
        dispatcher: Dispatcher,
        settings: EngineSettings,
    ) -> Self {
        Self {
            tracker: ProgressTracker::new(store.clone()),
            store,
            composer,
            dispatcher,
            settings,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Use a fixed author-selection generator.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Run every configured pass. Fetch failures end the run with an error;
    /// per-recipient failures are collected in the report.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        let settings = &self.settings;
        tracing::info!(
            "🚀 Run {run_id}: {} pass(es), hot_send={}, hot_update={}, concurrency={}",
            settings.loops,
            settings.hot_send,
            settings.hot_update,
            settings.concurrency
        );
        let audience = &settings.audience;
        if !audience.is_unrestricted() {
            tracing::info!(
                "🎯 Audience narrowed: canary={:?}, max_recipients={:?}, max_wave={:?}",
                audience.canary,
                audience.max_recipients,
                audience.max_wave
            );
        }

        let mut report = RunReport { run_id: run_id.clone(), passes: Vec::new(), cancelled: false };
        for pass in 1..=settings.loops {
            if *shutdown.borrow() {
                report.cancelled = true;
                break;
            }

            let span = tracing::info_span!("pass", run_id = %run_id, pass);
            let pass_report = async {
                let snapshot = self.fetch_snapshot().await?;
                Ok::<_, WavecastError>(self.run_pass(pass, &snapshot, &shutdown).await)
            }
            .instrument(span)
            .await?;

            tracing::info!("📊 {pass_report}");
            let cancelled = pass_report.cancelled > 0;
            report.passes.push(pass_report);
            if cancelled {
                report.cancelled = true;
                break;
            }

            if pass < settings.loops && !settings.wait.is_zero() {
                tracing::info!("⏳ Waiting {}s before pass {}", settings.wait.as_secs(), pass + 1);
                if wait_or_shutdown(settings.wait, &mut shutdown).await {
                    report.cancelled = true;
                    break;
                }
            }
        }

        if report.cancelled {
            tracing::warn!("🛑 Run {run_id} stopped early");
        }
        Ok(report)
    }

    /// Fetch and narrow everything a pass needs.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot> {
        let (recipients, messages, prompts, authors) = tokio::try_join!(
            self.store.fetch_active_recipients(),
            self.store.fetch_active_messages(),
            self.store.fetch_common_prompts(),
            self.store.fetch_authors(),
        )?;

        let audience = &self.settings.audience;
        let snapshot = Snapshot {
            recipients: audience.narrow_recipients(recipients),
            messages: audience.narrow_messages(messages),
            prompts,
            authors,
        };
        tracing::info!(
            "📥 {} recipients, {} messages, {} authors",
            snapshot.recipients.len(),
            snapshot.messages.len(),
            snapshot.authors.len()
        );
        Ok(snapshot)
    }

    /// Drive every recipient of `snapshot` through one pass.
    pub async fn run_pass(&self, pass: u32, snapshot: &Snapshot, shutdown: &watch::Receiver<bool>) -> PassReport {
        let mut seen = HashSet::new();
        let recipients: Vec<&Recipient> = snapshot
            .recipients
            .iter()
            .filter(|r| {
                let first = seen.insert(r.id);
                if !first {
                    tracing::warn!("👯 Row {} listed twice, processing once", r.id);
                }
                first
            })
            .collect();

        let outcomes: Vec<(&Recipient, Outcome)> = futures::stream::iter(recipients)
            .map(|recipient| async move {
                if *shutdown.borrow() {
                    return (recipient, Outcome::Cancelled);
                }
                let span = tracing::info_span!("recipient", row = recipient.id, number = %recipient.number);
                let outcome = self.process(recipient, snapshot).instrument(span).await;
                (recipient, outcome)
            })
            .buffer_unordered(self.settings.concurrency)
            .collect()
            .await;

        let mut report = PassReport::new(pass);
        for (recipient, outcome) in outcomes {
            report.record(recipient, outcome);
        }
        report.failures.sort_by_key(|f| f.row);
        report.previews.sort_by_key(|p| p.row);
        report
    }

    /// One recipient's pipeline.
    async fn process(&self, recipient: &Recipient, snapshot: &Snapshot) -> Outcome {
        let Some(message) = select_next(recipient, &snapshot.messages, self.settings.priority_gate) else {
            tracing::info!("💤 Nothing to send to {} (at wave {})", recipient.name, recipient.last_wave);
            return Outcome::NothingToSend;
        };
        tracing::info!("🎯 '{}' (wave {}) selected for {}", message.handle, message.wave, recipient.name);

        let body = match self.composer.render(message, recipient, &snapshot.prompts, Utc::now()).await {
            Ok(body) => body,
            Err(e) => return failed(Step::Render, recipient, e),
        };
        let content = {
            let mut rng = self.rng.lock().await;
            self.composer.wrap(&body, &message.handle, &snapshot.authors, &mut *rng)
        };

        if !self.settings.hot_send {
            tracing::info!("🧪 NOT sending '{}' to {}:\n{content}", message.handle, recipient.number);
            return Outcome::DryRun { handle: message.handle.clone(), content };
        }

        if let Err(e) = self.dispatcher.dispatch(recipient, &content).await {
            return failed(Step::Dispatch, recipient, e);
        }
        let sent_at = Utc::now();
        tracing::info!("📤 Sent '{}' to {} via {}", message.handle, recipient.number, recipient.channel);

        let commit = if !self.settings.hot_update {
            tracing::info!("⏸️ hot_update off, wave {} not recorded for row {}", message.wave, recipient.id);
            Commit::Skipped
        } else {
            match self.tracker.commit(recipient, message, &content, sent_at).await {
                Ok(_) => Commit::Recorded,
                Err(e) => {
                    tracing::error!(
                        "🔥 '{}' delivered to {} but not recorded, a later pass may resend it: {e}",
                        message.handle,
                        recipient.number
                    );
                    Commit::Failed(e.to_string())
                }
            }
        };

        Outcome::Sent { handle: message.handle.clone(), wave: message.wave, commit }
    }
}

fn failed(step: Step, recipient: &Recipient, error: WavecastError) -> Outcome {
    tracing::warn!("⚠️ {step} failed for {} ({}): {error}", recipient.name, recipient.number);
    Outcome::Failed { step, error: error.to_string() }
}
