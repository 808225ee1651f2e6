//! # Wavecast Campaign
//! Staged campaign progression: pick each recipient's next wave, render it,
//! deliver it, and record the new progression state.
//!
//! - `template`: versioned placeholder substitution
//! - `selection`: next-wave selection with optional priority gate
//! - `composer`: template/generation pipeline and author wrap
//! - `tracker`: progression update + audit log
//! - `audience`: canary, cap and max-wave narrowing
//! - `engine`: passes, gates, concurrency, cancellation

pub mod audience;
pub mod composer;
pub mod engine;
pub mod selection;
pub mod template;
pub mod tracker;

pub use audience::Audience;
pub use composer::{ComposerSettings, ContentComposer};
pub use engine::{CampaignEngine, EngineSettings, Outcome, PassReport, RunReport, Snapshot, Step};
pub use selection::{PriorityGate, select_next};
pub use tracker::ProgressTracker;
