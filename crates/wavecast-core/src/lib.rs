//! # Wavecast Core
//!
//! Shared vocabulary for the campaign engine: recipient and message records,
//! the error taxonomy, configuration, and the traits every collaborator
//! (generation provider, delivery channel, row store) implements.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::WavecastConfig;
pub use error::{Result, WavecastError};
pub use traits::{Channel, Provider, RowStore};
