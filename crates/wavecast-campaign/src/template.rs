//! Placeholder substitution for message templates.
//!
//! Supported keys are versioned. Substitution is one left-to-right scan:
//! every `{key}` naming a supplied variable is replaced, every other brace
//! sequence is copied verbatim, and replaced values are never rescanned.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use wavecast_core::error::{Result, WavecastError};
use wavecast_core::types::{CommonPromptSet, Recipient};

/// Versions of the recognised placeholder key set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderSet {
    /// `name`, `days`, `hours`, `seconds`.
    V1,
    /// V1 plus `weeks` and `slots`.
    V2,
}

impl PlaceholderSet {
    pub const CURRENT: PlaceholderSet = PlaceholderSet::V2;

    pub fn keys(self) -> &'static [&'static str] {
        match self {
            PlaceholderSet::V1 => &["name", "days", "hours", "seconds"],
            PlaceholderSet::V2 => &["name", "days", "hours", "seconds", "weeks", "slots"],
        }
    }

    pub fn supports(self, key: &str) -> bool {
        self.keys().contains(&key)
    }
}

/// Values for one rendering.
#[derive(Debug, Clone)]
pub struct TemplateVars {
    set: PlaceholderSet,
    values: BTreeMap<&'static str, String>,
}

/// JavaScript-style rounding: halves go towards positive infinity.
fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

impl TemplateVars {
    pub fn new(set: PlaceholderSet) -> Self {
        Self { set, values: BTreeMap::new() }
    }

    /// Set a variable. Keys outside the active set are rejected.
    pub fn set(&mut self, key: &'static str, value: impl Into<String>) -> Result<()> {
        if !self.set.supports(key) {
            return Err(WavecastError::Validation(format!(
                "placeholder '{key}' is not part of {:?}",
                self.set
            )));
        }
        self.values.insert(key, value.into());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Variables for `recipient`, with time left until `deadline` seen from `now`.
    pub fn for_recipient(
        recipient: &Recipient,
        prompts: &CommonPromptSet,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let set = PlaceholderSet::CURRENT;
        let seconds_left = (deadline - now).num_milliseconds() as f64 / 1000.0;

        let mut values = BTreeMap::new();
        values.insert("name", recipient.name.clone());
        values.insert("seconds", round_half_up(seconds_left).to_string());
        values.insert("hours", round_half_up(seconds_left / 3_600.0).to_string());
        values.insert("days", round_half_up(seconds_left / 86_400.0).to_string());
        values.insert("weeks", round_half_up(seconds_left / 604_800.0).to_string());
        if let Some(slots) = recipient.slots_remaining.or(prompts.slots_remaining) {
            values.insert("slots", slots.to_string());
        }
        Self { set, values }
    }
}

/// Replace every `{key}` whose key has a value.
pub fn render(template: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after
            .find('}')
            .and_then(|close| vars.get(&after[..close]).map(|v| (close, v)));
        match value {
            Some((close, v)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
