//! Ingestion boundary: raw spreadsheet records → validated domain records.
//!
//! Inactive rows are dropped silently. Active rows that fail validation are
//! quarantined: logged with their row index and left out of the run.

use serde_json::Value;
use wavecast_core::config::LanguageConfig;
use wavecast_core::error::{Result, WavecastError};
use wavecast_core::types::{ChannelKind, CommonPromptSet, Message, MessageKind, Recipient, RowId};

/// Temperature used when a message row leaves the cell blank.
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

/// Cell as trimmed text. Numbers are rendered, null and blanks are `None`.
fn cell_str(row: &Value, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Spreadsheet checkbox: the literal `TRUE`, case-insensitive.
fn cell_flag(row: &Value, key: &str) -> bool {
    matches!(row.get(key), Some(Value::Bool(true)))
        || cell_str(row, key).is_some_and(|s| s.eq_ignore_ascii_case("true"))
}

fn cell_u32(row: &Value, key: &str) -> Result<Option<u32>> {
    match cell_str(row, key) {
        None => Ok(None),
        Some(s) => s
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0 && *v <= u32::MAX as f64)
            .map(|v| Some(v as u32))
            .ok_or_else(|| WavecastError::Validation(format!("{key} '{s}' is not a whole number"))),
    }
}

fn cell_f32(row: &Value, key: &str) -> Result<Option<f32>> {
    match cell_str(row, key) {
        None => Ok(None),
        Some(s) => s
            .replace(',', ".")
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| WavecastError::Validation(format!("{key} '{s}' is not a number"))),
    }
}

/// Normalise a stored number to E.164: digits only, one leading `+`.
pub fn normalize_number(raw: &str) -> Result<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    if digits.len() < 6 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(WavecastError::Validation(format!("number '{raw}' is not E.164")));
    }
    Ok(format!("+{digits}"))
}

fn parse_recipient(index: RowId, row: &Value, languages: &LanguageConfig) -> Result<Option<Recipient>> {
    let Some(raw_number) = cell_str(row, "number") else {
        return Ok(None);
    };
    if !cell_flag(row, "active") {
        return Ok(None);
    }

    let number = normalize_number(&raw_number)?;
    let name = cell_str(row, "name").unwrap_or_default();
    let language = match cell_str(row, "language").map(|l| l.to_lowercase()) {
        None => languages.default.clone(),
        Some(l) if l == languages.default || languages.supported.contains_key(&l) => l,
        Some(l) => {
            tracing::warn!("⚠️ Row {index}: unsupported language '{l}', using '{}'", languages.default);
            languages.default.clone()
        }
    };
    let channel = cell_str(row, "channel").unwrap_or_default().parse::<ChannelKind>()?;
    let high_intensity = cell_flag(row, "intensity")
        || cell_str(row, "intensity").is_some_and(|s| s.eq_ignore_ascii_case("high"));

    Ok(Some(Recipient {
        id: index,
        number,
        name,
        active: true,
        last_wave: cell_u32(row, "level")?.unwrap_or(0),
        language,
        channel,
        high_intensity,
        slots_remaining: cell_u32(row, "slots")?,
    }))
}

/// Active, valid recipients. The row id is the zero-based record index.
pub fn parse_recipients(rows: &[Value], languages: &LanguageConfig) -> Vec<Recipient> {
    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| match parse_recipient(index, row, languages) {
            Ok(recipient) => recipient,
            Err(e) => {
                tracing::warn!("🚧 Quarantined recipient row {index}: {e}");
                None
            }
        })
        .collect()
}

fn parse_message(row: &Value) -> Result<Option<Message>> {
    let wave = cell_u32(row, "level")?.unwrap_or(0);
    if wave == 0 || !cell_flag(row, "active") {
        return Ok(None);
    }

    let handle = cell_str(row, "caption")
        .ok_or_else(|| WavecastError::Validation("caption is empty".into()))?;
    let kind = cell_str(row, "type")
        .ok_or_else(|| WavecastError::Validation(format!("'{handle}' has no type")))?
        .parse::<MessageKind>()?;
    let content = cell_str(row, "content").unwrap_or_default();
    if content.is_empty() && kind != MessageKind::Reminder {
        return Err(WavecastError::Validation(format!("'{handle}' has no content")));
    }

    Ok(Some(Message {
        handle,
        content,
        kind,
        wave,
        high_priority: cell_flag(row, "priority")
            || cell_str(row, "priority").is_some_and(|s| s.eq_ignore_ascii_case("high")),
        condition: cell_str(row, "condition").map(|c| c.to_lowercase()),
        temperature: cell_f32(row, "temperature")?.unwrap_or(DEFAULT_TEMPERATURE),
        active: true,
    }))
}

/// Active, valid messages, stably sorted ascending by wave so sheet order
/// breaks ties.
pub fn parse_messages(rows: &[Value]) -> Vec<Message> {
    let mut messages: Vec<Message> = rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| match parse_message(row) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("🚧 Quarantined message row {index}: {e}");
                None
            }
        })
        .collect();
    messages.sort_by_key(|m| m.wave);
    messages
}

/// Non-empty author lines, in sheet order.
pub fn parse_authors(rows: &[Value]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| cell_str(row, "author").or_else(|| cell_str(row, "name")))
        .collect()
}

/// The prompt set lives in the first record of the prompts sheet.
pub fn parse_prompts(rows: &[Value]) -> Result<CommonPromptSet> {
    let row = rows
        .first()
        .ok_or_else(|| WavecastError::Fetch("prompts sheet is empty".into()))?;
    Ok(CommonPromptSet {
        system: cell_str(row, "system").unwrap_or_default(),
        reminder: cell_str(row, "reminder").unwrap_or_default(),
        slots_remaining: cell_u32(row, "slots").map_err(|e| WavecastError::Fetch(e.to_string()))?,
    })
}
