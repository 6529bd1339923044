//! Macro persistence: event codec + one-file-per-macro storage
//!
//! # File format
//!
//! A macro file is a JSON array of event objects, each shaped as
//! `{ "time": <seconds>, "type": <string>, "data": {...} }` with `data`
//! depending on `type`. Encoding and decoding are mutual inverses for every
//! valid sequence.
//!
//! # Forward readability
//!
//! Files written by a future version may contain event types this version
//! does not know. The decoder skips those elements with a warning instead of
//! failing the whole load. Everything else is strict: a missing `type`,
//! unrecognized key or button names, missing fields, or a negative timestamp
//! fail the load with [`MacroError::Malformed`], and no partially decoded
//! macro is ever returned for playback.

use crate::config::MACRO_FILE_EXTENSION;
use crate::error::{MacroError, Result, ResultExt};
use crate::types::{Event, Macro, KNOWN_EVENT_TYPES};
use std::path::{Path, PathBuf};

/// Upper bound on an event timestamp, one week in seconds.
///
/// No capture session runs anywhere near this long; a larger value in a file
/// is a corrupt or hostile timestamp, not a recording. Rejecting it here
/// keeps every accepted `time` safely convertible to a sleepable duration.
pub const MAX_EVENT_TIME_SECS: f64 = 7.0 * 86_400.0;

/// Encode an event sequence into the textual macro file form
pub fn encode_events(events: &[Event]) -> Result<String> {
    serde_json::to_string_pretty(events)
        .map_err(|e| MacroError::Malformed(format!("failed to encode events: {}", e)))
}

/// Decode a macro file body into an event sequence.
///
/// All-or-nothing apart from the documented unknown-type skip: any malformed
/// element aborts the whole decode.
pub fn decode_events(json: &str) -> Result<Vec<Event>> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(json)
        .map_err(|e| MacroError::Malformed(format!("not a macro event array: {}", e)))?;

    let mut events = Vec::with_capacity(raw.len());
    let mut last_time = 0.0_f64;
    for (index, value) in raw.into_iter().enumerate() {
        let tag = match value.get("type") {
            None => {
                return Err(MacroError::Malformed(format!(
                    "event {} missing `type`",
                    index
                )))
            }
            Some(t) => t.as_str().ok_or_else(|| {
                MacroError::Malformed(format!("event {}: `type` is not a string", index))
            })?,
        };

        if !KNOWN_EVENT_TYPES.contains(&tag) {
            tracing::warn!("skipping event {} with unknown type {:?}", index, tag);
            continue;
        }

        let event: Event = serde_json::from_value(value)
            .map_err(|e| MacroError::Malformed(format!("event {}: {}", index, e)))?;

        // `!(>= 0.0)` rejects NaN as well.
        if !(event.time >= 0.0) || event.time > MAX_EVENT_TIME_SECS {
            return Err(MacroError::Malformed(format!(
                "event {}: timestamp {} outside 0..={}",
                index, event.time, MAX_EVENT_TIME_SECS
            )));
        }
        if event.time < last_time {
            tracing::warn!(
                "event {} timestamp {} is earlier than its predecessor {}",
                index,
                event.time,
                last_time
            );
        }
        last_time = last_time.max(event.time);
        events.push(event);
    }
    Ok(events)
}

/// Path of the file a macro with the given name is stored at
pub fn macro_file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, MACRO_FILE_EXTENSION))
}

/// Save a macro to a file, overwriting any previous version.
///
/// The target directory is created on demand, so saving into a fresh
/// macros directory works without any setup step.
pub fn save_macro(macro_: &Macro, path: &Path) -> Result<()> {
    let json = encode_events(&macro_.events)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(MacroError::Io)
            .with_context(|| format!("creating macros directory {}", parent.display()))?;
    }
    std::fs::write(path, json)
        .map_err(MacroError::Io)
        .with_context(|| format!("saving macro {:?} to {}", macro_.name, path.display()))?;
    tracing::info!(
        "saved macro {:?} ({} events) to {}",
        macro_.name,
        macro_.len(),
        path.display()
    );
    Ok(())
}

/// Load a macro from a file, naming it after the file stem
pub fn load_macro(path: &Path) -> Result<Macro> {
    let contents = std::fs::read_to_string(path)
        .map_err(MacroError::Io)
        .with_context(|| format!("loading macro from {}", path.display()))?;
    let events = decode_events(&contents)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string());
    tracing::info!("loaded macro {:?} ({} events)", name, events.len());
    Ok(Macro::new(name, events))
}

/// List macro files in a directory, sorted by name.
///
/// A missing directory reads as an empty list.
pub fn list_macros(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file()
            && path.extension().and_then(|e| e.to_str()) == Some(MACRO_FILE_EXTENSION)
        {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
