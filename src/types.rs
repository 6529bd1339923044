//! Core data types for macrorec
//!
//! This module contains the fundamental data structures used throughout the
//! crate for representing captured input events and recorded macros.
//!
//! # Main Types
//!
//! - [`EventKind`] - Closed tagged-variant enum of supported input events
//! - [`KeyIdent`] - Key identifier (literal char, symbolic name, or opaque fallback)
//! - [`NamedKey`] - Closed enum of recognized symbolic keys
//! - [`PointerButton`] - Mouse button with a stable, portable wire name
//! - [`Event`] - A single input occurrence with a relative timestamp
//! - [`Macro`] - A named, ordered, persistable sequence of events
//!
//! # Wire format
//!
//! Events serialize as `{ "time": <seconds>, "type": <kind>, "data": {...} }`.
//! The `type`/`data` pair comes from the adjacently-tagged [`EventKind`]; key
//! identifiers carry a `vtype` tag distinguishing the three key cases so that
//! decoding can never confuse a literal character with a symbolic key name.
//! Buttons and symbolic keys are encoded by name, never as OS numeric codes,
//! keeping saved macros portable across OS versions.

use serde::{Deserialize, Serialize};

/// Symbolic (non-printable) keys recognized by the codec.
///
/// This is a closed enum: decoding a name outside this set fails with a
/// malformed-macro error instead of silently producing a different key.
/// The set mirrors what the OS driver can both observe and synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedKey {
    Alt,
    AltGr,
    Backspace,
    CapsLock,
    ControlLeft,
    ControlRight,
    Delete,
    DownArrow,
    End,
    Escape,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    Home,
    Insert,
    LeftArrow,
    MetaLeft,
    MetaRight,
    NumLock,
    PageDown,
    PageUp,
    Pause,
    PrintScreen,
    Return,
    RightArrow,
    ScrollLock,
    ShiftLeft,
    ShiftRight,
    Space,
    Tab,
    UpArrow,
}

/// Identifies a keyboard key on the wire.
///
/// Three unambiguous cases, tagged with `vtype`:
///
/// - `Char` - a literal printable character (e.g. `a`, `;`)
/// - `Named` - a recognized symbolic key (e.g. `f12`, `shift_left`)
/// - `Raw` - an opaque textual representation for keys the driver could not
///   classify; preserved through encode/decode so nothing is lost, but
///   synthesis of a raw key may fail at playback time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "vtype", rename_all = "snake_case")]
pub enum KeyIdent {
    /// A literal printable character
    Char { char: char },
    /// A recognized symbolic key
    Named { name: NamedKey },
    /// Opaque fallback representation
    Raw { value: String },
}

impl KeyIdent {
    /// Shorthand for a literal character key
    pub fn ch(c: char) -> Self {
        KeyIdent::Char { char: c }
    }

    /// Shorthand for a symbolic key
    pub fn named(name: NamedKey) -> Self {
        KeyIdent::Named { name }
    }

    /// Shorthand for the opaque fallback
    pub fn raw(value: impl Into<String>) -> Self {
        KeyIdent::Raw {
            value: value.into(),
        }
    }
}

impl std::fmt::Display for KeyIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyIdent::Char { char } => write!(f, "'{}'", char),
            KeyIdent::Named { name } => write!(f, "{:?}", name),
            KeyIdent::Raw { value } => write!(f, "<{}>", value),
        }
    }
}

/// Mouse button, encoded by stable name on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

/// One supported input event, without its timestamp.
///
/// Serializes adjacently tagged as `"type"` + `"data"`, which is exactly the
/// per-event object shape of the macro file format. Decode failures are an
/// exhaustive compile-time-checked match over this enum, not a runtime
/// missing-key lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventKind {
    /// A key went down
    KeyPress { key: KeyIdent },
    /// A key came up
    KeyRelease { key: KeyIdent },
    /// The pointer moved to absolute screen coordinates
    PointerMove { x: f64, y: f64 },
    /// A mouse button changed state at the given coordinates
    PointerClick {
        x: f64,
        y: f64,
        button: PointerButton,
        pressed: bool,
    },
    /// The wheel scrolled by the given deltas at the given coordinates
    PointerScroll { x: f64, y: f64, dx: i64, dy: i64 },
}

/// Wire names of the event kinds this version understands.
///
/// Used by the decoder to distinguish "unknown future event type" (skipped
/// with a warning, per forward-readability) from "recognized type with
/// missing or invalid fields" (a hard decode error).
pub const KNOWN_EVENT_TYPES: &[&str] = &[
    "key_press",
    "key_release",
    "pointer_move",
    "pointer_click",
    "pointer_scroll",
];

/// A single recorded input occurrence.
///
/// `time` is floating-point seconds elapsed since the start of the capture
/// session (the recording epoch); it is never negative, and within a macro
/// the sequence of times is non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds since recording start
    pub time: f64,
    /// What happened
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Create a new event
    pub fn new(time: f64, kind: EventKind) -> Self {
        Self { time, kind }
    }
}

/// A named, ordered sequence of timestamped input events.
///
/// Created in memory by a capture session, optionally persisted as one file,
/// and loaded back for playback any number of times. A loaded macro is never
/// mutated in place; re-saving under the same name overwrites the file.
#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    /// User-chosen name (derived from the file stem when loaded)
    pub name: String,
    /// Events in capture order, timestamps relative to the recording start
    pub events: Vec<Event>,
}

impl Macro {
    /// Create a macro with the given name
    pub fn new(name: impl Into<String>, events: Vec<Event>) -> Self {
        Self {
            name: name.into(),
            events,
        }
    }

    /// Create a macro that has not been named yet (fresh capture result)
    pub fn unnamed(events: Vec<Event>) -> Self {
        Self::new("untitled", events)
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when the macro holds no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Timestamp of the last event, i.e. the scheduled playback length in seconds
    pub fn duration_secs(&self) -> f64 {
        self.events.last().map(|e| e.time).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_event_wire_shape() {
        let ev = Event::new(
            0.1,
            EventKind::KeyPress {
                key: KeyIdent::ch('a'),
            },
        );
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(
            value,
            json!({
                "time": 0.1,
                "type": "key_press",
                "data": { "key": { "vtype": "char", "char": "a" } }
            })
        );
    }

    #[test]
    fn test_named_key_wire_shape() {
        let key = KeyIdent::named(NamedKey::ShiftLeft);
        let value = serde_json::to_value(&key).unwrap();
        assert_eq!(value, json!({ "vtype": "named", "name": "shift_left" }));
    }

    #[test]
    fn test_raw_key_wire_shape() {
        let key = KeyIdent::raw("Unknown(187)");
        let value = serde_json::to_value(&key).unwrap();
        assert_eq!(value, json!({ "vtype": "raw", "value": "Unknown(187)" }));
    }

    #[test]
    fn test_click_wire_shape() {
        let ev = Event::new(
            1.25,
            EventKind::PointerClick {
                x: 10.0,
                y: 20.0,
                button: PointerButton::Left,
                pressed: true,
            },
        );
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(
            value,
            json!({
                "time": 1.25,
                "type": "pointer_click",
                "data": { "x": 10.0, "y": 20.0, "button": "left", "pressed": true }
            })
        );
    }

    #[test]
    fn test_unknown_named_key_fails_to_decode() {
        let result: std::result::Result<KeyIdent, _> =
            serde_json::from_value(json!({ "vtype": "named", "name": "hyper_mega" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_button_fails_to_decode() {
        let result: std::result::Result<PointerButton, _> =
            serde_json::from_value(json!("button9"));
        assert!(result.is_err());
    }

    #[test]
    fn test_known_event_types_match_serde_tags() {
        // The decoder's known-type list must stay in sync with the enum tags.
        let samples = [
            EventKind::KeyPress {
                key: KeyIdent::ch('x'),
            },
            EventKind::KeyRelease {
                key: KeyIdent::ch('x'),
            },
            EventKind::PointerMove { x: 0.0, y: 0.0 },
            EventKind::PointerClick {
                x: 0.0,
                y: 0.0,
                button: PointerButton::Middle,
                pressed: false,
            },
            EventKind::PointerScroll {
                x: 0.0,
                y: 0.0,
                dx: 0,
                dy: -1,
            },
        ];
        for kind in &samples {
            let value = serde_json::to_value(kind).unwrap();
            let tag = value["type"].as_str().unwrap();
            assert!(
                KNOWN_EVENT_TYPES.contains(&tag),
                "tag {} missing from KNOWN_EVENT_TYPES",
                tag
            );
        }
        assert_eq!(KNOWN_EVENT_TYPES.len(), samples.len());
    }

    #[test]
    fn test_macro_duration() {
        let m = Macro::new(
            "demo",
            vec![
                Event::new(
                    0.1,
                    EventKind::KeyPress {
                        key: KeyIdent::ch('a'),
                    },
                ),
                Event::new(
                    0.4,
                    EventKind::KeyRelease {
                        key: KeyIdent::ch('a'),
                    },
                ),
            ],
        );
        assert_eq!(m.len(), 2);
        assert_eq!(m.duration_secs(), 0.4);
        assert!(Macro::unnamed(vec![]).is_empty());
    }
}
