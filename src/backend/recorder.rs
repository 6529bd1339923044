//! Capture session state
//!
//! A [`CaptureSession`] turns the stream of driver notifications into an
//! ordered event sequence with timestamps relative to the recording epoch.
//! The hook delivers from its own threads, but notifications reach the
//! session through a single-producer queue owned by the backend worker, so
//! the append itself needs no further serialization.
//!
//! The stop hotkey is handled as a priority filter stage ahead of generic
//! recording: its press requests the stop transition exactly once per
//! session, and neither its press nor its release is ever recorded.

use crate::backend::driver::CapturedInput;
use crate::types::{Event, EventKind, KeyIdent, Macro, NamedKey};
use std::time::Instant;

/// What the session did with one delivered notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Appended to the sequence
    Recorded,
    /// Filtered out (stop-key release, or delivery after stop)
    Ignored,
    /// The stop hotkey was pressed; the caller should finalize the session
    StopRequested,
}

/// An in-progress recording
pub struct CaptureSession {
    epoch: Instant,
    stop_key: NamedKey,
    events: Vec<Event>,
    /// Guards against the stop transition firing more than once
    stopping: bool,
}

impl CaptureSession {
    /// Begin a session with the recording epoch at `now`
    pub fn new(stop_key: NamedKey) -> Self {
        Self::with_epoch(Instant::now(), stop_key)
    }

    /// Begin a session with an explicit epoch
    pub fn with_epoch(epoch: Instant, stop_key: NamedKey) -> Self {
        Self {
            epoch,
            stop_key,
            events: Vec::new(),
            stopping: false,
        }
    }

    /// Process one delivered notification.
    ///
    /// The stop-key filter runs before generic recording; everything else is
    /// timestamped against the epoch and appended.
    pub fn handle(&mut self, captured: CapturedInput) -> CaptureOutcome {
        if self.stopping {
            return CaptureOutcome::Ignored;
        }

        if let Some(outcome) = self.filter_stop_key(&captured.kind) {
            return outcome;
        }

        let mut time = captured.at.saturating_duration_since(self.epoch).as_secs_f64();
        // Keeps the sequence non-decreasing even if deliveries straddle the
        // epoch or arrive with skewed stamps.
        if let Some(last) = self.events.last() {
            time = time.max(last.time);
        }
        self.events.push(Event::new(time, captured.kind));
        CaptureOutcome::Recorded
    }

    fn filter_stop_key(&mut self, kind: &EventKind) -> Option<CaptureOutcome> {
        let is_stop = |key: &KeyIdent| *key == KeyIdent::named(self.stop_key);
        match kind {
            EventKind::KeyPress { key } if is_stop(key) => {
                self.stopping = true;
                Some(CaptureOutcome::StopRequested)
            }
            EventKind::KeyRelease { key } if is_stop(key) => Some(CaptureOutcome::Ignored),
            _ => None,
        }
    }

    /// Number of events recorded so far
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether the stop transition has been requested
    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    /// Finalize the session into a macro (possibly empty)
    pub fn finish(self) -> Macro {
        tracing::info!("capture finished with {} events", self.events.len());
        Macro::unnamed(self.events)
    }
}
