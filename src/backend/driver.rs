//! InputDriver trait for unified OS input access
//!
//! This module provides a common trait over the two capability groups the
//! core consumes but does not implement: subscribing to global key/pointer
//! notifications, and synthesizing key/pointer events as if performed by the
//! user. Implementations exist for the real OS hook (via rdev) and for a
//! scriptable mock used in tests.

use crate::error::Result;
use crate::types::{EventKind, KeyIdent, PointerButton};
use crossbeam_channel::Sender;
use std::time::Instant;

/// One observed input notification, timestamped at delivery.
///
/// The driver stamps `at` as close to the OS callback as possible; the
/// capture session converts it into seconds relative to the recording epoch.
#[derive(Debug, Clone)]
pub struct CapturedInput {
    /// When the notification was observed
    pub at: Instant,
    /// What was observed
    pub kind: EventKind,
}

impl CapturedInput {
    /// Stamp an observation with the current time
    pub fn now(kind: EventKind) -> Self {
        Self {
            at: Instant::now(),
            kind,
        }
    }
}

/// One input event to synthesize during playback
#[derive(Debug, Clone, PartialEq)]
pub enum SynthAction {
    /// Press a key
    KeyDown(KeyIdent),
    /// Release a key
    KeyUp(KeyIdent),
    /// Press a mouse button at the current pointer position
    ButtonDown(PointerButton),
    /// Release a mouse button at the current pointer position
    ButtonUp(PointerButton),
    /// Scroll by the given deltas
    Scroll { dx: i64, dy: i64 },
}

/// Counters for driver operations
#[derive(Debug, Clone, Default)]
pub struct DriverStats {
    /// Input notifications delivered to a subscriber
    pub events_delivered: u64,
    /// Successfully synthesized actions
    pub actions_synthesized: u64,
    /// Synthesis attempts rejected by the OS or unmappable
    pub synth_failures: u64,
}

impl DriverStats {
    /// Record a delivered input notification
    pub fn record_delivered(&mut self) {
        self.events_delivered += 1;
    }

    /// Record the outcome of one synthesis attempt
    pub fn record_synth(&mut self, ok: bool) {
        if ok {
            self.actions_synthesized += 1;
        } else {
            self.synth_failures += 1;
        }
    }

    /// Synthesis success rate as a percentage
    pub fn synth_success_rate(&self) -> f64 {
        let total = self.actions_synthesized + self.synth_failures;
        if total == 0 {
            100.0
        } else {
            (self.actions_synthesized as f64 / total as f64) * 100.0
        }
    }

    /// Reset all counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Unified interface to the OS input subsystem.
///
/// Implementations must be `Send` so the backend worker and the playback
/// thread can share one driver behind a mutex. The hook is process-wide
/// state with an explicit subscribe/unsubscribe lifecycle; subscribing
/// while the hook cannot be installed fails with
/// [`crate::MacroError::HookInstall`] and leaves no partial state.
pub trait InputDriver: Send {
    /// Install the global hook and start delivering notifications into `tx`.
    ///
    /// Delivery is asynchronous, from driver-owned threads. Only one
    /// subscriber is supported at a time.
    fn subscribe(&mut self, tx: Sender<CapturedInput>) -> Result<()>;

    /// Stop delivering notifications and release the subscription
    fn unsubscribe(&mut self);

    /// Whether a subscriber is currently attached
    fn is_subscribed(&self) -> bool;

    /// Synthesize one input event.
    ///
    /// Failures are per-event: the driver reports them but retains the
    /// ability to synthesize subsequent events.
    fn synthesize(&mut self, action: &SynthAction) -> Result<()>;

    /// Get driver operation statistics
    fn stats(&self) -> &DriverStats;

    /// Get mutable reference to driver statistics
    fn stats_mut(&mut self) -> &mut DriverStats;

    /// Reset driver statistics
    fn reset_stats(&mut self) {
        self.stats_mut().reset();
    }
}

/// A driver shared between the backend worker and the playback thread.
///
/// The mutex is held only for the duration of a single driver call, never
/// across a playback wait.
pub type SharedDriver = std::sync::Arc<std::sync::Mutex<Box<dyn InputDriver>>>;

/// Wrap a driver for shared use
pub fn shared(driver: impl InputDriver + 'static) -> SharedDriver {
    std::sync::Arc::new(std::sync::Mutex::new(Box::new(driver)))
}

/// Lock a shared driver, recovering from a poisoned mutex.
///
/// A panic inside one driver call must not wedge every later capture or
/// playback, and the driver holds no invariant that a recovered lock could
/// violate.
pub fn lock_driver(driver: &SharedDriver) -> std::sync::MutexGuard<'_, Box<dyn InputDriver>> {
    match driver.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
