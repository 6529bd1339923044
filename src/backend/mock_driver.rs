//! Mock input driver for testing
//!
//! This module provides a scriptable driver that can be used to exercise
//! capture and playback without touching the real OS input subsystem.
//!
//! # Features
//!
//! - **Event injection**: Push observed input into an active subscription
//!   as if the OS hook delivered it
//! - **Synthesis log**: Every synthesized action is recorded with a
//!   timestamp so tests can assert order and spacing
//! - **Failure injection**: Subscription can be made to fail (hook install
//!   failure path) and individual actions can be made to fail (per-event
//!   synthesis failure path)
//!
//! # Example
//!
//! ```ignore
//! use macrorec::backend::mock_driver::MockDriver;
//!
//! let (driver, handle) = MockDriver::new();
//! // hand `driver` to the backend, keep `handle` in the test
//! handle.inject(EventKind::KeyPress { key: KeyIdent::ch('a') });
//! assert_eq!(handle.synthesized().len(), 0);
//! ```
//!
//! # Enabling
//!
//! Available to unit tests unconditionally and to integration tests and
//! embedding applications through the `mock-driver` feature:
//!
//! ```bash
//! cargo test --features mock-driver
//! ```

use crate::backend::driver::{CapturedInput, DriverStats, InputDriver, SynthAction};
use crate::error::{MacroError, Result};
use crate::types::EventKind;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// One synthesized action with the moment it was issued
#[derive(Debug, Clone)]
pub struct SynthRecord {
    /// When the driver received the action
    pub at: Instant,
    /// The action itself
    pub action: SynthAction,
}

struct MockInner {
    tx: Mutex<Option<Sender<CapturedInput>>>,
    log: Mutex<Vec<SynthRecord>>,
    fail_subscribe: AtomicBool,
    failing_actions: Mutex<Vec<SynthAction>>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Test-side handle onto a [`MockDriver`]
#[derive(Clone)]
pub struct MockHandle {
    inner: Arc<MockInner>,
}

impl MockHandle {
    /// Deliver an observed event to the current subscriber.
    ///
    /// Returns false when nothing is subscribed.
    pub fn inject(&self, kind: EventKind) -> bool {
        self.inject_at(Instant::now(), kind)
    }

    /// Deliver an observed event with an explicit timestamp
    pub fn inject_at(&self, at: Instant, kind: EventKind) -> bool {
        let guard = lock(&self.inner.tx);
        match *guard {
            Some(ref tx) => tx.send(CapturedInput { at, kind }).is_ok(),
            None => false,
        }
    }

    /// Snapshot of everything synthesized so far, in order
    pub fn synthesized(&self) -> Vec<SynthRecord> {
        lock(&self.inner.log).clone()
    }

    /// Actions only, without timestamps
    pub fn synthesized_actions(&self) -> Vec<SynthAction> {
        self.synthesized().into_iter().map(|r| r.action).collect()
    }

    /// Whether a subscriber is attached
    pub fn is_subscribed(&self) -> bool {
        lock(&self.inner.tx).is_some()
    }

    /// Make the next and all further subscriptions fail
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.inner.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Make synthesis of the given action fail
    pub fn fail_action(&self, action: SynthAction) {
        lock(&self.inner.failing_actions).push(action);
    }
}

/// Scriptable input driver backed by shared in-memory state
pub struct MockDriver {
    inner: Arc<MockInner>,
    stats: DriverStats,
}

impl MockDriver {
    /// Create a driver and its test handle
    pub fn new() -> (Self, MockHandle) {
        let inner = Arc::new(MockInner {
            tx: Mutex::new(None),
            log: Mutex::new(Vec::new()),
            fail_subscribe: AtomicBool::new(false),
            failing_actions: Mutex::new(Vec::new()),
        });
        let handle = MockHandle {
            inner: Arc::clone(&inner),
        };
        (
            Self {
                inner,
                stats: DriverStats::default(),
            },
            handle,
        )
    }
}

impl InputDriver for MockDriver {
    fn subscribe(&mut self, tx: Sender<CapturedInput>) -> Result<()> {
        if self.inner.fail_subscribe.load(Ordering::SeqCst) {
            return Err(MacroError::HookInstall(
                "mock driver configured to fail".into(),
            ));
        }
        *lock(&self.inner.tx) = Some(tx);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        *lock(&self.inner.tx) = None;
    }

    fn is_subscribed(&self) -> bool {
        lock(&self.inner.tx).is_some()
    }

    fn synthesize(&mut self, action: &SynthAction) -> Result<()> {
        if lock(&self.inner.failing_actions).contains(action) {
            self.stats.record_synth(false);
            return Err(MacroError::Synthesis(format!(
                "mock failure for {:?}",
                action
            )));
        }
        lock(&self.inner.log).push(SynthRecord {
            at: Instant::now(),
            action: action.clone(),
        });
        self.stats.record_synth(true);
        Ok(())
    }

    fn stats(&self) -> &DriverStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut DriverStats {
        &mut self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KeyIdent;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_inject_reaches_subscriber() {
        let (mut driver, handle) = MockDriver::new();
        let (tx, rx) = unbounded();
        driver.subscribe(tx).unwrap();

        assert!(handle.inject(EventKind::KeyPress {
            key: KeyIdent::ch('a')
        }));
        let delivered = rx.try_recv().unwrap();
        assert!(matches!(delivered.kind, EventKind::KeyPress { .. }));
    }

    #[test]
    fn test_inject_without_subscriber_is_dropped() {
        let (_driver, handle) = MockDriver::new();
        assert!(!handle.inject(EventKind::PointerMove { x: 0.0, y: 0.0 }));
    }

    #[test]
    fn test_subscribe_failure() {
        let (mut driver, handle) = MockDriver::new();
        handle.set_fail_subscribe(true);
        let (tx, _rx) = unbounded();
        assert!(matches!(
            driver.subscribe(tx),
            Err(MacroError::HookInstall(_))
        ));
        assert!(!driver.is_subscribed());
    }

    #[test]
    fn test_failing_action_errors_and_is_not_logged() {
        let (mut driver, handle) = MockDriver::new();
        let bad = SynthAction::KeyDown(KeyIdent::ch('x'));
        handle.fail_action(bad.clone());

        assert!(driver.synthesize(&bad).is_err());
        assert!(driver
            .synthesize(&SynthAction::KeyDown(KeyIdent::ch('y')))
            .is_ok());

        assert_eq!(
            handle.synthesized_actions(),
            vec![SynthAction::KeyDown(KeyIdent::ch('y'))]
        );
        assert_eq!(driver.stats().synth_failures, 1);
        assert_eq!(driver.stats().actions_synthesized, 1);
    }
}
