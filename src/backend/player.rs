//! Playback engine
//!
//! Replays a macro on a dedicated worker thread so the controlling thread
//! stays responsive. Each event is synthesized after waiting out the delay
//! to its recorded timestamp; a consumer that falls behind schedule replays
//! immediately without skipping or dropping events.
//!
//! # Cancellation
//!
//! Cancellation is cooperative: a shared flag checked between the wait and
//! the synthesis call of each event. A cancel during a long wait takes
//! effect at that boundary; synthesis already issued is never undone.
//!
//! # Deliberate omissions
//!
//! Pointer-move events are captured but not replayed, so playback does not
//! fight the user's live pointer. Click and scroll events likewise do not
//! reposition the pointer before synthesis; they replay against the current
//! position, mirroring capture semantics. Both behaviors are covered by
//! tests below.

use crate::backend::driver::{lock_driver, SharedDriver, SynthAction};
use crate::backend::BackendMessage;
use crate::error::Result;
use crate::types::{EventKind, Macro};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Lifecycle of a playback run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No run in progress
    Idle,
    /// Events are being replayed
    Running,
    /// The run replayed every event
    Finished,
    /// The run was cancelled at an event boundary
    Cancelled,
}

/// Handle onto a running playback thread
pub struct PlayerHandle {
    cancel: Arc<AtomicBool>,
    state: Arc<Mutex<PlaybackState>>,
    join: Option<JoinHandle<()>>,
}

impl PlayerHandle {
    /// Request cancellation; observed at the next event boundary
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Current state of the run
    pub fn state(&self) -> PlaybackState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Whether the run is still replaying events
    pub fn is_active(&self) -> bool {
        self.state() == PlaybackState::Running
    }

    /// Block until the playback thread exits
    pub fn wait(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawns playback runs
pub struct Player;

impl Player {
    /// Start replaying `macro_` on a background thread.
    ///
    /// Sends [`BackendMessage::PlaybackFinished`] when the run ends,
    /// naturally or by cancellation.
    pub fn spawn(
        macro_: Macro,
        driver: SharedDriver,
        message_tx: Sender<BackendMessage>,
    ) -> Result<PlayerHandle> {
        let cancel = Arc::new(AtomicBool::new(false));
        let state = Arc::new(Mutex::new(PlaybackState::Running));

        let thread_cancel = Arc::clone(&cancel);
        let thread_state = Arc::clone(&state);
        let join = std::thread::Builder::new()
            .name("macrorec-playback".into())
            .spawn(move || {
                let final_state = run(&macro_, &driver, &thread_cancel);
                match thread_state.lock() {
                    Ok(mut guard) => *guard = final_state,
                    Err(poisoned) => *poisoned.into_inner() = final_state,
                }
                let _ = message_tx.send(BackendMessage::PlaybackFinished {
                    cancelled: final_state == PlaybackState::Cancelled,
                });
            })?;

        Ok(PlayerHandle {
            cancel,
            state,
            join: Some(join),
        })
    }
}

/// Replay loop; returns the terminal state
fn run(macro_: &Macro, driver: &SharedDriver, cancel: &AtomicBool) -> PlaybackState {
    tracing::info!(
        "playback of {:?} started ({} events, {:.2}s)",
        macro_.name,
        macro_.len(),
        macro_.duration_secs()
    );

    let started = Instant::now();
    let mut synthesized = 0_u64;
    let mut failed = 0_u64;

    for (index, event) in macro_.events.iter().enumerate() {
        let wait = event.time - started.elapsed().as_secs_f64();
        if wait > 0.0 {
            // A wait outside the Duration range replays immediately; a panic
            // here would leave the run in Running forever.
            match Duration::try_from_secs_f64(wait) {
                Ok(wait) => std::thread::sleep(wait),
                Err(_) => {
                    tracing::warn!("event {} wait of {}s is not sleepable", index, wait)
                }
            }
        }

        if cancel.load(Ordering::SeqCst) {
            tracing::info!(
                "playback of {:?} cancelled before event {} of {}",
                macro_.name,
                index,
                macro_.len()
            );
            return PlaybackState::Cancelled;
        }

        let Some(action) = synth_action(&event.kind) else {
            continue;
        };
        // The lock spans one synthesis call, never the wait above.
        if let Err(e) = lock_driver(driver).synthesize(&action) {
            tracing::warn!("event {} skipped: {}", index, e);
            failed += 1;
        } else {
            synthesized += 1;
        }
    }

    tracing::info!(
        "playback of {:?} finished: {} synthesized, {} failed",
        macro_.name,
        synthesized,
        failed
    );
    PlaybackState::Finished
}

/// What to synthesize for one recorded event.
///
/// `None` for pointer moves (not replayed). Click and scroll coordinates are
/// intentionally dropped here; synthesis targets the current pointer
/// position.
fn synth_action(kind: &EventKind) -> Option<SynthAction> {
    match kind {
        EventKind::KeyPress { key } => Some(SynthAction::KeyDown(key.clone())),
        EventKind::KeyRelease { key } => Some(SynthAction::KeyUp(key.clone())),
        EventKind::PointerMove { .. } => None,
        EventKind::PointerClick {
            button, pressed, ..
        } => Some(if *pressed {
            SynthAction::ButtonDown(*button)
        } else {
            SynthAction::ButtonUp(*button)
        }),
        EventKind::PointerScroll { dx, dy, .. } => Some(SynthAction::Scroll { dx: *dx, dy: *dy }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::driver::{shared, CapturedInput, DriverStats, InputDriver};
    use crate::backend::mock_driver::MockDriver;
    use crate::error::MacroError;
    use crate::types::{Event, KeyIdent, PointerButton};
    use crossbeam_channel::unbounded;
    use serial_test::serial;

    fn key_press(c: char, time: f64) -> Event {
        Event::new(
            time,
            EventKind::KeyPress {
                key: KeyIdent::ch(c),
            },
        )
    }

    fn key_release(c: char, time: f64) -> Event {
        Event::new(
            time,
            EventKind::KeyRelease {
                key: KeyIdent::ch(c),
            },
        )
    }

    fn finish_message(
        rx: &crossbeam_channel::Receiver<BackendMessage>,
    ) -> BackendMessage {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_synth_action_mapping() {
        assert_eq!(
            synth_action(&EventKind::PointerMove { x: 1.0, y: 2.0 }),
            None
        );
        assert_eq!(
            synth_action(&EventKind::PointerClick {
                x: 9.0,
                y: 9.0,
                button: PointerButton::Right,
                pressed: false,
            }),
            Some(SynthAction::ButtonUp(PointerButton::Right))
        );
        assert_eq!(
            synth_action(&EventKind::PointerScroll {
                x: 9.0,
                y: 9.0,
                dx: 2,
                dy: -1,
            }),
            Some(SynthAction::Scroll { dx: 2, dy: -1 })
        );
    }

    #[test]
    #[serial]
    fn test_replays_in_order_with_recorded_gaps() {
        // Presses at 0.10s and 0.35s, release at 0.40s,
        // with a pointer move in between that must not be synthesized.
        let (driver, handle) = MockDriver::new();
        let macro_ = Macro::new(
            "scenario",
            vec![
                key_press('a', 0.10),
                Event::new(0.2, EventKind::PointerMove { x: 5.0, y: 5.0 }),
                key_press('b', 0.35),
                key_release('a', 0.40),
            ],
        );
        let (tx, rx) = unbounded();
        let mut player = Player::spawn(macro_, shared(driver), tx).unwrap();
        assert!(matches!(
            finish_message(&rx),
            BackendMessage::PlaybackFinished { cancelled: false }
        ));
        player.wait();

        let records = handle.synthesized();
        let actions: Vec<_> = records.iter().map(|r| r.action.clone()).collect();
        assert_eq!(
            actions,
            vec![
                SynthAction::KeyDown(KeyIdent::ch('a')),
                SynthAction::KeyDown(KeyIdent::ch('b')),
                SynthAction::KeyUp(KeyIdent::ch('a')),
            ]
        );

        let gap1 = records[1].at.duration_since(records[0].at).as_secs_f64();
        let gap2 = records[2].at.duration_since(records[1].at).as_secs_f64();
        assert!((0.15..0.60).contains(&gap1), "gap1 = {}", gap1);
        assert!(gap2 < 0.25, "gap2 = {}", gap2);
    }

    #[test]
    #[serial]
    fn test_behind_schedule_replays_immediately_without_skipping() {
        let (driver, handle) = MockDriver::new();
        let macro_ = Macro::new(
            "burst",
            vec![key_press('a', 0.0), key_press('b', 0.0), key_press('c', 0.0)],
        );
        let (tx, rx) = unbounded();
        let started = Instant::now();
        let mut player = Player::spawn(macro_, shared(driver), tx).unwrap();
        finish_message(&rx);
        player.wait();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(handle.synthesized().len(), 3);
    }

    #[test]
    #[serial]
    fn test_cancellation_boundary() {
        let (driver, handle) = MockDriver::new();
        let macro_ = Macro::new(
            "cancellable",
            vec![
                key_press('a', 0.0),
                key_press('b', 0.5),
                key_press('c', 0.6),
            ],
        );
        let (tx, rx) = unbounded();
        let mut player = Player::spawn(macro_, shared(driver), tx).unwrap();

        std::thread::sleep(Duration::from_millis(100));
        player.cancel();

        assert!(matches!(
            finish_message(&rx),
            BackendMessage::PlaybackFinished { cancelled: true }
        ));
        player.wait();
        assert_eq!(player.state(), PlaybackState::Cancelled);

        // Event 0 went out before the cancel, events 1.. never did.
        assert_eq!(
            handle.synthesized_actions(),
            vec![SynthAction::KeyDown(KeyIdent::ch('a'))]
        );
    }

    #[test]
    #[serial]
    fn test_synthesis_failure_is_non_fatal() {
        let (driver, handle) = MockDriver::new();
        handle.fail_action(SynthAction::KeyDown(KeyIdent::ch('x')));
        let macro_ = Macro::new(
            "flaky",
            vec![key_press('x', 0.0), key_press('y', 0.01)],
        );
        let (tx, rx) = unbounded();
        let mut player = Player::spawn(macro_, shared(driver), tx).unwrap();
        assert!(matches!(
            finish_message(&rx),
            BackendMessage::PlaybackFinished { cancelled: false }
        ));
        player.wait();

        assert_eq!(
            handle.synthesized_actions(),
            vec![SynthAction::KeyDown(KeyIdent::ch('y'))]
        );
    }

    #[test]
    #[serial]
    fn test_unsleepable_timestamp_does_not_wedge_the_run() {
        // A timestamp too large for Duration must not kill the thread; the
        // run has to reach its terminal state so later runs are accepted.
        let (driver, handle) = MockDriver::new();
        let macro_ = Macro::new(
            "corrupt",
            vec![key_press('a', 0.0), key_press('b', 1e300)],
        );
        let (tx, rx) = unbounded();
        let mut player = Player::spawn(macro_, shared(driver), tx).unwrap();
        assert!(matches!(
            finish_message(&rx),
            BackendMessage::PlaybackFinished { cancelled: false }
        ));
        player.wait();
        assert_eq!(player.state(), PlaybackState::Finished);
        assert_eq!(handle.synthesized().len(), 2);
    }

    #[test]
    #[serial]
    fn test_empty_macro_finishes_immediately() {
        let (driver, _handle) = MockDriver::new();
        let (tx, rx) = unbounded();
        let mut player = Player::spawn(Macro::unnamed(vec![]), shared(driver), tx).unwrap();
        assert!(matches!(
            finish_message(&rx),
            BackendMessage::PlaybackFinished { cancelled: false }
        ));
        player.wait();
        assert_eq!(player.state(), PlaybackState::Finished);
    }

    // A mocked driver (via mockall) for the error-then-success path, driving
    // the same non-fatal policy through the trait object seam.
    mockall::mock! {
        SynthDriver {}
        impl InputDriver for SynthDriver {
            fn subscribe(&mut self, tx: crossbeam_channel::Sender<CapturedInput>) -> crate::error::Result<()>;
            fn unsubscribe(&mut self);
            fn is_subscribed(&self) -> bool;
            fn synthesize(&mut self, action: &SynthAction) -> crate::error::Result<()>;
            fn stats(&self) -> &DriverStats;
            fn stats_mut(&mut self) -> &mut DriverStats;
        }
    }

    #[test]
    #[serial]
    fn test_every_event_offered_to_driver_despite_errors() {
        let mut driver = MockSynthDriver::new();
        let mut remaining_failures = 1;
        driver
            .expect_synthesize()
            .times(3)
            .returning(move |action| {
                if remaining_failures > 0 {
                    remaining_failures -= 1;
                    Err(MacroError::Synthesis(format!("rejected {:?}", action)))
                } else {
                    Ok(())
                }
            });

        let macro_ = Macro::new(
            "trio",
            vec![key_press('a', 0.0), key_press('b', 0.0), key_press('c', 0.0)],
        );
        let (tx, rx) = unbounded();
        let mut player = Player::spawn(macro_, shared(driver), tx).unwrap();
        assert!(matches!(
            finish_message(&rx),
            BackendMessage::PlaybackFinished { cancelled: false }
        ));
        player.wait();
        // The mock's `times(3)` expectation verifies on drop.
    }
}
