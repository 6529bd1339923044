//! Backend for input capture, storage, and playback
//!
//! The backend runs on its own worker thread and is driven over channels:
//! the frontend sends [`BackendCommand`]s and drains [`BackendMessage`]s.
//! This keeps hook callbacks, file IO, and playback waits off the thread
//! that embeds the crate (a GUI event loop, a CLI, a test harness).
//!
//! # Architecture
//!
//! ```text
//! frontend thread            worker thread              playback thread
//! FrontendHandle  --cmds-->  BackendWorker  --spawns->  Player
//!                 <--msgs--       |                       |
//!                            SharedDriver  <--------------+
//!                                 ^
//!                           hook threads (rdev)
//! ```
//!
//! The driver is the only component touching the OS; everything above it is
//! deterministic and exercised in tests through the mock driver.

pub mod driver;
#[cfg(any(test, feature = "mock-driver"))]
pub mod mock_driver;
pub mod player;
pub mod rdev_driver;
pub mod recorder;
pub mod worker;

pub use driver::{lock_driver, shared, CapturedInput, DriverStats, InputDriver, SharedDriver, SynthAction};
pub use player::{PlaybackState, Player, PlayerHandle};
pub use recorder::{CaptureOutcome, CaptureSession};
pub use worker::BackendWorker;

use crate::config::AppConfig;
use crate::types::Macro;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::path::PathBuf;
use std::time::Duration;

/// Commands sent from the frontend to the backend worker
#[derive(Debug, Clone)]
pub enum BackendCommand {
    /// Install the hook and begin recording
    StartCapture,
    /// Finalize the active recording (the stop hotkey does this implicitly)
    StopCapture,
    /// Persist a macro to the given file
    SaveMacro { macro_: Macro, path: PathBuf },
    /// Read a macro back from the given file
    LoadMacro { path: PathBuf },
    /// Enumerate macro files in the configured macros directory
    ListMacros,
    /// Replay a macro on a background thread
    StartPlayback(Macro),
    /// Request cancellation of the active playback run
    CancelPlayback,
    /// Stop the worker thread
    Shutdown,
}

/// Messages sent from the backend worker to the frontend
#[derive(Debug, Clone)]
pub enum BackendMessage {
    /// The hook is installed and events are being recorded
    CaptureStarted,
    /// Advisory progress update while recording
    CaptureProgress { events: usize },
    /// The recording was finalized; sent exactly once per capture
    CaptureStopped(Macro),
    /// Capture could not start (hook install failure, double start)
    CaptureError(String),
    /// A macro was written to disk
    MacroSaved { path: PathBuf },
    /// A macro was read from disk
    MacroLoaded(Macro),
    /// Contents of the macros directory
    MacroList(Vec<PathBuf>),
    /// Playback began
    PlaybackStarted,
    /// Playback ended, by running out of events or by cancellation
    PlaybackFinished { cancelled: bool },
    /// A storage or playback operation failed
    Error(String),
    /// The worker thread is exiting
    Shutdown,
}

/// Frontend-side handle onto a running backend.
///
/// Cloneable sender, single receiver. Dropping the handle (and every clone
/// of its sender) shuts the worker down.
pub struct FrontendHandle {
    command_tx: Sender<BackendCommand>,
    message_rx: Receiver<BackendMessage>,
}

impl FrontendHandle {
    /// Send a command to the worker
    pub fn send(&self, cmd: BackendCommand) -> crate::error::Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|e| crate::error::MacroError::Channel(e.to_string()))
    }

    /// Non-blocking receive; `None` when no message is pending
    pub fn try_recv(&self) -> Option<BackendMessage> {
        match self.message_rx.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Blocking receive with a timeout
    pub fn recv_timeout(&self, timeout: Duration) -> Option<BackendMessage> {
        self.message_rx.recv_timeout(timeout).ok()
    }

    /// Drain every pending message
    pub fn drain(&self) -> Vec<BackendMessage> {
        let mut messages = Vec::new();
        while let Some(msg) = self.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// A clone of the command sender, for embedding in other threads
    pub fn command_sender(&self) -> Sender<BackendCommand> {
        self.command_tx.clone()
    }

    /// Begin recording
    pub fn start_capture(&self) -> crate::error::Result<()> {
        self.send(BackendCommand::StartCapture)
    }

    /// Finalize the active recording
    pub fn stop_capture(&self) -> crate::error::Result<()> {
        self.send(BackendCommand::StopCapture)
    }

    /// Replay a macro
    pub fn start_playback(&self, macro_: Macro) -> crate::error::Result<()> {
        self.send(BackendCommand::StartPlayback(macro_))
    }

    /// Cancel the active playback run
    pub fn cancel_playback(&self) -> crate::error::Result<()> {
        self.send(BackendCommand::CancelPlayback)
    }

    /// Ask the worker to exit
    pub fn shutdown(&self) -> crate::error::Result<()> {
        self.send(BackendCommand::Shutdown)
    }
}

/// The backend, ready to run on a thread of the caller's choosing
pub struct MacroBackend {
    worker: BackendWorker,
}

impl MacroBackend {
    /// Create a backend over the real OS driver
    pub fn new(config: AppConfig) -> (Self, FrontendHandle) {
        Self::with_driver(config, shared(rdev_driver::RdevDriver::new()))
    }

    /// Create a backend over an arbitrary driver (tests use the mock here)
    pub fn with_driver(config: AppConfig, driver: SharedDriver) -> (Self, FrontendHandle) {
        let (command_tx, command_rx) = crossbeam_channel::bounded(256);
        let (message_tx, message_rx) = crossbeam_channel::bounded(10_000);
        let worker = BackendWorker::new(config, driver, command_rx, message_tx);
        (
            Self { worker },
            FrontendHandle {
                command_tx,
                message_rx,
            },
        )
    }

    /// Run the worker loop on the current thread until shutdown
    pub fn run(self) {
        self.worker.run();
    }

    /// Run the worker loop on a new thread
    pub fn spawn(self) -> crate::error::Result<std::thread::JoinHandle<()>> {
        Ok(std::thread::Builder::new()
            .name("macrorec-backend".into())
            .spawn(move || self.run())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock_driver::MockDriver;

    #[test]
    fn test_backend_spawn_and_shutdown() {
        let (driver, _mock) = MockDriver::new();
        let (backend, handle) = MacroBackend::with_driver(AppConfig::default(), shared(driver));
        let join = backend.spawn().unwrap();

        handle.shutdown().unwrap();
        join.join().unwrap();
        assert!(handle
            .drain()
            .iter()
            .any(|m| matches!(m, BackendMessage::Shutdown)));
    }

    #[test]
    fn test_worker_exits_when_frontend_drops() {
        let (driver, _mock) = MockDriver::new();
        let (backend, handle) = MacroBackend::with_driver(AppConfig::default(), shared(driver));
        let join = backend.spawn().unwrap();

        drop(handle);
        join.join().unwrap();
    }
}
