//! Backend worker thread implementation
//!
//! This module contains the main worker loop that runs in a separate thread
//! and handles all capture, storage, and playback operations. It
//! communicates with the embedding presentation layer through crossbeam
//! channels.
//!
//! # Responsibilities
//!
//! The worker thread handles:
//!
//! - **Command processing**: Responds to frontend commands (start/stop
//!   capture, save/load, start/cancel playback)
//! - **Capture routing**: Feeds hook notifications into the active capture
//!   session and finalizes it when the stop hotkey fires
//! - **Playback supervision**: Spawns the playback thread and enforces that
//!   only one run exists at a time
//!
//! # Capture path
//!
//! The driver delivers notifications into a queue the worker drains
//! alongside its command queue, so appends to the event sequence are
//! naturally serialized. Notifications arriving while no session is active
//! (e.g. key-repeat of the stop hotkey racing the unsubscribe) are dropped.

use crate::backend::driver::{lock_driver, CapturedInput, SharedDriver};
use crate::backend::player::{PlaybackState, Player, PlayerHandle};
use crate::backend::recorder::{CaptureOutcome, CaptureSession};
use crate::backend::{BackendCommand, BackendMessage};
use crate::config::AppConfig;
use crate::storage;
use crate::types::Macro;
use crossbeam_channel::{select, Receiver, Sender};
use std::path::PathBuf;

/// Main worker loop state
pub struct BackendWorker {
    config: AppConfig,
    driver: SharedDriver,
    command_rx: Receiver<BackendCommand>,
    message_tx: Sender<BackendMessage>,
    capture_tx: Sender<CapturedInput>,
    capture_rx: Receiver<CapturedInput>,
    session: Option<CaptureSession>,
    player: Option<PlayerHandle>,
}

impl BackendWorker {
    /// Create a worker over the given driver and channels
    pub fn new(
        config: AppConfig,
        driver: SharedDriver,
        command_rx: Receiver<BackendCommand>,
        message_tx: Sender<BackendMessage>,
    ) -> Self {
        let (capture_tx, capture_rx) = crossbeam_channel::unbounded();
        Self {
            config,
            driver,
            command_rx,
            message_tx,
            capture_tx,
            capture_rx,
            session: None,
            player: None,
        }
    }

    /// Run until shutdown is requested or the frontend goes away
    pub fn run(mut self) {
        tracing::debug!("backend worker started");
        loop {
            select! {
                recv(self.command_rx) -> cmd => match cmd {
                    Ok(cmd) => {
                        if !self.handle_command(cmd) {
                            break;
                        }
                    }
                    // Frontend dropped its handle; nothing left to serve.
                    Err(_) => break,
                },
                recv(self.capture_rx) -> captured => {
                    if let Ok(captured) = captured {
                        self.handle_captured(captured);
                    }
                }
            }
        }
        self.shutdown();
    }

    /// Process one command; returns false when the loop should exit
    fn handle_command(&mut self, cmd: BackendCommand) -> bool {
        match cmd {
            BackendCommand::StartCapture => self.start_capture(),
            BackendCommand::StopCapture => self.finalize_capture(),
            BackendCommand::SaveMacro { macro_, path } => self.save_macro(macro_, path),
            BackendCommand::LoadMacro { path } => self.load_macro(path),
            BackendCommand::ListMacros => self.list_macros(),
            BackendCommand::StartPlayback(macro_) => self.start_playback(macro_),
            BackendCommand::CancelPlayback => {
                if let Some(ref player) = self.player {
                    player.cancel();
                }
            }
            BackendCommand::Shutdown => return false,
        }
        true
    }

    fn handle_captured(&mut self, captured: CapturedInput) {
        let Some(ref mut session) = self.session else {
            return;
        };
        match session.handle(captured) {
            CaptureOutcome::Recorded => {
                // Progress is advisory; drop it rather than block the worker.
                let _ = self.message_tx.try_send(BackendMessage::CaptureProgress {
                    events: session.len(),
                });
            }
            CaptureOutcome::Ignored => {}
            CaptureOutcome::StopRequested => self.finalize_capture(),
        }
    }

    fn start_capture(&mut self) {
        if self.session.is_some() {
            self.send(BackendMessage::CaptureError(
                "capture already in progress".into(),
            ));
            return;
        }
        if let Err(e) = lock_driver(&self.driver).subscribe(self.capture_tx.clone()) {
            tracing::error!("capture could not start: {}", e);
            self.send(BackendMessage::CaptureError(e.to_string()));
            return;
        }
        self.session = Some(CaptureSession::new(self.config.stop_key));
        tracing::info!("capture started (stop key {:?})", self.config.stop_key);
        self.send(BackendMessage::CaptureStarted);
    }

    /// Stop an active capture and emit the finalized macro.
    ///
    /// A second stop request is a no-op, keeping the stopped transition
    /// exactly-once per session.
    fn finalize_capture(&mut self) {
        let Some(session) = self.session.take() else {
            tracing::debug!("stop requested with no capture in progress");
            return;
        };
        lock_driver(&self.driver).unsubscribe();
        self.send(BackendMessage::CaptureStopped(session.finish()));
    }

    fn save_macro(&mut self, macro_: Macro, path: PathBuf) {
        match storage::save_macro(&macro_, &path) {
            Ok(()) => self.send(BackendMessage::MacroSaved { path }),
            Err(e) => self.send(BackendMessage::Error(e.to_string())),
        }
    }

    fn load_macro(&mut self, path: PathBuf) {
        match storage::load_macro(&path) {
            Ok(macro_) => self.send(BackendMessage::MacroLoaded(macro_)),
            Err(e) => self.send(BackendMessage::Error(e.to_string())),
        }
    }

    fn list_macros(&mut self) {
        match storage::list_macros(&self.config.macros_dir()) {
            Ok(paths) => self.send(BackendMessage::MacroList(paths)),
            Err(e) => self.send(BackendMessage::Error(e.to_string())),
        }
    }

    fn start_playback(&mut self, macro_: Macro) {
        if self.playback_state() == PlaybackState::Running {
            self.send(BackendMessage::Error("playback already in progress".into()));
            return;
        }
        match Player::spawn(macro_, self.driver.clone(), self.message_tx.clone()) {
            Ok(handle) => {
                self.player = Some(handle);
                self.send(BackendMessage::PlaybackStarted);
            }
            Err(e) => self.send(BackendMessage::Error(e.to_string())),
        }
    }

    /// State of the most recent playback run, `Idle` when none was started
    pub fn playback_state(&self) -> PlaybackState {
        self.player
            .as_ref()
            .map(|p| p.state())
            .unwrap_or(PlaybackState::Idle)
    }

    fn shutdown(&mut self) {
        if let Some(mut player) = self.player.take() {
            player.cancel();
            player.wait();
        }
        if self.session.is_some() {
            self.finalize_capture();
        }
        let _ = self.message_tx.send(BackendMessage::Shutdown);
        tracing::debug!("backend worker stopped");
    }

    fn send(&self, msg: BackendMessage) {
        let _ = self.message_tx.send(msg);
    }
}
