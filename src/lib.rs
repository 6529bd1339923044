//! # macrorec
//!
//! Record and replay keyboard and mouse macros.
//!
//! The crate captures global input through an OS hook, stores the result as
//! a timestamped event sequence in a human-inspectable JSON file, and
//! replays it later with the original timing. A configurable stop hotkey
//! (F12 by default) ends a recording without itself being recorded.
//!
//! ## Structure
//!
//! - [`backend`] - worker thread, input drivers, capture and playback
//! - [`types`] - events, key identities, the macro itself
//! - [`storage`] - JSON wire format and macro files
//! - [`config`] - persisted application settings
//! - [`error`] - crate-wide error type
//! - [`logging`] - tracing subscriber setup
//!
//! ## Usage
//!
//! ```ignore
//! use macrorec::{AppConfig, MacroBackend, BackendMessage};
//!
//! macrorec::logging::init();
//! let (backend, handle) = MacroBackend::new(AppConfig::load_or_default());
//! let _join = backend.spawn()?;
//!
//! handle.start_capture()?;
//! // ... user presses F12 to stop ...
//! while let Some(msg) = handle.recv_timeout(std::time::Duration::from_secs(60)) {
//!     if let BackendMessage::CaptureStopped(macro_) = msg {
//!         handle.start_playback(macro_)?;
//!         break;
//!     }
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
pub mod types;

pub use backend::{
    BackendCommand, BackendMessage, FrontendHandle, InputDriver, MacroBackend, PlaybackState,
    SharedDriver,
};
pub use config::AppConfig;
pub use error::{MacroError, Result};
pub use types::{Event, EventKind, KeyIdent, Macro, NamedKey, PointerButton};
