//! Error handling for the macrorec crate
//!
//! This module defines the error type shared by capture, storage, and
//! playback, plus a Result alias for use throughout the crate.
//!
//! Propagation policy: hook installation, macro decoding, and file IO
//! failures abort the requested operation and surface to the caller.
//! Per-event synthesis failures during playback are logged and skipped
//! at the call site; a missed key press must not be redone out of
//! temporal order, so there is no retry anywhere.

use thiserror::Error;

/// Main error type for macrorec operations
#[derive(Error, Debug)]
pub enum MacroError {
    /// The OS-level input hook could not be installed (capture cannot start)
    #[error("failed to install input hook: {0}")]
    HookInstall(String),

    /// A macro file or event sequence failed to decode
    #[error("malformed macro: {0}")]
    Malformed(String),

    /// A single synthesized input event was rejected by the OS
    #[error("input synthesis failed: {0}")]
    Synthesis(String),

    /// IO errors on macro or config files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors related to channel communication with the backend
    #[error("channel error: {0}")]
    Channel(String),

    /// Errors related to configuration loading/saving
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<MacroError>,
    },
}

impl MacroError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        MacroError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for macrorec operations
pub type Result<T> = std::result::Result<T, MacroError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
