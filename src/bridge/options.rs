//! Bridge configuration.
//!
//! Every field has a default, so an empty JSON object (or no document at
//! all from C) yields a working bridge.
//!
//! # Example
//!
//! ```ignore
//! use netbridge::BridgeOptions;
//!
//! let options = BridgeOptions::from_json(r#"{"worker_threads": 4, "user_agent": "host/1.0"}"#)?;
//! assert_eq!(options.shutdown_close_code, 1001);
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default number of tokio worker threads.
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Close code sent to live sockets when the bridge shuts down ("going away").
pub const DEFAULT_SHUTDOWN_CLOSE_CODE: u16 = 1001;

// ============================================================================
// BridgeOptions
// ============================================================================

/// Runtime and transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeOptions {
    /// Tokio worker threads driving the transports.
    pub worker_threads: usize,

    /// `User-Agent` for HTTP requests. `None` keeps the client default.
    pub user_agent: Option<String>,

    /// Largest incoming WebSocket message accepted, in bytes.
    pub max_message_size: Option<usize>,

    /// Close code sent to sockets still open at shutdown.
    pub shutdown_close_code: u16,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl BridgeOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            user_agent: None,
            max_message_size: None,
            shutdown_close_code: DEFAULT_SHUTDOWN_CLOSE_CODE,
        }
    }

    /// Parses options from a JSON object. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document is malformed or has unknown fields
    /// - [`Error::Config`] if a value is out of range
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BridgeOptions {
    /// Sets the worker thread count.
    #[inline]
    #[must_use]
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    /// Sets the HTTP `User-Agent`.
    #[inline]
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the incoming message size limit.
    #[inline]
    #[must_use]
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = Some(max_message_size);
        self
    }

    /// Sets the close code used at shutdown.
    #[inline]
    #[must_use]
    pub fn with_shutdown_close_code(mut self, code: u16) -> Self {
        self.shutdown_close_code = code;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl BridgeOptions {
    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(Error::config("worker_threads must be at least 1"));
        }

        if self.max_message_size == Some(0) {
            return Err(Error::config("max_message_size must be at least 1"));
        }

        if !is_sendable_close_code(self.shutdown_close_code) {
            return Err(Error::config(format!(
                "shutdown_close_code {} cannot be sent in a close frame",
                self.shutdown_close_code
            )));
        }

        Ok(())
    }
}

/// Close codes an endpoint may put in a close frame (RFC 6455 §7.4).
fn is_sendable_close_code(code: u16) -> bool {
    matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
}

// ============================================================================
// Tests
// ============================================================================
