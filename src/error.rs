//! Error types for the bridge.
//!
//! Synchronous precondition failures (bad URL, stale handle) are returned
//! directly from host-facing calls. Failures that happen after a call has
//! returned never show up here; they reach the host as `SocketError` or
//! `HttpError` events.
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Precondition | [`Error::InvalidUrl`], [`Error::UnknownHandle`], [`Error::InvalidArgument`] |
//! | Transport | [`Error::Transport`], [`Error::HttpTransport`] |
//! | Setup | [`Error::Config`] |
//! | Lifecycle | [`Error::Runtime`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::Handle;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Precondition Errors
    // ========================================================================
    /// URL passed to open/fetch did not parse or has an unsupported scheme.
    ///
    /// No handle is allocated.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The rejected URL string.
        url: String,
        /// Why it was rejected.
        message: String,
    },

    /// Operation referenced a handle that is not currently live.
    #[error("Unknown handle: {handle}")]
    UnknownHandle {
        /// The stale or never-issued handle.
        handle: Handle,
    },

    /// Argument crossing the C boundary was unusable (null, not UTF-8).
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// WebSocket transport reported cancellation or connection failure.
    #[error("Transport error: {message}")]
    Transport {
        /// Description reported by the transport.
        message: String,
    },

    /// No HTTP response was obtained.
    #[error("HTTP transport error: {message}")]
    HttpTransport {
        /// Description reported by the HTTP client.
        message: String,
    },

    // ========================================================================
    // Setup Errors
    // ========================================================================
    /// Bridge configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Bridge has shut down and accepts no new sessions.
    #[error("Runtime error: {message}")]
    Runtime {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown handle error.
    #[inline]
    pub fn unknown_handle(handle: Handle) -> Self {
        Self::UnknownHandle { handle }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an HTTP transport error.
    #[inline]
    pub fn http_transport(message: impl Into<String>) -> Self {
        Self::HttpTransport {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a runtime error.
    #[inline]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the caller passed something unusable.
    ///
    /// These are the errors host-facing calls report synchronously.
    #[inline]
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl { .. } | Self::UnknownHandle { .. } | Self::InvalidArgument { .. }
        )
    }

    /// Returns `true` if the network stack failed.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::HttpTransport { .. } | Self::WebSocket(_) | Self::Http(_)
        )
    }

    /// Returns the C status code for this error.
    ///
    /// | Code | Meaning |
    /// |------|---------|
    /// | `-1` | invalid URL |
    /// | `-2` | unknown handle |
    /// | `-3` | invalid argument |
    /// | `-4` | anything else |
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> i32 {
        match self {
            Self::InvalidUrl { .. } => -1,
            Self::UnknownHandle { .. } => -2,
            Self::InvalidArgument { .. } => -3,
            _ => -4,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
