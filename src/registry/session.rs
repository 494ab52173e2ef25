//! Per-session state tracked by the registry.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Instant;

use url::Url;

use crate::identifiers::UserContext;
use crate::transport::SocketConnection;

// ============================================================================
// SocketState
// ============================================================================

/// Lifecycle of a WebSocket session.
///
/// ```text
/// Connecting ──► Open ──► Closing ──► Closed
///     │           │          │
///     └───────────┴──────────┴──────► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketState {
    /// Handshake in progress.
    Connecting,
    /// Handshake done, writes accepted.
    Open,
    /// Host asked to close; waiting for the transport.
    Closing,
    /// Closed cleanly. Terminal.
    Closed,
    /// Failed or cancelled. Terminal.
    Failed,
}

impl SocketState {
    /// Returns `true` for `Closed` and `Failed`.
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// WebSocketSession
// ============================================================================

/// A WebSocket session. Owns its transport connection exclusively.
pub struct WebSocketSession {
    url: Url,
    state: SocketState,
    user_context: UserContext,
    connection: Box<dyn SocketConnection>,
}

impl WebSocketSession {
    /// Creates a session in `Connecting`.
    #[must_use]
    pub fn new(url: Url, user_context: UserContext, connection: Box<dyn SocketConnection>) -> Self {
        Self {
            url,
            state: SocketState::Connecting,
            user_context,
            connection,
        }
    }

    /// Returns the target URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SocketState {
        self.state
    }

    /// Returns the host token.
    #[inline]
    #[must_use]
    pub fn user_context(&self) -> UserContext {
        self.user_context
    }

    /// Returns the transport connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &dyn SocketConnection {
        self.connection.as_ref()
    }

    pub(crate) fn set_state(&mut self, state: SocketState) {
        self.state = state;
    }
}

impl fmt::Debug for WebSocketSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketSession")
            .field("url", &self.url.as_str())
            .field("state", &self.state)
            .field("user_context", &self.user_context)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// HttpSession
// ============================================================================

/// A one-shot HTTP request in flight.
#[derive(Debug, Clone)]
pub struct HttpSession {
    url: Url,
    user_context: UserContext,
    started: Instant,
}

impl HttpSession {
    /// Creates a session for a request starting now.
    #[must_use]
    pub fn new(url: Url, user_context: UserContext) -> Self {
        Self {
            url,
            user_context,
            started: Instant::now(),
        }
    }

    /// Returns the target URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the host token.
    #[inline]
    #[must_use]
    pub fn user_context(&self) -> UserContext {
        self.user_context
    }

    /// Returns when the request was handed to the transport.
    #[inline]
    #[must_use]
    pub fn started(&self) -> Instant {
        self.started
    }
}
