//! Event types delivered to the host.
//!
//! Every state change or data arrival the host learns about is one
//! [`Event`]. Socket events carry the owning [`Handle`]; HTTP events carry
//! only the [`UserContext`] because the HTTP session is gone by the time
//! its event is delivered.
//!
//! # Event Kinds
//!
//! | Kind | Terminal | Data |
//! |------|----------|------|
//! | `SocketOpen` | no | - |
//! | `SocketMessage` | no | message payload |
//! | `SocketClose` | yes | close reason |
//! | `SocketError` | yes | - |
//! | `HttpSuccess` | yes | response body |
//! | `HttpError` | yes | - |

// ============================================================================
// Imports
// ============================================================================

use bytes::Bytes;

use crate::error::Error;
use crate::identifiers::{Handle, UserContext};

// ============================================================================
// Constants
// ============================================================================

/// Status reported by `HttpError` when no response was obtained.
pub const HTTP_TRANSPORT_FAILURE: i32 = -1;

/// Close code reported when the peer closed without a close frame.
pub const CLOSE_CODE_NO_STATUS: u16 = 1005;

// ============================================================================
// Payload
// ============================================================================

/// A WebSocket message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Bytes),
}

impl Payload {
    /// Returns the raw bytes of the payload.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Returns the payload length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns `true` if the payload has no bytes.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` for binary frames.
    #[inline]
    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self::Binary(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(bytes))
    }
}

// ============================================================================
// EventKind
// ============================================================================

/// Tag of an [`Event`], laid out for the C boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Socket handshake completed.
    SocketOpen = 0,
    /// Socket received a message.
    SocketMessage = 1,
    /// Socket closed cleanly.
    SocketClose = 2,
    /// Socket failed or was cancelled.
    SocketError = 3,
    /// HTTP response received (any status).
    HttpSuccess = 4,
    /// No HTTP response obtained.
    HttpError = 5,
}

// ============================================================================
// Event
// ============================================================================

/// A normalized notification for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The socket is open and accepts writes.
    SocketOpen {
        /// Socket handle.
        handle: Handle,
        /// Token supplied at open.
        user_context: UserContext,
    },

    /// A message arrived on an open socket.
    SocketMessage {
        /// Socket handle.
        handle: Handle,
        /// Token supplied at open.
        user_context: UserContext,
        /// Message body.
        payload: Payload,
    },

    /// The socket closed. The handle is retired.
    SocketClose {
        /// Socket handle.
        handle: Handle,
        /// Token supplied at open.
        user_context: UserContext,
        /// Close code from the close frame.
        code: u16,
        /// Close reason from the close frame.
        reason: String,
    },

    /// The socket failed or was cancelled. The handle is retired.
    SocketError {
        /// Socket handle.
        handle: Handle,
        /// Token supplied at open.
        user_context: UserContext,
        /// Transport diagnostic.
        message: String,
    },

    /// An HTTP response arrived, whatever its status code.
    HttpSuccess {
        /// Token supplied at fetch.
        user_context: UserContext,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: Bytes,
    },

    /// No HTTP response was obtained.
    HttpError {
        /// Token supplied at fetch.
        user_context: UserContext,
        /// Always [`HTTP_TRANSPORT_FAILURE`] for transport failures.
        status: i32,
    },
}

impl Event {
    /// Returns the event tag.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SocketOpen { .. } => EventKind::SocketOpen,
            Self::SocketMessage { .. } => EventKind::SocketMessage,
            Self::SocketClose { .. } => EventKind::SocketClose,
            Self::SocketError { .. } => EventKind::SocketError,
            Self::HttpSuccess { .. } => EventKind::HttpSuccess,
            Self::HttpError { .. } => EventKind::HttpError,
        }
    }

    /// Returns the socket handle, or `None` for HTTP events.
    #[must_use]
    pub fn handle(&self) -> Option<Handle> {
        match self {
            Self::SocketOpen { handle, .. }
            | Self::SocketMessage { handle, .. }
            | Self::SocketClose { handle, .. }
            | Self::SocketError { handle, .. } => Some(*handle),
            Self::HttpSuccess { .. } | Self::HttpError { .. } => None,
        }
    }

    /// Returns the host token the session was opened with.
    #[must_use]
    pub fn user_context(&self) -> UserContext {
        match self {
            Self::SocketOpen { user_context, .. }
            | Self::SocketMessage { user_context, .. }
            | Self::SocketClose { user_context, .. }
            | Self::SocketError { user_context, .. }
            | Self::HttpSuccess { user_context, .. }
            | Self::HttpError { user_context, .. } => *user_context,
        }
    }

    /// Returns the status code field of the C layout.
    ///
    /// HTTP status for `HttpSuccess`, `-1` for `HttpError`, the close code
    /// for `SocketClose`, 0 otherwise.
    #[must_use]
    pub fn status_code(&self) -> i32 {
        match self {
            Self::HttpSuccess { status, .. } => i32::from(*status),
            Self::HttpError { status, .. } => *status,
            Self::SocketClose { code, .. } => i32::from(*code),
            _ => 0,
        }
    }

    /// Returns the data bytes of the C layout.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        match self {
            Self::SocketMessage { payload, .. } => payload.as_bytes(),
            Self::SocketClose { reason, .. } => reason.as_bytes(),
            Self::HttpSuccess { body, .. } => body,
            _ => &[],
        }
    }

    /// Returns `true` if the session is gone after this event.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::SocketOpen { .. } | Self::SocketMessage { .. })
    }

    /// Returns the failure carried by `SocketError` and `HttpError` events.
    #[must_use]
    pub fn error(&self) -> Option<Error> {
        match self {
            Self::SocketError { message, .. } => Some(Error::transport(message.as_str())),
            Self::HttpError { status, .. } => {
                Some(Error::http_transport(format!("no response (status {status})")))
            }
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> Handle {
        Handle::new(1, 1).expect("valid handle")
    }

    #[test]
    fn test_payload_bytes() {
        let text = Payload::from("ping");
        assert_eq!(text.as_bytes(), b"ping");
        assert!(!text.is_binary());

        let binary = Payload::from(vec![1u8, 2, 3]);
        assert_eq!(binary.len(), 3);
        assert!(binary.is_binary());
    }

    #[test]
    fn test_event_kind_discriminants() {
        assert_eq!(EventKind::SocketOpen as i32, 0);
        assert_eq!(EventKind::HttpError as i32, 5);
    }

    #[test]
    fn test_http_success_fields() {
        let event = Event::HttpSuccess {
            user_context: UserContext::new(3),
            status: 404,
            body: Bytes::new(),
        };
        assert_eq!(event.kind(), EventKind::HttpSuccess);
        assert_eq!(event.status_code(), 404);
        assert!(event.data().is_empty());
        assert!(event.handle().is_none());
        assert!(event.is_terminal());
    }

    #[test]
    fn test_socket_close_carries_code() {
        let event = Event::SocketClose {
            handle: handle(),
            user_context: UserContext::new(7),
            code: 1000,
            reason: "bye".into(),
        };
        assert_eq!(event.status_code(), 1000);
        assert_eq!(event.data(), b"bye");
        assert_eq!(event.handle(), Some(handle()));
    }

    #[test]
    fn test_message_is_not_terminal() {
        let event = Event::SocketMessage {
            handle: handle(),
            user_context: UserContext::new(7),
            payload: Payload::from("ping"),
        };
        assert!(!event.is_terminal());
        assert_eq!(event.data(), b"ping");
        assert_eq!(event.user_context(), UserContext::new(7));
    }

    #[test]
    fn test_failure_events_carry_error() {
        let socket = Event::SocketError {
            handle: handle(),
            user_context: UserContext::new(1),
            message: "connection refused".into(),
        };
        assert!(socket.error().is_some_and(|e| e.is_transport_error()));

        let http = Event::HttpError {
            user_context: UserContext::new(1),
            status: HTTP_TRANSPORT_FAILURE,
        };
        assert!(matches!(http.error(), Some(Error::HttpTransport { .. })));

        let open = Event::SocketOpen {
            handle: handle(),
            user_context: UserContext::new(1),
        };
        assert!(open.error().is_none());
    }
}
