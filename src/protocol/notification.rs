//! Raw transport notifications.
//!
//! Transports report what they observed with these types. They carry no
//! session state; the registry combines them with its table to produce
//! [`Event`](super::Event)s.

// ============================================================================
// Imports
// ============================================================================

use bytes::Bytes;

use crate::identifiers::{Handle, RequestId};

use super::Payload;

// ============================================================================
// SocketNotification
// ============================================================================

/// Something a socket transport observed on one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketNotification {
    /// Handshake completed.
    Connected,
    /// Peer or local close completed.
    Disconnected {
        /// Close code, 1005 if none was sent.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// Connection attempt was abandoned before completing.
    Cancelled,
    /// Connection or I/O failure.
    Failed {
        /// Diagnostic from the stack.
        message: String,
    },
    /// Data frame received.
    Message(Payload),
}

impl SocketNotification {
    /// Returns a short name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::Cancelled => "cancelled",
            Self::Failed { .. } => "failed",
            Self::Message(_) => "message",
        }
    }

    /// Returns `true` for notifications that end the connection.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Disconnected { .. } | Self::Cancelled | Self::Failed { .. }
        )
    }
}

// ============================================================================
// HttpCompletion
// ============================================================================

/// Outcome of a one-shot HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpCompletion {
    /// A response was received, any status code.
    Response {
        /// HTTP status code.
        status: u16,
        /// Body bytes received, possibly empty.
        body: Bytes,
    },
    /// No response was obtained.
    Failed {
        /// Diagnostic from the HTTP client.
        message: String,
    },
}

// ============================================================================
// Notification
// ============================================================================

/// Item on the delivery queue.
#[derive(Debug)]
pub enum Notification {
    /// A socket notification for one handle.
    Socket {
        /// Session the notification belongs to.
        handle: Handle,
        /// What the transport observed.
        notification: SocketNotification,
    },
    /// Completion of one HTTP request.
    Http {
        /// Request the completion belongs to.
        request: RequestId,
        /// Outcome.
        completion: HttpCompletion,
    },
    /// Stop the delivery thread.
    Shutdown,
}
