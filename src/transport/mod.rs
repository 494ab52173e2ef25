//! Transport adapters.
//!
//! The registry never talks to a network stack directly. It goes through
//! the capability traits defined here:
//!
//! | Trait | Capabilities |
//! |-------|--------------|
//! | [`SocketTransport`] | `connect(url)` |
//! | [`SocketConnection`] | `write(payload)`, `disconnect(code, reason)` |
//! | [`HttpTransport`] | `request(url)` |
//!
//! Transports report back on whatever thread they like through a
//! [`SocketNotifier`] or [`HttpCompleter`]. Both only push onto the
//! delivery queue, so they never block and never touch the session table.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ connect/write/disconnect ┌──────────────────────┐
//! │ Registry     │─────────────────────────►│ SocketTransport      │
//! │              │ request                  │ HttpTransport        │
//! │              │─────────────────────────►│ (tokio tasks)        │
//! └──────────────┘                          └──────────┬───────────┘
//!        ▲                                             │ notify/complete
//!        │ apply                                       ▼
//! ┌──────┴───────┐         Notification       ┌──────────────────────┐
//! │ Delivery     │◄───────────────────────────│ unbounded queue      │
//! │ thread       │                            └──────────────────────┘
//! └──────────────┘
//! ```
//!
//! No retry, redirect or timeout policy lives here; whatever the
//! underlying stack does by default applies.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket transport on tokio-tungstenite |
//! | `http` | HTTP transport on reqwest |
//! | `memory` | Scripted in-process transport |

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;
use url::Url;

use crate::identifiers::{Handle, RequestId};
use crate::protocol::{HttpCompletion, Notification, Payload, SocketNotification};

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket transport on tokio-tungstenite.
pub mod connection;

/// HTTP transport on reqwest.
pub mod http;

/// Scripted in-process transport.
pub mod memory;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::TungsteniteTransport;
pub use http::ReqwestTransport;
pub use memory::MemoryTransport;

// ============================================================================
// Traits
// ============================================================================

/// Opens WebSocket connections.
///
/// `connect` must return promptly; the handshake and everything after it
/// is reported through the notifier. Implementations must not call back
/// into the bridge from `connect`.
pub trait SocketTransport: Send + Sync {
    /// Starts connecting to `url`.
    fn connect(&self, url: &Url, notifier: SocketNotifier) -> Box<dyn SocketConnection>;
}

/// One connection created by a [`SocketTransport`].
///
/// Both methods enqueue work and return immediately. Dropping the
/// connection abandons it without further notifications being required.
pub trait SocketConnection: Send + Sync {
    /// Queues a data frame.
    fn write(&self, payload: Payload);

    /// Starts a close handshake, or cancels a pending connect.
    fn disconnect(&self, code: u16, reason: &str);
}

/// Performs one-shot HTTP requests.
pub trait HttpTransport: Send + Sync {
    /// Starts a GET of `url`; the outcome goes to `completer`.
    fn request(&self, url: &Url, completer: HttpCompleter);
}

// ============================================================================
// SocketNotifier
// ============================================================================

/// Reports notifications for one socket.
///
/// Cheap to clone; every clone reports for the same handle.
#[derive(Debug, Clone)]
pub struct SocketNotifier {
    handle: Handle,
    queue: UnboundedSender<Notification>,
}

impl SocketNotifier {
    pub(crate) fn new(handle: Handle, queue: UnboundedSender<Notification>) -> Self {
        Self { handle, queue }
    }

    /// Returns the handle notifications are reported for.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Reports a notification.
    ///
    /// Returns `false` if the bridge has shut down.
    pub fn notify(&self, notification: SocketNotification) -> bool {
        trace!(handle = %self.handle, kind = notification.name(), "Socket notification");
        self.queue
            .send(Notification::Socket {
                handle: self.handle,
                notification,
            })
            .is_ok()
    }
}

// ============================================================================
// HttpCompleter
// ============================================================================

/// Reports the outcome of one HTTP request.
///
/// Consumed by [`complete`](Self::complete), so a request completes at
/// most once. Dropping it uncompleted reports a transport failure, so a
/// request also completes at least once.
#[derive(Debug)]
pub struct HttpCompleter {
    request: RequestId,
    queue: Option<UnboundedSender<Notification>>,
}

impl HttpCompleter {
    pub(crate) fn new(request: RequestId, queue: UnboundedSender<Notification>) -> Self {
        Self {
            request,
            queue: Some(queue),
        }
    }

    /// Returns the request being completed.
    #[inline]
    #[must_use]
    pub fn request(&self) -> RequestId {
        self.request
    }

    /// Reports the outcome.
    pub fn complete(mut self, completion: HttpCompletion) {
        self.send(completion);
    }

    fn send(&mut self, completion: HttpCompletion) {
        if let Some(queue) = self.queue.take() {
            let _ = queue.send(Notification::Http {
                request: self.request,
                completion,
            });
        }
    }
}

impl Drop for HttpCompleter {
    fn drop(&mut self) {
        self.send(HttpCompletion::Failed {
            message: "request abandoned by transport".to_owned(),
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
