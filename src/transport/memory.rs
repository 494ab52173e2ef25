//! Scripted in-process transport.
//!
//! [`MemoryTransport`] implements both transport traits without touching
//! the network. It records what the registry asks of it and lets the
//! caller inject notifications and completions, which makes it the
//! transport of choice for exercising the bridge (and a host core) in
//! tests.
//!
//! # Example
//!
//! ```ignore
//! let transport = MemoryTransport::new();
//! let bridge = Bridge::builder()
//!     .transport(transport.clone())
//!     .event_sink(|event| println!("{event:?}"))
//!     .build()?;
//!
//! let handle = bridge.open_socket("wss://example/echo", UserContext::new(7))?;
//! transport.connected(handle);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use url::Url;

use crate::identifiers::{Handle, RequestId};
use crate::protocol::{HttpCompletion, Payload, SocketNotification};

use super::{HttpCompleter, HttpTransport, SocketConnection, SocketNotifier, SocketTransport};

// ============================================================================
// Types
// ============================================================================

/// What the registry did to one socket.
#[derive(Debug)]
struct MemorySocket {
    url: Url,
    notifier: SocketNotifier,
    writes: Vec<Payload>,
    disconnects: Vec<(u16, String)>,
}

#[derive(Debug, Default)]
struct MemoryState {
    sockets: FxHashMap<Handle, MemorySocket>,
    connects: usize,
    requests: Vec<(Url, HttpCompleter)>,
}

// ============================================================================
// MemoryTransport
// ============================================================================

/// In-process [`SocketTransport`] + [`HttpTransport`].
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    /// Creates an empty transport.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Socket scripting
    // ------------------------------------------------------------------------

    /// Injects a notification for `handle`.
    ///
    /// A terminal notification also forgets the socket, so its recorded
    /// writes and disconnects are gone afterwards.
    ///
    /// Returns `false` if `handle` is unknown to this transport (never
    /// connected or already ended) or the bridge is gone.
    pub fn notify(&self, handle: Handle, notification: SocketNotification) -> bool {
        let notifier = {
            let mut state = self.state.lock();
            if notification.is_terminal() {
                state.sockets.remove(&handle).map(|socket| socket.notifier)
            } else {
                state.sockets.get(&handle).map(|socket| socket.notifier.clone())
            }
        };

        notifier.is_some_and(|notifier| notifier.notify(notification))
    }

    /// Reports the handshake as completed.
    pub fn connected(&self, handle: Handle) -> bool {
        self.notify(handle, SocketNotification::Connected)
    }

    /// Reports an incoming message.
    pub fn message(&self, handle: Handle, payload: impl Into<Payload>) -> bool {
        self.notify(handle, SocketNotification::Message(payload.into()))
    }

    /// Reports a completed close.
    pub fn disconnected(&self, handle: Handle, code: u16, reason: &str) -> bool {
        self.notify(
            handle,
            SocketNotification::Disconnected {
                code,
                reason: reason.to_owned(),
            },
        )
    }

    /// Reports a connection failure.
    pub fn fail(&self, handle: Handle, message: &str) -> bool {
        self.notify(
            handle,
            SocketNotification::Failed {
                message: message.to_owned(),
            },
        )
    }

    /// Returns the number of sockets connected and not yet ended.
    #[must_use]
    pub fn live_sockets(&self) -> usize {
        self.state.lock().sockets.len()
    }

    /// Returns the number of `connect` calls seen.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.state.lock().connects
    }

    /// Returns the URL `handle` was connected to.
    #[must_use]
    pub fn url(&self, handle: Handle) -> Option<Url> {
        self.state
            .lock()
            .sockets
            .get(&handle)
            .map(|socket| socket.url.clone())
    }

    /// Returns the payloads written to `handle`, oldest first.
    #[must_use]
    pub fn writes(&self, handle: Handle) -> Vec<Payload> {
        self.state
            .lock()
            .sockets
            .get(&handle)
            .map(|socket| socket.writes.clone())
            .unwrap_or_default()
    }

    /// Returns the `(code, reason)` of every disconnect asked for `handle`.
    #[must_use]
    pub fn disconnects(&self, handle: Handle) -> Vec<(u16, String)> {
        self.state
            .lock()
            .sockets
            .get(&handle)
            .map(|socket| socket.disconnects.clone())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // HTTP scripting
    // ------------------------------------------------------------------------

    /// Returns the URLs of requests not yet completed, oldest first.
    #[must_use]
    pub fn pending_requests(&self) -> Vec<Url> {
        self.state
            .lock()
            .requests
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// Completes the oldest pending request for `url` with a response.
    ///
    /// Returns the request id, or `None` if nothing for `url` is pending.
    pub fn respond(&self, url: &str, status: u16, body: impl Into<Bytes>) -> Option<RequestId> {
        self.complete(
            url,
            HttpCompletion::Response {
                status,
                body: body.into(),
            },
        )
    }

    /// Completes the oldest pending request for `url` with a failure.
    pub fn fail_request(&self, url: &str, message: &str) -> Option<RequestId> {
        self.complete(
            url,
            HttpCompletion::Failed {
                message: message.to_owned(),
            },
        )
    }

    fn complete(&self, url: &str, completion: HttpCompletion) -> Option<RequestId> {
        let completer = {
            let mut state = self.state.lock();
            let position = state
                .requests
                .iter()
                .position(|(pending, _)| pending.as_str() == url)?;
            state.requests.remove(position).1
        };

        let request = completer.request();
        completer.complete(completion);
        Some(request)
    }
}

// ============================================================================
// Trait Implementations
// ============================================================================

impl SocketTransport for MemoryTransport {
    fn connect(&self, url: &Url, notifier: SocketNotifier) -> Box<dyn SocketConnection> {
        let handle = notifier.handle();
        let mut state = self.state.lock();
        state.connects += 1;
        state.sockets.insert(
            handle,
            MemorySocket {
                url: url.clone(),
                notifier,
                writes: Vec::new(),
                disconnects: Vec::new(),
            },
        );

        Box::new(MemoryConnection {
            handle,
            state: Arc::clone(&self.state),
        })
    }
}

impl HttpTransport for MemoryTransport {
    fn request(&self, url: &Url, completer: HttpCompleter) {
        self.state.lock().requests.push((url.clone(), completer));
    }
}

/// Connection handed to the registry; records into the shared state.
struct MemoryConnection {
    handle: Handle,
    state: Arc<Mutex<MemoryState>>,
}

impl SocketConnection for MemoryConnection {
    fn write(&self, payload: Payload) {
        if let Some(socket) = self.state.lock().sockets.get_mut(&self.handle) {
            socket.writes.push(payload);
        }
    }

    fn disconnect(&self, code: u16, reason: &str) {
        if let Some(socket) = self.state.lock().sockets.get_mut(&self.handle) {
            socket.disconnects.push((code, reason.to_owned()));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
