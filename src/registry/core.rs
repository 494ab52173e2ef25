//! Session registry.
//!
//! The registry is the only owner of session state and the single
//! synchronization point between host calls and transport notifications.
//!
//! # Locking
//!
//! - One `parking_lot::Mutex` guards the socket table, one guards the
//!   in-flight HTTP map.
//! - Transport calls made under the lock only enqueue work; notifiers only
//!   push onto the delivery queue. Neither can re-enter the registry.
//! - Notifications are applied one at a time by the delivery thread, so a
//!   host `send`/`close` racing a retirement either runs entirely before it
//!   (and succeeds) or entirely after it (and sees `UnknownHandle`).
//! - [`SessionRegistry::close_all`] raises the shut-down flag under both
//!   locks; `open_socket` and `fetch` read it under the lock they insert
//!   with, so nothing can be registered behind the final notifications.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{Handle, RequestId, UserContext};
use crate::protocol::{Event, HttpCompletion, Notification, Payload, SocketNotification};
use crate::transport::{
    HttpCompleter, HttpTransport, SocketNotifier, SocketTransport,
};
use crate::translator::{self, Effect, Translation};

use super::session::{HttpSession, SocketState, WebSocketSession};
use super::table::SessionTable;

// ============================================================================
// Constants
// ============================================================================

/// Schemes accepted by [`SessionRegistry::open_socket`].
const SOCKET_SCHEMES: &[&str] = &["ws", "wss"];

/// Schemes accepted by [`SessionRegistry::fetch`].
const HTTP_SCHEMES: &[&str] = &["http", "https"];

// ============================================================================
// SessionRegistry
// ============================================================================

/// Handle-indexed registry of WebSocket and HTTP sessions.
///
/// # Example
///
/// ```ignore
/// let handle = registry.open_socket("wss://example/echo", UserContext::new(7))?;
/// registry.send(handle, "ping")?;
/// registry.close(handle, 1000, "bye")?;
/// ```
pub struct SessionRegistry {
    sockets: Mutex<SessionTable<WebSocketSession>>,
    requests: Mutex<FxHashMap<RequestId, HttpSession>>,
    socket_transport: Arc<dyn SocketTransport>,
    http_transport: Arc<dyn HttpTransport>,
    queue: UnboundedSender<Notification>,
    shut_down: AtomicBool,
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sockets", &self.socket_count())
            .field("requests", &self.pending_http_count())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SessionRegistry - Constructor
// ============================================================================

impl SessionRegistry {
    /// Creates a registry reporting into `queue`.
    #[must_use]
    pub fn new(
        socket_transport: Arc<dyn SocketTransport>,
        http_transport: Arc<dyn HttpTransport>,
        queue: UnboundedSender<Notification>,
    ) -> Self {
        Self {
            sockets: Mutex::new(SessionTable::new()),
            requests: Mutex::new(FxHashMap::default()),
            socket_transport,
            http_transport,
            queue,
            shut_down: AtomicBool::new(false),
        }
    }
}

// ============================================================================
// SessionRegistry - Host Operations
// ============================================================================

impl SessionRegistry {
    /// Opens a WebSocket session.
    ///
    /// Returns as soon as the transport has been asked to connect; the
    /// outcome arrives later as `SocketOpen` or `SocketError`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if `url` does not parse as `ws://`/`wss://`
    /// - [`Error::Runtime`] once [`close_all`](Self::close_all) has run
    pub fn open_socket(&self, url: &str, user_context: UserContext) -> Result<Handle> {
        let url = parse_url(url, SOCKET_SCHEMES)?;

        let mut sockets = self.sockets.lock();
        self.ensure_running()?;
        let handle = sockets.insert_with(|handle| {
            let notifier = SocketNotifier::new(handle, self.queue.clone());
            let connection = self.socket_transport.connect(&url, notifier);
            WebSocketSession::new(url.clone(), user_context, connection)
        });
        drop(sockets);

        info!(%handle, url = %url, %user_context, "Socket opened");
        Ok(handle)
    }

    /// Writes a message to an open socket.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownHandle`] if the handle is not live or not `Open`
    pub fn send(&self, handle: Handle, payload: impl Into<Payload>) -> Result<()> {
        let sockets = self.sockets.lock();
        let session = sockets
            .get(handle)
            .filter(|session| session.state() == SocketState::Open)
            .ok_or_else(|| Error::unknown_handle(handle))?;

        let payload = payload.into();
        trace!(%handle, bytes = payload.len(), binary = payload.is_binary(), "Socket send");
        session.connection().write(payload);
        Ok(())
    }

    /// Starts closing a socket.
    ///
    /// Closing a socket that is already closing is a no-op. A socket still
    /// connecting has its handshake cancelled.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownHandle`] if the handle is not live
    pub fn close(&self, handle: Handle, code: u16, reason: &str) -> Result<()> {
        let mut sockets = self.sockets.lock();
        let session = sockets
            .get_mut(handle)
            .ok_or_else(|| Error::unknown_handle(handle))?;

        match session.state() {
            SocketState::Connecting | SocketState::Open => {
                debug!(%handle, code, reason, "Socket closing");
                session.set_state(SocketState::Closing);
                session.connection().disconnect(code, reason);
            }
            state => trace!(%handle, %state, "Close ignored"),
        }
        Ok(())
    }

    /// Starts a one-shot HTTP GET.
    ///
    /// Exactly one `HttpSuccess` or `HttpError` carrying `user_context`
    /// follows.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if `url` does not parse as `http://`/`https://`
    /// - [`Error::Runtime`] once [`close_all`](Self::close_all) has run
    pub fn fetch(&self, url: &str, user_context: UserContext) -> Result<RequestId> {
        let url = parse_url(url, HTTP_SCHEMES)?;

        let mut requests = self.requests.lock();
        self.ensure_running()?;
        let request = RequestId::next();
        requests.insert(request, HttpSession::new(url.clone(), user_context));
        self.http_transport
            .request(&url, HttpCompleter::new(request, self.queue.clone()));

        info!(%request, url = %url, %user_context, "HTTP request started");
        Ok(request)
    }
}

// ============================================================================
// SessionRegistry - Notification Handling
// ============================================================================

impl SessionRegistry {
    /// Applies one queued notification and returns the event to deliver.
    pub fn apply(&self, notification: Notification) -> Option<Event> {
        match notification {
            Notification::Socket {
                handle,
                notification,
            } => self.apply_socket(handle, notification),
            Notification::Http {
                request,
                completion,
            } => self.apply_http(request, completion),
            Notification::Shutdown => None,
        }
    }

    fn apply_socket(&self, handle: Handle, notification: SocketNotification) -> Option<Event> {
        let mut sockets = self.sockets.lock();
        let Some(session) = sockets.get_mut(handle) else {
            trace!(%handle, kind = notification.name(), "Notification for retired handle dropped");
            return None;
        };

        let state = session.state();
        let kind = notification.name();
        let Translation { event, effect } =
            translator::translate_socket(handle, state, session.user_context(), notification);

        match effect {
            Effect::None => {
                if event.is_none() {
                    debug!(%handle, %state, kind, "Notification dropped");
                }
            }
            Effect::Transition(next) => {
                debug!(%handle, from = %state, to = %next, "Socket state changed");
                session.set_state(next);
            }
            Effect::Retire(last) => {
                Self::retire(&mut sockets, handle, last);
            }
        }

        event
    }

    /// Removes a socket session. Called once per handle, on its terminal
    /// notification.
    fn retire(sockets: &mut SessionTable<WebSocketSession>, handle: Handle, last: SocketState) {
        if let Some(mut session) = sockets.remove(handle) {
            session.set_state(last);
            info!(%handle, state = %last, url = %session.url(), "Socket retired");
        }
    }

    fn apply_http(&self, request: RequestId, completion: HttpCompletion) -> Option<Event> {
        let Some(session) = self.requests.lock().remove(&request) else {
            warn!(%request, "Completion for unknown request dropped");
            return None;
        };

        match &completion {
            HttpCompletion::Response { status, .. } => {
                info!(%request, status, elapsed_ms = session.started().elapsed().as_millis() as u64, "HTTP request completed");
            }
            HttpCompletion::Failed { message } => {
                warn!(%request, url = %session.url(), error = %message, "HTTP request failed");
            }
        }

        Some(translator::translate_http(session.user_context(), completion))
    }
}

// ============================================================================
// SessionRegistry - Lifecycle & Introspection
// ============================================================================

impl SessionRegistry {
    /// Returns the state of a live socket.
    #[must_use]
    pub fn state(&self, handle: Handle) -> Option<SocketState> {
        self.sockets.lock().get(handle).map(WebSocketSession::state)
    }

    /// Returns the number of live sockets.
    #[inline]
    #[must_use]
    pub fn socket_count(&self) -> usize {
        self.sockets.lock().len()
    }

    /// Returns the number of HTTP requests awaiting completion.
    #[inline]
    #[must_use]
    pub fn pending_http_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns `true` once [`close_all`](Self::close_all) has run.
    #[inline]
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Closes every live socket, fails every pending request and refuses
    /// new sessions from then on.
    ///
    /// Each session gets a terminal notification queued behind whatever is
    /// already in flight, so the host still sees exactly one terminal event
    /// per session. Returns the number of sessions terminated.
    pub fn close_all(&self, code: u16, reason: &str) -> usize {
        let (handles, requests) = {
            let sockets = self.sockets.lock();
            let requests = self.requests.lock();
            self.shut_down.store(true, Ordering::Release);

            for handle in sockets.handles() {
                if let Some(session) = sockets.get(handle)
                    && !session.state().is_terminal()
                {
                    session.connection().disconnect(code, reason);
                }
            }
            (sockets.handles(), requests.keys().copied().collect::<Vec<_>>())
        };

        for &handle in &handles {
            let _ = self.queue.send(Notification::Socket {
                handle,
                notification: SocketNotification::Cancelled,
            });
        }
        for &request in &requests {
            let _ = self.queue.send(Notification::Http {
                request,
                completion: HttpCompletion::Failed {
                    message: reason.to_owned(),
                },
            });
        }

        let count = handles.len() + requests.len();
        if count > 0 {
            info!(sockets = handles.len(), requests = requests.len(), "Terminating sessions");
        }
        count
    }
}

// ============================================================================
// Helpers
// ============================================================================

impl SessionRegistry {
    fn ensure_running(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(Error::runtime("bridge is shut down"));
        }
        Ok(())
    }
}

fn parse_url(raw: &str, schemes: &[&str]) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::invalid_url(raw, e.to_string()))?;

    if !schemes.contains(&url.scheme()) {
        return Err(Error::invalid_url(
            raw,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================
