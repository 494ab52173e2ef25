//! Bridge composition root.
//!
//! A [`Bridge`] owns everything a host needs: the tokio runtime driving the
//! transports, the session registry, and the delivery thread feeding the
//! host sink.
//!
//! # Example
//!
//! ```ignore
//! use netbridge::{Bridge, Event, UserContext};
//!
//! let bridge = Bridge::builder()
//!     .event_sink(|event: &Event| println!("{:?} {}", event.kind(), event.status_code()))
//!     .build()?;
//!
//! let handle = bridge.open_socket("wss://relay.example/", UserContext::new(1))?;
//! bridge.fetch("https://example.com/", UserContext::new(2))?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::runtime::{Builder as RuntimeBuilder, Runtime};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::dispatch::{Dispatcher, EventSink};
use crate::error::Result;
use crate::identifiers::{Handle, RequestId, UserContext};
use crate::protocol::Payload;
use crate::registry::{SessionRegistry, SocketState};
use crate::transport::{HttpTransport, ReqwestTransport, SocketTransport, TungsteniteTransport};

use super::builder::BridgeBuilder;
use super::options::BridgeOptions;

// ============================================================================
// Constants
// ============================================================================

/// Close reason sent to sockets still open at shutdown.
const SHUTDOWN_REASON: &str = "bridge shutting down";

// ============================================================================
// Bridge
// ============================================================================

/// Networking bridge for a host application.
///
/// All methods take `&self` and may be called from any thread, including
/// from inside the event sink. Dropping the bridge closes every session
/// (each still receives its terminal event) and stops the runtime.
pub struct Bridge {
    registry: Arc<SessionRegistry>,
    dispatcher: Dispatcher,
    runtime: Option<Runtime>,
    options: BridgeOptions,
}

// ============================================================================
// Bridge - Display
// ============================================================================

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("sockets", &self.registry.socket_count())
            .field("requests", &self.registry.pending_http_count())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Bridge - Public API
// ============================================================================

impl Bridge {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// Opens a WebSocket. See [`SessionRegistry::open_socket`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`](crate::Error::InvalidUrl) if `url` is not a `ws://`/`wss://` URL
    #[inline]
    pub fn open_socket(&self, url: &str, user_context: UserContext) -> Result<Handle> {
        self.registry.open_socket(url, user_context)
    }

    /// Sends a text or binary message on an open socket.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownHandle`](crate::Error::UnknownHandle) if the socket is not open
    #[inline]
    pub fn send(&self, handle: Handle, payload: impl Into<Payload>) -> Result<()> {
        self.registry.send(handle, payload)
    }

    /// Starts closing a socket.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownHandle`](crate::Error::UnknownHandle) if the handle is not live
    #[inline]
    pub fn close(&self, handle: Handle, code: u16, reason: &str) -> Result<()> {
        self.registry.close(handle, code, reason)
    }

    /// Starts an HTTP GET.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`](crate::Error::InvalidUrl) if `url` is not an `http://`/`https://` URL
    #[inline]
    pub fn fetch(&self, url: &str, user_context: UserContext) -> Result<RequestId> {
        self.registry.fetch(url, user_context)
    }

    /// Returns the state of a live socket.
    #[inline]
    #[must_use]
    pub fn state(&self, handle: Handle) -> Option<SocketState> {
        self.registry.state(handle)
    }

    /// Returns the session registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Returns the options the bridge was built with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Closes every session and stops delivery.
    ///
    /// Every session still open gets its terminal event before the delivery
    /// thread exits. Later calls are no-ops; dropping the bridge calls this.
    pub fn shutdown(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };

        let closed = self
            .registry
            .close_all(self.options.shutdown_close_code, SHUTDOWN_REASON);
        self.dispatcher.shutdown();
        runtime.shutdown_background();

        info!(closed, "Bridge shut down");
    }
}

// ============================================================================
// Bridge - Internal API
// ============================================================================

impl Bridge {
    /// Assembles a bridge. Missing transports default to
    /// tokio-tungstenite and reqwest on the bridge runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`](crate::Error::Io) if the runtime or delivery thread cannot start
    /// - [`Error::Http`](crate::Error::Http) if the HTTP client cannot be built
    pub(crate) fn new(
        options: BridgeOptions,
        socket_transport: Option<Arc<dyn SocketTransport>>,
        http_transport: Option<Arc<dyn HttpTransport>>,
        sink: EventSink,
    ) -> Result<Self> {
        let runtime = RuntimeBuilder::new_multi_thread()
            .worker_threads(options.worker_threads)
            .thread_name("netbridge-io")
            .enable_all()
            .build()?;

        let socket_transport: Arc<dyn SocketTransport> = match socket_transport {
            Some(transport) => transport,
            None => Arc::new(
                TungsteniteTransport::new(runtime.handle().clone())
                    .with_max_message_size(options.max_message_size),
            ),
        };

        let http_transport: Arc<dyn HttpTransport> = match http_transport {
            Some(transport) => transport,
            None => {
                let _guard = runtime.enter();
                Arc::new(ReqwestTransport::new(
                    runtime.handle().clone(),
                    options.user_agent.as_deref(),
                )?)
            }
        };

        let (queue, receiver) = mpsc::unbounded_channel();
        let registry = Arc::new(SessionRegistry::new(
            socket_transport,
            http_transport,
            queue.clone(),
        ));
        let dispatcher = Dispatcher::spawn(Arc::clone(&registry), queue, receiver, sink)?;

        debug!(
            worker_threads = options.worker_threads,
            max_message_size = ?options.max_message_size,
            "Bridge initialized"
        );

        Ok(Self {
            registry,
            dispatcher,
            runtime: Some(runtime),
            options,
        })
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Tests
// ============================================================================
