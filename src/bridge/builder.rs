//! Builder pattern for bridge configuration.
//!
//! # Example
//!
//! ```ignore
//! use netbridge::{Bridge, Event};
//!
//! let bridge = Bridge::builder()
//!     .worker_threads(1)
//!     .user_agent("host/1.0")
//!     .event_sink(|event: &Event| println!("{event:?}"))
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::dispatch::EventSink;
use crate::error::{Error, Result};
use crate::protocol::Event;
use crate::transport::{HttpTransport, SocketTransport};

use super::core::Bridge;
use super::options::BridgeOptions;

// ============================================================================
// BridgeBuilder
// ============================================================================

/// Builder for configuring a [`Bridge`].
///
/// Use [`Bridge::builder()`] to create a new builder. An event sink is
/// required; transports default to tokio-tungstenite and reqwest.
#[derive(Default)]
pub struct BridgeBuilder {
    options: BridgeOptions,
    socket_transport: Option<Arc<dyn SocketTransport>>,
    http_transport: Option<Arc<dyn HttpTransport>>,
    sink: Option<EventSink>,
}

impl fmt::Debug for BridgeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeBuilder")
            .field("options", &self.options)
            .field("socket_transport", &self.socket_transport.is_some())
            .field("http_transport", &self.http_transport.is_some())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

// ============================================================================
// BridgeBuilder Implementation
// ============================================================================

impl BridgeBuilder {
    /// Creates a builder with default options and no sink.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the tokio worker thread count.
    #[inline]
    #[must_use]
    pub fn worker_threads(mut self, worker_threads: usize) -> Self {
        self.options.worker_threads = worker_threads;
        self
    }

    /// Sets the HTTP `User-Agent`.
    #[inline]
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.options.user_agent = Some(user_agent.into());
        self
    }

    /// Limits incoming WebSocket message size.
    #[inline]
    #[must_use]
    pub fn max_message_size(mut self, max_message_size: usize) -> Self {
        self.options.max_message_size = Some(max_message_size);
        self
    }

    /// Uses a custom WebSocket transport.
    #[inline]
    #[must_use]
    pub fn socket_transport(mut self, transport: Arc<dyn SocketTransport>) -> Self {
        self.socket_transport = Some(transport);
        self
    }

    /// Uses a custom HTTP transport.
    #[inline]
    #[must_use]
    pub fn http_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.http_transport = Some(transport);
        self
    }

    /// Uses one value as both transports.
    #[must_use]
    pub fn transport<T>(self, transport: T) -> Self
    where
        T: SocketTransport + HttpTransport + 'static,
    {
        let transport = Arc::new(transport);
        self.socket_transport(Arc::clone(&transport) as Arc<dyn SocketTransport>)
            .http_transport(transport)
    }

    /// Sets the callback receiving every event.
    ///
    /// Called on the delivery thread, one event at a time.
    #[inline]
    #[must_use]
    pub fn event_sink(mut self, sink: impl FnMut(&Event) + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Builds the bridge with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no sink is set or an option is invalid
    /// - [`Error::Io`] if the runtime or delivery thread cannot start
    pub fn build(self) -> Result<Bridge> {
        self.options.validate()?;

        let sink = self.sink.ok_or_else(|| {
            Error::config(
                "Event sink is required. Use .event_sink() to set it.\n\
                 Example: Bridge::builder().event_sink(|event| println!(\"{event:?}\"))",
            )
        })?;

        Bridge::new(
            self.options,
            self.socket_transport,
            self.http_transport,
            sink,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
