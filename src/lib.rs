//! Netbridge - WebSocket and HTTP sessions for embedding hosts.
//!
//! This library gives a host application (a UI shell, a game loop, a core
//! written in another language) asynchronous networking through a small,
//! handle-based surface: open a socket, send, close, fetch a URL. Results
//! come back as events through one callback.
//!
//! # Architecture
//!
//! ```text
//! host ──open/send/close/fetch──► SessionRegistry ──connect/write/request──► transports
//!  ▲                                    │  ▲                                    │
//!  │ Event                        apply │  │ Notification (unbounded queue)     │
//!  └──────── delivery thread ◄──────────┘  └────────────────────────────────────┘
//! ```
//!
//! Key design principles:
//!
//! - Sessions are addressed by generation-tagged [`Handle`]s; a retired
//!   handle is never reissued, so stale calls fail with
//!   [`Error::UnknownHandle`] instead of reaching another session
//! - Transports never touch session state; they only enqueue notifications
//! - One delivery thread applies notifications in order and calls the sink
//!   without holding any lock, so the sink may call back into the bridge
//! - Every session gets exactly one terminal event
//!
//! # Quick Start
//!
//! ```no_run
//! use netbridge::{Bridge, Event, Result, UserContext};
//!
//! fn main() -> Result<()> {
//!     let bridge = Bridge::builder()
//!         .event_sink(|event: &Event| println!("{:?}", event))
//!         .build()?;
//!
//!     let handle = bridge.open_socket("wss://echo.example/", UserContext::new(1))?;
//!     bridge.fetch("https://example.com/", UserContext::new(2))?;
//!
//!     // Later, after SocketOpen arrived:
//!     bridge.send(handle, "ping")?;
//!     bridge.close(handle, 1000, "bye")?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | Composition root: [`Bridge`], [`BridgeBuilder`], [`BridgeOptions`] |
//! | [`dispatch`] | Ordered delivery thread |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`ffi`] | C ABI |
//! | [`identifiers`] | [`Handle`], [`RequestId`], [`UserContext`] |
//! | [`logging`] | Optional tracing-subscriber installation |
//! | [`protocol`] | Events, payloads and transport notifications |
//! | [`registry`] | Session registry and generational table |
//! | [`translator`] | Notification-to-event state machine |
//! | [`transport`] | Transport traits, tokio-tungstenite, reqwest and in-memory transports |

// ============================================================================
// Modules
// ============================================================================

/// Composition root.
///
/// Use [`Bridge::builder()`] to create a configured bridge.
pub mod bridge;

/// Ordered event delivery.
pub mod dispatch;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// C ABI for non-Rust hosts.
pub mod ffi;

/// Type-safe identifiers for sessions and host tokens.
pub mod identifiers;

/// Optional log output.
pub mod logging;

/// Events, payloads and transport notifications.
pub mod protocol;

/// Session registry.
pub mod registry;

/// Notification-to-event translation.
pub mod translator;

/// Transport adapters.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{Bridge, BridgeBuilder, BridgeOptions};

// Delivery types
pub use dispatch::EventSink;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{Handle, RequestId, UserContext};

// Logging
pub use logging::init_logging;

// Protocol types
pub use protocol::{Event, EventKind, Payload};

// Registry types
pub use registry::{SessionRegistry, SocketState};

// Transport types
pub use transport::{
    HttpCompleter, HttpTransport, MemoryTransport, ReqwestTransport, SocketConnection,
    SocketNotifier, SocketTransport, TungsteniteTransport,
};
