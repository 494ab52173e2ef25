//! Message types flowing through the bridge.
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | `SocketNotification` | Transport → Registry | What a socket observed |
//! | `HttpCompletion` | Transport → Registry | How a request ended |
//! | `Notification` | Transport → Delivery thread | Queue item |
//! | `Event` | Bridge → Host | Normalized event |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Event, EventKind and Payload |
//! | `notification` | Raw transport notifications |

// ============================================================================
// Submodules
// ============================================================================

/// Event types delivered to the host.
pub mod event;

/// Raw transport notifications.
pub mod notification;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{CLOSE_CODE_NO_STATUS, Event, EventKind, HTTP_TRANSPORT_FAILURE, Payload};
pub use notification::{HttpCompletion, Notification, SocketNotification};
