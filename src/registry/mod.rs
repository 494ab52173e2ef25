//! Session registry.
//!
//! Owns every live session and turns transport notifications into host
//! events.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SessionRegistry`] | Host operations and notification handling |
//! | [`SessionTable`] | Generational slab addressing sessions by [`Handle`](crate::Handle) |
//! | [`WebSocketSession`] | One socket and its lifecycle state |
//! | [`HttpSession`] | One in-flight HTTP request |
//! | [`SocketState`] | `Connecting → Open → Closing → Closed/Failed` |

// ============================================================================
// Submodules
// ============================================================================

/// Registry operations.
pub mod core;

/// Session records.
pub mod session;

/// Generational slab.
pub mod table;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::SessionRegistry;
pub use session::{HttpSession, SocketState, WebSocketSession};
pub use table::SessionTable;
