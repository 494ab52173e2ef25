//! Type-safe identifiers for bridge sessions.
//!
//! Newtype wrappers keep socket handles, HTTP request ids and host tokens
//! from being mixed up at compile time.
//!
//! | Type | Names | Issued by |
//! |------|-------|-----------|
//! | [`Handle`] | a live WebSocket session | [`SessionTable`](crate::registry::SessionTable) |
//! | [`RequestId`] | an in-flight HTTP request | process-wide counter |
//! | [`UserContext`] | host-supplied opaque token | the host |

// ============================================================================
// Imports
// ============================================================================

use std::ffi::c_void;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Handle
// ============================================================================

/// Opaque identifier of a WebSocket session.
///
/// A handle is a slot index plus the generation the slot had when the
/// session was inserted. Retiring a session bumps the slot generation, so a
/// stale copy of the handle never matches the slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Creates a handle from its parts.
    ///
    /// Returns `None` for generation 0, which is never issued.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Option<Self> {
        if generation == 0 {
            None
        } else {
            Some(Self { index, generation })
        }
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the slot generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Packs the handle into the `u64` used across the C ABI.
    ///
    /// The result is never 0.
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Unpacks a raw handle. Returns `None` for values never issued.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Option<Self> {
        Self::new(raw as u32, (raw >> 32) as u32)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

// ============================================================================
// RequestId
// ============================================================================

/// Counter backing [`RequestId::next`]. Starts at 1.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a one-shot HTTP request.
///
/// Ids are drawn from a process-wide counter and never repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    /// Allocates the next request id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the numeric value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

// ============================================================================
// UserContext
// ============================================================================

/// Opaque token supplied by the host at open/fetch time.
///
/// The bridge never dereferences it; it is only handed back in events.
/// Stored as an integer so it can travel between threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UserContext(usize);

impl UserContext {
    /// Wraps a raw token value.
    #[inline]
    #[must_use]
    pub const fn new(value: usize) -> Self {
        Self(value)
    }

    /// Returns the raw token value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> usize {
        self.0
    }

    /// Wraps a host pointer.
    #[inline]
    #[must_use]
    pub fn from_ptr(ptr: *mut c_void) -> Self {
        Self(ptr as usize)
    }

    /// Returns the token as the host pointer it came from.
    #[inline]
    #[must_use]
    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

impl fmt::Display for UserContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_raw_round_trip() {
        let handle = Handle::new(7, 3).expect("valid handle");
        let raw = handle.to_raw();
        assert_eq!(raw, (3u64 << 32) | 7);
        assert_eq!(Handle::from_raw(raw), Some(handle));
    }

    #[test]
    fn test_handle_rejects_generation_zero() {
        assert!(Handle::new(5, 0).is_none());
        assert!(Handle::from_raw(0).is_none());
        assert!(Handle::from_raw(42).is_none());
    }

    #[test]
    fn test_handle_display() {
        let handle = Handle::new(2, 9).expect("valid handle");
        assert_eq!(handle.to_string(), "2v9");
    }

    #[test]
    fn test_request_id_monotonic() {
        let a = RequestId::next();
        let b = RequestId::next();
        assert!(b > a);
        assert_ne!(a, b);
    }

    #[test]
    fn test_user_context_pointer_round_trip() {
        let ctx = UserContext::new(7);
        assert_eq!(UserContext::from_ptr(ctx.as_ptr()), ctx);
        assert_eq!(ctx.value(), 7);
    }
}
