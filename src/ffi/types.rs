//! C-compatible data types.

// ============================================================================
// Imports
// ============================================================================

use std::ffi::{c_char, c_void};
use std::ptr;

use tracing::warn;

use crate::bridge::Bridge;
use crate::protocol::{Event, EventKind};

// ============================================================================
// Status Codes
// ============================================================================

/// Call succeeded.
pub const NETBRIDGE_OK: i32 = 0;
/// URL did not parse or has the wrong scheme.
pub const NETBRIDGE_INVALID_URL: i32 = -1;
/// Handle is not live.
pub const NETBRIDGE_UNKNOWN_HANDLE: i32 = -2;
/// Null pointer or non-UTF-8 string.
pub const NETBRIDGE_INVALID_ARGUMENT: i32 = -3;
/// Anything else, including a caught panic.
pub const NETBRIDGE_INTERNAL_ERROR: i32 = -4;

// ============================================================================
// NetbridgeEvent
// ============================================================================

/// Event as seen by a C host.
///
/// `data` points at the message, close reason or response body and is
/// valid only for the duration of the callback. It is null when there is
/// nothing to carry.
#[repr(C)]
#[derive(Debug)]
pub struct NetbridgeEvent {
    pub kind: EventKind,
    /// Raw socket handle, 0 for HTTP events.
    pub handle: u64,
    pub user_context: *mut c_void,
    /// HTTP status, -1 for an HTTP transport failure, close code for
    /// `SocketClose`, 0 otherwise.
    pub status_code: i32,
    pub data: *const u8,
    pub data_length: i32,
}

impl NetbridgeEvent {
    /// Borrows `event` into the C layout.
    pub(crate) fn borrow(event: &Event) -> Self {
        let data = event.data();
        let (data_ptr, data_length) = if data.is_empty() {
            (ptr::null(), 0)
        } else {
            (data.as_ptr(), data_length(data.len()))
        };

        Self {
            kind: event.kind(),
            handle: event.handle().map_or(0, |handle| handle.to_raw()),
            user_context: event.user_context().as_ptr(),
            status_code: event.status_code(),
            data: data_ptr,
            data_length,
        }
    }
}

/// Converts a payload length to the C field, clamping at `i32::MAX`.
///
/// HTTP bodies are capped before they get here; a socket message this large
/// needs `max_message_size` left unset.
fn data_length(len: usize) -> i32 {
    i32::try_from(len).unwrap_or_else(|_| {
        warn!(len, delivered = i32::MAX, "Event data truncated for C host");
        i32::MAX
    })
}

// ============================================================================
// Callbacks
// ============================================================================

/// Host event callback. Receives the context given to `netbridge_new`.
pub type NetbridgeEventCallback =
    Option<unsafe extern "C" fn(context: *mut c_void, event: *const NetbridgeEvent)>;

/// Sink forwarding events to a C callback.
pub(crate) struct HostSink {
    callback: unsafe extern "C" fn(*mut c_void, *const NetbridgeEvent),
    context: *mut c_void,
}

// SAFETY: the host guarantees `context` may be used from the delivery
// thread; the bridge only ever passes it back to `callback`.
unsafe impl Send for HostSink {}

impl HostSink {
    pub(crate) fn new(
        callback: unsafe extern "C" fn(*mut c_void, *const NetbridgeEvent),
        context: *mut c_void,
    ) -> Self {
        Self { callback, context }
    }

    pub(crate) fn deliver(&self, event: &Event) {
        let raw = NetbridgeEvent::borrow(event);
        // SAFETY: `raw` and the bytes it points at outlive the call.
        unsafe { (self.callback)(self.context, &raw) };
    }
}

// ============================================================================
// NetbridgeOps
// ============================================================================

/// Function table a host core stores and calls through.
///
/// Every entry takes `opaque_ptr` as its first argument.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NetbridgeOps {
    pub opaque_ptr: *mut c_void,
    pub socket_open: unsafe extern "C" fn(
        opaque: *mut c_void,
        url: *const c_char,
        user_context: *mut c_void,
        out_handle: *mut u64,
    ) -> i32,
    pub socket_send: unsafe extern "C" fn(opaque: *mut c_void, handle: u64, text: *const c_char) -> i32,
    pub socket_send_binary:
        unsafe extern "C" fn(opaque: *mut c_void, handle: u64, data: *const u8, length: usize) -> i32,
    pub socket_close: unsafe extern "C" fn(
        opaque: *mut c_void,
        handle: u64,
        code: u16,
        reason: *const c_char,
    ) -> i32,
    pub http_fetch:
        unsafe extern "C" fn(opaque: *mut c_void, url: *const c_char, user_context: *mut c_void) -> i32,
}

impl NetbridgeOps {
    pub(crate) fn for_bridge(bridge: *const Bridge) -> Self {
        Self {
            opaque_ptr: bridge.cast_mut().cast(),
            socket_open: super::ops_socket_open,
            socket_send: super::ops_socket_send,
            socket_send_binary: super::ops_socket_send_binary,
            socket_close: super::ops_socket_close,
            http_fetch: super::ops_http_fetch,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
