//! C ABI.
//!
//! A host that is not written in Rust drives the bridge through these
//! functions and receives [`NetbridgeEvent`]s through a single callback.
//!
//! | Function | Returns |
//! |----------|---------|
//! | `netbridge_new(config_json, callback, context)` | bridge pointer, null on failure |
//! | `netbridge_free(bridge)` | closes every session, then frees |
//! | `netbridge_ops(bridge)` | [`NetbridgeOps`] function table |
//! | `netbridge_socket_open(bridge, url, user_context, out_handle)` | status |
//! | `netbridge_socket_send(bridge, handle, text)` | status |
//! | `netbridge_socket_send_binary(bridge, handle, data, length)` | status |
//! | `netbridge_socket_close(bridge, handle, code, reason)` | status |
//! | `netbridge_http_fetch(bridge, url, user_context)` | status |
//! | `netbridge_init_logging(filter)` | status |
//!
//! Status is one of the `NETBRIDGE_*` constants. No call blocks on the
//! network and no panic crosses the boundary.
//!
//! The callback runs on the bridge's delivery thread and may call any
//! function here except `netbridge_free`.

// ============================================================================
// Imports
// ============================================================================

use std::ffi::{CStr, c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::slice;

use bytes::Bytes;
use tracing::{debug, error};

use crate::bridge::{Bridge, BridgeBuilder, BridgeOptions};
use crate::error::{Error, Result};
use crate::identifiers::{Handle, UserContext};
use crate::logging;

// ============================================================================
// Submodules
// ============================================================================

/// C-compatible data types.
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use types::{
    NETBRIDGE_INTERNAL_ERROR, NETBRIDGE_INVALID_ARGUMENT, NETBRIDGE_INVALID_URL, NETBRIDGE_OK,
    NETBRIDGE_UNKNOWN_HANDLE, NetbridgeEvent, NetbridgeEventCallback, NetbridgeOps,
};

use types::HostSink;

// ============================================================================
// Lifecycle
// ============================================================================

/// Creates a bridge.
///
/// `config_json` is a JSON object of bridge options, or null for defaults.
/// Returns null if the options are invalid, `callback` is null, or the
/// runtime cannot start.
///
/// # Safety
///
/// `config_json` must be null or a valid NUL-terminated string. `context`
/// is passed back to `callback` from the delivery thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn netbridge_new(
    config_json: *const c_char,
    callback: NetbridgeEventCallback,
    context: *mut c_void,
) -> *mut Bridge {
    guard(ptr::null_mut(), || {
        let result = (|| -> Result<Bridge> {
            let options = if config_json.is_null() {
                BridgeOptions::default()
            } else {
                // SAFETY: non-null, caller guarantees NUL termination.
                BridgeOptions::from_json(unsafe { str_arg(config_json, "config_json") }?)?
            };
            let callback = callback.ok_or_else(|| Error::invalid_argument("callback is null"))?;

            host_bridge(
                Bridge::builder().options(options),
                HostSink::new(callback, context),
            )
        })();

        match result {
            Ok(bridge) => Box::into_raw(Box::new(bridge)),
            Err(e) => {
                error!(error = %e, "netbridge_new failed");
                ptr::null_mut()
            }
        }
    })
}

/// Shuts a bridge down and frees it.
///
/// Every open session receives its terminal event before this returns.
/// Null is ignored.
///
/// # Safety
///
/// `bridge` must come from `netbridge_new` and not be used afterwards.
/// Must not be called from the event callback.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn netbridge_free(bridge: *mut Bridge) {
    if bridge.is_null() {
        return;
    }
    guard((), || {
        // SAFETY: caller passes ownership of a pointer from `netbridge_new`.
        drop(unsafe { Box::from_raw(bridge) });
    });
}

/// Returns the function table for `bridge`.
///
/// The table is valid for as long as `bridge` is.
#[unsafe(no_mangle)]
pub extern "C" fn netbridge_ops(bridge: *const Bridge) -> NetbridgeOps {
    NetbridgeOps::for_bridge(bridge)
}

/// Installs a stderr log subscriber. `filter` may be null.
///
/// # Safety
///
/// `filter` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn netbridge_init_logging(filter: *const c_char) -> i32 {
    guard(NETBRIDGE_INTERNAL_ERROR, || {
        status((|| -> Result<()> {
            let filter = if filter.is_null() {
                None
            } else {
                // SAFETY: non-null, caller guarantees NUL termination.
                Some(unsafe { str_arg(filter, "filter") }?)
            };
            logging::init_logging(filter)
        })())
    })
}

// ============================================================================
// Socket Operations
// ============================================================================

/// Opens a WebSocket and writes its handle to `out_handle`.
///
/// # Safety
///
/// `bridge` must be live, `url` a valid NUL-terminated string and
/// `out_handle` writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn netbridge_socket_open(
    bridge: *const Bridge,
    url: *const c_char,
    user_context: *mut c_void,
    out_handle: *mut u64,
) -> i32 {
    guard(NETBRIDGE_INTERNAL_ERROR, || {
        status((|| -> Result<()> {
            // SAFETY: forwarded caller guarantees.
            let bridge = unsafe { bridge_arg(bridge) }?;
            let url = unsafe { str_arg(url, "url") }?;
            if out_handle.is_null() {
                return Err(Error::invalid_argument("out_handle is null"));
            }

            let handle = bridge.open_socket(url, UserContext::from_ptr(user_context))?;
            // SAFETY: checked non-null above.
            unsafe { out_handle.write(handle.to_raw()) };
            Ok(())
        })())
    })
}

/// Sends a text message.
///
/// # Safety
///
/// `bridge` must be live and `text` a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn netbridge_socket_send(
    bridge: *const Bridge,
    handle: u64,
    text: *const c_char,
) -> i32 {
    guard(NETBRIDGE_INTERNAL_ERROR, || {
        status((|| -> Result<()> {
            // SAFETY: forwarded caller guarantees.
            let bridge = unsafe { bridge_arg(bridge) }?;
            let text = unsafe { str_arg(text, "text") }?;
            bridge.send(handle_arg(handle)?, text)
        })())
    })
}

/// Sends a binary message. `data` may be null when `length` is 0.
///
/// # Safety
///
/// `bridge` must be live and `data` readable for `length` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn netbridge_socket_send_binary(
    bridge: *const Bridge,
    handle: u64,
    data: *const u8,
    length: usize,
) -> i32 {
    guard(NETBRIDGE_INTERNAL_ERROR, || {
        status((|| -> Result<()> {
            // SAFETY: forwarded caller guarantees.
            let bridge = unsafe { bridge_arg(bridge) }?;
            let payload = match (data.is_null(), length) {
                (_, 0) => Bytes::new(),
                (true, _) => return Err(Error::invalid_argument("data is null")),
                // SAFETY: caller guarantees `length` readable bytes.
                (false, _) => Bytes::copy_from_slice(unsafe { slice::from_raw_parts(data, length) }),
            };
            bridge.send(handle_arg(handle)?, payload)
        })())
    })
}

/// Starts closing a socket. `reason` may be null.
///
/// # Safety
///
/// `bridge` must be live and `reason` null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn netbridge_socket_close(
    bridge: *const Bridge,
    handle: u64,
    code: u16,
    reason: *const c_char,
) -> i32 {
    guard(NETBRIDGE_INTERNAL_ERROR, || {
        status((|| -> Result<()> {
            // SAFETY: forwarded caller guarantees.
            let bridge = unsafe { bridge_arg(bridge) }?;
            let reason = if reason.is_null() {
                ""
            } else {
                unsafe { str_arg(reason, "reason") }?
            };
            bridge.close(handle_arg(handle)?, code, reason)
        })())
    })
}

// ============================================================================
// HTTP Operations
// ============================================================================

/// Starts an HTTP GET.
///
/// # Safety
///
/// `bridge` must be live and `url` a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn netbridge_http_fetch(
    bridge: *const Bridge,
    url: *const c_char,
    user_context: *mut c_void,
) -> i32 {
    guard(NETBRIDGE_INTERNAL_ERROR, || {
        status((|| -> Result<()> {
            // SAFETY: forwarded caller guarantees.
            let bridge = unsafe { bridge_arg(bridge) }?;
            let url = unsafe { str_arg(url, "url") }?;
            bridge.fetch(url, UserContext::from_ptr(user_context))?;
            Ok(())
        })())
    })
}

// ============================================================================
// Function Table Entries
// ============================================================================

pub(crate) unsafe extern "C" fn ops_socket_open(
    opaque: *mut c_void,
    url: *const c_char,
    user_context: *mut c_void,
    out_handle: *mut u64,
) -> i32 {
    // SAFETY: `opaque` is the bridge the table was made for.
    unsafe { netbridge_socket_open(opaque.cast(), url, user_context, out_handle) }
}

pub(crate) unsafe extern "C" fn ops_socket_send(
    opaque: *mut c_void,
    handle: u64,
    text: *const c_char,
) -> i32 {
    // SAFETY: as above.
    unsafe { netbridge_socket_send(opaque.cast(), handle, text) }
}

pub(crate) unsafe extern "C" fn ops_socket_send_binary(
    opaque: *mut c_void,
    handle: u64,
    data: *const u8,
    length: usize,
) -> i32 {
    // SAFETY: as above.
    unsafe { netbridge_socket_send_binary(opaque.cast(), handle, data, length) }
}

pub(crate) unsafe extern "C" fn ops_socket_close(
    opaque: *mut c_void,
    handle: u64,
    code: u16,
    reason: *const c_char,
) -> i32 {
    // SAFETY: as above.
    unsafe { netbridge_socket_close(opaque.cast(), handle, code, reason) }
}

pub(crate) unsafe extern "C" fn ops_http_fetch(
    opaque: *mut c_void,
    url: *const c_char,
    user_context: *mut c_void,
) -> i32 {
    // SAFETY: as above.
    unsafe { netbridge_http_fetch(opaque.cast(), url, user_context) }
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds a bridge delivering to a C callback.
fn host_bridge(builder: BridgeBuilder, sink: HostSink) -> Result<Bridge> {
    builder.event_sink(move |event| sink.deliver(event)).build()
}

/// Runs `f`, turning a panic into `fallback`.
fn guard<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        error!("Panic caught at FFI boundary");
        fallback
    })
}

fn status(result: Result<()>) -> i32 {
    match result {
        Ok(()) => NETBRIDGE_OK,
        Err(e) => {
            debug!(error = %e, "FFI call rejected");
            e.status_code()
        }
    }
}

/// # Safety
///
/// `ptr` must be null or point at a live bridge.
unsafe fn bridge_arg<'a>(ptr: *const Bridge) -> Result<&'a Bridge> {
    // SAFETY: forwarded.
    unsafe { ptr.as_ref() }.ok_or_else(|| Error::invalid_argument("bridge is null"))
}

/// # Safety
///
/// `ptr` must be null or a valid NUL-terminated string outliving `'a`.
unsafe fn str_arg<'a>(ptr: *const c_char, name: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(Error::invalid_argument(format!("{name} is null")));
    }
    // SAFETY: forwarded.
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| Error::invalid_argument(format!("{name} is not valid UTF-8")))
}

/// Raw 0 (and any zero generation) was never issued.
fn handle_arg(raw: u64) -> Result<Handle> {
    Handle::from_raw(raw)
        .ok_or_else(|| Error::invalid_argument(format!("handle {raw:#x} was never issued")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::ffi::CString;
    use std::net::TcpListener;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::thread;
    use std::time::Duration;

    use tokio_tungstenite::tungstenite;

    use crate::protocol::EventKind;
    use crate::transport::MemoryTransport;

    /// Owned copy of a [`NetbridgeEvent`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Received {
        kind: EventKind,
        handle: u64,
        user_context: usize,
        status_code: i32,
        data: Vec<u8>,
    }

    struct Collector {
        tx: Sender<Received>,
    }

    unsafe extern "C" fn collect(context: *mut c_void, event: *const NetbridgeEvent) {
        // SAFETY: tests pass a live `Collector` and the bridge a live event.
        let (collector, event) = unsafe { (&*(context as *const Collector), &*event) };
        let data = if event.data.is_null() {
            Vec::new()
        } else {
            // SAFETY: valid for the duration of the callback.
            unsafe { slice::from_raw_parts(event.data, event.data_length as usize) }.to_vec()
        };
        let _ = collector.tx.send(Received {
            kind: event.kind,
            handle: event.handle,
            user_context: event.user_context as usize,
            status_code: event.status_code,
            data,
        });
    }

    struct Host {
        bridge: *mut Bridge,
        rx: Receiver<Received>,
        // Must outlive the bridge.
        _collector: Box<Collector>,
    }

    impl Host {
        fn with_builder(builder: BridgeBuilder) -> Self {
            let (tx, rx) = mpsc::channel();
            let collector = Box::new(Collector { tx });
            let context = (&*collector as *const Collector).cast_mut().cast();
            let bridge = host_bridge(builder, HostSink::new(collect, context)).expect("bridge");
            Self {
                bridge: Box::into_raw(Box::new(bridge)),
                rx,
                _collector: collector,
            }
        }

        fn memory(transport: &MemoryTransport) -> Self {
            Self::with_builder(Bridge::builder().worker_threads(1).transport(transport.clone()))
        }

        fn recv(&self) -> Received {
            self.rx.recv_timeout(Duration::from_secs(5)).expect("event")
        }

        fn open(&self, url: &str, context: usize) -> (i32, u64) {
            let url = CString::new(url).expect("url");
            let mut handle = 0u64;
            // SAFETY: live bridge, valid string, writable out pointer.
            let status = unsafe {
                netbridge_socket_open(self.bridge, url.as_ptr(), context as *mut c_void, &mut handle)
            };
            (status, handle)
        }
    }

    impl Drop for Host {
        fn drop(&mut self) {
            // SAFETY: created by `with_builder`, freed once.
            unsafe { netbridge_free(self.bridge) };
        }
    }

    fn handle_of(raw: u64) -> Handle {
        Handle::from_raw(raw).expect("issued handle")
    }

    #[test]
    fn test_new_with_defaults_and_free() {
        let (tx, _rx) = mpsc::channel();
        let collector = Collector { tx };
        let context = (&collector as *const Collector).cast_mut().cast();

        // SAFETY: null config, live context.
        let bridge = unsafe { netbridge_new(ptr::null(), Some(collect), context) };
        assert!(!bridge.is_null());
        // SAFETY: from netbridge_new.
        unsafe { netbridge_free(bridge) };
    }

    #[test]
    fn test_new_rejects_bad_input() {
        let bad = CString::new(r#"{"worker_threads": 0}"#).expect("json");
        let malformed = CString::new("{").expect("json");

        // SAFETY: valid strings or null.
        unsafe {
            assert!(netbridge_new(bad.as_ptr(), Some(collect), ptr::null_mut()).is_null());
            assert!(netbridge_new(malformed.as_ptr(), Some(collect), ptr::null_mut()).is_null());
            assert!(netbridge_new(ptr::null(), None, ptr::null_mut()).is_null());
            netbridge_free(ptr::null_mut());
        }
    }

    #[test]
    fn test_socket_lifecycle() {
        let transport = MemoryTransport::new();
        let host = Host::memory(&transport);

        let (status, raw) = host.open("wss://example/echo", 7);
        assert_eq!(status, NETBRIDGE_OK);
        assert_ne!(raw, 0);
        let handle = handle_of(raw);

        transport.connected(handle);
        let opened = host.recv();
        assert_eq!(opened.kind, EventKind::SocketOpen);
        assert_eq!(opened.handle, raw);
        assert_eq!(opened.user_context, 7);

        let ping = CString::new("ping").expect("text");
        let bytes = [1u8, 2, 3];
        // SAFETY: live bridge, valid buffers.
        unsafe {
            assert_eq!(netbridge_socket_send(host.bridge, raw, ping.as_ptr()), NETBRIDGE_OK);
            assert_eq!(
                netbridge_socket_send_binary(host.bridge, raw, bytes.as_ptr(), bytes.len()),
                NETBRIDGE_OK
            );
        }
        assert_eq!(transport.writes(handle).len(), 2);

        transport.message(handle, "pong");
        assert_eq!(host.recv().data, b"pong");

        let reason = CString::new("bye").expect("reason");
        // SAFETY: live bridge, valid string.
        assert_eq!(
            unsafe { netbridge_socket_close(host.bridge, raw, 1000, reason.as_ptr()) },
            NETBRIDGE_OK
        );
        transport.disconnected(handle, 1000, "bye");

        let closed = host.recv();
        assert_eq!(closed.kind, EventKind::SocketClose);
        assert_eq!(closed.status_code, 1000);
        assert_eq!(closed.data, b"bye");

        // SAFETY: live bridge, valid string.
        assert_eq!(
            unsafe { netbridge_socket_send(host.bridge, raw, ping.as_ptr()) },
            NETBRIDGE_UNKNOWN_HANDLE
        );
    }

    #[test]
    fn test_invalid_arguments() {
        let transport = MemoryTransport::new();
        let host = Host::memory(&transport);
        let text = CString::new("x").expect("text");

        assert_eq!(host.open("ftp://example/", 1).0, NETBRIDGE_INVALID_URL);
        assert_eq!(transport.connect_count(), 0);

        // SAFETY: every pointer is null or valid.
        unsafe {
            let mut handle = 0u64;
            assert_eq!(
                netbridge_socket_open(ptr::null(), text.as_ptr(), ptr::null_mut(), &mut handle),
                NETBRIDGE_INVALID_ARGUMENT
            );
            assert_eq!(
                netbridge_socket_open(host.bridge, ptr::null(), ptr::null_mut(), &mut handle),
                NETBRIDGE_INVALID_ARGUMENT
            );
            assert_eq!(
                netbridge_socket_send(host.bridge, 0, text.as_ptr()),
                NETBRIDGE_INVALID_ARGUMENT
            );
            assert_eq!(
                netbridge_socket_send_binary(host.bridge, 1 << 32, ptr::null(), 4),
                NETBRIDGE_INVALID_ARGUMENT
            );
            assert_eq!(
                netbridge_socket_close(host.bridge, (1 << 32) | 5, 1000, ptr::null()),
                NETBRIDGE_UNKNOWN_HANDLE
            );
            assert_eq!(
                netbridge_http_fetch(host.bridge, ptr::null(), ptr::null_mut()),
                NETBRIDGE_INVALID_ARGUMENT
            );
        }
    }

    #[test]
    fn test_non_utf8_is_invalid_argument() {
        let transport = MemoryTransport::new();
        let host = Host::memory(&transport);
        let url = CString::new(vec![b'w', b's', 0xff]).expect("no interior NUL");
        let mut handle = 0u64;

        // SAFETY: valid NUL-terminated bytes.
        let status = unsafe {
            netbridge_socket_open(host.bridge, url.as_ptr(), ptr::null_mut(), &mut handle)
        };
        assert_eq!(status, NETBRIDGE_INVALID_ARGUMENT);
    }

    #[test]
    fn test_http_through_ops_table() {
        let transport = MemoryTransport::new();
        let host = Host::memory(&transport);
        let ops = netbridge_ops(host.bridge);
        assert_eq!(ops.opaque_ptr, host.bridge.cast::<c_void>());

        let ok = CString::new("https://example/404").expect("url");
        let down = CString::new("http://example/down").expect("url");
        // SAFETY: table for a live bridge, valid strings.
        unsafe {
            assert_eq!((ops.http_fetch)(ops.opaque_ptr, ok.as_ptr(), 3usize as *mut c_void), NETBRIDGE_OK);
            assert_eq!((ops.http_fetch)(ops.opaque_ptr, down.as_ptr(), 4usize as *mut c_void), NETBRIDGE_OK);
        }

        transport.respond("https://example/404", 404, "");
        let success = host.recv();
        assert_eq!(success.kind, EventKind::HttpSuccess);
        assert_eq!(success.status_code, 404);
        assert_eq!(success.user_context, 3);
        assert!(success.data.is_empty());

        transport.fail_request("http://example/down", "unreachable");
        let failure = host.recv();
        assert_eq!(failure.kind, EventKind::HttpError);
        assert_eq!(failure.status_code, -1);
        assert_eq!(failure.user_context, 4);
    }

    #[test]
    fn test_free_delivers_terminal_events() {
        let transport = MemoryTransport::new();
        let mut host = Host::memory(&transport);
        let (status, raw) = host.open("wss://example/a", 9);
        assert_eq!(status, NETBRIDGE_OK);

        // SAFETY: freed once; Drop then sees null.
        unsafe { netbridge_free(host.bridge) };
        host.bridge = ptr::null_mut();

        let terminal = host.recv();
        assert_eq!(terminal.kind, EventKind::SocketError);
        assert_eq!(terminal.handle, raw);
    }

    /// Echo server on a plain thread using tungstenite's blocking API.
    fn blocking_echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();

        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                let Ok(mut ws) = tungstenite::accept(stream) else {
                    return;
                };
                while let Ok(message) = ws.read() {
                    if (message.is_text() || message.is_binary()) && ws.send(message).is_err() {
                        break;
                    }
                }
            }
        });

        format!("ws://127.0.0.1:{port}/echo")
    }

    #[test]
    fn test_loopback_echo() {
        let url = blocking_echo_server();
        let host = Host::with_builder(Bridge::builder().worker_threads(1));

        let (status, raw) = host.open(&url, 11);
        assert_eq!(status, NETBRIDGE_OK);
        assert_eq!(host.recv().kind, EventKind::SocketOpen);

        let ping = CString::new("ping").expect("text");
        // SAFETY: live bridge, valid string.
        assert_eq!(unsafe { netbridge_socket_send(host.bridge, raw, ping.as_ptr()) }, NETBRIDGE_OK);

        let echoed = host.recv();
        assert_eq!(echoed.kind, EventKind::SocketMessage);
        assert_eq!(echoed.data, b"ping");
        assert_eq!(echoed.user_context, 11);

        // SAFETY: live bridge.
        assert_eq!(
            unsafe { netbridge_socket_close(host.bridge, raw, 1000, ptr::null()) },
            NETBRIDGE_OK
        );
        assert_eq!(host.recv().kind, EventKind::SocketClose);
    }

    #[test]
    fn test_refused_connection_reports_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let host = Host::with_builder(Bridge::builder().worker_threads(1));

        let (status, raw) = host.open(&format!("ws://127.0.0.1:{port}/"), 5);
        assert_eq!(status, NETBRIDGE_OK);

        let event = host.recv();
        assert_eq!(event.kind, EventKind::SocketError);
        assert_eq!(event.handle, raw);
        assert_eq!(event.user_context, 5);
    }

    #[test]
    fn test_init_logging_status() {
        let bad = CString::new("netbridge=loud").expect("filter");
        // SAFETY: valid string or null.
        unsafe {
            assert_eq!(netbridge_init_logging(bad.as_ptr()), NETBRIDGE_INTERNAL_ERROR);
            assert_eq!(netbridge_init_logging(ptr::null()), NETBRIDGE_OK);
        }
    }
}
