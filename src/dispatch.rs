//! Ordered event delivery.
//!
//! A single OS thread drains the notification queue, applies each
//! notification to the registry and hands the resulting event to the host
//! sink. Because there is exactly one consumer, events for a handle reach
//! the host in the order the transport reported them, and the sink is never
//! called concurrently with itself.
//!
//! The sink runs without any registry lock held, so it may call back into
//! the bridge (`send`, `close`, `open_socket`, `fetch`). Once shutdown has
//! begun, new sessions are refused.

// ============================================================================
// Imports
// ============================================================================

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, trace, warn};

use crate::error::Result;
use crate::protocol::{Event, Notification};
use crate::registry::SessionRegistry;

// ============================================================================
// Constants
// ============================================================================

/// Name of the delivery thread.
pub const DELIVERY_THREAD_NAME: &str = "netbridge-delivery";

// ============================================================================
// Types
// ============================================================================

/// Host callback receiving every event.
pub type EventSink = Box<dyn FnMut(&Event) + Send>;

// ============================================================================
// Dispatcher
// ============================================================================

/// Owns the delivery thread.
///
/// Dropping the dispatcher stops the thread after it has drained whatever
/// was queued before the stop request.
pub struct Dispatcher {
    queue: UnboundedSender<Notification>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("running", &self.thread.is_some())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Starts the delivery thread.
    ///
    /// `queue` must be the sending side of `receiver`; it is used to post
    /// the stop request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the thread cannot be spawned.
    pub fn spawn(
        registry: Arc<SessionRegistry>,
        queue: UnboundedSender<Notification>,
        receiver: UnboundedReceiver<Notification>,
        sink: EventSink,
    ) -> Result<Self> {
        let thread = thread::Builder::new()
            .name(DELIVERY_THREAD_NAME.to_owned())
            .spawn(move || run(&registry, receiver, sink))?;

        debug!(thread = DELIVERY_THREAD_NAME, "Delivery thread started");

        Ok(Self {
            queue,
            thread: Some(thread),
        })
    }

    /// Returns `true` while the delivery thread has not been stopped.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stops the delivery thread and waits for it.
    ///
    /// Notifications queued before this call are still delivered. Calling
    /// this from inside the sink only posts the stop request.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        let _ = self.queue.send(Notification::Shutdown);

        if thread.thread().id() == thread::current().id() {
            warn!("Dispatcher shut down from its own sink; not joining");
            return;
        }

        if thread.join().is_err() {
            error!("Delivery thread panicked");
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Delivery Loop
// ============================================================================

fn run(
    registry: &SessionRegistry,
    mut receiver: UnboundedReceiver<Notification>,
    mut sink: EventSink,
) {
    let mut delivered: u64 = 0;

    while let Some(notification) = receiver.blocking_recv() {
        if matches!(notification, Notification::Shutdown) {
            break;
        }

        let Some(event) = registry.apply(notification) else {
            continue;
        };

        match event.error() {
            Some(err) => debug!(kind = ?event.kind(), handle = ?event.handle(), error = %err, "Delivering failure"),
            None => trace!(kind = ?event.kind(), handle = ?event.handle(), "Delivering event"),
        }

        // A panicking host callback must not take delivery down with it.
        if panic::catch_unwind(AssertUnwindSafe(|| sink(&event))).is_err() {
            error!(kind = ?event.kind(), "Event sink panicked");
        }
        delivered += 1;
    }

    debug!(delivered, "Delivery thread stopped");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use crate::error::Error;
    use crate::identifiers::UserContext;
    use crate::protocol::EventKind;
    use crate::transport::MemoryTransport;

    struct Fixture {
        registry: Arc<SessionRegistry>,
        transport: MemoryTransport,
        queue: UnboundedSender<Notification>,
        receiver: Option<UnboundedReceiver<Notification>>,
    }

    impl Fixture {
        fn new() -> Self {
            let transport = MemoryTransport::new();
            let (queue, receiver) = mpsc::unbounded_channel();
            let registry = Arc::new(SessionRegistry::new(
                Arc::new(transport.clone()),
                Arc::new(transport.clone()),
                queue.clone(),
            ));
            Self {
                registry,
                transport,
                queue,
                receiver: Some(receiver),
            }
        }

        fn spawn(&mut self, sink: EventSink) -> Dispatcher {
            let receiver = self.receiver.take().expect("spawned once");
            Dispatcher::spawn(Arc::clone(&self.registry), self.queue.clone(), receiver, sink)
                .expect("spawn")
        }
    }

    fn recv(rx: &std_mpsc::Receiver<Event>) -> Event {
        rx.recv_timeout(Duration::from_secs(5)).expect("event")
    }

    #[test]
    fn test_delivers_in_order() {
        let mut f = Fixture::new();
        let (tx, rx) = std_mpsc::channel();
        let mut dispatcher = f.spawn(Box::new(move |event: &Event| {
            let _ = tx.send(event.clone());
        }));

        let handle = f
            .registry
            .open_socket("wss://example/echo", UserContext::new(7))
            .expect("open");
        f.transport.connected(handle);
        for i in 0..10 {
            f.transport.message(handle, format!("m{i}"));
        }

        assert_eq!(recv(&rx).kind(), EventKind::SocketOpen);
        for i in 0..10 {
            assert_eq!(recv(&rx).data(), format!("m{i}").as_bytes());
        }

        dispatcher.shutdown();
        assert!(!dispatcher.is_running());
    }

    #[test]
    fn test_sink_runs_on_delivery_thread() {
        let mut f = Fixture::new();
        let (tx, rx) = std_mpsc::channel();
        let _dispatcher = f.spawn(Box::new(move |_: &Event| {
            let _ = tx.send(thread::current().name().map(str::to_owned));
        }));

        f.registry
            .fetch("https://example/", UserContext::new(1))
            .expect("fetch");
        f.transport.respond("https://example/", 200, "ok");

        let name = rx.recv_timeout(Duration::from_secs(5)).expect("name");
        assert_eq!(name.as_deref(), Some(DELIVERY_THREAD_NAME));
    }

    #[test]
    fn test_sink_may_reenter_registry() {
        let mut f = Fixture::new();
        let (tx, rx) = std_mpsc::channel();
        let registry = Arc::clone(&f.registry);
        let _dispatcher = f.spawn(Box::new(move |event: &Event| {
            if let Event::SocketOpen { handle, .. } = event {
                let _ = tx.send(registry.send(*handle, "hello").is_ok());
            }
        }));

        let handle = f
            .registry
            .open_socket("wss://example/echo", UserContext::new(1))
            .expect("open");
        f.transport.connected(handle);

        assert!(rx.recv_timeout(Duration::from_secs(5)).expect("result"));
        assert_eq!(f.transport.writes(handle).len(), 1);
    }

    #[test]
    fn test_panicking_sink_keeps_delivering() {
        let mut f = Fixture::new();
        let (tx, rx) = std_mpsc::channel();
        let _dispatcher = f.spawn(Box::new(move |event: &Event| {
            if event.status_code() == 500 {
                panic!("host bug");
            }
            let _ = tx.send(event.clone());
        }));

        f.registry
            .fetch("https://example/a", UserContext::new(1))
            .expect("fetch");
        f.registry
            .fetch("https://example/b", UserContext::new(2))
            .expect("fetch");
        f.transport.respond("https://example/a", 500, "");
        f.transport.respond("https://example/b", 200, "");

        assert_eq!(recv(&rx).user_context(), UserContext::new(2));
    }

    #[test]
    fn test_host_calls_race_retirement() {
        const HOST_THREADS: usize = 8;
        const CALLS_PER_THREAD: usize = 500;

        let mut f = Fixture::new();
        let (tx, rx) = std_mpsc::channel();
        let mut dispatcher = f.spawn(Box::new(move |event: &Event| {
            let _ = tx.send(event.clone());
        }));

        let handle = f
            .registry
            .open_socket("wss://example/race", UserContext::new(1))
            .expect("open");
        f.transport.connected(handle);
        assert_eq!(recv(&rx).kind(), EventKind::SocketOpen);

        let start = Arc::new(std::sync::Barrier::new(HOST_THREADS + 1));
        let hosts: Vec<_> = (0..HOST_THREADS)
            .map(|i| {
                let registry = Arc::clone(&f.registry);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    (0..CALLS_PER_THREAD)
                        .map(|n| {
                            if (i + n) % 2 == 0 {
                                registry.send(handle, "tick")
                            } else {
                                registry.close(handle, 1000, "bye")
                            }
                        })
                        .filter(|result| {
                            !matches!(result, Ok(()) | Err(Error::UnknownHandle { .. }))
                        })
                        .count()
                })
            })
            .collect();

        start.wait();
        assert!(f.transport.disconnected(handle, 1000, "bye"));

        for host in hosts {
            assert_eq!(host.join().expect("host thread"), 0);
        }

        let closed = recv(&rx);
        assert_eq!(closed.kind(), EventKind::SocketClose);
        assert_eq!(closed.handle(), Some(handle));

        dispatcher.shutdown();
        assert!(rx.try_recv().is_err());
        assert_eq!(f.registry.socket_count(), 0);
        assert!(matches!(
            f.registry.send(handle, "late"),
            Err(Error::UnknownHandle { .. })
        ));
    }

    #[test]
    fn test_shutdown_drains_queue_first() {
        let mut f = Fixture::new();
        let (tx, rx) = std_mpsc::channel();
        let mut dispatcher = f.spawn(Box::new(move |event: &Event| {
            let _ = tx.send(event.clone());
        }));

        f.registry
            .fetch("https://example/", UserContext::new(1))
            .expect("fetch");
        f.registry.close_all(1001, "shutdown");
        dispatcher.shutdown();

        assert_eq!(recv(&rx).kind(), EventKind::HttpError);
        assert!(rx.try_recv().is_err());
    }
}
