//! WebSocket transport on tokio-tungstenite.
//!
//! Each connection runs as one tokio task:
//!
//! 1. Handshake via `connect_async`, racing a host `disconnect` (which
//!    cancels the attempt)
//! 2. Event loop `select!`-ing between incoming frames and commands from
//!    the registry
//! 3. Exactly one terminal notification (`Disconnected`, `Failed` or
//!    `Cancelled`), then the task ends
//!
//! Notifications from one task are sent in the order frames were read, so
//! per-handle order is what the socket observed.

// ============================================================================
// Imports
// ============================================================================

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::protocol::frame::CloseFrame;
use tokio_tungstenite::connect_async_with_config;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::Error;
use crate::protocol::{CLOSE_CODE_NO_STATUS, Payload, SocketNotification};

use super::{SocketConnection, SocketNotifier, SocketTransport};

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Commands from the registry to a connection task.
#[derive(Debug)]
enum ConnectionCommand {
    /// Send a data frame.
    Write(Payload),
    /// Send a close frame (or cancel the handshake).
    Disconnect { code: u16, reason: String },
}

// ============================================================================
// TungsteniteTransport
// ============================================================================

/// [`SocketTransport`] backed by tokio-tungstenite.
///
/// `wss://` uses rustls with the webpki root store.
#[derive(Debug, Clone)]
pub struct TungsteniteTransport {
    runtime: RuntimeHandle,
    max_message_size: Option<usize>,
}

impl TungsteniteTransport {
    /// Creates a transport spawning connection tasks on `runtime`.
    #[inline]
    #[must_use]
    pub fn new(runtime: RuntimeHandle) -> Self {
        Self {
            runtime,
            max_message_size: None,
        }
    }

    /// Limits incoming message size. `None` keeps tungstenite's default.
    #[inline]
    #[must_use]
    pub fn with_max_message_size(mut self, max_message_size: Option<usize>) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    fn config(&self) -> Option<WebSocketConfig> {
        self.max_message_size
            .map(|size| WebSocketConfig::default().max_message_size(Some(size)))
    }
}

impl SocketTransport for TungsteniteTransport {
    fn connect(&self, url: &Url, notifier: SocketNotifier) -> Box<dyn SocketConnection> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        debug!(handle = %notifier.handle(), url = %url, "Spawning WebSocket connection");

        self.runtime.spawn(run_connection(
            url.clone(),
            self.config(),
            notifier,
            command_rx,
        ));

        Box::new(TungsteniteConnection { command_tx })
    }
}

// ============================================================================
// TungsteniteConnection
// ============================================================================

/// Registry-side end of a connection task.
struct TungsteniteConnection {
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
}

impl SocketConnection for TungsteniteConnection {
    fn write(&self, payload: Payload) {
        if self.command_tx.send(ConnectionCommand::Write(payload)).is_err() {
            trace!("Write after connection task ended");
        }
    }

    fn disconnect(&self, code: u16, reason: &str) {
        let command = ConnectionCommand::Disconnect {
            code,
            reason: reason.to_owned(),
        };
        if self.command_tx.send(command).is_err() {
            trace!("Disconnect after connection task ended");
        }
    }
}

// ============================================================================
// Connection Task
// ============================================================================

async fn run_connection(
    url: Url,
    config: Option<WebSocketConfig>,
    notifier: SocketNotifier,
    mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
) {
    let handle = notifier.handle();

    let ws_stream = tokio::select! {
        result = connect_async_with_config(url.as_str(), config, false) => {
            match result {
                Ok((stream, response)) => {
                    debug!(%handle, status = response.status().as_u16(), "WebSocket handshake completed");
                    stream
                }
                Err(e) => {
                    warn!(%handle, error = %e, "WebSocket connect failed");
                    notifier.notify(failed(e));
                    return;
                }
            }
        }

        // Only a disconnect (or the session going away) can arrive before
        // the socket is open.
        _ = command_rx.recv() => {
            debug!(%handle, "WebSocket connect cancelled");
            notifier.notify(SocketNotification::Cancelled);
            return;
        }
    };

    notifier.notify(SocketNotification::Connected);

    let (mut ws_write, mut ws_read) = ws_stream.split();

    let terminal = loop {
        tokio::select! {
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        notifier.notify(SocketNotification::Message(Payload::Text(text.as_str().to_owned())));
                    }

                    Some(Ok(Message::Binary(bytes))) => {
                        notifier.notify(SocketNotification::Message(Payload::Binary(bytes)));
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                            .unwrap_or((CLOSE_CODE_NO_STATUS, String::new()));
                        debug!(%handle, code, "WebSocket closed");
                        break SocketNotification::Disconnected { code, reason };
                    }

                    Some(Err(e)) => {
                        warn!(%handle, error = %e, "WebSocket error");
                        break failed(e);
                    }

                    None => {
                        debug!(%handle, "WebSocket stream ended");
                        break SocketNotification::Disconnected {
                            code: CLOSE_CODE_NO_STATUS,
                            reason: String::new(),
                        };
                    }

                    // Ping/Pong are answered by tungstenite
                    Some(Ok(_)) => {}
                }
            }

            command = command_rx.recv() => {
                match command {
                    Some(ConnectionCommand::Write(payload)) => {
                        if let Err(e) = ws_write.send(to_message(payload)).await {
                            warn!(%handle, error = %e, "WebSocket write failed");
                            break failed(e);
                        }
                    }

                    Some(ConnectionCommand::Disconnect { code, reason }) => {
                        trace!(%handle, code, "Sending close frame");
                        let frame = CloseFrame {
                            code: code.into(),
                            reason: reason.into(),
                        };
                        if let Err(e) = ws_write.send(Message::Close(Some(frame))).await {
                            warn!(%handle, error = %e, "Close frame failed");
                            break failed(e);
                        }
                        // Keep reading until the peer acknowledges.
                    }

                    None => {
                        debug!(%handle, "Session dropped, closing socket");
                        let _ = ws_write.close().await;
                        return;
                    }
                }
            }
        }
    };

    notifier.notify(terminal);

    // Flush a queued close reply, if any.
    let _ = ws_write.close().await;
    debug!(%handle, "Connection task terminated");
}

fn failed(e: WsError) -> SocketNotification {
    SocketNotification::Failed {
        message: Error::from(e).to_string(),
    }
}

fn to_message(payload: Payload) -> Message {
    match payload {
        Payload::Text(text) => Message::Text(text.into()),
        Payload::Binary(bytes) => Message::Binary(bytes),
    }
}

// ============================================================================
// Tests
// ============================================================================
