//! Event translation.
//!
//! Maps one raw transport notification, plus the state its session is in
//! right now, to at most one [`Event`] and one state change. Pure: the
//! registry applies the returned [`Effect`] under its own lock.
//!
//! | Notification | Session state | Event | Effect |
//! |--------------|---------------|-------|--------|
//! | connected | Connecting | `SocketOpen` | → Open |
//! | connected | other | dropped | none |
//! | disconnected | Open, Closing | `SocketClose` | retire (Closed) |
//! | disconnected | Connecting | `SocketError` | retire (Failed) |
//! | cancelled, failed | any non-terminal | `SocketError` | retire (Failed) |
//! | message | Open | `SocketMessage` | none |
//! | message | other | dropped | none |
//!
//! HTTP: any response, whatever its status, is `HttpSuccess`; only a
//! missing response is `HttpError` with status `-1`.

// ============================================================================
// Imports
// ============================================================================

use crate::identifiers::{Handle, UserContext};
use crate::protocol::{Event, HTTP_TRANSPORT_FAILURE, HttpCompletion, SocketNotification};
use crate::registry::SocketState;

// ============================================================================
// Effect
// ============================================================================

/// What the registry must do to the session after translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Leave the session as it is.
    None,
    /// Move the session to a new non-terminal state.
    Transition(SocketState),
    /// Remove the session; it ended in the given terminal state.
    Retire(SocketState),
}

/// Result of translating one socket notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Event for the host, if any.
    pub event: Option<Event>,
    /// Registry side effect.
    pub effect: Effect,
}

impl Translation {
    fn dropped() -> Self {
        Self {
            event: None,
            effect: Effect::None,
        }
    }
}

// ============================================================================
// Socket Translation
// ============================================================================

/// Translates a socket notification for a session in `state`.
#[must_use]
pub fn translate_socket(
    handle: Handle,
    state: SocketState,
    user_context: UserContext,
    notification: SocketNotification,
) -> Translation {
    if state.is_terminal() {
        return Translation::dropped();
    }

    let error = |message: String| Translation {
        event: Some(Event::SocketError {
            handle,
            user_context,
            message,
        }),
        effect: Effect::Retire(SocketState::Failed),
    };

    match (notification, state) {
        (SocketNotification::Connected, SocketState::Connecting) => Translation {
            event: Some(Event::SocketOpen {
                handle,
                user_context,
            }),
            effect: Effect::Transition(SocketState::Open),
        },
        (SocketNotification::Connected, _) => Translation::dropped(),

        (
            SocketNotification::Disconnected { code, reason },
            SocketState::Open | SocketState::Closing,
        ) => Translation {
            event: Some(Event::SocketClose {
                handle,
                user_context,
                code,
                reason,
            }),
            effect: Effect::Retire(SocketState::Closed),
        },
        (SocketNotification::Disconnected { code, .. }, _) => {
            error(format!("connection closed before handshake (code {code})"))
        }

        (SocketNotification::Cancelled, _) => error("connection cancelled".to_owned()),
        (SocketNotification::Failed { message }, _) => error(message),

        (SocketNotification::Message(payload), SocketState::Open) => Translation {
            event: Some(Event::SocketMessage {
                handle,
                user_context,
                payload,
            }),
            effect: Effect::None,
        },
        (SocketNotification::Message(_), _) => Translation::dropped(),
    }
}

// ============================================================================
// HTTP Translation
// ============================================================================

/// Translates an HTTP completion into its terminal event.
#[must_use]
pub fn translate_http(user_context: UserContext, completion: HttpCompletion) -> Event {
    match completion {
        HttpCompletion::Response { status, body } => Event::HttpSuccess {
            user_context,
            status,
            body,
        },
        HttpCompletion::Failed { .. } => Event::HttpError {
            user_context,
            status: HTTP_TRANSPORT_FAILURE,
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;

    use crate::protocol::{EventKind, Payload};

    const CTX: UserContext = UserContext::new(7);

    fn handle() -> Handle {
        Handle::new(0, 1).expect("valid handle")
    }

    fn kind(translation: &Translation) -> Option<EventKind> {
        translation.event.as_ref().map(Event::kind)
    }

    #[test]
    fn test_connected_opens() {
        let t = translate_socket(handle(), SocketState::Connecting, CTX, SocketNotification::Connected);
        assert_eq!(kind(&t), Some(EventKind::SocketOpen));
        assert_eq!(t.effect, Effect::Transition(SocketState::Open));
    }

    #[test]
    fn test_connected_while_closing_is_dropped() {
        let t = translate_socket(handle(), SocketState::Closing, CTX, SocketNotification::Connected);
        assert_eq!(t, Translation::dropped());
    }

    #[test]
    fn test_disconnected_closes_open_and_closing() {
        for state in [SocketState::Open, SocketState::Closing] {
            let t = translate_socket(
                handle(),
                state,
                CTX,
                SocketNotification::Disconnected {
                    code: 1000,
                    reason: "bye".into(),
                },
            );
            assert_eq!(kind(&t), Some(EventKind::SocketClose));
            assert_eq!(t.effect, Effect::Retire(SocketState::Closed));
        }
    }

    #[test]
    fn test_disconnected_while_connecting_is_error() {
        let t = translate_socket(
            handle(),
            SocketState::Connecting,
            CTX,
            SocketNotification::Disconnected {
                code: 1006,
                reason: String::new(),
            },
        );
        assert_eq!(kind(&t), Some(EventKind::SocketError));
        assert_eq!(t.effect, Effect::Retire(SocketState::Failed));
    }

    #[test]
    fn test_failure_and_cancel_retire_from_any_live_state() {
        for state in [SocketState::Connecting, SocketState::Open, SocketState::Closing] {
            for notification in [
                SocketNotification::Cancelled,
                SocketNotification::Failed {
                    message: "reset".into(),
                },
            ] {
                let t = translate_socket(handle(), state, CTX, notification);
                assert_eq!(kind(&t), Some(EventKind::SocketError));
                assert_eq!(t.effect, Effect::Retire(SocketState::Failed));
            }
        }
    }

    #[test]
    fn test_message_only_when_open() {
        let message = || SocketNotification::Message(Payload::from("ping"));

        let t = translate_socket(handle(), SocketState::Open, CTX, message());
        assert_eq!(
            t.event,
            Some(Event::SocketMessage {
                handle: handle(),
                user_context: CTX,
                payload: Payload::from("ping"),
            })
        );
        assert_eq!(t.effect, Effect::None);

        for state in [SocketState::Connecting, SocketState::Closing] {
            let t = translate_socket(handle(), state, CTX, message());
            assert_eq!(t, Translation::dropped());
        }
    }

    #[test]
    fn test_terminal_state_drops_everything() {
        let t = translate_socket(handle(), SocketState::Closed, CTX, SocketNotification::Cancelled);
        assert_eq!(t, Translation::dropped());
    }

    #[test]
    fn test_http_404_is_success() {
        let event = translate_http(
            UserContext::new(3),
            HttpCompletion::Response {
                status: 404,
                body: Bytes::new(),
            },
        );
        assert_eq!(
            event,
            Event::HttpSuccess {
                user_context: UserContext::new(3),
                status: 404,
                body: Bytes::new(),
            }
        );
    }

    #[test]
    fn test_http_transport_failure_is_error() {
        let event = translate_http(
            UserContext::new(3),
            HttpCompletion::Failed {
                message: "dns".into(),
            },
        );
        assert_eq!(event.kind(), EventKind::HttpError);
        assert_eq!(event.status_code(), -1);
    }
}
