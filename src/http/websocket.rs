//! Session pump for upgraded connections.
//!
//! # Responsibilities
//! - Drive an endpoint with the messages of one upgraded connection
//! - Enforce the session policy (idle timeout, message and frame sizes)
//! - Close with the right status and notify the endpoint exactly once
//!
//! # Data Flow
//! ```text
//! Client ──── frames ────→ axum WebSocket ──→ Endpoint::on_message
//!        ←─── replies ─────────────────────── (Option<Message>)
//! ```
//!
//! # Design Decisions
//! - Ping/pong is answered by the transport and never reaches endpoints
//! - Size limits are checked per message kind; the transport limit is
//!   the larger of the two
//! - The session slot is released when the pump returns

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket};
use tokio::sync::broadcast;

use crate::config::SessionConfig;
use crate::http::sessions::SessionGuard;
use crate::mapping::{Endpoint, Message, SessionInfo};

/// Close status codes used by the pump.
pub mod close {
    pub const GOING_AWAY: u16 = 1001;
    pub const NO_STATUS: u16 = 1005;
    /// Reserved; reported to endpoints, never sent on the wire.
    pub const ABNORMAL: u16 = 1006;
    pub const MESSAGE_TOO_BIG: u16 = 1009;
}

/// Why the pump stopped reading.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Closing {
    code: u16,
    reason: String,
}

impl Closing {
    fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// Inbound frame after translation.
#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Data(Message),
    Control,
    Close(Closing),
}

fn translate(message: WsMessage) -> Inbound {
    match message {
        WsMessage::Text(text) => Inbound::Data(Message::Text(text.as_str().to_owned())),
        WsMessage::Binary(data) => Inbound::Data(Message::Binary(data.to_vec())),
        WsMessage::Ping(_) | WsMessage::Pong(_) => Inbound::Control,
        WsMessage::Close(frame) => Inbound::Close(match frame {
            Some(frame) => Closing::new(frame.code, frame.reason.as_str()),
            None => Closing::new(close::NO_STATUS, ""),
        }),
    }
}

/// `Err` when `message` exceeds its kind's limit.
fn check_inbound(message: &Message, policy: &SessionConfig) -> Result<(), Closing> {
    match message {
        Message::Text(text) if text.len() > policy.max_text_message_size => Err(Closing::new(
            close::MESSAGE_TOO_BIG,
            "text message too big",
        )),
        Message::Binary(data) if data.len() > policy.max_binary_message_size => Err(
            Closing::new(close::MESSAGE_TOO_BIG, "binary message too big"),
        ),
        _ => Ok(()),
    }
}

/// Outbound payloads must fit one frame unless auto-fragmenting.
fn check_outbound(message: &Message, policy: &SessionConfig) -> Result<(), Closing> {
    let len = match message {
        Message::Text(text) => text.len(),
        Message::Binary(data) => data.len(),
    };
    if !policy.auto_fragment && len > policy.max_frame_size {
        return Err(Closing::new(close::MESSAGE_TOO_BIG, "reply exceeds frame size"));
    }
    Ok(())
}

async fn send(socket: &mut WebSocket, message: Message, policy: &SessionConfig) -> Result<(), Closing> {
    check_outbound(&message, policy)?;
    let frame = match message {
        Message::Text(text) => WsMessage::Text(text.into()),
        Message::Binary(data) => WsMessage::Binary(data.into()),
    };
    socket.send(frame).await.map_err(|e| {
        tracing::debug!(error = %e, "Send failed");
        Closing::new(close::ABNORMAL, "send failed")
    })
}

/// Who ended the session.
#[derive(Debug)]
enum Ending {
    /// Closed here; a close frame is still owed to the peer.
    Local(Closing),
    /// Closed by the peer or by a dead connection.
    Remote(Closing),
}

/// Run one session to completion.
pub async fn run_session(
    mut socket: WebSocket,
    mut endpoint: Box<dyn Endpoint>,
    info: SessionInfo,
    policy: Arc<SessionConfig>,
    guard: SessionGuard,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::debug!(session_id = %info.id, path = %info.path, "Session opened");

    let closing = match pump(&mut socket, endpoint.as_mut(), &info, &policy, &mut shutdown).await {
        Ending::Local(closing) => {
            let frame = CloseFrame {
                code: closing.code,
                reason: closing.reason.clone().into(),
            };
            if let Err(e) = socket.send(WsMessage::Close(Some(frame))).await {
                tracing::debug!(session_id = %info.id, error = %e, "Close frame not delivered");
            }
            closing
        }
        Ending::Remote(closing) => closing,
    };

    endpoint.on_close(closing.code, &closing.reason);
    tracing::debug!(
        session_id = %info.id,
        code = closing.code,
        reason = %closing.reason,
        "Session closed"
    );
    drop(guard);
}

/// Read until the session must end.
async fn pump(
    socket: &mut WebSocket,
    endpoint: &mut dyn Endpoint,
    info: &SessionInfo,
    policy: &SessionConfig,
    shutdown: &mut broadcast::Receiver<()>,
) -> Ending {
    let idle = Duration::from_secs(policy.idle_timeout_secs);

    if let Some(greeting) = endpoint.on_open(info) {
        if let Err(closing) = send(socket, greeting, policy).await {
            return ending_for(closing);
        }
    }

    loop {
        let next = tokio::select! {
            next = tokio::time::timeout(idle, socket.recv()) => next,
            _ = shutdown.recv() => {
                return Ending::Local(Closing::new(close::GOING_AWAY, "server shutting down"));
            }
        };

        let frame = match next {
            Err(_) => return Ending::Local(Closing::new(close::GOING_AWAY, "idle timeout")),
            Ok(None) => return Ending::Remote(Closing::new(close::ABNORMAL, "connection dropped")),
            Ok(Some(Err(e))) => {
                tracing::debug!(session_id = %info.id, error = %e, "Receive failed");
                return Ending::Remote(Closing::new(close::ABNORMAL, "receive failed"));
            }
            Ok(Some(Ok(frame))) => frame,
        };

        let message = match translate(frame) {
            Inbound::Data(message) => message,
            Inbound::Control => continue,
            Inbound::Close(closing) => return Ending::Remote(closing),
        };
        if let Err(closing) = check_inbound(&message, policy) {
            return Ending::Local(closing);
        }

        if let Some(reply) = endpoint.on_message(message) {
            if let Err(closing) = send(socket, reply, policy).await {
                return ending_for(closing);
            }
        }
    }
}

/// 1006 means the connection is gone; nothing more can be sent.
fn ending_for(closing: Closing) -> Ending {
    if closing.code == close::ABNORMAL {
        Ending::Remote(closing)
    } else {
        Ending::Local(closing)
    }
}
