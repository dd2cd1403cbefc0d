//! Endpoint kinds selectable from configuration.

use std::sync::Arc;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::MappingConfig;
use crate::mapping::{creator_fn, Creator, Endpoint, Message, Rejection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// Sends every message back unchanged.
    Echo,
    /// Refuses the upgrade with the configured status.
    Reject,
}

/// Replies to every message with the message itself.
#[derive(Debug, Default)]
pub struct EchoEndpoint {
    received: u64,
}

impl EchoEndpoint {
    pub fn received(&self) -> u64 {
        self.received
    }
}

impl Endpoint for EchoEndpoint {
    fn on_message(&mut self, message: Message) -> Option<Message> {
        self.received += 1;
        Some(message)
    }

    fn on_close(&mut self, code: u16, reason: &str) {
        tracing::debug!(code, reason = %reason, received = self.received, "Echo session closed");
    }
}

/// Build the creator described by a mapping entry.
pub fn creator_for(mapping: &MappingConfig) -> Arc<dyn Creator> {
    match mapping.endpoint {
        EndpointKind::Echo => {
            let subprotocol = mapping.subprotocol.clone();
            creator_fn(move |request, response| {
                if let Some(protocol) = &subprotocol {
                    if request.offers_subprotocol(protocol) {
                        response.accepted_subprotocol = Some(protocol.clone());
                    }
                }
                Ok(Box::new(EchoEndpoint::default()) as Box<dyn Endpoint>)
            })
        }
        EndpointKind::Reject => {
            let status = mapping
                .status
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::FORBIDDEN);
            let reason = mapping
                .reason
                .clone()
                .unwrap_or_else(|| "upgrade refused".to_string());
            creator_fn(move |_, _| Err(Rejection::new(status, reason.clone())))
        }
    }
}
