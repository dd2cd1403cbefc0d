//! Creator facade.
//!
//! # Responsibilities
//! - Describe the upgrade request handed to a creator (path, headers,
//!   offered extensions and subprotocols, captured path params)
//! - Let a creator pick a subprotocol or trim the negotiated extensions
//! - Produce a live endpoint, or reject the upgrade with a status
//!
//! # Design Decisions
//! - Creation is a pure decision point: no blocking I/O inside `create`
//! - Any `Fn(&UpgradeRequest, &mut UpgradeResponse)` closure is a creator
//! - Endpoints are driven by the session pump after creation; they never
//!   see the socket

use std::any::type_name;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use uuid::Uuid;

use crate::extensions::ExtensionConfig;

/// A data message exchanged with an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
}

/// What an endpoint learns about its session when it opens.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: Uuid,
    pub path: String,
    pub path_params: BTreeMap<String, String>,
    pub subprotocol: Option<String>,
    pub extensions: Vec<ExtensionConfig>,
}

/// The per-connection object created for an accepted upgrade.
pub trait Endpoint: Send {
    /// Called once before any message. A returned message is sent first.
    fn on_open(&mut self, _session: &SessionInfo) -> Option<Message> {
        None
    }

    /// Handle one inbound message, optionally replying.
    fn on_message(&mut self, message: Message) -> Option<Message>;

    fn on_close(&mut self, _code: u16, _reason: &str) {}
}

/// Context of an inbound upgrade request.
#[derive(Debug, Clone, Default)]
pub struct UpgradeRequest {
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    /// Captures of the matched spec (template variables, regex groups).
    pub path_params: BTreeMap<String, String>,
    /// Extension offers in the client's order.
    pub requested_extensions: Vec<ExtensionConfig>,
    pub requested_subprotocols: Vec<String>,
}

impl UpgradeRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub fn offers_subprotocol(&self, protocol: &str) -> bool {
        self.requested_subprotocols.iter().any(|p| p == protocol)
    }
}

/// Mutable half of the upgrade handed to a creator.
#[derive(Debug, Clone, Default)]
pub struct UpgradeResponse {
    pub accepted_subprotocol: Option<String>,
    /// Negotiated chain, pre-filled by the extension registry.
    pub extensions: Vec<ExtensionConfig>,
}

/// A refused upgrade.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("upgrade rejected with {status}: {reason}")]
pub struct Rejection {
    pub status: StatusCode,
    pub reason: String,
}

impl Rejection {
    pub fn new(status: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, reason)
    }
}

pub type CreateResult = Result<Box<dyn Endpoint>, Rejection>;

/// Turns a matched registration plus request context into an endpoint.
pub trait Creator: Send + Sync {
    fn create(&self, request: &UpgradeRequest, response: &mut UpgradeResponse) -> CreateResult;
}

impl<F> Creator for F
where
    F: Fn(&UpgradeRequest, &mut UpgradeResponse) -> CreateResult + Send + Sync,
{
    fn create(&self, request: &UpgradeRequest, response: &mut UpgradeResponse) -> CreateResult {
        self(request, response)
    }
}

/// Wrap a closure as a shareable creator.
pub fn creator_fn<F>(f: F) -> Arc<dyn Creator>
where
    F: Fn(&UpgradeRequest, &mut UpgradeResponse) -> CreateResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Creator that instantiates `E::default()` for every upgrade.
pub struct DefaultCreator<E> {
    _endpoint: PhantomData<fn() -> E>,
}

impl<E> DefaultCreator<E> {
    pub fn new() -> Self {
        Self {
            _endpoint: PhantomData,
        }
    }

    pub fn endpoint_type(&self) -> &'static str {
        type_name::<E>()
    }
}

impl<E> Default for DefaultCreator<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Creator for DefaultCreator<E>
where
    E: Endpoint + Default + 'static,
{
    fn create(&self, _request: &UpgradeRequest, _response: &mut UpgradeResponse) -> CreateResult {
        Ok(Box::new(E::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        seen: usize,
    }

    impl Endpoint for Counter {
        fn on_message(&mut self, _message: Message) -> Option<Message> {
            self.seen += 1;
            Some(Message::Text(self.seen.to_string()))
        }
    }

    #[test]
    fn test_default_creator_builds_fresh_endpoints() {
        let creator = DefaultCreator::<Counter>::new();
        assert!(creator.endpoint_type().ends_with("Counter"));

        let request = UpgradeRequest::new("/");
        let mut response = UpgradeResponse::default();
        let mut first = creator.create(&request, &mut response).unwrap();
        let mut second = creator.create(&request, &mut response).unwrap();
        assert_eq!(first.on_message(Message::Text("a".into())), Some(Message::Text("1".into())));
        assert_eq!(first.on_message(Message::Text("b".into())), Some(Message::Text("2".into())));
        assert_eq!(second.on_message(Message::Text("c".into())), Some(Message::Text("1".into())));
    }

    #[test]
    fn test_closure_creator_can_reject_and_pick_subprotocol() {
        let creator = creator_fn(|request, response| {
            if !request.offers_subprotocol("chat.v1") {
                return Err(Rejection::forbidden("chat.v1 required"));
            }
            response.accepted_subprotocol = Some("chat.v1".to_string());
            Ok(Box::new(Counter::default()) as Box<dyn Endpoint>)
        });

        let mut response = UpgradeResponse::default();
        let rejected = creator.create(&UpgradeRequest::new("/chat"), &mut response);
        assert_eq!(rejected.err().map(|r| r.status), Some(StatusCode::FORBIDDEN));

        let mut request = UpgradeRequest::new("/chat");
        request.requested_subprotocols.push("chat.v1".to_string());
        assert!(creator.create(&request, &mut response).is_ok());
        assert_eq!(response.accepted_subprotocol.as_deref(), Some("chat.v1"));
    }
}
