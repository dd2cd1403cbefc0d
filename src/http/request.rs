//! Upgrade request context extraction.
//!
//! # Responsibilities
//! - Build the `UpgradeRequest` handed to creators from the HTTP request
//! - Parse offered extensions and subprotocols in the client's order
//! - Surface the request ID assigned by the middleware stack
//!
//! # Design Decisions
//! - Repeated headers are concatenated in arrival order
//! - Malformed header values are skipped, never fatal

use axum::http::{header, HeaderMap, Uri};

use crate::extensions::ExtensionConfig;
use crate::mapping::UpgradeRequest;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Request context for a creator. Path params are filled in after matching.
pub fn upgrade_request(uri: &Uri, headers: &HeaderMap) -> UpgradeRequest {
    UpgradeRequest {
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: headers.clone(),
        path_params: Default::default(),
        requested_extensions: requested_extensions(headers),
        requested_subprotocols: requested_subprotocols(headers),
    }
}

/// Extension offers from every `Sec-WebSocket-Extensions` header.
pub fn requested_extensions(headers: &HeaderMap) -> Vec<ExtensionConfig> {
    headers
        .get_all(header::SEC_WEBSOCKET_EXTENSIONS)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(ExtensionConfig::parse_header)
        .collect()
}

/// Subprotocol names from every `Sec-WebSocket-Protocol` header.
pub fn requested_subprotocols(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|protocol| !protocol.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_offers_keep_client_order_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(
            header::SEC_WEBSOCKET_EXTENSIONS,
            HeaderValue::from_static("permessage-deflate; client_max_window_bits"),
        );
        headers.append(
            header::SEC_WEBSOCKET_EXTENSIONS,
            HeaderValue::from_static("identity, x-custom"),
        );

        let names: Vec<_> = requested_extensions(&headers)
            .into_iter()
            .map(|offer| offer.name)
            .collect();
        assert_eq!(names, ["permessage-deflate", "identity", "x-custom"]);
    }

    #[test]
    fn test_subprotocols_are_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static(" chat.v2 ,chat.v1,, "),
        );
        assert_eq!(requested_subprotocols(&headers), ["chat.v2", "chat.v1"]);
    }

    #[test]
    fn test_upgrade_request_carries_query() {
        let uri: Uri = "/rooms/lobby?token=abc".parse().unwrap();
        let request = upgrade_request(&uri, &HeaderMap::new());
        assert_eq!(request.path, "/rooms/lobby");
        assert_eq!(request.query.as_deref(), Some("token=abc"));
        assert!(request.requested_extensions.is_empty());
        assert_eq!(request_id(&request.headers), "unknown");
    }
}
