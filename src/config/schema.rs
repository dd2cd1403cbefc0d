//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::endpoints::EndpointKind;
use crate::extensions::builtin::IDENTITY;

/// Root configuration for the upgrade router.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration (bind address, session cap).
    pub listener: ListenerConfig,

    /// Policy applied to every upgraded session.
    pub session: SessionConfig,

    /// Extensions offered during negotiation.
    pub extensions: ExtensionsConfig,

    /// Path mappings installed when the factory starts.
    pub mappings: Vec<MappingConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent upgraded sessions (backpressure).
    pub max_sessions: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_sessions: 10_000,
        }
    }
}

/// Session policy for upgraded connections.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Close a session after this long without an inbound message.
    pub idle_timeout_secs: u64,

    /// Largest accepted text message in bytes.
    pub max_text_message_size: usize,

    /// Largest accepted binary message in bytes.
    pub max_binary_message_size: usize,

    /// Largest accepted single frame in bytes.
    pub max_frame_size: usize,

    /// Read buffer size hint in bytes.
    pub input_buffer_size: usize,

    /// Write buffer size hint in bytes.
    pub output_buffer_size: usize,

    /// Split outgoing messages larger than `max_frame_size`.
    pub auto_fragment: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 300,
            max_text_message_size: 64 * 1024,
            max_binary_message_size: 64 * 1024,
            max_frame_size: 64 * 1024,
            input_buffer_size: 4 * 1024,
            output_buffer_size: 4 * 1024,
            auto_fragment: true,
        }
    }
}

impl SessionConfig {
    /// Largest message of either kind.
    pub fn max_message_size(&self) -> usize {
        self.max_text_message_size.max(self.max_binary_message_size)
    }
}

/// Extension negotiation settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExtensionsConfig {
    /// Built-in extension names to register.
    ///
    /// `permessage-deflate` is opt-in: the bundled transport does not
    /// compress frames, so only enable it behind a front end that does.
    pub enabled: Vec<String>,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            enabled: vec![IDENTITY.to_string()],
        }
    }
}

/// One path mapping.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct MappingConfig {
    /// Raw path spec (servlet, `regex|`, `^`, or `uri-template|` syntax).
    pub spec: String,

    /// Endpoint created for matching upgrades.
    pub endpoint: EndpointKind,

    /// Status for `reject` endpoints.
    #[serde(default)]
    pub status: Option<u16>,

    /// Reason text for `reject` endpoints.
    #[serde(default)]
    pub reason: Option<String>,

    /// Subprotocol to accept when the client offers it.
    #[serde(default)]
    pub subprotocol: Option<String>,
}

impl MappingConfig {
    pub fn echo(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            endpoint: EndpointKind::Echo,
            status: None,
            reason: None,
            subprotocol: None,
        }
    }

    pub fn reject(spec: impl Into<String>, status: u16) -> Self {
        Self {
            status: Some(status),
            endpoint: EndpointKind::Reject,
            ..Self::echo(spec)
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
