//! WebSocket upgrade router library.
//!
//! Maps request paths to endpoint creators, negotiates extensions and
//! hands accepted upgrades to a session pump.

// Core subsystems
pub mod factory;
pub mod mapping;
pub mod pathspec;
pub mod extensions;

// Serving
pub mod endpoints;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::RouterConfig;
pub use factory::{MappingInfo, MatchedMapping, UpgradeFactory};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use mapping::{Creator, Endpoint, Message, Rejection, UpgradeRequest, UpgradeResponse};
pub use pathspec::{PathSpec, PathSpecError, PathSpecGroup};
