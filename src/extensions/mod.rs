//! Extension negotiation subsystem.
//!
//! # Data Flow
//! ```text
//! Sec-WebSocket-Extensions request header
//!     → config.rs (ordered ExtensionConfig offers)
//!     → registry.rs (filter to registered names, build one unit each)
//!     → builtin.rs (identity, permessage-deflate parameter negotiation)
//!     → negotiated chain → response header + UpgradeResponse
//! ```

pub mod builtin;
pub mod config;
pub mod registry;

pub use config::ExtensionConfig;
pub use registry::{Extension, ExtensionDescriptor, ExtensionError, ExtensionFactory, ExtensionRegistry};
