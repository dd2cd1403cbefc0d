//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, every spec parsed)
//!     → RouterConfig (validated, immutable)
//!     → lifecycle::startup installs mappings and extensions
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server runs a stop/start cycle of the upgrade factory
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ExtensionsConfig, ListenerConfig, MappingConfig, ObservabilityConfig, RouterConfig, SessionConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
