//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! State machine (state.rs):
//!     Stopped → Starting → Started → Stopping → Stopped
//!     Stopping entry → ephemeral mappings pruned
//!
//! Startup (startup.rs):
//!     Load config → Validate → Starting → install extensions/mappings → Started
//!
//! Reload (startup.rs):
//!     Stop → remove previously configured mappings → Start with new config
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     Ctrl+C → broadcast → stop accepting → close sessions → exit
//! ```
//!
//! # Design Decisions
//! - Transitions are explicit events, not inferred from callbacks
//! - Registration-time state is captured as a flag on each mapping

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use shutdown::Shutdown;
pub use startup::{reconfigure, start_factory, StartupError};
pub use state::{Lifecycle, LifecycleError, LifecycleState};
