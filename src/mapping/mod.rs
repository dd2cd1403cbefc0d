//! Upgrade mapping subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (startup or runtime):
//!     PathSpec + Arc<dyn Creator> + persistence flag
//!     → registry.rs (copy-on-write snapshot, rebuilt indices)
//!
//! Upgrade request (accept path):
//!     target path
//!     → registry.rs (exact → prefix → suffix → template/regex → root)
//!     → matched Registration
//!     → creator.rs (Creator::create with request context)
//!     → Endpoint or Rejection
//! ```
//!
//! # Design Decisions
//! - Registrations reference creators through `Arc`; dropping a mapping
//!   never destroys a creator another owner still holds
//! - Readers get a consistent snapshot per call, never a live view

pub mod creator;
pub mod registry;

pub use creator::{
    creator_fn, CreateResult, Creator, DefaultCreator, Endpoint, Message, Rejection, SessionInfo,
    UpgradeRequest, UpgradeResponse,
};
pub use registry::{MappingRegistry, Registration};
