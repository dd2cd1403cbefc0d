//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, upgrade dispatch)
//!     → request.rs (path, offered extensions and subprotocols)
//!     → UpgradeFactory (match, negotiate, create)
//!     → sessions.rs (admission against the session cap)
//!     → websocket.rs (session pump driving the endpoint)
//! ```

pub mod request;
pub mod server;
pub mod sessions;
pub mod websocket;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, ServerError};
pub use sessions::{SessionGuard, SessionTracker};
