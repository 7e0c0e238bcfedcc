//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID + trace layers)
//!     → request.rs (request ID, client identity)
//!     → rate limiter → load balancer → backend
//!     → response.rs (JSON bodies for locally generated responses)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{client_identity, X_REQUEST_ID};
pub use response::{ErrorBody, MessageBody};
pub use server::{AppState, HttpServer};
