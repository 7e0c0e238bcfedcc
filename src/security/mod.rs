//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client token bucket)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-For)
//!     → Pass to load balancer
//! ```
//!
//! # Design Decisions
//! - Fail closed: a client over its limit is rejected before any backend is chosen
//! - Client identity is the peer IP, never a client-supplied header

pub mod headers;
pub mod rate_limit;

pub use rate_limit::{BucketConfig, ClientEntry, LimiterConfig, RateLimiter};
