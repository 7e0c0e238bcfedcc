//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer (first tick at startup)
//!     → Copy the backend list out of the pool
//!     → Probe every backend concurrently (2s timeout each)
//!     → Write each result to that backend's own state
//! ```
//!
//! # Design Decisions
//! - No hysteresis: a backend's state is its most recent probe outcome
//! - Status codes below 500 count as healthy
//! - Health state is per-backend, not per-pool
//! - The monitor runs for the lifetime of the process

pub mod active;

pub use active::HealthMonitor;
