//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request admitted by the gateway
//!     → dispatcher.rs (connection accounting)
//!     → pool.rs (snapshot of healthy backends)
//!     → Apply the pool's strategy:
//!         - least_conn.rs (pick backend with fewest connections)
//!         - round_robin.rs (rotate through backends)
//!         - random.rs (uniform pick)
//!     → backend.rs (connection guard held for the request)
//!     → Return backend URL or NoHealthyBackends
//! ```
//!
//! # Design Decisions
//! - Strategy is a closed enum fixed at pool construction
//! - Selection is a pure read of health and connection counts
//! - The dispatcher is the only writer of connection counts
//! - Unhealthy and never-probed backends are excluded from selection

pub mod backend;
pub mod dispatcher;
pub mod least_conn;
pub mod pool;
pub mod random;
pub mod round_robin;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::LbError;
use self::backend::Backend;

pub use self::dispatcher::Dispatcher;
pub use self::pool::BackendPool;

/// Backend selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    LeastConnections,
    RoundRobin,
    Random,
}

impl Strategy {
    /// Choose one backend out of the healthy sequence.
    ///
    /// `cursor` is only advanced by [`Strategy::RoundRobin`].
    pub fn select(
        self,
        healthy: &[Arc<Backend>],
        cursor: &AtomicUsize,
    ) -> Result<Arc<Backend>, LbError> {
        let chosen = match self {
            Strategy::LeastConnections => least_conn::pick(healthy),
            Strategy::RoundRobin => round_robin::pick(healthy, cursor),
            Strategy::Random => random::pick(healthy),
        };
        chosen.cloned().ok_or(LbError::NoHealthyBackends)
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::LeastConnections => "least_connections",
            Strategy::RoundRobin => "round_robin",
            Strategy::Random => "random",
        };
        f.write_str(name)
    }
}
