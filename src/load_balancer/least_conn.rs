//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::backend::Backend;

/// Pick the backend with the fewest in-flight connections.
/// In case of tie, the first one in sequence order is selected (stability).
pub fn pick(backends: &[Arc<Backend>]) -> Option<&Arc<Backend>> {
    // min_by_key keeps the first of several equal minimums
    backends.iter().min_by_key(|b| b.connections())
}
