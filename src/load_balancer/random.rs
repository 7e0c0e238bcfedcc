//! Random load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::backend::Backend;

/// Uniform pick over the healthy set (non-cryptographic source).
pub fn pick(backends: &[Arc<Backend>]) -> Option<&Arc<Backend>> {
    if backends.is_empty() {
        return None;
    }
    backends.get(fastrand::usize(..backends.len()))
}
