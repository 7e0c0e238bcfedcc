//! Backend pool management.
//!
//! # Responsibilities
//! - Own the fixed, ordered set of backends
//! - Produce consistent snapshots of the healthy subset
//! - Apply the configured strategy to select a backend

use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::error::LbError;
use crate::load_balancer::backend::{parse_endpoint, Backend};
use crate::load_balancer::Strategy;

/// The set of upstream targets and their live state.
///
/// Membership is fixed at construction; only health flags and connection
/// counts change afterwards.
#[derive(Debug)]
pub struct BackendPool {
    /// Backends in configuration order.
    backends: RwLock<Vec<Arc<Backend>>>,
    strategy: Strategy,
    /// Monotonic round-robin cursor.
    cursor: AtomicUsize,
    health_interval: Duration,
}

impl BackendPool {
    /// Build a pool from endpoint URLs.
    ///
    /// Fails with [`LbError::InvalidConfiguration`] if the list is empty, any
    /// endpoint is unparsable, or the health interval is zero.
    pub fn new<S: AsRef<str>>(
        endpoints: &[S],
        strategy: Strategy,
        health_interval: Duration,
    ) -> Result<Self, LbError> {
        if endpoints.is_empty() {
            return Err(LbError::InvalidConfiguration("no backends configured".into()));
        }
        if health_interval.is_zero() {
            return Err(LbError::InvalidConfiguration(
                "health check interval must be greater than zero".into(),
            ));
        }

        let backends = endpoints
            .iter()
            .map(|endpoint| parse_endpoint(endpoint.as_ref()).map(|url| Arc::new(Backend::new(url))))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            backends = backends.len(),
            strategy = %strategy,
            health_interval = ?health_interval,
            "Backend pool created"
        );

        Ok(Self {
            backends: RwLock::new(backends),
            strategy,
            cursor: AtomicUsize::new(0),
            health_interval,
        })
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn health_interval(&self) -> Duration {
        self.health_interval
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Return a list of all backends (for health checking).
    pub fn all_backends(&self) -> Vec<Arc<Backend>> {
        self.read().clone()
    }

    /// The healthy backends, in configuration order.
    pub fn snapshot(&self) -> Vec<Arc<Backend>> {
        self.read()
            .iter()
            .filter(|b| b.is_healthy())
            .cloned()
            .collect()
    }

    /// Select a backend from the current healthy snapshot.
    pub fn next_backend(&self) -> Result<Arc<Backend>, LbError> {
        let healthy = self.snapshot();
        self.strategy.select(&healthy, &self.cursor)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<Backend>>> {
        self.backends.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(10);

    fn pool(strategy: Strategy) -> BackendPool {
        BackendPool::new(
            &["http://127.0.0.1:9001", "http://127.0.0.1:9002", "http://127.0.0.1:9003"],
            strategy,
            INTERVAL,
        )
        .unwrap()
    }

    #[test]
    fn construction_rejects_bad_input() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            BackendPool::new(&empty, Strategy::LeastConnections, INTERVAL),
            Err(LbError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            BackendPool::new(&["http://ok:1", "%%%"], Strategy::LeastConnections, INTERVAL),
            Err(LbError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            BackendPool::new(&["http://ok:1"], Strategy::LeastConnections, Duration::ZERO),
            Err(LbError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn keeps_configuration_order() {
        let pool = pool(Strategy::RoundRobin);
        let ports: Vec<_> = pool
            .all_backends()
            .iter()
            .map(|b| b.url().port().unwrap())
            .collect();
        assert_eq!(ports, vec![9001, 9002, 9003]);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn nothing_selectable_before_first_probe() {
        let pool = pool(Strategy::LeastConnections);
        assert!(pool.snapshot().is_empty());
        assert!(matches!(pool.next_backend(), Err(LbError::NoHealthyBackends)));
    }

    #[test]
    fn unhealthy_backend_never_selected() {
        let pool = pool(Strategy::LeastConnections);
        let all = pool.all_backends();
        all[0].set_healthy(true);
        all[1].set_healthy(false);
        all[2].set_healthy(true);

        let mut guards = Vec::new();
        for _ in 0..100 {
            let chosen = pool.next_backend().unwrap();
            assert!(!Arc::ptr_eq(&chosen, &all[1]));
            // keep load on so least-connections spreads over both
            guards.push(chosen.acquire());
        }
        assert_eq!(all[1].connections(), 0);
        assert_eq!(all[0].connections() + all[2].connections(), 100);
    }

    #[test]
    fn recovered_backend_becomes_selectable_again() {
        let pool = pool(Strategy::RoundRobin);
        let all = pool.all_backends();
        for b in &all {
            b.set_healthy(true);
        }
        all[2].set_healthy(false);
        for _ in 0..10 {
            assert!(!Arc::ptr_eq(&pool.next_backend().unwrap(), &all[2]));
        }

        all[2].set_healthy(true);
        let picked_third = (0..10).any(|_| Arc::ptr_eq(&pool.next_backend().unwrap(), &all[2]));
        assert!(picked_third);
    }
}
