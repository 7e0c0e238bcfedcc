//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream target, identified by its URL
//! - Track in-flight connections (for Least Connections LB)
//! - Track health state as decided by the latest probe

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use ::metrics::Gauge;
use axum::http::Uri;
use url::{Position, Url};

use crate::error::LbError;
use crate::observability::metrics;

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Not probed yet. Not selectable.
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

/// A single backend server.
pub struct Backend {
    url: Url,
    /// Current health state (0=Unknown, 1=Healthy, 2=Unhealthy).
    state: AtomicU8,
    /// Number of requests currently dispatched to this backend.
    connections: AtomicUsize,
    connections_gauge: Gauge,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("url", &self.url.as_str())
            .field("state", &self.health())
            .field("connections", &self.connections())
            .finish()
    }
}

impl Backend {
    /// Create a backend that has not been probed yet.
    pub fn new(url: Url) -> Self {
        Self {
            connections_gauge: metrics::backend_connections_gauge(url.as_str()),
            url,
            state: AtomicU8::new(HealthState::Unknown as u8),
            connections: AtomicUsize::new(0),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get the current number of in-flight connections.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }

    pub fn health(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Acquire))
    }

    /// Only backends whose latest probe succeeded are selectable.
    pub fn is_healthy(&self) -> bool {
        self.health() == HealthState::Healthy
    }

    /// Record a probe outcome. Returns the previous state when it changed.
    pub fn set_healthy(&self, healthy: bool) -> Option<HealthState> {
        let next = if healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        };
        let previous = HealthState::from(self.state.swap(next as u8, Ordering::AcqRel));
        (previous != next).then_some(previous)
    }

    /// Take a connection slot. The slot is released when the guard drops.
    pub(crate) fn acquire(self: &Arc<Self>) -> BackendConnectionGuard {
        let current = self.connections.fetch_add(1, Ordering::AcqRel) + 1;
        self.connections_gauge.set(current as f64);
        BackendConnectionGuard {
            backend: self.clone(),
        }
    }

    fn release(&self) {
        let current = self.connections.fetch_sub(1, Ordering::AcqRel) - 1;
        self.connections_gauge.set(current as f64);
    }
}

/// A RAII guard that manages the in-flight connection count.
///
/// Every guard pairs exactly one increment with exactly one decrement, even
/// when the work holding it panics or its future is dropped.
#[derive(Debug)]
pub struct BackendConnectionGuard {
    backend: Arc<Backend>,
}

impl BackendConnectionGuard {
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Deref for BackendConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for BackendConnectionGuard {
    fn drop(&mut self) {
        self.backend.release();
    }
}

/// Parse a configured endpoint. Only plain `http` targets with a host are usable.
pub fn parse_endpoint(endpoint: &str) -> Result<Url, LbError> {
    let url = Url::parse(endpoint.trim())
        .map_err(|e| LbError::InvalidConfiguration(format!("{endpoint}: {e}")))?;

    if url.scheme() != "http" {
        return Err(LbError::InvalidConfiguration(format!(
            "{endpoint}: unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(LbError::InvalidConfiguration(format!("{endpoint}: missing host")));
    }
    Ok(url)
}

/// Build the absolute URI for `path`/`query` on top of a backend URL.
///
/// Paths are joined with exactly one slash; the backend's own query string
/// comes first when both sides carry one.
pub fn target_uri(base: &Url, path: &str, query: Option<&str>) -> Result<Uri, axum::http::Error> {
    let mut path_and_query = join_paths(base.path(), path);

    let query = match (base.query().filter(|q| !q.is_empty()), query.filter(|q| !q.is_empty())) {
        (Some(a), Some(b)) => Some(format!("{a}&{b}")),
        (Some(a), None) => Some(a.to_string()),
        (None, Some(b)) => Some(b.to_string()),
        (None, None) => None,
    };
    if let Some(query) = query {
        path_and_query.push('?');
        path_and_query.push_str(&query);
    }

    Uri::builder()
        .scheme(base.scheme())
        .authority(&base[Position::BeforeHost..Position::AfterPort])
        .path_and_query(path_and_query)
        .build()
}

fn join_paths(a: &str, b: &str) -> String {
    match (a.ends_with('/'), b.starts_with('/')) {
        (true, true) => format!("{}{}", a, &b[1..]),
        (false, false) if !b.is_empty() => format!("{a}/{b}"),
        _ => format!("{a}{b}"),
    }
}
