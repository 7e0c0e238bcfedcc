//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend, all probes of a cycle concurrently
//! - Update each backend's health from its latest probe outcome

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request};
use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;

use crate::load_balancer::backend::{target_uri, Backend, HealthState};
use crate::load_balancer::pool::BackendPool;
use crate::observability::metrics;

/// Upper bound on a single probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct HealthMonitor {
    pool: Arc<BackendPool>,
    path: Option<String>,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(pool: Arc<BackendPool>, path: Option<String>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self { pool, path, client }
    }

    /// Spawn the monitor loop. It lives as long as the runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let interval = self.pool.health_interval();
        tracing::info!(
            interval = ?interval,
            path = ?self.path,
            "Health monitor starting"
        );

        // first tick completes immediately, so backends are probed at startup
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.check_all().await;
        }
    }

    /// Run one probe cycle and wait for every probe in it.
    pub async fn check_all(&self) {
        // the pool lock is only held while copying the list
        let backends = self.pool.all_backends();

        join_all(backends.iter().map(|backend| self.check_one(backend))).await;
    }

    async fn check_one(&self, backend: &Backend) {
        let healthy = self.probe(backend).await;

        if let Some(previous) = backend.set_healthy(healthy) {
            if previous == HealthState::Unknown && healthy {
                tracing::info!(backend = %backend.url(), "Backend healthy");
            } else if healthy {
                tracing::info!(backend = %backend.url(), "Backend recovered");
            } else {
                tracing::info!(backend = %backend.url(), previous = ?previous, "Backend marked unhealthy");
            }
        }
        metrics::record_backend_health(backend.url().as_str(), healthy);
    }

    /// Healthy iff the probe completes in time with a status below 500.
    async fn probe(&self, backend: &Backend) -> bool {
        let uri = match target_uri(backend.url(), self.path.as_deref().unwrap_or(""), None) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(backend = %backend.url(), error = %e, "Failed to build probe URI");
                return false;
            }
        };

        let request = match Request::builder()
            .method("GET")
            .uri(uri)
            .header(header::USER_AGENT, "tollgate-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!("Failed to build health check request: {}", e);
                return false;
            }
        };

        match time::timeout(PROBE_TIMEOUT, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let status = response.status();
                if status.is_server_error() {
                    tracing::debug!(backend = %backend.url(), status = %status, "Health probe failed: server error");
                    false
                } else {
                    true
                }
            }
            Ok(Err(e)) => {
                tracing::debug!(backend = %backend.url(), error = %e, "Health probe failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(backend = %backend.url(), "Health probe failed: timeout");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::load_balancer::Strategy;

    /// Answer every connection with the given status line.
    async fn status_server(status: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let response =
                        format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        addr
    }

    async fn closed_port() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    }

    #[tokio::test]
    async fn probe_cycle_classifies_backends() {
        let ok = status_server("200 OK").await;
        let not_found = status_server("404 Not Found").await;
        let failing = status_server("503 Service Unavailable").await;
        let down = closed_port().await;

        let endpoints: Vec<String> = [ok, not_found, failing, down]
            .iter()
            .map(|a| format!("http://{a}"))
            .collect();
        let pool = Arc::new(
            BackendPool::new(&endpoints, Strategy::LeastConnections, Duration::from_secs(60)).unwrap(),
        );

        HealthMonitor::new(pool.clone(), None).check_all().await;

        let states: Vec<_> = pool.all_backends().iter().map(|b| b.health()).collect();
        assert_eq!(
            states,
            vec![
                HealthState::Healthy,
                HealthState::Healthy,
                HealthState::Unhealthy,
                HealthState::Unhealthy,
            ]
        );
        assert_eq!(pool.snapshot().len(), 2);
    }

    /// Accept connections and never answer.
    async fn silent_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        addr
    }

    #[tokio::test]
    async fn hung_backend_times_out_without_stalling_cycle() {
        let ok = status_server("200 OK").await;
        let hung = silent_server().await;

        let pool = Arc::new(
            BackendPool::new(
                &[format!("http://{hung}"), format!("http://{ok}")],
                Strategy::LeastConnections,
                Duration::from_secs(60),
            )
            .unwrap(),
        );

        let started = std::time::Instant::now();
        HealthMonitor::new(pool.clone(), None).check_all().await;
        let elapsed = started.elapsed();

        assert!(elapsed >= PROBE_TIMEOUT, "returned after {elapsed:?}");
        assert!(elapsed < PROBE_TIMEOUT + Duration::from_secs(1), "returned after {elapsed:?}");

        let all = pool.all_backends();
        assert_eq!(all[0].health(), HealthState::Unhealthy);
        assert_eq!(all[1].health(), HealthState::Healthy);
    }

    #[tokio::test]
    async fn monitor_probes_immediately() {
        let ok = status_server("200 OK").await;
        let pool = Arc::new(
            BackendPool::new(&[format!("http://{ok}")], Strategy::RoundRobin, Duration::from_secs(60))
                .unwrap(),
        );

        let handle = HealthMonitor::new(pool.clone(), Some("/healthz".into())).spawn();
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.abort();

        assert!(pool.next_backend().is_ok());
    }
}
