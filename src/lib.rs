//! tollgate: a rate-limiting HTTP load balancer.
//!
//! Every request is charged against its client's token bucket, then
//! forwarded to one healthy backend chosen by the configured strategy.

pub mod admin;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod security;
pub mod storage;

pub use config::ProxyConfig;
pub use error::LbError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::Strategy;
