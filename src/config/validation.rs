//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, addresses parse)
//! - Detect listener conflicts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;
use crate::load_balancer::backend::parse_endpoint;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    NoBackends,
    InvalidEndpoint { endpoint: String, reason: String },
    ZeroHealthInterval,
    InvalidBindAddress { field: &'static str, value: String },
    ListenerConflict(String),
    EmptyDatabaseUrl,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::NoBackends => write!(f, "backends.endpoints must not be empty"),
            ValidationError::InvalidEndpoint { endpoint, reason } => {
                write!(f, "invalid backend endpoint '{}': {}", endpoint, reason)
            }
            ValidationError::ZeroHealthInterval => {
                write!(f, "health_check.interval_secs must be greater than zero")
            }
            ValidationError::InvalidBindAddress { field, value } => {
                write!(f, "{} '{}' is not a socket address", field, value)
            }
            ValidationError::ListenerConflict(addr) => {
                write!(f, "proxy and management listeners both bind {}", addr)
            }
            ValidationError::EmptyDatabaseUrl => write!(f, "database.url must not be empty"),
        }
    }
}

/// Check the configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.endpoints.is_empty() {
        errors.push(ValidationError::NoBackends);
    }
    for endpoint in &config.backends.endpoints {
        if let Err(e) = parse_endpoint(endpoint) {
            errors.push(ValidationError::InvalidEndpoint {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            });
        }
    }

    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError::ZeroHealthInterval);
    }

    let proxy = parse_bind("listener.bind_address", &config.listener.bind_address, &mut errors);
    let admin = parse_bind("admin.bind_address", &config.admin.bind_address, &mut errors);
    if let (Some(proxy), Some(admin)) = (proxy, admin) {
        if proxy == admin && proxy.port() != 0 {
            errors.push(ValidationError::ListenerConflict(proxy.to_string()));
        }
    }

    if config.database.url.trim().is_empty() {
        errors.push(ValidationError::EmptyDatabaseUrl);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn parse_bind(
    field: &'static str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<SocketAddr> {
    match value.parse() {
        Ok(addr) => Some(addr),
        Err(_) => {
            errors.push(ValidationError::InvalidBindAddress {
                field,
                value: value.to_string(),
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.backends.endpoints = vec!["http://127.0.0.1:9001".into()];
        config
    }

    #[test]
    fn default_with_backend_is_valid() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = valid();
        config.backends.endpoints = vec!["not a url".into(), "ftp://files.example.com".into()];
        config.health_check.interval_secs = 0;
        config.admin.bind_address = config.listener.bind_address.clone();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(errors.contains(&ValidationError::ZeroHealthInterval));
        assert!(errors.contains(&ValidationError::ListenerConflict("0.0.0.0:8080".into())));
    }

    #[test]
    fn empty_backends_rejected() {
        let errors = validate_config(&ProxyConfig::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoBackends]);
    }

    #[test]
    fn bad_bind_address_rejected() {
        let mut config = valid();
        config.listener.bind_address = "localhost".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            errors[0],
            ValidationError::InvalidBindAddress { field: "listener.bind_address", .. }
        ));
    }
}
