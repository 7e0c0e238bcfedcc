//! Error taxonomy for the balancer.
//!
//! Construction errors halt startup. Every per-request variant is caught at
//! the gateway boundary and turned into a status code plus JSON error body.

use axum::http::StatusCode;
use thiserror::Error;

use crate::storage::StorageError;

/// Errors produced by the pool, the limiter and the gateway pipeline.
#[derive(Debug, Error)]
pub enum LbError {
    /// Empty backend list, unparsable endpoint or unusable interval.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The healthy snapshot was empty when a backend was requested.
    #[error("no healthy backends")]
    NoHealthyBackends,

    /// The client's bucket had no tokens left.
    #[error("the request limit has expired")]
    RateLimitExceeded,

    /// The persistence collaborator rejected a client record.
    #[error("an error occurred while updating the data")]
    Persistence(#[from] StorageError),

    /// Transport or protocol failure talking to the chosen backend.
    #[error("{0}")]
    Upstream(String),
}

impl LbError {
    /// HTTP status surfaced to the caller for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            LbError::InvalidConfiguration(_) | LbError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            LbError::NoHealthyBackends => StatusCode::SERVICE_UNAVAILABLE,
            LbError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            LbError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(LbError::NoHealthyBackends.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(LbError::RateLimitExceeded.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            LbError::Upstream("connection refused".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            LbError::Persistence(StorageError::Unavailable("down".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn persistence_message_hides_detail() {
        let err = LbError::Persistence(StorageError::Unavailable("disk full".into()));
        assert_eq!(err.to_string(), "an error occurred while updating the data");
    }
}
