use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::LbError;
use crate::http::response::{error_response, message_response};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::storage::ClientRecord;

/// `POST /api/v1/client`: persist a client, then install its bucket.
///
/// The bucket is keyed by the body's `ip`, not by the caller's address.
pub async fn add_client(
    State(state): State<AppState>,
    payload: Result<Json<ClientRecord>, JsonRejection>,
) -> Response {
    let Json(record) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected client payload");
            let status = match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            return error_response(status, rejection.body_text());
        }
    };

    if record.ip.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "ip must not be empty");
    }

    if let Err(e) = state.store.record_client(&record).await {
        tracing::error!(client = %record.ip, error = %e, "Failed to persist client");
        return LbError::from(e).into_response();
    }

    state.limiter.add_client(&record.ip, record.bucket());
    metrics::record_client_registered("admin");
    tracing::info!(
        client = %record.ip,
        capacity = record.capacity,
        rate_per_interval = record.rate_per_interval,
        tokens = record.tokens,
        "Client added"
    );

    message_response(StatusCode::OK, "client added")
}

/// `DELETE /api/v1/client`: reserved, nothing is removed.
pub async fn remove_client() -> Response {
    error_response(StatusCode::NOT_IMPLEMENTED, "client removal is not supported")
}
