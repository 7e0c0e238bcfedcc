//! Management API.
//!
//! Served on its own listener so it can be bound to a private interface.

pub mod handlers;

use axum::{routing::post, Router};
use tower_http::limit::RequestBodyLimitLayer;

use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState, max_body_size: usize) -> Router {
    Router::new()
        .route("/api/v1/client", post(add_client).delete(remove_client))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .with_state(state)
}
