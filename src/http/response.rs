//! JSON bodies for locally generated responses.
//!
//! Every response the balancer produces itself (errors from the gateway,
//! results from the management API) carries a timestamp in RFC 3339 form.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LbError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
    pub time: String,
}

/// Current UTC time, second precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: error.into(),
        time: timestamp(),
    };
    (status, Json(body)).into_response()
}

pub fn message_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = MessageBody {
        message: message.into(),
        time: timestamp(),
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for LbError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), self.to_string())
    }
}
