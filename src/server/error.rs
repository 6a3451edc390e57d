//! HTTP error mapping
//!
//! Every handler returns `Result<_, AppError>`; failures become a status code
//! and a `{"error": "..."}` JSON body.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use voipbill_core::error::BillingError;

/// Error returned by web handlers
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or wrong credentials
    #[error("authentication required")]
    Unauthorized,

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Billing(#[from] BillingError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Billing(e) => match e {
                BillingError::InvalidDate(_)
                | BillingError::InvalidArgument(_)
                | BillingError::InvalidTimezone(_) => StatusCode::BAD_REQUEST,
                BillingError::UnknownVoipPlan(_) => StatusCode::FORBIDDEN,
                BillingError::Upstream { .. }
                | BillingError::RateParse { .. }
                | BillingError::Network(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = json!({ "error": self.to_string() });
        let mut response = (status, Json(body)).into_response();
        if matches!(self, Self::Unauthorized) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"voipbill\""),
            );
        }
        response
    }
}
