//! HTTP error taxonomy (§7): every admission-pipeline and admin-endpoint
//! failure maps to one of these kinds, each with a fixed HTTP status and a
//! `{detail: string}` JSON body (§6).

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use saas_catalog::CatalogError;
use saas_provisioning::QueueError;
use saas_ratelimit::RateLimitError;
use saas_usage::UsageError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    /// §4.3 stage 6/7: the detail string distinguishes "rate limit" from
    /// "tenant monthly quota exceeded" (§8 scenarios 3, 4).
    #[error("{0}")]
    RateLimited(&'static str),

    #[error("{0}")]
    DependencyUnavailable(String),

    #[error("{0}")]
    Misconfigured(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, detail) = match &self {
            ApiError::InvalidInput(detail) => (StatusCode::BAD_REQUEST, detail.clone()),
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, detail.clone()),
            ApiError::RateLimited(detail) => (StatusCode::TOO_MANY_REQUESTS, detail.to_string()),
            ApiError::DependencyUnavailable(detail) => (StatusCode::SERVICE_UNAVAILABLE, detail.clone()),
            ApiError::Misconfigured(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail.clone()),
        };

        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE) {
            tracing::error!(status = %status, detail = %detail, "request failed");
        }

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound => ApiError::NotFound,
            CatalogError::Conflict(msg) => ApiError::Conflict(msg),
            CatalogError::Storage(msg) => ApiError::DependencyUnavailable(msg),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotFound(_) => ApiError::NotFound,
            QueueError::Storage(msg) => ApiError::DependencyUnavailable(msg),
            QueueError::IllegalTransition(id) => ApiError::Conflict(format!("illegal transition for job {id}")),
        }
    }
}

impl From<UsageError> for ApiError {
    fn from(err: UsageError) -> Self {
        match err {
            UsageError::InvalidMonth => ApiError::InvalidInput("month must match ^\\d{4}-\\d{2}$".to_string()),
            UsageError::Storage(msg) => ApiError::DependencyUnavailable(msg),
        }
    }
}

impl From<RateLimitError> for ApiError {
    fn from(err: RateLimitError) -> Self {
        ApiError::DependencyUnavailable(err.to_string())
    }
}
