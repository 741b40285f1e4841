//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<mflow_store::StoreError> for ApiError {
    fn from(err: mflow_store::StoreError) -> Self {
        match err {
            mflow_store::StoreError::NotFound(id) => Self::NotFound(format!("job '{}'", id)),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<mflow_storage::StorageError> for ApiError {
    fn from(err: mflow_storage::StorageError) -> Self {
        use mflow_storage::StorageError::*;
        match err {
            UnsupportedScheme(_) | InvalidUri { .. } | SsrfBlocked { .. } => {
                Self::BadRequest(err.to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<mflow_planner::PlanError> for ApiError {
    fn from(err: mflow_planner::PlanError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<mflow_models::SpecError> for ApiError {
    fn from(err: mflow_models::SpecError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay out of production responses.
        let detail = match &self {
            ApiError::Internal(_)
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" =>
            {
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_store_not_found_to_404() {
        let err: ApiError =
            mflow_store::StoreError::NotFound(mflow_models::JobId::from_string("x")).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn maps_ssrf_block_to_400() {
        let err: ApiError = mflow_storage::StorageError::SsrfBlocked {
            host: "127.0.0.1".to_string(),
            category: "localhost".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("localhost"));
    }
}
