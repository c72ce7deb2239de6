use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    response::{ApiResponse, Meta},
    store::StoreError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized {0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict {0}")]
    Conflict(String),

    #[error("Store unavailable")]
    StoreUnavailable(String),

    #[error("Store deadline exceeded")]
    Timeout,

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateCode(code) => {
                AppError::Conflict(format!("coupon code {code} already exists"))
            }
            StoreError::Conflict(detail) => AppError::Conflict(detail),
            StoreError::Unavailable(detail) => AppError::StoreUnavailable(detail),
            StoreError::Timeout => AppError::Timeout,
            StoreError::Query(detail) => AppError::Internal(anyhow::anyhow!(detail)),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Transient failures the caller may retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_) | AppError::Timeout)
    }
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                error: self.to_string(),
                retryable: self.is_retryable(),
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_distinct_statuses() {
        let cases = [
            (StoreError::DuplicateCode("X".into()), StatusCode::CONFLICT),
            (StoreError::Unavailable("down".into()), StatusCode::SERVICE_UNAVAILABLE),
            (StoreError::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (StoreError::Query("bad".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (store_err, status) in cases {
            assert_eq!(AppError::from(store_err).status(), status);
        }
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(AppError::Timeout.is_retryable());
        assert!(AppError::StoreUnavailable("x".into()).is_retryable());
        assert!(!AppError::Validation("x".into()).is_retryable());
    }
}
