//! HTTP error type for fieldnet-api
//!
//! Each variant maps onto one of the JSON error bodies clients rely on:
//! `{"message"}`, `{"message", "errors"}`, bare field errors,
//! `{"detail"}` for auth and pagination, `{"error"}` for uploads.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fieldnet_common::time::response_stamp;
use fieldnet_common::ValidationErrors;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// 400 `{"message", "errors"}`
    #[error("{message}: {errors}")]
    Invalid {
        message: String,
        errors: ValidationErrors,
    },

    /// 400 with the field errors as the whole body
    #[error("{0}")]
    Fields(ValidationErrors),

    /// 400 `{"message"}`
    #[error("{0}")]
    BadRequest(String),

    /// 400 `{"message", "datetime"}` for raw reading submissions
    #[error("{0}")]
    BadReadings(String),

    /// 400 `{"error"}`
    #[error("{0}")]
    Upload(String),

    /// 400 `{"error": "Error uploading document", "details"}`
    #[error("Error uploading document")]
    UploadRejected(Value),

    /// 404 `{"message"}`
    #[error("{0}")]
    NotFound(String),

    /// 404 `{"detail": "Invalid page."}`
    #[error("Invalid page.")]
    InvalidPage,

    /// 401 `{"detail"}`
    #[error("{0}")]
    Unauthorized(String),

    /// 403 `{"detail"}`
    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Common(#[from] fieldnet_common::Error),
}

impl ApiError {
    pub fn invalid(message: impl Into<String>, errors: ValidationErrors) -> Self {
        ApiError::Invalid {
            message: message.into(),
            errors,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Invalid { message, errors } => (
                StatusCode::BAD_REQUEST,
                json!({ "message": message, "errors": errors }),
            ),
            ApiError::Fields(errors) => (StatusCode::BAD_REQUEST, json!(errors)),
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({ "message": message }))
            }
            ApiError::BadReadings(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "message": message, "datetime": response_stamp() }),
            ),
            ApiError::Upload(message) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            ApiError::UploadRejected(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Error uploading document", "details": details }),
            ),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "message": message })),
            ApiError::InvalidPage => (StatusCode::NOT_FOUND, json!({ "detail": "Invalid page." })),
            ApiError::Unauthorized(detail) => {
                (StatusCode::UNAUTHORIZED, json!({ "detail": detail }))
            }
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, json!({ "detail": detail })),
            ApiError::Database(e) => {
                error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Internal server error" }),
                )
            }
            ApiError::Common(e) => match e {
                fieldnet_common::Error::NotFound(message) => {
                    (StatusCode::NOT_FOUND, json!({ "message": message }))
                }
                fieldnet_common::Error::InvalidInput(message) => {
                    (StatusCode::BAD_REQUEST, json!({ "message": message }))
                }
                other => {
                    error!("Internal error: {}", other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({ "message": "Internal server error" }),
                    )
                }
            },
        };

        (status, Json(body)).into_response()
    }
}
