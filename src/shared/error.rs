//! Application Error Types
//!
//! Centralized error handling with Axum integration.
//!
//! Infrastructure faults (`DirectoryUnavailable`, `TransportUnavailable`,
//! `HotStoreUnavailable`, `ColdStoreUnavailable`) are logged where they
//! occur and never propagate to a message sender; only `Validation` and
//! `NotAuthorized` surface at the public boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Presence directory unavailable: {0}")]
    DirectoryUnavailable(#[source] redis::RedisError),

    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Hot store unavailable: {0}")]
    HotStoreUnavailable(#[source] redis::RedisError),

    #[error("Cold store unavailable: {0}")]
    ColdStoreUnavailable(#[from] sqlx::Error),

    #[error("Send queue full for user {0}")]
    QueueFull(String),

    #[error("No partition mapping for gateway {0}")]
    RouteUnknown(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, 20001, msg.clone()),
            AppError::NotAuthorized(msg) => (StatusCode::FORBIDDEN, 20002, msg.clone()),
            AppError::QueueFull(user) => {
                (StatusCode::SERVICE_UNAVAILABLE, 20003, format!("send queue full for {}", user))
            }
            AppError::RouteUnknown(gateway) => {
                tracing::error!(gateway = %gateway, "No partition mapping; configuration bug");
                (StatusCode::INTERNAL_SERVER_ERROR, 20000, "Internal server error".into())
            }
            AppError::DirectoryUnavailable(e) => {
                tracing::error!("Presence directory error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, 20004, "Service unavailable".into())
            }
            AppError::TransportUnavailable(e) => {
                tracing::error!("Transport error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, 20005, "Service unavailable".into())
            }
            AppError::HotStoreUnavailable(e) => {
                tracing::error!("Hot store error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, 20006, "Service unavailable".into())
            }
            AppError::ColdStoreUnavailable(e) => {
                tracing::error!("Cold store error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, 20000, "Internal server error".into())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, 20000, "Internal server error".into())
            }
        };

        let body = ErrorResponse { code, message };

        (status, Json(body)).into_response()
    }
}
