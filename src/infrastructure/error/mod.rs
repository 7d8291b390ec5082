use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::provider::{ProviderError, RegistryError};
use crate::store::StoreError;
use crate::webhook::NormalizeError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Stored data is inconsistent, e.g. an integration without a plan
    #[error("Misconfigured: {0}")]
    Misconfigured(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Unknown integration: {0}")]
    UnknownIntegration(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => {
                AppError::NotFound(format!("{} not found: {}", entity, id))
            }
            StoreError::Conflict { entity, id } => {
                AppError::Conflict(format!("{} already exists: {}", entity, id))
            }
            other => AppError::Store(other),
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotConfigured(_) => AppError::NotConfigured(err.to_string()),
            RegistryError::UnknownIntegration(_) => AppError::UnknownIntegration(err.to_string()),
        }
    }
}

impl From<NormalizeError> for AppError {
    fn from(err: NormalizeError) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::Misconfigured(_) => (StatusCode::UNPROCESSABLE_ENTITY, "MISCONFIGURED"),
            AppError::NotConfigured(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "PROVIDER_NOT_CONFIGURED")
            }
            AppError::UnknownIntegration(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_INTEGRATION"),
            AppError::Provider(e) if e.is_validation() => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            AppError::Provider(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Message safe to show the client; server-side details are hidden in production
    fn client_message(&self) -> String {
        let hidden = match self {
            AppError::Config(_) => Some("Configuration error"),
            AppError::Store(_) => Some("Storage temporarily unavailable"),
            AppError::Internal(_) => Some("Internal server error"),
            _ => None,
        };

        match hidden {
            Some(generic) if is_production() => generic.to_string(),
            _ => self.detail(),
        }
    }

    fn detail(&self) -> String {
        match self {
            AppError::Config(e) => e.to_string(),
            AppError::Provider(e) => e.to_string(),
            AppError::Store(e) => e.to_string(),
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg)
            | AppError::Misconfigured(msg)
            | AppError::NotConfigured(msg)
            | AppError::UnknownIntegration(msg)
            | AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Always log the detailed error server-side
        if status.is_server_error() {
            tracing::error!(
                code = %code,
                status = %status.as_u16(),
                message = %self.detail(),
                "API error"
            );
        } else {
            tracing::warn!(
                code = %code,
                status = %status.as_u16(),
                message = %self.detail(),
                "API error"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.client_message(),
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
