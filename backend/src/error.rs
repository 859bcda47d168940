//! Error handling for the stock ledger
//!
//! Provides consistent JSON error responses for every service failure

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::BomError;
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Ledger errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: Uuid,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Invalid BOM: {0}")]
    InvalidBom(String),

    #[error("Journal {0} is already cancelled")]
    AlreadyCancelled(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Validation failure on a named field
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<BomError> for AppError {
    fn from(err: BomError) -> Self {
        match err {
            BomError::NonPositiveRequest | BomError::OutOfRange => {
                AppError::validation("output_quantity", err.to_string())
            }
            other => AppError::InvalidBom(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|f| f.to_string())
            .unwrap_or_default();
        AppError::Validation {
            field,
            message: errors.to_string(),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
        }
    }
}

impl AppError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            AppError::Validation { .. } | AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::InvalidBom(_) => "INVALID_BOM",
            AppError::AlreadyCancelled(_) => "ALREADY_CANCELLED",
            AppError::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::Validation { .. } | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState(_)
            | AppError::AlreadyCancelled(_)
            | AppError::DuplicateEntry(_) => StatusCode::CONFLICT,
            AppError::InsufficientStock { .. } | AppError::InvalidBom(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Configuration(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let error_detail = match &self {
            AppError::Validation { field, message } => ErrorDetail {
                code: code.to_string(),
                message: message.clone(),
                field: Some(field.clone()),
            },
            AppError::NotFound(resource) => ErrorDetail::new(code, format!("{} not found", resource)),
            AppError::DuplicateEntry(field) => ErrorDetail {
                code: code.to_string(),
                message: format!("A record with this {} already exists", field),
                field: Some(field.clone()),
            },
            AppError::DatabaseError(_) => ErrorDetail::new(code, "A database error occurred"),
            AppError::InternalError(_) => ErrorDetail::new(code, "An internal server error occurred"),
            other => ErrorDetail::new(code, other.to_string()),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request failed: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;

/// Map a unique-constraint violation to `DuplicateEntry`
pub fn map_unique_violation(err: sqlx::Error, field: &str) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return AppError::DuplicateEntry(field.to_string());
        }
    }
    AppError::DatabaseError(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::NotFound("Product".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::InvalidState("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::InsufficientStock {
                product_id: Uuid::nil(),
                available: Decimal::from(5),
                requested: Decimal::from(6),
            }
            .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AppError::AlreadyCancelled("ST-2024-0001".into()).code(), "ALREADY_CANCELLED");
    }

    #[test]
    fn test_bom_error_conversion() {
        assert!(matches!(AppError::from(BomError::NoComponents), AppError::InvalidBom(_)));
        assert!(matches!(
            AppError::from(BomError::NonPositiveRequest),
            AppError::Validation { .. }
        ));
    }
}
