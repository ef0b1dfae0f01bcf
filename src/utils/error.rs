use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::store::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::AuthError(_) => (StatusCode::UNAUTHORIZED, "AUTH_ERROR"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            AppError::InternalServerError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR")
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.classify().0
    }

    pub fn code(&self) -> &'static str {
        self.classify().1
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => {
                warn!(code = self.code(), message = %msg, "Request rejected");
            }
            AppError::InternalServerError(msg) => {
                error!(message = %msg, "Internal error");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }

    /// Collapses storage failures of a multi-step write into a generic
    /// message. Rule violations keep their own status and message.
    pub fn transactional(message: &'static str) -> impl Fn(StoreError) -> AppError {
        move |err| match err {
            StoreError::Database(e) => {
                error!(error = ?e, "Transaction rolled back");
                AppError::InternalServerError(message.to_string())
            }
            other => other.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { resource, .. } => {
                AppError::NotFound(format!("{} not found", capitalize(resource)))
            }
            conflict @ StoreError::Conflict { .. } => AppError::Conflict(conflict.to_string()),
            StoreError::Inventory(e) if e.is_conflict() => AppError::Conflict(e.to_string()),
            StoreError::Inventory(e) => AppError::ValidationError(e.to_string()),
            StoreError::Database(e) => AppError::DatabaseError(e),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        self.log();

        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::InternalServerError(msg) => msg.clone(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
        };

        error_response(code, public_message, None, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryError;

    #[test]
    fn test_store_errors_map_to_statuses() {
        let missing: AppError = StoreError::not_found("event", "42").into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(missing.to_string(), "Resource not found: Event not found");

        let taken: AppError =
            StoreError::Inventory(InventoryError::SeatTaken("S1".to_string())).into();
        assert_eq!(taken.status_code(), StatusCode::CONFLICT);

        let empty: AppError = StoreError::Inventory(InventoryError::EmptySelection).into();
        assert_eq!(empty.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_transactional_hides_database_details() {
        let map = AppError::transactional("Could not create reservation. Please try again.");

        let err = map(StoreError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(
            err,
            AppError::InternalServerError(ref msg) if msg.starts_with("Could not create")
        ));

        let rule = map(StoreError::Inventory(InventoryError::EmptySelection));
        assert_eq!(rule.status_code(), StatusCode::BAD_REQUEST);
    }
}
