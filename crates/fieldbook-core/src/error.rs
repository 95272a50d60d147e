//! Unified error handling for Fieldbook
//!
//! Every failure in the engine is expressed as an [`AppError`]. Variants are
//! grouped by how a caller should react to them (see [`ErrorKind`]), and the
//! type implements `ResponseError` so the HTTP layer can render it directly.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Broad error classes used for propagation decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input; never reaches storage
    Validation,
    /// A conditional write lost against current state; safe to retry with fresh data
    Conflict,
    /// Unknown resource, booking, add-on, withdrawal
    NotFound,
    /// Illegal status transition
    InvalidState,
    /// Connectivity, timeout, serialization failure in the store
    TransientStore,
    /// Everything else
    Internal,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Store Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Booking must start at least {min_lead_hours}h from now (requested start {start})")]
    PastOrTooSoonBooking { start: String, min_lead_hours: i64 },

    // ==================== Not Found Errors ====================
    #[error("Field not found: {0}")]
    ResourceNotFound(i64),

    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    #[error("Add-on not found: {0}")]
    AddOnNotFound(i64),

    #[error("Withdrawal not found: {0}")]
    WithdrawalNotFound(i64),

    #[error("Owner {0} has no places")]
    OwnerHasNoResources(i64),

    // ==================== Conflict Errors ====================
    #[error("Field {field_id} is already booked for the requested interval")]
    ConflictingBooking { field_id: i64 },

    #[error("Insufficient stock for add-on {add_on_id}: requested {requested}, available {available}")]
    InsufficientStock {
        add_on_id: i64,
        requested: i32,
        available: i32,
    },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: String, available: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    // ==================== State Errors ====================
    #[error("Cannot move booking from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Refund rejected: {0}")]
    RefundRejected(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Database(_) | AppError::Pool(_) | AppError::Transaction(_) => {
                ErrorKind::TransientStore
            }

            AppError::Validation(_)
            | AppError::InvalidInterval(_)
            | AppError::PastOrTooSoonBooking { .. } => ErrorKind::Validation,

            AppError::ResourceNotFound(_)
            | AppError::BookingNotFound(_)
            | AppError::AddOnNotFound(_)
            | AppError::WithdrawalNotFound(_)
            | AppError::OwnerHasNoResources(_) => ErrorKind::NotFound,

            AppError::ConflictingBooking { .. }
            | AppError::InsufficientStock { .. }
            | AppError::InsufficientBalance { .. }
            | AppError::Conflict(_) => ErrorKind::Conflict,

            AppError::InvalidTransition { .. } | AppError::RefundRejected(_) => {
                ErrorKind::InvalidState
            }

            AppError::Internal(_) | AppError::Config(_) | AppError::Serialization(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether retrying the same operation later may succeed
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientStore
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InvalidState => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::TransientStore => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInterval(_) => "invalid_interval",
            AppError::PastOrTooSoonBooking { .. } => "past_or_too_soon_booking",
            AppError::ResourceNotFound(_) => "resource_not_found",
            AppError::BookingNotFound(_) => "booking_not_found",
            AppError::AddOnNotFound(_) => "add_on_not_found",
            AppError::WithdrawalNotFound(_) => "withdrawal_not_found",
            AppError::OwnerHasNoResources(_) => "owner_has_no_resources",
            AppError::ConflictingBooking { .. } => "conflicting_booking",
            AppError::InsufficientStock { .. } => "insufficient_stock",
            AppError::InsufficientBalance { .. } => "insufficient_balance",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::RefundRejected(_) => "refund_rejected",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }

    /// Message safe to show across the API boundary
    ///
    /// Store and internal failures carry driver text; those are replaced by a
    /// generic message and only logged.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::TransientStore => {
                "The service is temporarily unavailable, please retry".to_string()
            }
            ErrorKind::Internal => "An internal error occurred".to_string(),
            _ => self.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if matches!(
            self.kind(),
            ErrorKind::TransientStore | ErrorKind::Internal
        ) {
            tracing::error!(error = %self, "Request failed");
        }

        let body = json!({
            "error": self.error_code(),
            "message": self.public_message(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
