//! Common DTOs used across the API

use fieldbook_core::AppError;
use serde::Serialize;
use validator::Validate;

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a success response with data
    pub fn success(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    /// Create a success response with data and message
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

/// Request-level rules that `validator` attributes cannot express
pub trait BusinessRules {
    fn validate_business_rules(&self) -> Result<(), String>;
}

/// Run `validator` rules, then business rules, mapping failures to
/// `AppError::Validation`
pub fn validate_request<T: Validate + BusinessRules>(req: &T) -> Result<(), AppError> {
    req.validate().map_err(|e| {
        tracing::warn!("Request validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    req.validate_business_rules().map_err(|e| {
        tracing::warn!("Request business validation failed: {}", e);
        AppError::Validation(e)
    })
}
