//! API layer for Fieldbook
//!
//! HTTP handlers for reservations, status changes, settlement, withdrawals
//! and refunds. Handlers validate DTOs and delegate to [`Services`].

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;

pub use dto::ApiResponse;
pub use handlers::configure;

/// Shared services, registered once as `web::Data<Services>`
pub use fieldbook_services::Services;
