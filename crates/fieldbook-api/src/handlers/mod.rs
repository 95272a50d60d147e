//! HTTP request handlers

pub mod balance;
pub mod booking;
pub mod health;
pub mod settlement;

use actix_web::web;

pub use balance::configure as configure_balance;
pub use booking::configure as configure_bookings;
pub use settlement::configure as configure_settlement;

/// Mount every route under `/api/v1`
///
/// Expects `web::Data<Services>` to be registered on the app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health::health_check))
            .configure(configure_bookings)
            .configure(configure_settlement)
            .configure(configure_balance),
    );
}
