//! Settlement handlers

use crate::dto::{ApiResponse, SweepResponse};
use actix_web::{web, HttpResponse};
use fieldbook_core::AppError;
use fieldbook_services::Services;
use tracing::{info, instrument};

/// Run the settlement sweep now, outside its schedule
///
/// POST /api/v1/settlement/sweep
#[instrument(skip(services))]
pub async fn run_sweep(services: web::Data<Services>) -> Result<HttpResponse, AppError> {
    let now = services.clock().now();
    let report = services.sweeper.run_sweep(now).await?;

    info!(
        completed = report.completed,
        failed = report.failed,
        "Manual settlement sweep finished"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success(SweepResponse::new(now, report))))
}

/// Configure settlement routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/settlement/sweep", web::post().to(run_sweep));
}
