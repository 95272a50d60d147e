//! Withdrawal, owner balance and refund handlers

use crate::dto::{
    validate_request, ApiResponse, RefundRequest, RefundResponse, WithdrawalRequest,
    WithdrawalResponse,
};
use actix_web::{web, HttpResponse};
use fieldbook_core::AppError;
use fieldbook_services::Services;
use tracing::{info, instrument};

/// Withdraw from an owner's places, lowest id first
///
/// POST /api/v1/withdrawals
#[instrument(skip(services, req), fields(owner_id = req.owner_id))]
pub async fn request_withdrawal(
    services: web::Data<Services>,
    req: web::Json<WithdrawalRequest>,
) -> Result<HttpResponse, AppError> {
    validate_request(&req.0)?;

    let req = req.into_inner();
    let receipt = services
        .balance
        .request_withdrawal(req.owner_id, req.amount, req.evidence_ref)
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        WithdrawalResponse::from(receipt),
        "Withdrawal recorded",
    )))
}

/// Delete the withdrawal record; balances stay as they are
///
/// DELETE /api/v1/withdrawals/{id}
#[instrument(skip(services))]
pub async fn delete_withdrawal(
    services: web::Data<Services>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let withdrawal_id = path.into_inner();
    services.balance.delete_withdrawal(withdrawal_id).await?;

    info!(withdrawal_id, "Withdrawal deleted via API");
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        serde_json::json!({ "id": withdrawal_id }),
        "Withdrawal deleted",
    )))
}

/// GET /api/v1/owners/{id}/balance
#[instrument(skip(services))]
pub async fn owner_balance(
    services: web::Data<Services>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let summary = services.balance.owner_summary(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(summary)))
}

/// Record an out-of-band refund for a cancelled booking
///
/// POST /api/v1/refunds
#[instrument(skip(services, req), fields(booking_id = req.booking_id))]
pub async fn create_refund(
    services: web::Data<Services>,
    req: web::Json<RefundRequest>,
) -> Result<HttpResponse, AppError> {
    validate_request(&req.0)?;

    let req = req.into_inner();
    let refund = services
        .refunds
        .create_refund(req.booking_id, req.amount, req.evidence_ref)
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::success(RefundResponse::from(refund))))
}

/// Configure balance routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/withdrawals")
            .route("", web::post().to(request_withdrawal))
            .route("/{id}", web::delete().to(delete_withdrawal)),
    )
    .route("/owners/{id}/balance", web::get().to(owner_balance))
    .route("/refunds", web::post().to(create_refund));
}
