//! Booking handlers
//!
//! Creation, lookup, status changes and availability of field bookings.

use crate::dto::{
    validate_request, ApiResponse, AvailabilityRequest, AvailabilityResponse, BookingResponse,
    CreateBookingRequest, FieldBookingsQuery, PaymentTokenRequest, UpdateStatusRequest,
};
use actix_web::{web, HttpResponse};
use fieldbook_core::{models::BookingStatus, AppError};
use fieldbook_services::Services;
use tracing::{debug, info, instrument};

/// Create a pending booking
///
/// POST /api/v1/bookings
#[instrument(skip(services, req), fields(field_id = req.field_id, renter_id = req.renter_id))]
pub async fn create_booking(
    services: web::Data<Services>,
    req: web::Json<CreateBookingRequest>,
) -> Result<HttpResponse, AppError> {
    validate_request(&req.0)?;

    let details = services
        .coordinator
        .create_reservation(req.into_inner().into())
        .await?;

    info!(
        booking_id = details.booking.id,
        order_id = %details.booking.order_id,
        "Booking created via API"
    );

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        BookingResponse::from(details),
        "Booking created, waiting for owner approval",
    )))
}

/// GET /api/v1/bookings/{id}
#[instrument(skip(services))]
pub async fn get_booking(
    services: web::Data<Services>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let booking_id = path.into_inner();
    let details = services.coordinator.get_booking(booking_id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(BookingResponse::from(details))))
}

/// GET /api/v1/bookings/order/{order_id}
#[instrument(skip(services))]
pub async fn get_booking_by_order_id(
    services: web::Data<Services>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let details = services
        .coordinator
        .get_booking_by_order_id(&order_id)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(BookingResponse::from(details))))
}

/// Approve, reject or cancel a booking
///
/// PATCH /api/v1/bookings/{id}/status
#[instrument(skip(services, req))]
pub async fn update_status(
    services: web::Data<Services>,
    path: web::Path<i64>,
    req: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let booking_id = path.into_inner();
    validate_request(&req.0)?;

    let req = req.into_inner();
    let status = req
        .parsed_status()
        .ok_or_else(|| AppError::Validation(format!("unknown status '{}'", req.status)))?;

    let booking = services
        .state_machine
        .set_status(booking_id, status, req.note)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        BookingResponse::from(booking),
        format!("Booking {}", status),
    )))
}

/// Manual completion after external settlement
///
/// POST /api/v1/bookings/{id}/complete
#[instrument(skip(services))]
pub async fn complete_booking(
    services: web::Data<Services>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let booking_id = path.into_inner();
    let booking = services.state_machine.complete(booking_id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        BookingResponse::from(booking),
        "Booking completed",
    )))
}

/// PATCH /api/v1/bookings/{id}/payment-token
#[instrument(skip(services, req))]
pub async fn attach_payment_token(
    services: web::Data<Services>,
    path: web::Path<i64>,
    req: web::Json<PaymentTokenRequest>,
) -> Result<HttpResponse, AppError> {
    let booking_id = path.into_inner();
    validate_request(&req.0)?;

    let booking = services
        .state_machine
        .attach_payment_token(booking_id, req.into_inner().payment_token)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(BookingResponse::from(booking))))
}

/// Read-only availability check; the answer is not a hold
///
/// POST /api/v1/availability
#[instrument(skip(services, req))]
pub async fn check_availability(
    services: web::Data<Services>,
    req: web::Json<AvailabilityRequest>,
) -> Result<HttpResponse, AppError> {
    validate_request(&req.0)?;

    let available = services
        .availability
        .is_available(req.field_id, req.start, req.end, req.exclude_booking_id)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(AvailabilityResponse {
        field_id: req.field_id,
        start: req.start,
        end: req.end,
        available,
    })))
}

/// GET /api/v1/fields/{id}/bookings
#[instrument(skip(services))]
pub async fn list_field_bookings(
    services: web::Data<Services>,
    path: web::Path<i64>,
    query: web::Query<FieldBookingsQuery>,
) -> Result<HttpResponse, AppError> {
    let field_id = path.into_inner();

    let status = match query.status.as_deref() {
        Some(raw) => Some(
            BookingStatus::from_str(raw)
                .ok_or_else(|| AppError::Validation(format!("unknown status '{}'", raw)))?,
        ),
        None => None,
    };
    debug!(field_id, ?status, "Listing field bookings");

    let bookings = services
        .coordinator
        .list_field_bookings(field_id, status)
        .await?;

    let response: Vec<BookingResponse> = bookings.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// Configure booking routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/bookings")
            .route("", web::post().to(create_booking))
            .route("/order/{order_id}", web::get().to(get_booking_by_order_id))
            .route("/{id}", web::get().to(get_booking))
            .route("/{id}/status", web::patch().to(update_status))
            .route("/{id}/complete", web::post().to(complete_booking))
            .route("/{id}/payment-token", web::patch().to(attach_payment_token)),
    )
    .route("/availability", web::post().to(check_availability))
    .route("/fields/{id}/bookings", web::get().to(list_field_bookings));
}
