//! Booking DTOs
//!
//! Request and response types for booking, availability and settlement
//! endpoints.

use chrono::{DateTime, Utc};
use fieldbook_core::models::{
    Booking, BookingDetails, BookingStatus, LineItem, LineItemRequest, ReservationRequest,
};
use fieldbook_services::{constants::MAX_LINE_ITEMS, SweepReport};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::BusinessRules;

/// One add-on on a booking request
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Validate)]
pub struct LineItemDto {
    #[validate(range(min = 1))]
    pub add_on_id: i64,

    #[validate(range(min = 1, max = 1000))]
    pub quantity: i32,
}

/// Booking creation request
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateBookingRequest {
    #[validate(range(min = 1))]
    pub field_id: i64,

    #[validate(range(min = 1))]
    pub renter_id: i64,

    pub start: DateTime<Utc>,

    /// Checked against `start` by the coordinator, after the lead-time rule
    pub end: DateTime<Utc>,

    #[serde(default)]
    #[validate(nested)]
    pub line_items: Vec<LineItemDto>,

    #[validate(length(min = 1, max = 255))]
    pub payment_token: Option<String>,

    #[validate(length(max = 500))]
    pub note: Option<String>,
}

impl BusinessRules for CreateBookingRequest {
    fn validate_business_rules(&self) -> Result<(), String> {
        if self.line_items.len() > MAX_LINE_ITEMS {
            return Err(format!("at most {} line items per booking", MAX_LINE_ITEMS));
        }
        if self
            .payment_token
            .as_ref()
            .is_some_and(|t| t.trim().is_empty())
        {
            return Err("payment_token must not be blank".to_string());
        }
        Ok(())
    }
}

impl From<CreateBookingRequest> for ReservationRequest {
    fn from(req: CreateBookingRequest) -> Self {
        Self {
            field_id: req.field_id,
            renter_id: req.renter_id,
            start: req.start,
            end: req.end,
            line_items: req
                .line_items
                .into_iter()
                .map(|item| LineItemRequest {
                    add_on_id: item.add_on_id,
                    quantity: item.quantity,
                })
                .collect(),
            payment_token: req.payment_token,
            note: req.note,
        }
    }
}

/// Owner approval/rejection or renter cancellation
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct UpdateStatusRequest {
    /// `approved` or `cancelled`
    #[validate(length(min = 1, max = 32))]
    pub status: String,

    #[validate(length(max = 500))]
    pub note: Option<String>,
}

impl UpdateStatusRequest {
    pub fn parsed_status(&self) -> Option<BookingStatus> {
        BookingStatus::from_str(&self.status)
    }
}

impl BusinessRules for UpdateStatusRequest {
    fn validate_business_rules(&self) -> Result<(), String> {
        match self.parsed_status() {
            Some(BookingStatus::Approved | BookingStatus::Cancelled) => Ok(()),
            Some(other) => Err(format!("status cannot be set to {}", other)),
            None => Err(format!("unknown status '{}'", self.status)),
        }
    }
}

/// Payment token attachment
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PaymentTokenRequest {
    #[validate(length(min = 1, max = 255))]
    pub payment_token: String,
}

impl BusinessRules for PaymentTokenRequest {
    fn validate_business_rules(&self) -> Result<(), String> {
        if self.payment_token.trim().is_empty() {
            return Err("payment_token must not be blank".to_string());
        }
        Ok(())
    }
}

/// Query parameters for listing a field's bookings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldBookingsQuery {
    pub status: Option<String>,
}

/// Availability pre-flight check
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AvailabilityRequest {
    #[validate(range(min = 1))]
    pub field_id: i64,

    pub start: DateTime<Utc>,

    pub end: DateTime<Utc>,

    pub exclude_booking_id: Option<i64>,
}

impl BusinessRules for AvailabilityRequest {
    fn validate_business_rules(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub field_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemResponse {
    pub add_on_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl From<LineItem> for LineItemResponse {
    fn from(item: LineItem) -> Self {
        Self {
            add_on_id: item.add_on_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            line_total: item.line_total,
        }
    }
}

/// Booking response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub id: i64,
    pub order_id: String,
    pub field_id: i64,
    pub renter_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_price: Decimal,
    pub status: String,
    pub payment_token: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_items: Option<Vec<LineItemResponse>>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            order_id: booking.order_id,
            field_id: booking.field_id,
            renter_id: booking.renter_id,
            start_time: booking.start_time,
            end_time: booking.end_time,
            total_price: booking.total_price,
            status: booking.status.to_string(),
            payment_token: booking.payment_token,
            note: booking.note,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
            line_items: None,
        }
    }
}

impl From<BookingDetails> for BookingResponse {
    fn from(details: BookingDetails) -> Self {
        let mut response = Self::from(details.booking);
        response.line_items = Some(details.line_items.into_iter().map(Into::into).collect());
        response
    }
}

/// Result of a manually triggered settlement sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResponse {
    pub ran_at: DateTime<Utc>,
    pub found: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SweepResponse {
    pub fn new(ran_at: DateTime<Utc>, report: SweepReport) -> Self {
        Self {
            ran_at,
            found: report.found,
            completed: report.completed,
            skipped: report.skipped,
            failed: report.failed,
        }
    }
}
