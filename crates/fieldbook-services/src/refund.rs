//! Refund bookkeeping
//!
//! Records that a cancelled booking was refunded out-of-band. No money moves
//! here and balances are untouched.

use fieldbook_core::{
    models::{BookingStatus, NewRefund, Refund},
    AppError, AppResult, Clock, Store,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::constants::MAX_REFERENCE_LENGTH;

pub struct RefundService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl RefundService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Record a refund for a cancelled booking
    ///
    /// # Errors
    ///
    /// - `BookingNotFound` if the booking does not exist
    /// - `RefundRejected` if the booking is not cancelled, was already
    ///   refunded, or `amount` is outside `(0, total_price]`
    #[instrument(skip(self, evidence_ref))]
    pub async fn create_refund(
        &self,
        booking_id: i64,
        amount: Decimal,
        evidence_ref: Option<String>,
    ) -> AppResult<Refund> {
        if evidence_ref
            .as_ref()
            .is_some_and(|r| r.len() > MAX_REFERENCE_LENGTH)
        {
            return Err(AppError::Validation("Evidence reference is too long".to_string()));
        }

        let mut tx = self.store.begin().await?;

        let booking = tx
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))?;

        if booking.status != BookingStatus::Cancelled {
            warn!(booking_id, status = %booking.status, "Refund on a booking that is not cancelled");
            return Err(AppError::RefundRejected(format!(
                "booking {} is {}, only cancelled bookings can be refunded",
                booking_id, booking.status
            )));
        }

        if tx.find_refund_by_booking(booking_id).await?.is_some() {
            return Err(AppError::RefundRejected(format!(
                "booking {} was already refunded",
                booking_id
            )));
        }

        if amount <= Decimal::ZERO || amount > booking.total_price {
            return Err(AppError::RefundRejected(format!(
                "amount {} must be positive and at most {}",
                amount, booking.total_price
            )));
        }

        let refund = tx
            .insert_refund(&NewRefund {
                booking_id,
                amount,
                evidence_ref,
                created_at: self.clock.now(),
            })
            .await?;

        tx.commit().await?;

        info!(booking_id, refund_id = refund.id, %amount, "Refund recorded");
        Ok(refund)
    }
}
