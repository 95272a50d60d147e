//! Booking state machine
//!
//! The only path through which a booking's status changes. Each transition
//! is written with a conditional update (`WHERE id = ? AND status = expected`)
//! and its side effects run in the same transaction:
//!
//! | From     | Event    | To        | Side effects                         |
//! |----------|----------|-----------|--------------------------------------|
//! | pending  | approve  | approved  | none                                 |
//! | pending  | cancel   | cancelled | restore line-item stock              |
//! | approved | complete | completed | restore stock, credit place by total |

use chrono::{DateTime, Utc};
use fieldbook_core::{
    models::{Booking, BookingEvent, BookingNotice, BookingPatch, BookingStatus, TransitionEffects},
    AppError, AppResult, Clock, Notifier, Store, StoreTx,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::constants::MAX_REFERENCE_LENGTH;
use crate::inventory::InventoryLedger;

pub struct BookingStateMachine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    max_note_length: usize,
}

impl BookingStateMachine {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        max_note_length: usize,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            max_note_length,
        }
    }

    /// Owner approval or rejection / renter cancellation
    ///
    /// Only `approved` and `cancelled` are accepted here; completion has its
    /// own entry point.
    #[instrument(skip(self, note))]
    pub async fn set_status(
        &self,
        booking_id: i64,
        new_status: BookingStatus,
        note: Option<String>,
    ) -> AppResult<Booking> {
        let event = match new_status {
            BookingStatus::Approved => BookingEvent::Approve,
            BookingStatus::Cancelled => BookingEvent::Cancel,
            other => {
                return Err(AppError::Validation(format!(
                    "Status can only be set to approved or cancelled, got {}",
                    other
                )))
            }
        };

        self.fire(booking_id, event, note).await
    }

    /// Manual `approved -> completed` after external settlement
    #[instrument(skip(self))]
    pub async fn complete(&self, booking_id: i64) -> AppResult<Booking> {
        self.fire(booking_id, BookingEvent::Complete, None).await
    }

    /// Attach the payment provider's token without touching the status
    #[instrument(skip(self, token))]
    pub async fn attach_payment_token(&self, booking_id: i64, token: String) -> AppResult<Booking> {
        if token.len() > MAX_REFERENCE_LENGTH {
            return Err(AppError::Validation("Payment token is too long".to_string()));
        }
        let patch = BookingPatch::payment_token(token);
        patch.validate(self.max_note_length)?;

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let booking = tx
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))?;

        if booking.status.is_terminal() {
            return Err(AppError::InvalidTransition {
                from: booking.status.to_string(),
                to: booking.status.to_string(),
            });
        }

        let updated = match tx.patch_booking(booking.id, booking.status, &patch, now).await? {
            Some(updated) => updated,
            None => return Err(Self::lost_race(tx.as_mut(), booking_id, booking.status).await),
        };

        tx.commit().await?;

        info!(booking_id, "Payment token attached");
        Ok(updated)
    }

    /// Settle one expired booking for the sweep
    ///
    /// Returns `Ok(None)` when the booking is no longer approved, which makes
    /// overlapping sweeps and manual completion harmless.
    #[instrument(skip(self))]
    pub async fn settle(&self, booking_id: i64, now: DateTime<Utc>) -> AppResult<Option<Booking>> {
        let (to, effects) = BookingStatus::Approved.transition(BookingEvent::Complete)?;

        let mut tx = self.store.begin().await?;

        let Some(updated) = tx
            .patch_booking(
                booking_id,
                BookingStatus::Approved,
                &BookingPatch::status(to),
                now,
            )
            .await?
        else {
            debug!(booking_id, "Booking already settled or no longer approved");
            return Ok(None);
        };

        Self::apply_effects(tx.as_mut(), &updated, effects, now).await?;
        tx.commit().await?;

        info!(
            booking_id,
            total = %updated.total_price,
            "Booking settled"
        );

        self.announce(&updated, BookingStatus::Approved).await;
        Ok(Some(updated))
    }

    /// Run one event against the current status
    async fn fire(
        &self,
        booking_id: i64,
        event: BookingEvent,
        note: Option<String>,
    ) -> AppResult<Booking> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let booking = tx
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))?;

        let (to, effects) = booking.status.transition(event).map_err(|e| {
            warn!(booking_id, from = %booking.status, %event, "Transition rejected");
            e
        })?;

        let patch = BookingPatch::status(to).with_note(note);
        patch.validate(self.max_note_length)?;

        let updated = match tx.patch_booking(booking.id, booking.status, &patch, now).await? {
            Some(updated) => updated,
            None => return Err(Self::lost_race(tx.as_mut(), booking_id, to).await),
        };

        Self::apply_effects(tx.as_mut(), &updated, effects, now).await?;
        tx.commit().await?;

        info!(booking_id, from = %booking.status, to = %to, "Booking status changed");

        self.announce(&updated, booking.status).await;
        Ok(updated)
    }

    /// Side effects of a transition, inside the transition's transaction
    async fn apply_effects(
        tx: &mut dyn StoreTx,
        booking: &Booking,
        effects: TransitionEffects,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if effects.restore_stock {
            let items = tx.list_line_items(booking.id).await?;
            InventoryLedger::restore_line_items(tx, &items).await?;
        }

        if effects.credit_owner {
            let field = tx.find_field(booking.field_id).await?.ok_or_else(|| {
                AppError::Internal(format!(
                    "Field {} of booking {} disappeared",
                    booking.field_id, booking.id
                ))
            })?;
            tx.credit_place(field.place_id, booking.total_price, booking.id, now)
                .await?;
        }

        Ok(())
    }

    /// The conditional write matched nothing: someone else moved the booking
    async fn lost_race(tx: &mut dyn StoreTx, booking_id: i64, target: BookingStatus) -> AppError {
        match tx.find_booking(booking_id).await {
            Ok(Some(current)) => AppError::InvalidTransition {
                from: current.status.to_string(),
                to: target.to_string(),
            },
            Ok(None) => AppError::BookingNotFound(booking_id.to_string()),
            Err(e) => e,
        }
    }

    async fn announce(&self, booking: &Booking, from: BookingStatus) {
        let notice = BookingNotice::for_booking(booking, Some(from));
        if let Err(e) = self.notifier.notify(&notice).await {
            warn!(booking_id = booking.id, error = %e, "Failed to send booking notice");
        }
    }
}
