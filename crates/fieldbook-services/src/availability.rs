//! Availability checker
//!
//! Decides whether a field is free for a half-open interval. Only pending
//! and approved bookings occupy a field.

use chrono::{DateTime, Utc};
use fieldbook_core::{
    models::{Booking, Interval},
    AppError, AppResult, Store, StoreTx,
};
use std::sync::Arc;
use tracing::{debug, instrument};

pub struct AvailabilityChecker {
    store: Arc<dyn Store>,
}

impl AvailabilityChecker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Bookings that block `interval` on the field, evaluated inside `tx`
    ///
    /// Callers about to write a booking must use the same transaction for the
    /// check and the write.
    pub async fn conflicts_in(
        tx: &mut dyn StoreTx,
        field_id: i64,
        interval: &Interval,
        exclude_booking_id: Option<i64>,
    ) -> AppResult<Vec<Booking>> {
        let candidates = tx
            .find_occupying_bookings(field_id, interval, exclude_booking_id)
            .await?;

        Ok(candidates
            .into_iter()
            .filter(|b| b.status.is_occupying() && b.interval().overlaps(interval))
            .collect())
    }

    /// Read-only pre-flight check
    #[instrument(skip(self))]
    pub async fn is_available(
        &self,
        field_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_booking_id: Option<i64>,
    ) -> AppResult<bool> {
        let interval = Interval::new(start, end)?;

        let mut tx = self.store.begin().await?;
        tx.find_field(field_id)
            .await?
            .ok_or(AppError::ResourceNotFound(field_id))?;

        let conflicts =
            Self::conflicts_in(tx.as_mut(), field_id, &interval, exclude_booking_id).await?;

        debug!(
            field_id,
            conflicts = conflicts.len(),
            "Availability checked"
        );

        Ok(conflicts.is_empty())
    }
}
