//! Reservation coordinator
//!
//! Creates a booking, its line items and the matching stock reservations as
//! one atomic unit:
//! 1. Reject starts in the past or inside the minimum lead time, then empty
//!    or inverted intervals and malformed line items (no store access)
//! 2. Lock the field row
//! 3. Check availability against every other occupying booking
//! 4. Check each add-on belongs to the field's place and has enough stock
//! 5. Price the booking
//! 6. Insert booking and line items, decrement stock, commit
//!
//! Any failure after step 1 drops the transaction, so nothing is written.

use chrono::{DateTime, Duration, Utc};
use fieldbook_core::{
    models::{
        AddOn, Booking, BookingDetails, BookingNotice, BookingStatus, Interval, LineItemRequest,
        NewBooking, ReservationRequest,
    },
    AppError, AppResult, BookingConfig, Clock, Notifier, Store,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::availability::AvailabilityChecker;
use crate::constants::{MAX_LINE_ITEMS, MAX_REFERENCE_LENGTH, ORDER_ID_PREFIX, ORDER_ID_SUFFIX_LEN};
use crate::inventory::InventoryLedger;
use crate::pricing;

/// Reservation coordinator
///
/// Owns booking creation and the read side of bookings.
pub struct ReservationCoordinator {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    config: BookingConfig,
}

impl ReservationCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        config: BookingConfig,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            config,
        }
    }

    /// Build a unique order id: `BOOKING-{unix_millis}-{renter}-{8 hex}`
    pub fn generate_order_id(now: DateTime<Utc>, renter_id: i64) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}-{}",
            ORDER_ID_PREFIX,
            now.timestamp_millis(),
            renter_id,
            &suffix[..ORDER_ID_SUFFIX_LEN]
        )
    }

    /// Checks that need no store access
    fn validate_request(&self, req: &ReservationRequest, now: DateTime<Utc>) -> AppResult<Interval> {
        let earliest = now + Duration::hours(self.config.min_lead_time_hours);
        if req.start <= now || req.start < earliest {
            return Err(AppError::PastOrTooSoonBooking {
                start: req.start.to_rfc3339(),
                min_lead_hours: self.config.min_lead_time_hours,
            });
        }

        let interval = Interval::new(req.start, req.end)?;

        validate_line_items(&req.line_items)?;

        if let Some(note) = &req.note {
            if note.chars().count() > self.config.max_note_length {
                return Err(AppError::Validation(format!(
                    "Note exceeds {} characters",
                    self.config.max_note_length
                )));
            }
        }
        if let Some(token) = &req.payment_token {
            if token.trim().is_empty() || token.len() > MAX_REFERENCE_LENGTH {
                return Err(AppError::Validation("Invalid payment token".to_string()));
            }
        }

        Ok(interval)
    }

    /// Create a pending booking with its add-ons
    ///
    /// # Errors
    ///
    /// - `PastOrTooSoonBooking`, `InvalidInterval`, `Validation` before any store access
    /// - `ResourceNotFound` if the field does not exist
    /// - `ConflictingBooking` if another pending/approved booking overlaps
    /// - `AddOnNotFound` / `InsufficientStock` for line items
    #[instrument(skip(self, req), fields(field_id = req.field_id, renter_id = req.renter_id))]
    pub async fn create_reservation(&self, req: ReservationRequest) -> AppResult<BookingDetails> {
        let now = self.clock.now();
        let interval = self.validate_request(&req, now)?;

        let mut tx = self.store.begin().await?;

        let field = tx
            .lock_field(req.field_id)
            .await?
            .ok_or(AppError::ResourceNotFound(req.field_id))?;

        let conflicts =
            AvailabilityChecker::conflicts_in(tx.as_mut(), field.id, &interval, None).await?;
        if let Some(existing) = conflicts.first() {
            warn!(
                field_id = field.id,
                existing_booking = existing.id,
                "Requested interval is already taken"
            );
            return Err(AppError::ConflictingBooking { field_id: field.id });
        }

        let mut add_ons: Vec<(AddOn, i32)> = Vec::with_capacity(req.line_items.len());
        for item in &req.line_items {
            let add_on = tx
                .find_add_on(item.add_on_id)
                .await?
                .ok_or(AppError::AddOnNotFound(item.add_on_id))?;

            if add_on.place_id != field.place_id {
                return Err(AppError::Validation(format!(
                    "Add-on {} does not belong to the place of field {}",
                    add_on.id, field.id
                )));
            }
            if !add_on.has_stock(item.quantity) {
                warn!(
                    add_on_id = add_on.id,
                    requested = item.quantity,
                    available = add_on.stock,
                    "Insufficient stock"
                );
                return Err(AppError::InsufficientStock {
                    add_on_id: add_on.id,
                    requested: item.quantity,
                    available: add_on.stock,
                });
            }
            add_ons.push((add_on, item.quantity));
        }

        let quote = pricing::quote(&field, &interval, &add_ons);
        debug!(
            hours = quote.billable_hours,
            total = %quote.total,
            "Reservation priced"
        );

        let booking = tx
            .insert_booking(&NewBooking {
                order_id: Self::generate_order_id(now, req.renter_id),
                field_id: field.id,
                renter_id: req.renter_id,
                interval,
                total_price: quote.total,
                payment_token: req.payment_token.clone(),
                note: req.note.clone(),
                created_at: now,
            })
            .await?;

        let mut line_items = Vec::with_capacity(quote.line_items.len());
        for item in &quote.line_items {
            line_items.push(tx.insert_line_item(booking.id, item).await?);
            InventoryLedger::reserve(tx.as_mut(), item.add_on_id, item.quantity).await?;
        }

        tx.commit().await?;

        info!(
            booking_id = booking.id,
            order_id = %booking.order_id,
            total = %booking.total_price,
            "Booking created"
        );

        self.announce(&booking).await;

        Ok(BookingDetails {
            booking,
            line_items,
        })
    }

    /// Fetch a booking with its line items
    #[instrument(skip(self))]
    pub async fn get_booking(&self, booking_id: i64) -> AppResult<BookingDetails> {
        let mut tx = self.store.begin().await?;
        let booking = tx
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))?;
        let line_items = tx.list_line_items(booking.id).await?;

        Ok(BookingDetails {
            booking,
            line_items,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_booking_by_order_id(&self, order_id: &str) -> AppResult<BookingDetails> {
        let mut tx = self.store.begin().await?;
        let booking = tx
            .find_booking_by_order_id(order_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(order_id.to_string()))?;
        let line_items = tx.list_line_items(booking.id).await?;

        Ok(BookingDetails {
            booking,
            line_items,
        })
    }

    /// Bookings of a field ordered by start time
    #[instrument(skip(self))]
    pub async fn list_field_bookings(
        &self,
        field_id: i64,
        status: Option<BookingStatus>,
    ) -> AppResult<Vec<Booking>> {
        let mut tx = self.store.begin().await?;
        tx.find_field(field_id)
            .await?
            .ok_or(AppError::ResourceNotFound(field_id))?;

        tx.list_field_bookings(field_id, status).await
    }

    async fn announce(&self, booking: &Booking) {
        let notice = BookingNotice::for_booking(booking, None);
        if let Err(e) = self.notifier.notify(&notice).await {
            warn!(booking_id = booking.id, error = %e, "Failed to send booking notice");
        }
    }
}

/// Positive quantities, no repeated add-on, bounded count
fn validate_line_items(items: &[LineItemRequest]) -> AppResult<()> {
    if items.len() > MAX_LINE_ITEMS {
        return Err(AppError::Validation(format!(
            "At most {} add-ons per booking",
            MAX_LINE_ITEMS
        )));
    }

    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if item.quantity <= 0 {
            return Err(AppError::Validation(format!(
                "Quantity for add-on {} must be positive",
                item.add_on_id
            )));
        }
        if !seen.insert(item.add_on_id) {
            return Err(AppError::Validation(format!(
                "Add-on {} listed more than once",
                item.add_on_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_order_id_format() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let id = ReservationCoordinator::generate_order_id(now, 42);
        let parts: Vec<&str> = id.split('-').collect();

        assert_eq!(parts[0], "BOOKING");
        assert_eq!(parts[1], now.timestamp_millis().to_string());
        assert_eq!(parts[2], "42");
        assert_eq!(parts[3].len(), 8);
        assert_ne!(id, ReservationCoordinator::generate_order_id(now, 42));
    }

    #[test]
    fn test_line_item_validation() {
        let ok = [
            LineItemRequest {
                add_on_id: 1,
                quantity: 2,
            },
            LineItemRequest {
                add_on_id: 2,
                quantity: 1,
            },
        ];
        assert!(validate_line_items(&ok).is_ok());

        let zero = [LineItemRequest {
            add_on_id: 1,
            quantity: 0,
        }];
        assert!(matches!(
            validate_line_items(&zero),
            Err(AppError::Validation(_))
        ));

        let repeated = [ok[0], ok[0]];
        assert!(validate_line_items(&repeated).is_err());
    }
}
