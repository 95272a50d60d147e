//! In-process store
//!
//! State lives behind a `tokio::sync::Mutex`. A transaction holds the owned
//! guard for its whole lifetime and works on a copy of the state that only
//! replaces the shared state on commit, so transactions run one at a time and
//! a dropped transaction leaves no trace. It enforces the same constraints as
//! the PostgreSQL schema (no overlap between occupying bookings, non-negative
//! stock and balance, one settlement credit and one refund per booking).

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use fieldbook_core::{
    models::{
        AddOn, BalanceTransaction, Booking, BookingPatch, BookingStatus, Field, Interval,
        LineItem, NewBooking, NewLineItem, NewRefund, NewWithdrawal, Place, Refund,
        TransactionType, Withdrawal,
    },
    traits::{Store, StoreTx},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
struct State {
    next_id: i64,
    places: BTreeMap<i64, Place>,
    fields: BTreeMap<i64, Field>,
    add_ons: BTreeMap<i64, AddOn>,
    bookings: BTreeMap<i64, Booking>,
    line_items: Vec<LineItem>,
    ledger: Vec<BalanceTransaction>,
    withdrawals: BTreeMap<i64, Withdrawal>,
    refunds: Vec<Refund>,
    /// Bookings whose writes fail with a transient error
    faulty_bookings: HashSet<i64>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_fault(&self, booking_id: i64) -> AppResult<()> {
        if self.faulty_bookings.contains(&booking_id) {
            warn!(booking_id, "Injected store failure");
            return Err(AppError::Transaction(format!(
                "injected failure for booking {}",
                booking_id
            )));
        }
        Ok(())
    }
}

/// Transactional in-memory implementation of [`Store`]
///
/// Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Seeding ====================

    pub async fn insert_place(&self, owner_id: i64, name: &str, balance: Decimal) -> Place {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let place = Place {
            id: state.next_id(),
            owner_id,
            name: name.to_string(),
            balance,
            created_at: now,
            updated_at: now,
        };
        state.places.insert(place.id, place.clone());
        place
    }

    /// Add a field open around the clock
    pub async fn insert_field(&self, place_id: i64, name: &str, price_per_hour: Decimal) -> Field {
        let mut state = self.state.lock().await;
        let field = Field {
            id: state.next_id(),
            place_id,
            name: name.to_string(),
            price_per_hour,
            opening_time: NaiveTime::MIN,
            closing_time: NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
        };
        state.fields.insert(field.id, field.clone());
        field
    }

    pub async fn insert_add_on(
        &self,
        place_id: i64,
        name: &str,
        price_per_hour: Decimal,
        stock: i32,
    ) -> AddOn {
        let mut state = self.state.lock().await;
        let add_on = AddOn {
            id: state.next_id(),
            place_id,
            name: name.to_string(),
            price_per_hour,
            stock,
        };
        state.add_ons.insert(add_on.id, add_on.clone());
        add_on
    }

    /// Owner edit of an add-on price, outside any booking
    pub async fn set_add_on_price(&self, add_on_id: i64, price_per_hour: Decimal) {
        let mut state = self.state.lock().await;
        if let Some(add_on) = state.add_ons.get_mut(&add_on_id) {
            add_on.price_per_hour = price_per_hour;
        }
    }

    // ==================== Inspection ====================

    pub async fn place(&self, place_id: i64) -> Option<Place> {
        self.state.lock().await.places.get(&place_id).cloned()
    }

    pub async fn add_on(&self, add_on_id: i64) -> Option<AddOn> {
        self.state.lock().await.add_ons.get(&add_on_id).cloned()
    }

    pub async fn booking(&self, booking_id: i64) -> Option<Booking> {
        self.state.lock().await.bookings.get(&booking_id).cloned()
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.state.lock().await.bookings.values().cloned().collect()
    }

    /// Every ledger entry, in insertion order
    pub async fn balance_transactions(&self) -> Vec<BalanceTransaction> {
        self.state.lock().await.ledger.clone()
    }

    // ==================== Fault injection ====================

    /// Make every write touching this booking fail with a transient error
    pub async fn fail_writes_for_booking(&self, booking_id: i64) {
        self.state.lock().await.faulty_bookings.insert(booking_id);
    }

    pub async fn clear_faults(&self) {
        self.state.lock().await.faulty_bookings.clear();
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }
}

/// Open in-memory transaction
pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    work: State,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_field(&mut self, field_id: i64) -> AppResult<Option<Field>> {
        // the whole store is already locked
        Ok(self.work.fields.get(&field_id).cloned())
    }

    async fn find_field(&mut self, field_id: i64) -> AppResult<Option<Field>> {
        Ok(self.work.fields.get(&field_id).cloned())
    }

    async fn find_place(&mut self, place_id: i64) -> AppResult<Option<Place>> {
        Ok(self.work.places.get(&place_id).cloned())
    }

    async fn list_owner_places(&mut self, owner_id: i64) -> AppResult<Vec<Place>> {
        self.lock_owner_places(owner_id).await
    }

    async fn lock_owner_places(&mut self, owner_id: i64) -> AppResult<Vec<Place>> {
        Ok(self
            .work
            .places
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn find_add_on(&mut self, add_on_id: i64) -> AppResult<Option<AddOn>> {
        Ok(self.work.add_ons.get(&add_on_id).cloned())
    }

    async fn reserve_stock(&mut self, add_on_id: i64, quantity: i32) -> AppResult<Option<i32>> {
        match self.work.add_ons.get_mut(&add_on_id) {
            Some(add_on) if add_on.stock >= quantity => {
                add_on.stock -= quantity;
                Ok(Some(add_on.stock))
            }
            _ => Ok(None),
        }
    }

    async fn restore_stock(&mut self, add_on_id: i64, quantity: i32) -> AppResult<Option<i32>> {
        Ok(self.work.add_ons.get_mut(&add_on_id).map(|add_on| {
            add_on.stock += quantity;
            add_on.stock
        }))
    }

    async fn find_occupying_bookings(
        &mut self,
        field_id: i64,
        window: &Interval,
        exclude_booking_id: Option<i64>,
    ) -> AppResult<Vec<Booking>> {
        let mut found: Vec<Booking> = self
            .work
            .bookings
            .values()
            .filter(|b| {
                b.field_id == field_id
                    && b.status.is_occupying()
                    && Some(b.id) != exclude_booking_id
                    && b.interval().overlaps(window)
            })
            .cloned()
            .collect();
        found.sort_by_key(|b| (b.start_time, b.id));
        Ok(found)
    }

    async fn insert_booking(&mut self, booking: &NewBooking) -> AppResult<Booking> {
        if !self.work.fields.contains_key(&booking.field_id) {
            return Err(AppError::Conflict(format!(
                "field {} does not exist",
                booking.field_id
            )));
        }
        if self
            .work
            .bookings
            .values()
            .any(|b| b.order_id == booking.order_id)
        {
            return Err(AppError::Conflict("duplicate order id".to_string()));
        }
        let overlapping = self
            .work
            .bookings
            .values()
            .any(|b| {
                b.field_id == booking.field_id
                    && b.status.is_occupying()
                    && b.interval().overlaps(&booking.interval)
            });
        if overlapping {
            return Err(AppError::ConflictingBooking {
                field_id: booking.field_id,
            });
        }

        let stored = Booking {
            id: self.work.next_id(),
            order_id: booking.order_id.clone(),
            field_id: booking.field_id,
            renter_id: booking.renter_id,
            start_time: booking.interval.start,
            end_time: booking.interval.end,
            total_price: booking.total_price,
            status: BookingStatus::Pending,
            payment_token: booking.payment_token.clone(),
            note: booking.note.clone(),
            created_at: booking.created_at,
            updated_at: booking.created_at,
        };
        self.work.bookings.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn insert_line_item(
        &mut self,
        booking_id: i64,
        item: &NewLineItem,
    ) -> AppResult<LineItem> {
        let duplicate = self
            .work
            .line_items
            .iter()
            .any(|li| li.booking_id == booking_id && li.add_on_id == item.add_on_id);
        if duplicate || item.quantity <= 0 {
            return Err(AppError::Conflict(format!(
                "invalid line item for booking {}",
                booking_id
            )));
        }

        let stored = LineItem {
            id: self.work.next_id(),
            booking_id,
            add_on_id: item.add_on_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            line_total: item.line_total,
        };
        self.work.line_items.push(stored.clone());
        Ok(stored)
    }

    async fn find_booking(&mut self, booking_id: i64) -> AppResult<Option<Booking>> {
        Ok(self.work.bookings.get(&booking_id).cloned())
    }

    async fn find_booking_by_order_id(&mut self, order_id: &str) -> AppResult<Option<Booking>> {
        Ok(self
            .work
            .bookings
            .values()
            .find(|b| b.order_id == order_id)
            .cloned())
    }

    async fn list_line_items(&mut self, booking_id: i64) -> AppResult<Vec<LineItem>> {
        Ok(self
            .work
            .line_items
            .iter()
            .filter(|li| li.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn list_field_bookings(
        &mut self,
        field_id: i64,
        status: Option<BookingStatus>,
    ) -> AppResult<Vec<Booking>> {
        let mut found: Vec<Booking> = self
            .work
            .bookings
            .values()
            .filter(|b| b.field_id == field_id && status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        found.sort_by_key(|b| (b.start_time, b.id));
        Ok(found)
    }

    async fn patch_booking(
        &mut self,
        booking_id: i64,
        expected: BookingStatus,
        patch: &BookingPatch,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Booking>> {
        self.work.check_fault(booking_id)?;

        let Some(booking) = self.work.bookings.get_mut(&booking_id) else {
            return Ok(None);
        };
        if booking.status != expected {
            debug!("Booking {} is no longer {}", booking_id, expected);
            return Ok(None);
        }

        if let Some(status) = patch.status {
            booking.status = status;
        }
        if let Some(note) = &patch.note {
            booking.note = Some(note.clone());
        }
        if let Some(token) = &patch.payment_token {
            booking.payment_token = Some(token.clone());
        }
        booking.updated_at = at;

        Ok(Some(booking.clone()))
    }

    async fn list_settleable(&mut self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<Booking>> {
        let mut found: Vec<Booking> = self
            .work
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Approved && b.has_ended(now))
            .cloned()
            .collect();
        found.sort_by_key(|b| (b.end_time, b.id));
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn list_upcoming(
        &mut self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<Booking>> {
        let mut found: Vec<Booking> = self
            .work
            .bookings
            .values()
            .filter(|b| {
                b.status == BookingStatus::Approved && b.start_time >= from && b.start_time <= until
            })
            .cloned()
            .collect();
        found.sort_by_key(|b| (b.start_time, b.id));
        Ok(found)
    }

    async fn credit_place(
        &mut self,
        place_id: i64,
        amount: Decimal,
        booking_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<BalanceTransaction> {
        self.work.check_fault(booking_id)?;

        let already_settled = self.work.ledger.iter().any(|e| {
            e.transaction_type == TransactionType::SettlementCredit
                && e.booking_id == Some(booking_id)
        });
        if already_settled {
            return Err(AppError::Conflict(format!(
                "booking {} already settled",
                booking_id
            )));
        }

        let place = self
            .work
            .places
            .get_mut(&place_id)
            .ok_or_else(|| AppError::Internal(format!("Place {} disappeared", place_id)))?;
        let previous = place.balance;
        place.balance += amount;
        place.updated_at = at;

        let mut entry = BalanceTransaction::settlement(place_id, amount, previous, booking_id, at);
        entry.id = self.work.next_id();
        self.work.ledger.push(entry.clone());
        Ok(entry)
    }

    async fn debit_place(
        &mut self,
        place_id: i64,
        amount: Decimal,
        withdrawal_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<Option<BalanceTransaction>> {
        let previous = match self.work.places.get_mut(&place_id) {
            Some(place) if place.balance >= amount => {
                let previous = place.balance;
                place.balance -= amount;
                place.updated_at = at;
                previous
            }
            _ => return Ok(None),
        };

        let mut entry =
            BalanceTransaction::withdrawal(place_id, amount, previous, withdrawal_id, at);
        entry.id = self.work.next_id();
        self.work.ledger.push(entry.clone());
        Ok(Some(entry))
    }

    async fn list_balance_transactions(
        &mut self,
        place_id: i64,
    ) -> AppResult<Vec<BalanceTransaction>> {
        Ok(self
            .work
            .ledger
            .iter()
            .filter(|e| e.place_id == place_id)
            .cloned()
            .collect())
    }

    async fn insert_withdrawal(&mut self, withdrawal: &NewWithdrawal) -> AppResult<Withdrawal> {
        let stored = Withdrawal {
            id: self.work.next_id(),
            owner_id: withdrawal.owner_id,
            amount: withdrawal.amount,
            evidence_ref: withdrawal.evidence_ref.clone(),
            created_at: withdrawal.created_at,
        };
        self.work.withdrawals.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn delete_withdrawal(&mut self, withdrawal_id: i64) -> AppResult<bool> {
        Ok(self.work.withdrawals.remove(&withdrawal_id).is_some())
    }

    async fn owner_withdrawal_totals(&mut self, owner_id: i64) -> AppResult<(Decimal, i64)> {
        Ok(self
            .work
            .withdrawals
            .values()
            .filter(|w| w.owner_id == owner_id)
            .fold((Decimal::ZERO, 0), |(sum, count), w| {
                (sum + w.amount, count + 1)
            }))
    }

    async fn find_refund_by_booking(&mut self, booking_id: i64) -> AppResult<Option<Refund>> {
        Ok(self
            .work
            .refunds
            .iter()
            .find(|r| r.booking_id == booking_id)
            .cloned())
    }

    async fn insert_refund(&mut self, refund: &NewRefund) -> AppResult<Refund> {
        if self.work.refunds.iter().any(|r| r.booking_id == refund.booking_id) {
            return Err(AppError::Conflict(format!(
                "booking {} already refunded",
                refund.booking_id
            )));
        }

        let stored = Refund {
            id: self.work.next_id(),
            booking_id: refund.booking_id,
            amount: refund.amount,
            evidence_ref: refund.evidence_ref.clone(),
            created_at: refund.created_at,
        };
        self.work.refunds.push(stored.clone());
        Ok(stored)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn new_booking(field_id: i64, start_h: u32, end_h: u32) -> NewBooking {
        let day = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        NewBooking {
            order_id: format!("BOOKING-{}-{}", field_id, start_h),
            field_id,
            renter_id: 7,
            interval: Interval::new(
                day + Duration::hours(start_h as i64),
                day + Duration::hours(end_h as i64),
            )
            .unwrap(),
            total_price: dec!(100),
            payment_token: None,
            note: None,
            created_at: day,
        }
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        let place = store.insert_place(1, "Arena", dec!(0)).await;
        let add_on = store.insert_add_on(place.id, "Ball", dec!(5), 3).await;

        {
            let mut tx = store.begin().await.unwrap();
            assert_eq!(tx.reserve_stock(add_on.id, 2).await.unwrap(), Some(1));
        }

        assert_eq!(store.add_on(add_on.id).await.unwrap().stock, 3);

        let mut tx = store.begin().await.unwrap();
        tx.reserve_stock(add_on.id, 2).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.add_on(add_on.id).await.unwrap().stock, 1);
    }

    #[tokio::test]
    async fn test_reserve_stock_is_conditional() {
        let store = MemoryStore::new();
        let place = store.insert_place(1, "Arena", dec!(0)).await;
        let add_on = store.insert_add_on(place.id, "Bib", dec!(1), 1).await;

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.reserve_stock(add_on.id, 2).await.unwrap(), None);
        assert_eq!(tx.reserve_stock(add_on.id, 1).await.unwrap(), Some(0));
        assert_eq!(tx.reserve_stock(add_on.id, 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overlapping_insert_is_rejected() {
        let store = MemoryStore::new();
        let place = store.insert_place(1, "Arena", dec!(0)).await;
        let field = store.insert_field(place.id, "Court 1", dec!(100)).await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_booking(&new_booking(field.id, 10, 12)).await.unwrap();
        tx.insert_booking(&new_booking(field.id, 12, 13)).await.unwrap();

        let mut clash = new_booking(field.id, 11, 13);
        clash.order_id = "BOOKING-clash".to_string();
        let err = tx.insert_booking(&clash).await.unwrap_err();
        assert!(matches!(err, AppError::ConflictingBooking { .. }));
    }

    #[tokio::test]
    async fn test_patch_requires_expected_status() {
        let store = MemoryStore::new();
        let place = store.insert_place(1, "Arena", dec!(0)).await;
        let field = store.insert_field(place.id, "Court 1", dec!(100)).await;

        let mut tx = store.begin().await.unwrap();
        let booking = tx.insert_booking(&new_booking(field.id, 8, 9)).await.unwrap();
        let now = Utc::now();

        let approved = tx
            .patch_booking(
                booking.id,
                BookingStatus::Pending,
                &BookingPatch::status(BookingStatus::Approved),
                now,
            )
            .await
            .unwrap();
        assert_eq!(approved.unwrap().status, BookingStatus::Approved);

        let again = tx
            .patch_booking(
                booking.id,
                BookingStatus::Pending,
                &BookingPatch::status(BookingStatus::Cancelled),
                now,
            )
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_second_settlement_credit_is_rejected() {
        let store = MemoryStore::new();
        let place = store.insert_place(1, "Arena", dec!(0)).await;
        let now = Utc::now();

        let mut tx = store.begin().await.unwrap();
        tx.credit_place(place.id, dec!(50), 99, now).await.unwrap();
        assert!(tx.credit_place(place.id, dec!(50), 99, now).await.is_err());
    }

    #[tokio::test]
    async fn test_debit_never_goes_negative() {
        let store = MemoryStore::new();
        let place = store.insert_place(1, "Arena", dec!(80)).await;
        let now = Utc::now();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.debit_place(place.id, dec!(81), 1, now).await.unwrap().is_none());
        let entry = tx.debit_place(place.id, dec!(80), 1, now).await.unwrap().unwrap();
        assert_eq!(entry.new_balance, dec!(0));
        tx.commit().await.unwrap();

        assert_eq!(store.place(place.id).await.unwrap().balance, dec!(0));
    }
}
