//! Storage and notification abstractions
//!
//! Services never open connections themselves. They receive a [`Store`],
//! begin a [`StoreTx`] per operation and perform every read and write of that
//! operation through it, so the whole operation commits or rolls back as one.

use crate::models::{
    AddOn, BalanceTransaction, Booking, BookingNotice, BookingPatch, BookingStatus, Field,
    Interval, LineItem, NewBooking, NewLineItem, NewRefund, NewWithdrawal, Place, Refund,
    Withdrawal,
};
use crate::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Transactional storage backend
#[async_trait]
pub trait Store: Send + Sync {
    /// Start an atomic unit of work
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;
}

/// One open transaction
///
/// Dropping it without calling [`commit`](StoreTx::commit) rolls back every
/// write made through it.
#[async_trait]
pub trait StoreTx: Send {
    // ==================== Fields & Places ====================

    /// Fetch a field and hold a write lock on it until the transaction ends
    ///
    /// Booking creation takes this lock first, which serialises all
    /// creations on the same field.
    async fn lock_field(&mut self, field_id: i64) -> AppResult<Option<Field>>;

    async fn find_field(&mut self, field_id: i64) -> AppResult<Option<Field>>;

    async fn find_place(&mut self, place_id: i64) -> AppResult<Option<Place>>;

    /// Every place of an owner, ascending by id, without locking
    async fn list_owner_places(&mut self, owner_id: i64) -> AppResult<Vec<Place>>;

    /// Lock every place of an owner, ascending by id
    async fn lock_owner_places(&mut self, owner_id: i64) -> AppResult<Vec<Place>>;

    // ==================== Add-ons ====================

    async fn find_add_on(&mut self, add_on_id: i64) -> AppResult<Option<AddOn>>;

    /// `stock -= quantity` only if `stock >= quantity`
    ///
    /// Returns the new stock, or `None` when the guard did not match.
    async fn reserve_stock(&mut self, add_on_id: i64, quantity: i32) -> AppResult<Option<i32>>;

    /// `stock += quantity`; returns the new stock, `None` if the add-on is gone
    async fn restore_stock(&mut self, add_on_id: i64, quantity: i32) -> AppResult<Option<i32>>;

    // ==================== Bookings ====================

    /// Pending or approved bookings on the field whose interval overlaps `window`
    async fn find_occupying_bookings(
        &mut self,
        field_id: i64,
        window: &Interval,
        exclude_booking_id: Option<i64>,
    ) -> AppResult<Vec<Booking>>;

    async fn insert_booking(&mut self, booking: &NewBooking) -> AppResult<Booking>;

    async fn insert_line_item(&mut self, booking_id: i64, item: &NewLineItem)
        -> AppResult<LineItem>;

    async fn find_booking(&mut self, booking_id: i64) -> AppResult<Option<Booking>>;

    async fn find_booking_by_order_id(&mut self, order_id: &str) -> AppResult<Option<Booking>>;

    async fn list_line_items(&mut self, booking_id: i64) -> AppResult<Vec<LineItem>>;

    /// Bookings of a field ordered by start time
    async fn list_field_bookings(
        &mut self,
        field_id: i64,
        status: Option<BookingStatus>,
    ) -> AppResult<Vec<Booking>>;

    /// Apply `patch` only if the booking is still in `expected` status
    ///
    /// Returns the updated booking, or `None` when no row matched (the
    /// booking moved on or does not exist).
    async fn patch_booking(
        &mut self,
        booking_id: i64,
        expected: BookingStatus,
        patch: &BookingPatch,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Booking>>;

    /// Approved bookings with `end_time < now`, oldest end first
    async fn list_settleable(&mut self, now: DateTime<Utc>, limit: i64)
        -> AppResult<Vec<Booking>>;

    /// Approved bookings starting within `[from, until]`
    async fn list_upcoming(
        &mut self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<Booking>>;

    // ==================== Balances ====================

    /// Add `amount` to a place balance and record a settlement entry
    async fn credit_place(
        &mut self,
        place_id: i64,
        amount: Decimal,
        booking_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<BalanceTransaction>;

    /// Take `amount` from a place only if `balance >= amount`
    ///
    /// Records a withdrawal entry on success, returns `None` when the guard
    /// did not match.
    async fn debit_place(
        &mut self,
        place_id: i64,
        amount: Decimal,
        withdrawal_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<Option<BalanceTransaction>>;

    async fn list_balance_transactions(&mut self, place_id: i64)
        -> AppResult<Vec<BalanceTransaction>>;

    // ==================== Withdrawals & Refunds ====================

    async fn insert_withdrawal(&mut self, withdrawal: &NewWithdrawal) -> AppResult<Withdrawal>;

    /// Remove the record; returns false if it did not exist
    async fn delete_withdrawal(&mut self, withdrawal_id: i64) -> AppResult<bool>;

    /// Sum and count of an owner's withdrawals
    async fn owner_withdrawal_totals(&mut self, owner_id: i64) -> AppResult<(Decimal, i64)>;

    async fn find_refund_by_booking(&mut self, booking_id: i64) -> AppResult<Option<Refund>>;

    async fn insert_refund(&mut self, refund: &NewRefund) -> AppResult<Refund>;

    /// Make every write of this transaction visible
    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Outbound channel for booking status changes
///
/// Called after commit. An error here is logged and never undoes the change.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &BookingNotice) -> AppResult<()>;
}
