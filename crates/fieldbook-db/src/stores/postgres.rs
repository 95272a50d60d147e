//! PostgreSQL store
//!
//! Every `StoreTx` wraps one sqlx transaction. Conditional writes
//! (`WHERE stock >= $2`, `WHERE status = $2`, `WHERE balance >= $2`) report a
//! lost race as "no row", and the field row lock taken by `lock_field`
//! serialises booking creation per field. The `bookings_no_overlap`
//! exclusion constraint is the last line against double booking.

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
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, instrument, warn};

const BOOKING_COLUMNS: &str = r#"
    id, order_id, field_id, renter_id, start_time, end_time,
    total_price, status, payment_token, note, created_at, updated_at
"#;

const LEDGER_COLUMNS: &str = r#"
    id, place_id, amount, previous_balance, new_balance,
    transaction_type, booking_id, withdrawal_id, created_at
"#;

/// SQLSTATE of a database error, if any
fn sqlstate(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Map a sqlx error to the engine's taxonomy
///
/// `23P01` only comes from `bookings_no_overlap`, so it needs the field the
/// rejected booking was for; callers that can hit it go through
/// [`map_booking_error`].
fn map_db_error(context: &str, e: sqlx::Error) -> AppError {
    match sqlstate(&e).as_deref() {
        Some("40001") | Some("40P01") => {
            warn!("{}: transaction aborted by the database: {}", context, e);
            AppError::Transaction(format!("{}: {}", context, e))
        }
        Some("23514") | Some("23505") | Some("23P01") => {
            warn!("{}: constraint violation: {}", context, e);
            AppError::Conflict(format!("{}: constraint violated", context))
        }
        _ => match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                error!("{}: pool unavailable: {}", context, e);
                AppError::Pool(format!("{}: {}", context, e))
            }
            other => {
                error!("{}: {}", context, other);
                AppError::Database(format!("{}: {}", context, other))
            }
        },
    }
}

/// Like [`map_db_error`], with overlap rejections reported per field
fn map_booking_error(field_id: i64, context: &str, e: sqlx::Error) -> AppError {
    if sqlstate(&e).as_deref() == Some("23P01") {
        warn!(field_id, "{}: overlap rejected by exclusion constraint", context);
        return AppError::ConflictingBooking { field_id };
    }
    map_db_error(context, e)
}

/// PostgreSQL implementation of [`Store`]
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("Failed to begin transaction", e))?;

        Ok(Box::new(PgStoreTx { tx }))
    }
}

/// One open PostgreSQL transaction
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    #[instrument(skip(self))]
    async fn lock_field(&mut self, field_id: i64) -> AppResult<Option<Field>> {
        debug!("Locking field {}", field_id);

        let row = sqlx::query_as::<sqlx::Postgres, FieldRow>(
            r#"
            SELECT id, place_id, name, price_per_hour, opening_time, closing_time
            FROM fields
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(field_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to lock field", e))?;

        Ok(row.map(Into::into))
    }

    async fn find_field(&mut self, field_id: i64) -> AppResult<Option<Field>> {
        let row = sqlx::query_as::<sqlx::Postgres, FieldRow>(
            r#"
            SELECT id, place_id, name, price_per_hour, opening_time, closing_time
            FROM fields
            WHERE id = $1
            "#,
        )
        .bind(field_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to find field", e))?;

        Ok(row.map(Into::into))
    }

    async fn find_place(&mut self, place_id: i64) -> AppResult<Option<Place>> {
        let row = sqlx::query_as::<sqlx::Postgres, PlaceRow>(
            r#"
            SELECT id, owner_id, name, balance, created_at, updated_at
            FROM places
            WHERE id = $1
            "#,
        )
        .bind(place_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to find place", e))?;

        Ok(row.map(Into::into))
    }

    async fn list_owner_places(&mut self, owner_id: i64) -> AppResult<Vec<Place>> {
        let rows = sqlx::query_as::<sqlx::Postgres, PlaceRow>(
            r#"
            SELECT id, owner_id, name, balance, created_at, updated_at
            FROM places
            WHERE owner_id = $1
            ORDER BY id
            "#,
        )
        .bind(owner_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to list owner places", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn lock_owner_places(&mut self, owner_id: i64) -> AppResult<Vec<Place>> {
        let rows = sqlx::query_as::<sqlx::Postgres, PlaceRow>(
            r#"
            SELECT id, owner_id, name, balance, created_at, updated_at
            FROM places
            WHERE owner_id = $1
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(owner_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to lock owner places", e))?;

        debug!("Locked {} places for owner {}", rows.len(), owner_id);
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_add_on(&mut self, add_on_id: i64) -> AppResult<Option<AddOn>> {
        let row = sqlx::query_as::<sqlx::Postgres, AddOnRow>(
            r#"
            SELECT id, place_id, name, price_per_hour, stock
            FROM add_ons
            WHERE id = $1
            "#,
        )
        .bind(add_on_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to find add-on", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn reserve_stock(&mut self, add_on_id: i64, quantity: i32) -> AppResult<Option<i32>> {
        let stock: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE add_ons
            SET stock = stock - $2
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(add_on_id)
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to reserve stock", e))?;

        Ok(stock.map(|(s,)| s))
    }

    #[instrument(skip(self))]
    async fn restore_stock(&mut self, add_on_id: i64, quantity: i32) -> AppResult<Option<i32>> {
        let stock: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE add_ons
            SET stock = stock + $2
            WHERE id = $1
            RETURNING stock
            "#,
        )
        .bind(add_on_id)
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to restore stock", e))?;

        Ok(stock.map(|(s,)| s))
    }

    #[instrument(skip(self, window))]
    async fn find_occupying_bookings(
        &mut self,
        field_id: i64,
        window: &Interval,
        exclude_booking_id: Option<i64>,
    ) -> AppResult<Vec<Booking>> {
        // same half-open predicate as Interval::overlaps
        let sql = format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE field_id = $1
                AND status IN ('pending', 'approved')
                AND start_time < $3
                AND $2 < end_time
                AND ($4::BIGINT IS NULL OR id <> $4)
            ORDER BY start_time
            "#,
            BOOKING_COLUMNS
        );

        let rows = sqlx::query_as::<sqlx::Postgres, BookingRow>(&sql)
            .bind(field_id)
            .bind(window.start)
            .bind(window.end)
            .bind(exclude_booking_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_db_error("Failed to check availability", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, booking), fields(order_id = %booking.order_id))]
    async fn insert_booking(&mut self, booking: &NewBooking) -> AppResult<Booking> {
        let sql = format!(
            r#"
            INSERT INTO bookings (
                order_id, field_id, renter_id, start_time, end_time,
                total_price, status, payment_token, note, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8, $9, $9)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, BookingRow>(&sql)
            .bind(&booking.order_id)
            .bind(booking.field_id)
            .bind(booking.renter_id)
            .bind(booking.interval.start)
            .bind(booking.interval.end)
            .bind(booking.total_price)
            .bind(&booking.payment_token)
            .bind(&booking.note)
            .bind(booking.created_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_booking_error(booking.field_id, "Failed to insert booking", e))?;

        Ok(row.into())
    }

    async fn insert_line_item(
        &mut self,
        booking_id: i64,
        item: &NewLineItem,
    ) -> AppResult<LineItem> {
        let row = sqlx::query_as::<sqlx::Postgres, LineItemRow>(
            r#"
            INSERT INTO booking_line_items (booking_id, add_on_id, quantity, unit_price, line_total)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, booking_id, add_on_id, quantity, unit_price, line_total
            "#,
        )
        .bind(booking_id)
        .bind(item.add_on_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.line_total)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to insert line item", e))?;

        Ok(row.into())
    }

    async fn find_booking(&mut self, booking_id: i64) -> AppResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);

        let row = sqlx::query_as::<sqlx::Postgres, BookingRow>(&sql)
            .bind(booking_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_db_error("Failed to find booking", e))?;

        Ok(row.map(Into::into))
    }

    async fn find_booking_by_order_id(&mut self, order_id: &str) -> AppResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE order_id = $1", BOOKING_COLUMNS);

        let row = sqlx::query_as::<sqlx::Postgres, BookingRow>(&sql)
            .bind(order_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_db_error("Failed to find booking by order id", e))?;

        Ok(row.map(Into::into))
    }

    async fn list_line_items(&mut self, booking_id: i64) -> AppResult<Vec<LineItem>> {
        let rows = sqlx::query_as::<sqlx::Postgres, LineItemRow>(
            r#"
            SELECT id, booking_id, add_on_id, quantity, unit_price, line_total
            FROM booking_line_items
            WHERE booking_id = $1
            ORDER BY id
            "#,
        )
        .bind(booking_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to list line items", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_field_bookings(
        &mut self,
        field_id: i64,
        status: Option<BookingStatus>,
    ) -> AppResult<Vec<Booking>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE field_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY start_time, id
            "#,
            BOOKING_COLUMNS
        );

        let rows = sqlx::query_as::<sqlx::Postgres, BookingRow>(&sql)
            .bind(field_id)
            .bind(status.map(|s| s.to_string()))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_db_error("Failed to list field bookings", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, patch))]
    async fn patch_booking(
        &mut self,
        booking_id: i64,
        expected: BookingStatus,
        patch: &BookingPatch,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Booking>> {
        let sql = format!(
            r#"
            UPDATE bookings
            SET status = COALESCE($3, status),
                note = COALESCE($4, note),
                payment_token = COALESCE($5, payment_token),
                updated_at = $6
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, BookingRow>(&sql)
            .bind(booking_id)
            .bind(expected.to_string())
            .bind(patch.status.map(|s| s.to_string()))
            .bind(&patch.note)
            .bind(&patch.payment_token)
            .bind(at)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_db_error("Failed to update booking", e))?;

        if row.is_none() {
            debug!("Booking {} is no longer {}", booking_id, expected);
        }

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_settleable(&mut self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<Booking>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE status = 'approved' AND end_time < $1
            ORDER BY end_time, id
            LIMIT $2
            "#,
            BOOKING_COLUMNS
        );

        let rows = sqlx::query_as::<sqlx::Postgres, BookingRow>(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_db_error("Failed to list settleable bookings", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_upcoming(
        &mut self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<Booking>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE status = 'approved' AND start_time >= $1 AND start_time <= $2
            ORDER BY start_time, id
            "#,
            BOOKING_COLUMNS
        );

        let rows = sqlx::query_as::<sqlx::Postgres, BookingRow>(&sql)
            .bind(from)
            .bind(until)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_db_error("Failed to list upcoming bookings", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn credit_place(
        &mut self,
        place_id: i64,
        amount: Decimal,
        booking_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<BalanceTransaction> {
        let balance: Option<(Decimal,)> = sqlx::query_as(
            r#"
            UPDATE places
            SET balance = balance + $2, updated_at = $3
            WHERE id = $1
            RETURNING balance
            "#,
        )
        .bind(place_id)
        .bind(amount)
        .bind(at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to credit place", e))?;

        let (new_balance,) = balance
            .ok_or_else(|| AppError::Internal(format!("Place {} disappeared", place_id)))?;

        let entry = BalanceTransaction::settlement(
            place_id,
            amount,
            new_balance - amount,
            booking_id,
            at,
        );
        self.insert_ledger_entry(&entry).await
    }

    #[instrument(skip(self))]
    async fn debit_place(
        &mut self,
        place_id: i64,
        amount: Decimal,
        withdrawal_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<Option<BalanceTransaction>> {
        let balance: Option<(Decimal,)> = sqlx::query_as(
            r#"
            UPDATE places
            SET balance = balance - $2, updated_at = $3
            WHERE id = $1 AND balance >= $2
            RETURNING balance
            "#,
        )
        .bind(place_id)
        .bind(amount)
        .bind(at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to debit place", e))?;

        let Some((new_balance,)) = balance else {
            return Ok(None);
        };

        let entry = BalanceTransaction::withdrawal(
            place_id,
            amount,
            new_balance + amount,
            withdrawal_id,
            at,
        );
        self.insert_ledger_entry(&entry).await.map(Some)
    }

    async fn list_balance_transactions(
        &mut self,
        place_id: i64,
    ) -> AppResult<Vec<BalanceTransaction>> {
        let sql = format!(
            "SELECT {} FROM balance_transactions WHERE place_id = $1 ORDER BY id",
            LEDGER_COLUMNS
        );

        let rows = sqlx::query_as::<sqlx::Postgres, LedgerRow>(&sql)
            .bind(place_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_db_error("Failed to list balance transactions", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_withdrawal(&mut self, withdrawal: &NewWithdrawal) -> AppResult<Withdrawal> {
        let row = sqlx::query_as::<sqlx::Postgres, WithdrawalRow>(
            r#"
            INSERT INTO withdrawals (owner_id, amount, evidence_ref, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_id, amount, evidence_ref, created_at
            "#,
        )
        .bind(withdrawal.owner_id)
        .bind(withdrawal.amount)
        .bind(&withdrawal.evidence_ref)
        .bind(withdrawal.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to insert withdrawal", e))?;

        Ok(row.into())
    }

    async fn delete_withdrawal(&mut self, withdrawal_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM withdrawals WHERE id = $1")
            .bind(withdrawal_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_db_error("Failed to delete withdrawal", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn owner_withdrawal_totals(&mut self, owner_id: i64) -> AppResult<(Decimal, i64)> {
        let totals: (Decimal, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount), 0), COUNT(*)
            FROM withdrawals
            WHERE owner_id = $1
            "#,
        )
        .bind(owner_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to sum withdrawals", e))?;

        Ok(totals)
    }

    async fn find_refund_by_booking(&mut self, booking_id: i64) -> AppResult<Option<Refund>> {
        let row = sqlx::query_as::<sqlx::Postgres, RefundRow>(
            r#"
            SELECT id, booking_id, amount, evidence_ref, created_at
            FROM refunds
            WHERE booking_id = $1
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to find refund", e))?;

        Ok(row.map(Into::into))
    }

    async fn insert_refund(&mut self, refund: &NewRefund) -> AppResult<Refund> {
        let row = sqlx::query_as::<sqlx::Postgres, RefundRow>(
            r#"
            INSERT INTO refunds (booking_id, amount, evidence_ref, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, booking_id, amount, evidence_ref, created_at
            "#,
        )
        .bind(refund.booking_id)
        .bind(refund.amount)
        .bind(&refund.evidence_ref)
        .bind(refund.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to insert refund", e))?;

        Ok(row.into())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_db_error("Failed to commit transaction", e))
    }
}

impl PgStoreTx {
    async fn insert_ledger_entry(
        &mut self,
        entry: &BalanceTransaction,
    ) -> AppResult<BalanceTransaction> {
        let sql = format!(
            r#"
            INSERT INTO balance_transactions (
                place_id, amount, previous_balance, new_balance,
                transaction_type, booking_id, withdrawal_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            LEDGER_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, LedgerRow>(&sql)
            .bind(entry.place_id)
            .bind(entry.amount)
            .bind(entry.previous_balance)
            .bind(entry.new_balance)
            .bind(entry.transaction_type.to_string())
            .bind(entry.booking_id)
            .bind(entry.withdrawal_id)
            .bind(entry.created_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_db_error("Failed to record balance transaction", e))?;

        Ok(row.into())
    }
}

// ==================== Row mapping ====================

#[derive(Debug, sqlx::FromRow)]
struct PlaceRow {
    id: i64,
    owner_id: i64,
    name: String,
    balance: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PlaceRow> for Place {
    fn from(row: PlaceRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            balance: row.balance,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FieldRow {
    id: i64,
    place_id: i64,
    name: String,
    price_per_hour: Decimal,
    opening_time: NaiveTime,
    closing_time: NaiveTime,
}

impl From<FieldRow> for Field {
    fn from(row: FieldRow) -> Self {
        Self {
            id: row.id,
            place_id: row.place_id,
            name: row.name,
            price_per_hour: row.price_per_hour,
            opening_time: row.opening_time,
            closing_time: row.closing_time,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AddOnRow {
    id: i64,
    place_id: i64,
    name: String,
    price_per_hour: Decimal,
    stock: i32,
}

impl From<AddOnRow> for AddOn {
    fn from(row: AddOnRow) -> Self {
        Self {
            id: row.id,
            place_id: row.place_id,
            name: row.name,
            price_per_hour: row.price_per_hour,
            stock: row.stock,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: i64,
    order_id: String,
    field_id: i64,
    renter_id: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    total_price: Decimal,
    status: String,
    payment_token: Option<String>,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            field_id: row.field_id,
            renter_id: row.renter_id,
            start_time: row.start_time,
            end_time: row.end_time,
            total_price: row.total_price,
            status: parse_status(&row.status),
            payment_token: row.payment_token,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Parse booking status; the table CHECK constraint makes the fallback unreachable
fn parse_status(s: &str) -> BookingStatus {
    BookingStatus::from_str(s).unwrap_or_else(|| {
        warn!("Unknown booking status in database: {}", s);
        BookingStatus::Pending
    })
}

#[derive(Debug, sqlx::FromRow)]
struct LineItemRow {
    id: i64,
    booking_id: i64,
    add_on_id: i64,
    quantity: i32,
    unit_price: Decimal,
    line_total: Decimal,
}

impl From<LineItemRow> for LineItem {
    fn from(row: LineItemRow) -> Self {
        Self {
            id: row.id,
            booking_id: row.booking_id,
            add_on_id: row.add_on_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            line_total: row.line_total,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    id: i64,
    place_id: i64,
    amount: Decimal,
    previous_balance: Decimal,
    new_balance: Decimal,
    transaction_type: String,
    booking_id: Option<i64>,
    withdrawal_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl From<LedgerRow> for BalanceTransaction {
    fn from(row: LedgerRow) -> Self {
        let transaction_type = TransactionType::from_str(&row.transaction_type)
            .unwrap_or(if row.amount < Decimal::ZERO {
                TransactionType::WithdrawalDebit
            } else {
                TransactionType::SettlementCredit
            });

        Self {
            id: row.id,
            place_id: row.place_id,
            amount: row.amount,
            previous_balance: row.previous_balance,
            new_balance: row.new_balance,
            transaction_type,
            booking_id: row.booking_id,
            withdrawal_id: row.withdrawal_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WithdrawalRow {
    id: i64,
    owner_id: i64,
    amount: Decimal,
    evidence_ref: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<WithdrawalRow> for Withdrawal {
    fn from(row: WithdrawalRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            amount: row.amount,
            evidence_ref: row.evidence_ref,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RefundRow {
    id: i64,
    booking_id: i64,
    amount: Decimal,
    evidence_ref: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<RefundRow> for Refund {
    fn from(row: RefundRow) -> Self {
        Self {
            id: row.id,
            booking_id: row.booking_id,
            amount: row.amount,
            evidence_ref: row.evidence_ref,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("approved"), BookingStatus::Approved);
        assert_eq!(parse_status("waiting_confirmation"), BookingStatus::Pending);
        assert_eq!(parse_status("completed"), BookingStatus::Completed);
    }

    #[test]
    fn test_pool_errors_are_transient() {
        let err = map_db_error("ctx", sqlx::Error::PoolTimedOut);
        assert!(err.is_transient());
        assert!(matches!(err, AppError::Pool(_)));
    }

    #[derive(Debug)]
    struct ConstraintViolation(&'static str);

    impl std::fmt::Display for ConstraintViolation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "constraint violation {}", self.0)
        }
    }

    impl std::error::Error for ConstraintViolation {}

    impl sqlx::error::DatabaseError for ConstraintViolation {
        fn message(&self) -> &str {
            "constraint violation"
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(std::borrow::Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn violation(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(ConstraintViolation(code)))
    }

    #[test]
    fn test_overlap_maps_to_conflicting_booking() {
        let err = map_booking_error(7, "insert", violation("23P01"));
        assert!(matches!(err, AppError::ConflictingBooking { field_id: 7 }));
        assert_eq!(err.error_code(), "conflicting_booking");
    }

    #[test]
    fn test_booking_errors_fall_back_to_generic_mapping() {
        let err = map_booking_error(7, "insert", violation("23505"));
        assert!(matches!(err, AppError::Conflict(_)));

        let err = map_booking_error(7, "insert", violation("40001"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_missing_row_is_database_error() {
        let err = map_db_error("ctx", sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Database(_)));
    }
}
