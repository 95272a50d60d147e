//! Booking, line item and booking lifecycle models
//!
//! A booking holds a field for a half-open interval `[start, end)` together
//! with add-on line items. Its status only moves along the table encoded in
//! [`BookingStatus::apply`].

use crate::error::AppError;
use crate::AppResult;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Waiting for the owner; already occupies the field and holds add-on stock
    #[default]
    Pending,
    /// Confirmed by the owner
    Approved,
    /// Rejected or withdrawn before approval
    Cancelled,
    /// Interval elapsed (or settled manually) and the owner was credited
    Completed,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::Approved => write!(f, "approved"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
            BookingStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Something that happens to a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingEvent {
    /// Owner approves a pending booking
    Approve,
    /// Owner rejects or renter cancels a pending booking
    Cancel,
    /// Interval has passed, or the booking was settled externally
    Complete,
}

impl fmt::Display for BookingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingEvent::Approve => write!(f, "approve"),
            BookingEvent::Cancel => write!(f, "cancel"),
            BookingEvent::Complete => write!(f, "complete"),
        }
    }
}

/// Side effects that must run in the same transaction as a status write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionEffects {
    /// Give every line item's quantity back to its add-on
    pub restore_stock: bool,
    /// Credit the field's place with the booking total
    pub credit_owner: bool,
}

impl BookingStatus {
    /// Parse from string (case-insensitive)
    ///
    /// `waiting_confirmation` is accepted for rows written by older clients.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" | "waiting_confirmation" => Some(BookingStatus::Pending),
            "approved" => Some(BookingStatus::Approved),
            "cancelled" | "canceled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            _ => None,
        }
    }

    /// Whether a booking in this status blocks its interval on the field
    pub fn is_occupying(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Approved)
    }

    /// Terminal statuses never change again
    pub fn is_terminal(&self) -> bool {
        !self.is_occupying()
    }

    /// Legal transitions and their side effects
    ///
    /// Returns `None` when the event is not allowed from this status.
    pub fn apply(self, event: BookingEvent) -> Option<(BookingStatus, TransitionEffects)> {
        match (self, event) {
            (BookingStatus::Pending, BookingEvent::Approve) => {
                Some((BookingStatus::Approved, TransitionEffects::default()))
            }
            (BookingStatus::Pending, BookingEvent::Cancel) => Some((
                BookingStatus::Cancelled,
                TransitionEffects {
                    restore_stock: true,
                    credit_owner: false,
                },
            )),
            (BookingStatus::Approved, BookingEvent::Complete) => Some((
                BookingStatus::Completed,
                TransitionEffects {
                    restore_stock: true,
                    credit_owner: true,
                },
            )),
            _ => None,
        }
    }

    /// Like [`apply`](Self::apply) but reports the rejected move as an error
    pub fn transition(
        self,
        event: BookingEvent,
    ) -> AppResult<(BookingStatus, TransitionEffects)> {
        self.apply(event).ok_or_else(|| AppError::InvalidTransition {
            from: self.to_string(),
            to: event.target().to_string(),
        })
    }
}

impl BookingEvent {
    /// Status this event tries to reach
    pub fn target(self) -> BookingStatus {
        match self {
            BookingEvent::Approve => BookingStatus::Approved,
            BookingEvent::Cancel => BookingStatus::Cancelled,
            BookingEvent::Complete => BookingStatus::Completed,
        }
    }
}

/// Half-open time interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    /// Build an interval, rejecting empty or inverted ones
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Self> {
        if end <= start {
            return Err(AppError::InvalidInterval(format!(
                "end {} must be after start {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// The single overlap predicate: `s1 < e2 AND s2 < e1`
    ///
    /// Back-to-back intervals (one ends exactly when the other starts) do not
    /// overlap.
    #[inline]
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Hours charged for this interval; partial hours round up
    pub fn billable_hours(&self) -> i64 {
        let millis = self.duration().num_milliseconds().max(0);
        (millis + MILLIS_PER_HOUR - 1) / MILLIS_PER_HOUR
    }
}

/// Booking entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Unique identifier
    pub id: i64,

    /// Public order token (`BOOKING-{millis}-{renter}-{suffix}`)
    pub order_id: String,

    /// Booked field
    pub field_id: i64,

    /// Renter who made the booking
    pub renter_id: i64,

    /// Inclusive start
    pub start_time: DateTime<Utc>,

    /// Exclusive end
    pub end_time: DateTime<Utc>,

    /// Price fixed at creation; never recomputed
    pub total_price: Decimal,

    /// Current status
    pub status: BookingStatus,

    /// Opaque token from the external payment provider
    pub payment_token: Option<String>,

    /// Free-form note from renter or owner
    pub note: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// Whether the booking's interval is over at `now`
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_time < now
    }
}

/// Add-on attached to a booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub booking_id: i64,
    pub add_on_id: i64,
    pub quantity: i32,
    /// Add-on hourly price captured at booking time
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Booking together with its line items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub line_items: Vec<LineItem>,
}

/// Booking row to insert
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub order_id: String,
    pub field_id: i64,
    pub renter_id: i64,
    pub interval: Interval,
    pub total_price: Decimal,
    pub payment_token: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Line item row to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewLineItem {
    pub add_on_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Requested add-on on a new reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub add_on_id: i64,
    pub quantity: i32,
}

/// Everything needed to place a reservation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub field_id: i64,
    pub renter_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub line_items: Vec<LineItemRequest>,
    pub payment_token: Option<String>,
    pub note: Option<String>,
}

/// Status change announced to renters and owners after commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingNotice {
    pub booking_id: i64,
    pub order_id: String,
    pub field_id: i64,
    pub renter_id: i64,
    /// `None` for a freshly created booking
    pub from: Option<BookingStatus>,
    pub to: BookingStatus,
    pub at: DateTime<Utc>,
}

impl BookingNotice {
    pub fn for_booking(booking: &Booking, from: Option<BookingStatus>) -> Self {
        Self {
            booking_id: booking.id,
            order_id: booking.order_id.clone(),
            field_id: booking.field_id,
            renter_id: booking.renter_id,
            from,
            to: booking.status,
            at: booking.updated_at,
        }
    }
}

/// The only booking fields a post-creation operation may change
///
/// Times, field, renter and prices are deliberately absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    pub note: Option<String>,
    pub payment_token: Option<String>,
}

impl BookingPatch {
    pub fn status(status: BookingStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    pub fn payment_token(token: impl Into<String>) -> Self {
        Self {
            payment_token: Some(token.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.note.is_none() && self.payment_token.is_none()
    }

    /// Check the patch before any write happens
    pub fn validate(&self, max_note_length: usize) -> AppResult<()> {
        if self.is_empty() {
            return Err(AppError::Validation("Nothing to update".to_string()));
        }
        if let Some(note) = &self.note {
            if note.chars().count() > max_note_length {
                return Err(AppError::Validation(format!(
                    "Note exceeds {} characters",
                    max_note_length
                )));
            }
        }
        if let Some(token) = &self.payment_token {
            if token.trim().is_empty() {
                return Err(AppError::Validation(
                    "Payment token must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(BookingStatus::from_str("pending"), Some(BookingStatus::Pending));
        assert_eq!(
            BookingStatus::from_str("waiting_confirmation"),
            Some(BookingStatus::Pending)
        );
        assert_eq!(
            BookingStatus::from_str("APPROVED"),
            Some(BookingStatus::Approved)
        );
        assert_eq!(BookingStatus::from_str("refunded"), None);
    }

    #[test]
    fn test_occupying_statuses() {
        assert!(BookingStatus::Pending.is_occupying());
        assert!(BookingStatus::Approved.is_occupying());
        assert!(!BookingStatus::Cancelled.is_occupying());
        assert!(!BookingStatus::Completed.is_occupying());
    }

    #[test]
    fn test_transition_table() {
        let (to, fx) = BookingStatus::Pending.apply(BookingEvent::Approve).unwrap();
        assert_eq!(to, BookingStatus::Approved);
        assert_eq!(fx, TransitionEffects::default());

        let (to, fx) = BookingStatus::Pending.apply(BookingEvent::Cancel).unwrap();
        assert_eq!(to, BookingStatus::Cancelled);
        assert!(fx.restore_stock && !fx.credit_owner);

        let (to, fx) = BookingStatus::Approved.apply(BookingEvent::Complete).unwrap();
        assert_eq!(to, BookingStatus::Completed);
        assert!(fx.restore_stock && fx.credit_owner);
    }

    #[test]
    fn test_rejected_transitions() {
        // pending cannot skip approval
        assert!(BookingStatus::Pending.apply(BookingEvent::Complete).is_none());
        assert!(BookingStatus::Approved.apply(BookingEvent::Approve).is_none());
        assert!(BookingStatus::Approved.apply(BookingEvent::Cancel).is_none());

        for terminal in [BookingStatus::Cancelled, BookingStatus::Completed] {
            for event in [
                BookingEvent::Approve,
                BookingEvent::Cancel,
                BookingEvent::Complete,
            ] {
                assert!(terminal.apply(event).is_none());
            }
        }

        let err = BookingStatus::Completed
            .transition(BookingEvent::Approve)
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition { ref from, ref to } if from == "completed" && to == "approved"
        ));
    }

    #[test]
    fn test_interval_rejects_empty_and_inverted() {
        assert!(matches!(
            Interval::new(at(10, 0), at(10, 0)),
            Err(AppError::InvalidInterval(_))
        ));
        assert!(Interval::new(at(12, 0), at(10, 0)).is_err());
    }

    #[test]
    fn test_back_to_back_intervals_do_not_overlap() {
        let morning = Interval::new(at(8, 0), at(10, 0)).unwrap();
        let late_morning = Interval::new(at(10, 0), at(12, 0)).unwrap();
        assert!(!morning.overlaps(&late_morning));
        assert!(!late_morning.overlaps(&morning));

        let straddle = Interval::new(at(9, 59), at(10, 30)).unwrap();
        assert!(straddle.overlaps(&morning));
        assert!(straddle.overlaps(&late_morning));

        let inside = Interval::new(at(8, 30), at(9, 0)).unwrap();
        assert!(inside.overlaps(&morning));
        assert!(morning.overlaps(&inside));
    }

    #[test]
    fn test_billable_hours_round_up() {
        assert_eq!(Interval::new(at(10, 0), at(12, 0)).unwrap().billable_hours(), 2);
        assert_eq!(Interval::new(at(10, 0), at(11, 1)).unwrap().billable_hours(), 2);
        assert_eq!(Interval::new(at(10, 0), at(10, 15)).unwrap().billable_hours(), 1);

        let start = at(10, 0);
        let one_ms_over = Interval::new(start, start + Duration::hours(3) + Duration::milliseconds(1))
            .unwrap();
        assert_eq!(one_ms_over.billable_hours(), 4);
    }

    #[test]
    fn test_patch_validation() {
        assert!(BookingPatch::default().validate(10).is_err());
        assert!(BookingPatch::payment_token("   ").validate(10).is_err());
        assert!(BookingPatch::status(BookingStatus::Approved)
            .with_note(Some("x".repeat(11)))
            .validate(10)
            .is_err());
        assert!(BookingPatch::status(BookingStatus::Approved)
            .with_note(Some("see you".to_string()))
            .validate(10)
            .is_ok());
    }

    fn interval_strategy() -> impl Strategy<Value = Interval> {
        (0i64..10_000, 1i64..500).prop_map(|(start, len)| {
            let base = at(0, 0);
            Interval {
                start: base + Duration::minutes(start),
                end: base + Duration::minutes(start + len),
            }
        })
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(a in interval_strategy(), b in interval_strategy()) {
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }

        #[test]
        fn overlap_matches_shared_minute(a in interval_strategy(), b in interval_strategy()) {
            // Minute-aligned intervals overlap iff some minute [m, m+1) lies in both
            let shared = (0..10_500i64).any(|m| {
                let t = at(0, 0) + Duration::minutes(m);
                t >= a.start && t < a.end && t >= b.start && t < b.end
            });
            prop_assert_eq!(a.overlaps(&b), shared);
        }

        #[test]
        fn billable_hours_cover_duration(iv in interval_strategy()) {
            let hours = iv.billable_hours();
            prop_assert!(Duration::hours(hours) >= iv.duration());
            prop_assert!(Duration::hours(hours - 1) < iv.duration());
        }
    }
}
