//! Shared fixtures for the service integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use fieldbook_core::{
    models::{AddOn, BookingNotice, Field, LineItemRequest, Place, ReservationRequest},
    AppError, AppResult, BookingConfig, ManualClock, Notifier,
};
use fieldbook_db::MemoryStore;
use fieldbook_services::{Services, TracingNotifier};
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use std::sync::Arc;

pub const OWNER_ID: i64 = 1;
pub const RENTER_ID: i64 = 42;

pub struct Harness {
    pub store: MemoryStore,
    pub clock: ManualClock,
    pub services: Services,
    pub place: Place,
    pub field: Field,
    pub racket: AddOn,
}

/// 2025-06-01 08:00 UTC
pub fn start_of_world() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
}

/// `hour:00` on the day after `start_of_world`, well past the lead time
pub fn tomorrow_at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, hour, 0, 0).unwrap()
}

pub async fn harness() -> Harness {
    harness_with_notifier(Arc::new(TracingNotifier)).await
}

pub async fn harness_with_notifier(notifier: Arc<dyn Notifier>) -> Harness {
    let store = MemoryStore::new();
    let clock = ManualClock::new(start_of_world());

    let place = store.insert_place(OWNER_ID, "Cancha Norte", dec!(0)).await;
    let field = store.insert_field(place.id, "Court 1", dec!(100)).await;
    let racket = store.insert_add_on(place.id, "Racket", dec!(10), 3).await;

    let services = Services::new(
        Arc::new(store.clone()),
        Arc::new(clock.clone()),
        notifier,
        BookingConfig::default(),
    );

    Harness {
        store,
        clock,
        services,
        place,
        field,
        racket,
    }
}

pub fn request(field_id: i64, start: DateTime<Utc>, hours: i64) -> ReservationRequest {
    ReservationRequest {
        field_id,
        renter_id: RENTER_ID,
        start,
        end: start + Duration::hours(hours),
        line_items: Vec::new(),
        payment_token: None,
        note: None,
    }
}

pub fn with_add_on(
    mut req: ReservationRequest,
    add_on_id: i64,
    quantity: i32,
) -> ReservationRequest {
    req.line_items.push(LineItemRequest {
        add_on_id,
        quantity,
    });
    req
}

/// Notifier that records every notice
#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<BookingNotice>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notice: &BookingNotice) -> AppResult<()> {
        self.notices.lock().push(notice.clone());
        Ok(())
    }
}

/// Notifier whose delivery always fails
pub struct BrokenNotifier;

#[async_trait]
impl Notifier for BrokenNotifier {
    async fn notify(&self, _notice: &BookingNotice) -> AppResult<()> {
        Err(AppError::Internal("smtp unreachable".to_string()))
    }
}
