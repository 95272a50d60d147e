//! Reservation creation against the in-memory store

mod common;

use chrono::Duration;
use common::*;
use fieldbook_core::{models::BookingStatus, AppError, Clock};
use futures::future::join_all;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn test_two_hour_booking_is_priced_by_the_hour() {
    let h = harness().await;

    let details = h
        .services
        .coordinator
        .create_reservation(request(h.field.id, tomorrow_at(10), 2))
        .await
        .unwrap();

    assert_eq!(details.booking.total_price, dec!(200));
    assert_eq!(details.booking.status, BookingStatus::Pending);
    assert!(details.booking.order_id.starts_with("BOOKING-"));
    assert!(details.line_items.is_empty());
}

#[tokio::test]
async fn test_partial_hour_is_billed_as_a_full_hour() {
    let h = harness().await;
    let mut req = request(h.field.id, tomorrow_at(10), 1);
    req.end = req.start + Duration::minutes(90);

    let details = h.services.coordinator.create_reservation(req).await.unwrap();

    assert_eq!(details.booking.total_price, dec!(200));
}

#[tokio::test]
async fn test_add_ons_are_priced_and_reserved() {
    let h = harness().await;
    let req = with_add_on(request(h.field.id, tomorrow_at(10), 2), h.racket.id, 2);

    let details = h.services.coordinator.create_reservation(req).await.unwrap();

    // 2h * 100 + 2h * 2 * 10
    assert_eq!(details.booking.total_price, dec!(240));
    assert_eq!(details.line_items.len(), 1);
    assert_eq!(details.line_items[0].unit_price, dec!(10));
    assert_eq!(details.line_items[0].line_total, dec!(40));
    assert_eq!(h.store.add_on(h.racket.id).await.unwrap().stock, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_cannot_oversell_stock() {
    let h = harness().await;

    let first = with_add_on(request(h.field.id, tomorrow_at(10), 1), h.racket.id, 2);
    let second = with_add_on(request(h.field.id, tomorrow_at(14), 1), h.racket.id, 2);

    let handles = [first, second].into_iter().map(|req| {
        let coordinator = h.services.coordinator.clone();
        tokio::spawn(async move { coordinator.create_reservation(req).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);

    let failure = results.into_iter().find_map(|r| r.err()).unwrap();
    assert!(matches!(
        failure,
        AppError::InsufficientStock {
            requested: 2,
            available: 1,
            ..
        }
    ));
    assert_eq!(h.store.add_on(h.racket.id).await.unwrap().stock, 1);
    assert_eq!(h.store.bookings().await.len(), 1);
}

#[tokio::test]
async fn test_booking_inside_lead_time_is_rejected_without_writes() {
    let h = harness().await;
    let start = h.clock.now() + Duration::hours(2);
    let req = with_add_on(request(h.field.id, start, 1), h.racket.id, 1);

    let err = h.services.coordinator.create_reservation(req).await.unwrap_err();

    assert!(matches!(err, AppError::PastOrTooSoonBooking { .. }));
    assert!(h.store.bookings().await.is_empty());
    assert_eq!(h.store.add_on(h.racket.id).await.unwrap().stock, 3);
}

#[tokio::test]
async fn test_booking_in_the_past_is_rejected() {
    let h = harness().await;
    let start = h.clock.now() - Duration::hours(3);

    let err = h
        .services
        .coordinator
        .create_reservation(request(h.field.id, start, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::PastOrTooSoonBooking { .. }));
}

#[tokio::test]
async fn test_empty_interval_is_rejected() {
    let h = harness().await;
    let req = request(h.field.id, tomorrow_at(10), 0);

    let err = h.services.coordinator.create_reservation(req).await.unwrap_err();

    assert!(matches!(err, AppError::InvalidInterval(_)));
}

#[tokio::test]
async fn test_overlapping_booking_is_rejected() {
    let h = harness().await;
    let coordinator = &h.services.coordinator;

    coordinator
        .create_reservation(request(h.field.id, tomorrow_at(10), 2))
        .await
        .unwrap();

    let err = coordinator
        .create_reservation(request(h.field.id, tomorrow_at(11), 2))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ConflictingBooking { field_id } if field_id == h.field.id));
    assert_eq!(h.store.bookings().await.len(), 1);
}

#[tokio::test]
async fn test_back_to_back_bookings_are_allowed() {
    let h = harness().await;
    let coordinator = &h.services.coordinator;

    coordinator
        .create_reservation(request(h.field.id, tomorrow_at(10), 1))
        .await
        .unwrap();
    coordinator
        .create_reservation(request(h.field.id, tomorrow_at(11), 1))
        .await
        .unwrap();
    coordinator
        .create_reservation(request(h.field.id, tomorrow_at(9), 1))
        .await
        .unwrap();

    assert_eq!(h.store.bookings().await.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_requests_for_one_slot_book_it_once() {
    let h = harness().await;

    let handles = (0..8).map(|_| {
        let coordinator = h.services.coordinator.clone();
        let req = request(h.field.id, tomorrow_at(18), 2);
        tokio::spawn(async move { coordinator.create_reservation(req).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, AppError::ConflictingBooking { .. })));
}

#[tokio::test]
async fn test_cancelled_booking_frees_the_slot() {
    let h = harness().await;
    let coordinator = &h.services.coordinator;

    let first = coordinator
        .create_reservation(request(h.field.id, tomorrow_at(10), 2))
        .await
        .unwrap();
    h.services
        .state_machine
        .set_status(first.booking.id, BookingStatus::Cancelled, None)
        .await
        .unwrap();

    let available = h
        .services
        .availability
        .is_available(h.field.id, tomorrow_at(10), tomorrow_at(12), None)
        .await
        .unwrap();
    assert!(available);

    coordinator
        .create_reservation(request(h.field.id, tomorrow_at(10), 2))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_availability_can_exclude_a_booking() {
    let h = harness().await;
    let details = h
        .services
        .coordinator
        .create_reservation(request(h.field.id, tomorrow_at(10), 2))
        .await
        .unwrap();
    let availability = &h.services.availability;

    assert!(!availability
        .is_available(h.field.id, tomorrow_at(11), tomorrow_at(13), None)
        .await
        .unwrap());
    assert!(availability
        .is_available(h.field.id, tomorrow_at(11), tomorrow_at(13), Some(details.booking.id))
        .await
        .unwrap());
    assert!(availability
        .is_available(h.field.id, tomorrow_at(12), tomorrow_at(13), None)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_unknown_field_and_add_on() {
    let h = harness().await;
    let coordinator = &h.services.coordinator;

    let err = coordinator
        .create_reservation(request(9_999, tomorrow_at(10), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ResourceNotFound(9_999)));

    let req = with_add_on(request(h.field.id, tomorrow_at(10), 1), 7_777, 1);
    let err = coordinator.create_reservation(req).await.unwrap_err();
    assert!(matches!(err, AppError::AddOnNotFound(7_777)));
    assert!(h.store.bookings().await.is_empty());
}

#[tokio::test]
async fn test_add_on_from_another_place_is_rejected() {
    let h = harness().await;
    let other_place = h.store.insert_place(OWNER_ID + 1, "Elsewhere", dec!(0)).await;
    let foreign = h.store.insert_add_on(other_place.id, "Ball", dec!(5), 10).await;

    let req = with_add_on(request(h.field.id, tomorrow_at(10), 1), foreign.id, 1);
    let err = h.services.coordinator.create_reservation(req).await.unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(h.store.add_on(foreign.id).await.unwrap().stock, 10);
}

#[tokio::test]
async fn test_lookup_by_id_and_order_id() {
    let h = harness().await;
    let req = with_add_on(request(h.field.id, tomorrow_at(10), 1), h.racket.id, 1);
    let created = h.services.coordinator.create_reservation(req).await.unwrap();
    let coordinator = &h.services.coordinator;

    let by_id = coordinator.get_booking(created.booking.id).await.unwrap();
    let by_order = coordinator
        .get_booking_by_order_id(&created.booking.order_id)
        .await
        .unwrap();

    assert_eq!(by_id, created);
    assert_eq!(by_order, created);
    assert!(matches!(
        coordinator.get_booking_by_order_id("BOOKING-0-0-deadbeef").await,
        Err(AppError::BookingNotFound(_))
    ));

    let listed = coordinator
        .list_field_bookings(h.field.id, Some(BookingStatus::Pending))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert!(coordinator
        .list_field_bookings(h.field.id, Some(BookingStatus::Approved))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_creation_is_announced_after_commit() {
    let notifier = Arc::new(RecordingNotifier::default());
    let h = harness_with_notifier(notifier.clone()).await;

    let details = h
        .services
        .coordinator
        .create_reservation(request(h.field.id, tomorrow_at(10), 1))
        .await
        .unwrap();

    let notices = notifier.notices.lock();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].booking_id, details.booking.id);
    assert_eq!(notices[0].from, None);
    assert_eq!(notices[0].to, BookingStatus::Pending);
}

#[tokio::test]
async fn test_failing_notifier_does_not_undo_the_booking() {
    let h = harness_with_notifier(Arc::new(BrokenNotifier)).await;

    let details = h
        .services
        .coordinator
        .create_reservation(request(h.field.id, tomorrow_at(10), 1))
        .await
        .unwrap();

    let stored = h.store.booking(details.booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Pending);
    assert_eq!(stored.created_at, start_of_world());
}
