//! HTTP handler tests against the in-memory store

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, web, App};
    use chrono::{TimeZone, Utc};
    use fieldbook_api::{configure, Services};
    use fieldbook_core::{models::Field, BookingConfig, ManualClock};
    use fieldbook_db::MemoryStore;
    use fieldbook_services::TracingNotifier;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct Fixture {
        store: MemoryStore,
        clock: ManualClock,
        services: Services,
        field: Field,
        add_on_id: i64,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap());

        let place = store.insert_place(1, "Cancha Sur", dec!(0)).await;
        let field = store.insert_field(place.id, "Court 1", dec!(100)).await;
        let add_on = store.insert_add_on(place.id, "Racket", dec!(10), 3).await;

        let services = Services::new(
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            Arc::new(TracingNotifier),
            BookingConfig::default(),
        );

        Fixture {
            store,
            clock,
            services,
            field,
            add_on_id: add_on.id,
        }
    }

    fn booking_body(field_id: i64, start: &str, end: &str) -> Value {
        json!({
            "field_id": field_id,
            "renter_id": 42,
            "start": start,
            "end": end,
        })
    }

    fn decimal(value: &Value) -> Decimal {
        match value {
            Value::String(s) => s.parse().unwrap(),
            other => other.to_string().parse().unwrap(),
        }
    }

    macro_rules! app {
        ($fx:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($fx.services.clone()))
                    .configure(configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_health_endpoint() {
        let fx = fixture().await;
        let app = app!(fx);

        let req = test::TestRequest::get().uri("/api/v1/health").to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_create_and_fetch_booking() {
        let fx = fixture().await;
        let app = app!(fx);

        let mut body = booking_body(fx.field.id, "2025-06-02T10:00:00Z", "2025-06-02T12:00:00Z");
        body["line_items"] = json!([{ "add_on_id": fx.add_on_id, "quantity": 1 }]);

        let req = test::TestRequest::post()
            .uri("/api/v1/bookings")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let created: Value = test::read_body_json(resp).await;
        let data = &created["data"];
        assert_eq!(data["status"], "pending");
        assert_eq!(decimal(&data["total_price"]), dec!(220));
        assert_eq!(data["line_items"].as_array().unwrap().len(), 1);

        let order_id = data["order_id"].as_str().unwrap().to_string();
        let id = data["id"].as_i64().unwrap();

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/bookings/order/{}", order_id))
            .to_request();
        let by_order: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(by_order["data"]["id"].as_i64(), Some(id));

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/bookings/{}", id))
            .to_request();
        let by_id: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(by_id["data"]["order_id"].as_str(), Some(order_id.as_str()));
    }

    #[actix_web::test]
    async fn test_invalid_interval_is_a_bad_request() {
        let fx = fixture().await;
        let app = app!(fx);

        let body = booking_body(fx.field.id, "2025-06-02T12:00:00Z", "2025-06-02T10:00:00Z");
        let req = test::TestRequest::post()
            .uri("/api/v1/bookings")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let error: Value = test::read_body_json(resp).await;
        assert_eq!(error["error"], "invalid_interval");
        assert!(fx.store.bookings().await.is_empty());
    }

    #[actix_web::test]
    async fn test_past_and_inverted_booking_reports_lead_time_first() {
        let fx = fixture().await;
        let app = app!(fx);

        let body = booking_body(fx.field.id, "2025-05-01T12:00:00Z", "2025-05-01T10:00:00Z");
        let req = test::TestRequest::post()
            .uri("/api/v1/bookings")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let error: Value = test::read_body_json(resp).await;
        assert_eq!(error["error"], "past_or_too_soon_booking");
        assert!(fx.store.bookings().await.is_empty());
    }

    #[actix_web::test]
    async fn test_too_soon_booking_is_rejected() {
        let fx = fixture().await;
        let app = app!(fx);

        let body = booking_body(fx.field.id, "2025-06-01T10:00:00Z", "2025-06-01T11:00:00Z");
        let req = test::TestRequest::post()
            .uri("/api/v1/bookings")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let error: Value = test::read_body_json(resp).await;
        assert_eq!(error["error"], "past_or_too_soon_booking");
    }

    #[actix_web::test]
    async fn test_double_booking_is_a_conflict() {
        let fx = fixture().await;
        let app = app!(fx);

        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            let body =
                booking_body(fx.field.id, "2025-06-02T10:00:00Z", "2025-06-02T11:00:00Z");
            let req = test::TestRequest::post()
                .uri("/api/v1/bookings")
                .set_json(&body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), expected);
        }

        let req = test::TestRequest::post()
            .uri("/api/v1/availability")
            .set_json(json!({
                "field_id": fx.field.id,
                "start": "2025-06-02T11:00:00Z",
                "end": "2025-06-02T12:00:00Z",
            }))
            .to_request();
        let availability: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(availability["data"]["available"], true);
    }

    #[actix_web::test]
    async fn test_status_flow_and_sweep() {
        let fx = fixture().await;
        let app = app!(fx);

        let body = booking_body(fx.field.id, "2025-06-02T10:00:00Z", "2025-06-02T12:00:00Z");
        let req = test::TestRequest::post()
            .uri("/api/v1/bookings")
            .set_json(&body)
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["data"]["id"].as_i64().unwrap();

        let req = test::TestRequest::patch()
            .uri(&format!("/api/v1/bookings/{}/status", id))
            .set_json(json!({ "status": "completed" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::patch()
            .uri(&format!("/api/v1/bookings/{}/status", id))
            .set_json(json!({ "status": "approved", "note": "see you there" }))
            .to_request();
        let approved: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(approved["data"]["status"], "approved");

        let req = test::TestRequest::patch()
            .uri(&format!("/api/v1/bookings/{}/status", id))
            .set_json(json!({ "status": "cancelled" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        fx.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 2, 13, 0, 0).unwrap());
        let req = test::TestRequest::post()
            .uri("/api/v1/settlement/sweep")
            .to_request();
        let sweep: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(sweep["data"]["completed"], 1);

        let req = test::TestRequest::get()
            .uri("/api/v1/owners/1/balance")
            .to_request();
        let summary: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(decimal(&summary["data"]["total_balance"]), dec!(200));
        assert_eq!(summary["data"]["can_withdraw"], true);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/fields/{}/bookings?status=completed", fx.field.id))
            .to_request();
        let listed: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_withdrawal_endpoints() {
        let fx = fixture().await;
        fx.store.insert_place(9, "R1", dec!(100)).await;
        fx.store.insert_place(9, "R2", dec!(80)).await;
        let app = app!(fx);

        let req = test::TestRequest::post()
            .uri("/api/v1/withdrawals")
            .set_json(json!({ "owner_id": 9, "amount": "150" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["data"]["deductions"].as_array().unwrap().len(), 2);
        let id = created["data"]["id"].as_i64().unwrap();

        let req = test::TestRequest::post()
            .uri("/api/v1/withdrawals")
            .set_json(json!({ "owner_id": 9, "amount": "31" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post()
            .uri("/api/v1/withdrawals")
            .set_json(json!({ "owner_id": 9, "amount": "-1" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/withdrawals/{}", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/api/v1/owners/9/balance")
            .to_request();
        let summary: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(decimal(&summary["data"]["total_balance"]), dec!(30));
    }

    #[actix_web::test]
    async fn test_refund_endpoint() {
        let fx = fixture().await;
        let app = app!(fx);

        let body = booking_body(fx.field.id, "2025-06-02T10:00:00Z", "2025-06-02T11:00:00Z");
        let req = test::TestRequest::post()
            .uri("/api/v1/bookings")
            .set_json(&body)
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["data"]["id"].as_i64().unwrap();

        let refund = json!({ "booking_id": id, "amount": "100" });
        let req = test::TestRequest::post()
            .uri("/api/v1/refunds")
            .set_json(&refund)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let req = test::TestRequest::patch()
            .uri(&format!("/api/v1/bookings/{}/status", id))
            .set_json(json!({ "status": "cancelled" }))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/refunds")
            .set_json(&refund)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[actix_web::test]
    async fn test_unknown_booking_is_not_found() {
        let fx = fixture().await;
        let app = app!(fx);

        let req = test::TestRequest::get()
            .uri("/api/v1/bookings/9999")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
