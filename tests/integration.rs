//! HTTP integration tests for the daycare billing engine.
//!
//! This suite drives the router end to end:
//! - Intake and enrollment
//! - Check-in / check-out billing tiers
//! - Late pickup fees
//! - Manual corrections
//! - Enrollment state machine over HTTP
//! - Payments and revenue reports
//! - Error mapping

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;

use daycare_billing::api::{AppState, ORGANIZATION_HEADER, create_router};
use daycare_billing::config::ConfigLoader;
use daycare_billing::engine::{DaycareEngine, MemoryNotificationSink};
use daycare_billing::models::OrganizationId;
use daycare_billing::store::InMemoryStore;

const ORG: &str = "sunrise-daycare";

// =============================================================================
// Test Helpers
// =============================================================================

fn seed_time() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2026-01-01 07:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
}

async fn create_router_for_test() -> Router {
    let loader = ConfigLoader::load("./config/daycare").expect("Failed to load config");
    let engine = DaycareEngine::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(MemoryNotificationSink::new()),
        loader.settings().clone(),
    );
    engine
        .seed_schedules(&OrganizationId::new(ORG), loader.schedule_seeds(), seed_time())
        .await
        .expect("Failed to seed schedules");
    create_router(AppState::with_clock(Arc::new(engine), seed_time))
}

fn normalize_decimal(s: &str) -> String {
    Decimal::from_str(s).unwrap().normalize().to_string()
}

fn assert_money(value: &Value, expected: &str) {
    let actual = value.as_str().unwrap_or_else(|| panic!("not a string: {}", value));
    assert_eq!(
        normalize_decimal(actual),
        normalize_decimal(expected),
        "Expected {}, got {}",
        expected,
        actual
    );
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(ORGANIZATION_HEADER, ORG);
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(router, "POST", uri, Some(body)).await
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, "GET", uri, None).await
}

fn intake(first_name: &str) -> Value {
    json!({
        "first_name": first_name,
        "last_name": "Rao",
        "date_of_birth": "2022-05-01",
        "guardian": { "name": "Meera Rao", "phone": "555-0100" }
    })
}

/// Enrolls a child and returns `(child_id, enrollment_id)`.
async fn enroll(router: &Router, first_name: &str, end_date: Option<&str>) -> (String, String) {
    let (status, body) = post(
        router,
        "/enroll",
        json!({
            "child": intake(first_name),
            "terms": { "start_date": "2026-01-01", "end_date": end_date },
            "at": "2026-01-01T08:00:00"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "enroll failed: {}", body);
    (
        body["child"]["id"].as_str().unwrap().to_string(),
        body["enrollment"]["id"].as_str().unwrap().to_string(),
    )
}

async fn check_in(router: &Router, enrollment_id: &str, time: &str) -> (StatusCode, Value) {
    post(
        router,
        "/attendance/check-in",
        json!({ "enrollment_id": enrollment_id, "time": time, "actor": "staff_1" }),
    )
    .await
}

async fn check_out(router: &Router, attendance_id: &str, time: &str) -> (StatusCode, Value) {
    post(
        router,
        &format!("/attendance/{}/check-out", attendance_id),
        json!({ "time": time, "actor": "staff_1" }),
    )
    .await
}

/// Runs one full session and returns the check-out outcome.
async fn session(router: &Router, enrollment_id: &str, start: &str, end: &str) -> Value {
    let (status, record) = check_in(router, enrollment_id, start).await;
    assert_eq!(status, StatusCode::CREATED, "check-in failed: {}", record);
    let (status, outcome) = check_out(router, record["id"].as_str().unwrap(), end).await;
    assert_eq!(status, StatusCode::OK, "check-out failed: {}", outcome);
    outcome
}

// =============================================================================
// SECTION 1: Intake and enrollment
// =============================================================================

#[tokio::test]
async fn test_enroll_assigns_codes() {
    let router = create_router_for_test().await;
    let (status, body) = post(
        &router,
        "/enroll",
        json!({
            "child": intake("Asha"),
            "terms": { "start_date": "2026-01-01" },
            "at": "2026-01-01T08:00:00"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["child"]["child_code"], "CH20260001");
    assert_eq!(body["enrollment"]["enrollment_number"], "ENR20260001");
    assert_eq!(body["enrollment"]["status"], "active");
}

#[tokio::test]
async fn test_second_enrollment_for_child_returns_409() {
    let router = create_router_for_test().await;
    let (child_id, _) = enroll(&router, "Asha", None).await;

    let (status, body) = post(
        &router,
        "/enrollments",
        json!({ "child_id": child_id, "start_date": "2026-02-01" }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn test_resolved_rates_come_from_active_seed_schedule() {
    let router = create_router_for_test().await;
    let (_, enrollment_id) = enroll(&router, "Asha", None).await;

    let (status, body) = get(&router, &format!("/enrollments/{}/rates", enrollment_id)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"]["kind"], "organization_default");
    assert_money(&body["tiers"]["full_day_rate"], "600");
}

// =============================================================================
// SECTION 2: Session billing tiers
// =============================================================================

#[tokio::test]
async fn test_50_minute_session_bills_one_hour() {
    let router = create_router_for_test().await;
    let (_, enrollment_id) = enroll(&router, "Asha", None).await;

    let outcome = session(
        &router,
        &enrollment_id,
        "2026-01-15T09:00:00",
        "2026-01-15T09:50:00",
    )
    .await;

    let billing = &outcome["record"]["billing"];
    assert_eq!(billing["duration_minutes"], 50);
    assert_eq!(billing["billing_type"], "hourly");
    assert_money(&billing["calculated_charge"], "100");
    assert_money(&outcome["payment"]["total_amount"], "100");
    assert_eq!(outcome["payment"]["status"], "pending");
}

#[tokio::test]
async fn test_four_and_a_half_hours_is_half_day() {
    let router = create_router_for_test().await;
    let (_, enrollment_id) = enroll(&router, "Asha", None).await;

    let outcome = session(
        &router,
        &enrollment_id,
        "2026-01-15T09:00:00",
        "2026-01-15T13:30:00",
    )
    .await;

    assert_eq!(outcome["record"]["billing"]["billing_type"], "half-day");
    assert_money(&outcome["payment"]["total_amount"], "350");
}

#[tokio::test]
async fn test_nine_hours_is_full_day() {
    let router = create_router_for_test().await;
    let (_, enrollment_id) = enroll(&router, "Asha", None).await;

    let outcome = session(
        &router,
        &enrollment_id,
        "2026-01-15T08:00:00",
        "2026-01-15T17:00:00",
    )
    .await;

    assert_eq!(outcome["record"]["billing"]["billing_type"], "full-day");
    assert_money(&outcome["record"]["billing"]["late_pickup_fee"], "0");
    assert_money(&outcome["payment"]["total_amount"], "600");
}

#[tokio::test]
async fn test_late_pickup_adds_fee() {
    let router = create_router_for_test().await;
    let (_, enrollment_id) = enroll(&router, "Asha", None).await;

    // Closing is 18:30 with 15 minutes grace; 19:00 is 30 minutes late.
    let outcome = session(
        &router,
        &enrollment_id,
        "2026-01-15T09:00:00",
        "2026-01-15T19:00:00",
    )
    .await;

    assert_money(&outcome["record"]["billing"]["late_pickup_fee"], "150");
    assert_money(&outcome["payment"]["late_fee"], "150");
    assert_money(&outcome["payment"]["total_amount"], "750");
}

#[tokio::test]
async fn test_audit_trace_records_each_rule() {
    let router = create_router_for_test().await;
    let (_, enrollment_id) = enroll(&router, "Asha", None).await;

    let outcome = session(
        &router,
        &enrollment_id,
        "2026-01-15T09:00:00",
        "2026-01-15T10:00:00",
    )
    .await;

    let steps = outcome["record"]["billing"]["audit_trace"].as_array().unwrap();
    let rules: Vec<&str> = steps.iter().map(|s| s["rule_id"].as_str().unwrap()).collect();
    assert_eq!(rules, vec!["rate_resolution", "tier_charge", "late_pickup"]);
}

// =============================================================================
// SECTION 3: Attendance preconditions
// =============================================================================

#[tokio::test]
async fn test_double_check_in_returns_409() {
    let router = create_router_for_test().await;
    let (_, enrollment_id) = enroll(&router, "Asha", None).await;

    let (first, _) = check_in(&router, &enrollment_id, "2026-01-15T09:00:00").await;
    let (second, body) = check_in(&router, &enrollment_id, "2026-01-15T09:05:00").await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_check_out_before_check_in_returns_400() {
    let router = create_router_for_test().await;
    let (_, enrollment_id) = enroll(&router, "Asha", None).await;
    let (_, record) = check_in(&router, &enrollment_id, "2026-01-15T09:00:00").await;

    let (status, body) = check_out(
        &router,
        record["id"].as_str().unwrap(),
        "2026-01-15T08:00:00",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_open_session_lookup() {
    let router = create_router_for_test().await;
    let (_, enrollment_id) = enroll(&router, "Asha", None).await;

    let uri = format!("/enrollments/{}/open-session", enrollment_id);
    let (_, before) = get(&router, &uri).await;
    assert!(before.is_null());

    let (_, record) = check_in(&router, &enrollment_id, "2026-01-15T09:00:00").await;
    let (status, open) = get(&router, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(open["id"], record["id"]);
}

#[tokio::test]
async fn test_check_in_on_paused_enrollment_returns_409() {
    let router = create_router_for_test().await;
    let (_, enrollment_id) = enroll(&router, "Asha", None).await;

    let (status, _) = post(
        &router,
        &format!("/enrollments/{}/pause", enrollment_id),
        json!({ "reason": "family holiday", "at": "2026-01-10T08:00:00" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = check_in(&router, &enrollment_id, "2026-01-15T09:00:00").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// =============================================================================
// SECTION 4: Manual corrections
// =============================================================================

#[tokio::test]
async fn test_manual_correction_rebills_session_and_payment() {
    let router = create_router_for_test().await;
    let (_, enrollment_id) = enroll(&router, "Asha", None).await;
    let outcome = session(
        &router,
        &enrollment_id,
        "2026-01-15T09:00:00",
        "2026-01-15T09:50:00",
    )
    .await;
    let attendance_id = outcome["record"]["id"].as_str().unwrap();

    let (status, corrected) = post(
        &router,
        &format!("/attendance/{}/correct", attendance_id),
        json!({
            "check_out_time": "2026-01-15T13:30:00",
            "actor": "admin",
            "reason": "pickup logged late",
            "at": "2026-01-16T10:00:00"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "correction failed: {}", corrected);
    assert_eq!(corrected["record"]["billing"]["duration_minutes"], 270);
    assert_eq!(corrected["record"]["billing"]["billing_type"], "half-day");
    assert_eq!(corrected["record"]["is_manual_edit"], true);
    assert_money(&corrected["payment"]["total_amount"], "350");
    assert_eq!(corrected["payment"]["id"], outcome["payment"]["id"]);
}

#[tokio::test]
async fn test_manual_correction_without_reason_returns_400() {
    let router = create_router_for_test().await;
    let (_, enrollment_id) = enroll(&router, "Asha", None).await;
    let (_, record) = check_in(&router, &enrollment_id, "2026-01-15T09:00:00").await;

    let (status, _) = post(
        &router,
        &format!("/attendance/{}/correct", record["id"].as_str().unwrap()),
        json!({ "notes": "arrived with a cold", "actor": "admin", "reason": "" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// SECTION 5: Enrollment state machine
// =============================================================================

#[tokio::test]
async fn test_pause_requires_reason() {
    let router = create_router_for_test().await;
    let (_, enrollment_id) = enroll(&router, "Asha", None).await;

    let (status, body) = post(
        &router,
        &format!("/enrollments/{}/pause", enrollment_id),
        json!({}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_cancelled_enrollment_cannot_resume() {
    let router = create_router_for_test().await;
    let (_, enrollment_id) = enroll(&router, "Asha", None).await;

    let (status, cancelled) = post(
        &router,
        &format!("/enrollments/{}/cancel", enrollment_id),
        json!({ "reason": "moved away", "at": "2026-01-20T09:00:00" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["end_date"], "2026-01-20");

    let (status, _) = post(
        &router,
        &format!("/enrollments/{}/resume", enrollment_id),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_sweep_expires_lapsed_enrollment() {
    let router = create_router_for_test().await;
    let (_, enrollment_id) = enroll(&router, "Asha", Some("2026-03-01")).await;

    let (status, report) = post(&router, "/sweeps", json!({ "at": "2026-03-01T00:05:00" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["expired_count"], 1);
    assert_eq!(report["notifications_emitted"], 1);

    let (_, enrollment) = get(&router, &format!("/enrollments/{}", enrollment_id)).await;
    assert_eq!(enrollment["status"], "expired");
}

// =============================================================================
// SECTION 6: Payments and reports
// =============================================================================

#[tokio::test]
async fn test_settled_session_counts_toward_monthly_revenue() {
    let router = create_router_for_test().await;
    let (_, enrollment_id) = enroll(&router, "Asha", None).await;
    let outcome = session(
        &router,
        &enrollment_id,
        "2026-01-31T09:00:00",
        "2026-01-31T17:00:00",
    )
    .await;
    let payment_id = outcome["payment"]["id"].as_str().unwrap();

    let (_, pending) = get(&router, "/reports/monthly-revenue/2026/1").await;
    assert_money(&pending["total"], "0");

    let (status, settled) = post(
        &router,
        &format!("/payments/{}/settle", payment_id),
        json!({ "status": "completed", "at": "2026-01-31T18:00:00" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settled["status"], "completed");

    let (_, january) = get(&router, "/reports/monthly-revenue/2026/1").await;
    assert_money(&january["total"], "600");
    assert_eq!(january["payment_count"], 1);

    let (_, february) = get(&router, "/reports/monthly-revenue/2026/2").await;
    assert_money(&february["total"], "0");
}

#[tokio::test]
async fn test_registration_fee_payment() {
    let router = create_router_for_test().await;
    let (child_id, enrollment_id) = enroll(&router, "Asha", None).await;

    let (status, payment) = post(
        &router,
        "/payments",
        json!({
            "child_id": child_id,
            "enrollment_id": enrollment_id,
            "purpose": "registration_fee",
            "amount": "2000",
            "discount": "500",
            "payment_date": "2026-01-01",
            "status": "completed",
            "at": "2026-01-01T08:30:00"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "payment failed: {}", payment);
    assert_money(&payment["total_amount"], "1500");
    assert_eq!(payment["payment_number"], "PAY20260001");
    assert_eq!(payment["receipt_number"], "RCP20260001");

    let (_, day) = get(&router, "/reports/daily-revenue/2026-01-01").await;
    assert_money(&day["total"], "1500");
}

#[tokio::test]
async fn test_attendance_report_and_outstanding_balances() {
    let router = create_router_for_test().await;
    let (child_id, enrollment_id) = enroll(&router, "Asha", None).await;
    session(&router, &enrollment_id, "2026-01-05T09:00:00", "2026-01-05T13:30:00").await;
    session(&router, &enrollment_id, "2026-01-06T09:00:00", "2026-01-06T10:00:00").await;

    let (status, report) = get(&router, &format!("/reports/attendance/{}/2026/1", child_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["days_present"], 2);
    assert_eq!(report["total_minutes"], 330);
    assert_money(&report["total_hours"], "5.5");
    assert_money(&report["total_charges"], "450");

    let (_, balances) = get(&router, "/reports/outstanding-balances").await;
    let balances = balances.as_array().unwrap();
    assert_eq!(balances.len(), 1);
    assert_money(&balances[0]["pending_total"], "450");
    assert_eq!(balances[0]["pending_count"], 2);
}

#[tokio::test]
async fn test_stats_snapshot() {
    let router = create_router_for_test().await;
    let (_, first) = enroll(&router, "Asha", None).await;
    enroll(&router, "Ravi", None).await;
    check_in(&router, &first, "2026-01-15T09:00:00").await;

    let (status, stats) = get(&router, "/reports/stats?date=2026-01-15").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_children"], 2);
    assert_eq!(stats["active_enrollments"], 2);
    assert_eq!(stats["checked_in_now"], 1);
    assert_money(&stats["today_revenue"], "0");
}

// =============================================================================
// SECTION 7: Error cases and tenancy
// =============================================================================

#[tokio::test]
async fn test_missing_organization_header_returns_400() {
    let router = create_router_for_test().await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/rate-schedules")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_tenant_without_schedule_returns_422() {
    let router = create_router_for_test().await;

    // Enrolled under a tenant that has no seeded schedules.
    let request = |uri: &str, body: Value| {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(ORGANIZATION_HEADER, "other-daycare")
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    };
    let response = router
        .clone()
        .oneshot(request(
            "/enroll",
            json!({
                "child": intake("Asha"),
                "terms": { "start_date": "2026-01-01" },
                "at": "2026-01-01T08:00:00"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let enrolled: Value = serde_json::from_slice(&bytes).unwrap();
    let enrollment_id = enrolled["enrollment"]["id"].as_str().unwrap();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/enrollments/{}/rates", enrollment_id))
                .header(ORGANIZATION_HEADER, "other-daycare")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // The seeded tenant cannot see the other tenant's enrollment.
    let (status, _) = get(&router, &format!("/enrollments/{}", enrollment_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_required_field_returns_validation_error() {
    let router = create_router_for_test().await;

    let (status, body) = post(
        &router,
        "/attendance/check-in",
        json!({ "actor": "staff_1" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["message"].as_str().unwrap().contains("enrollment_id"));
}

#[tokio::test]
async fn test_invalid_month_returns_400() {
    let router = create_router_for_test().await;

    let (status, body) = get(&router, "/reports/monthly-revenue/2026/13").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}
