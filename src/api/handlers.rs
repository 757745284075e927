//! HTTP request handlers for the billing API.
//!
//! Handlers are thin: they read the tenant header and the body, stamp a
//! time when the body carries none, call the engine and map its errors.

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::OrganizationId;

use super::request::{
    CheckInRequest, CheckOutRequest, CorrectAttendanceRequest, CorrectPaymentRequest,
    CreateChildRequest, CreateEnrollmentRequest, CreateScheduleRequest, EnrollRequest,
    RecordPaymentRequest, SettlePaymentRequest, StatsQuery, TimestampRequest, TransitionRequest,
};
use super::response::{ApiError, ApiErrorResponse};
use super::state::AppState;

/// Header naming the organization a request acts for.
pub const ORGANIZATION_HEADER: &str = "x-organization-id";

/// Header echoing the id assigned to each request.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

type HandlerResult = Result<Response, ApiErrorResponse>;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/children", post(create_child))
        .route("/children/:id", get(get_child))
        .route("/children/:id/tombstone", post(tombstone_child))
        .route("/enroll", post(enroll))
        .route("/enrollments", post(create_enrollment))
        .route("/enrollments/:id", get(get_enrollment))
        .route("/enrollments/:id/pause", post(pause_enrollment))
        .route("/enrollments/:id/resume", post(resume_enrollment))
        .route("/enrollments/:id/cancel", post(cancel_enrollment))
        .route("/enrollments/:id/rates", get(enrollment_rates))
        .route("/enrollments/:id/open-session", get(open_session))
        .route("/attendance/check-in", post(check_in))
        .route("/attendance/:id", get(get_attendance))
        .route("/attendance/:id/check-out", post(check_out))
        .route("/attendance/:id/correct", post(correct_attendance))
        .route("/rate-schedules", post(create_schedule).get(list_schedules))
        .route("/rate-schedules/:id/activate", post(activate_schedule))
        .route("/payments", post(record_payment))
        .route("/payments/:id", get(get_payment))
        .route("/payments/:id/settle", post(settle_payment))
        .route("/payments/:id/correct", post(correct_payment))
        .route("/reports/stats", get(stats_snapshot))
        .route("/reports/monthly-revenue/:year/:month", get(monthly_revenue))
        .route("/reports/daily-revenue/:date", get(daily_revenue))
        .route(
            "/reports/attendance/:child_id/:year/:month",
            get(attendance_report),
        )
        .route("/reports/conversion", get(conversion_rate))
        .route("/reports/pending-payments", get(pending_payments))
        .route("/reports/outstanding-balances", get(outstanding_balances))
        .route("/sweeps", post(run_sweep))
        .with_state(state)
}

/// The organization named by the request's tenant header.
#[derive(Debug, Clone)]
pub struct Tenant(pub OrganizationId);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Tenant {
    type Rejection = ApiErrorResponse;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ORGANIZATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Tenant(OrganizationId::new(value)))
            .ok_or_else(|| {
                warn!("Request rejected without organization header");
                ApiErrorResponse::bad_request(ApiError::missing_organization(ORGANIZATION_HEADER))
            })
    }
}

/// Unwraps a JSON body, turning extractor rejections into API errors.
fn read_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    correlation_id: Uuid,
) -> Result<T, ApiErrorResponse> {
    let rejection = match payload {
        Ok(Json(body)) => return Ok(body),
        Err(rejection) => rejection,
    };
    let error = match rejection {
        JsonRejection::JsonDataError(err) => {
            let body_text = err.body_text();
            warn!(correlation_id = %correlation_id, error = %body_text, "JSON data error");
            if body_text.contains("missing field") {
                ApiError::new("VALIDATION_ERROR", body_text)
            } else {
                ApiError::malformed_json(body_text)
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            warn!(correlation_id = %correlation_id, error = %err, "JSON syntax error");
            ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
        }
        _ => ApiError::malformed_json("Failed to parse request body"),
    };
    Err(ApiErrorResponse::bad_request(error))
}

/// Logs the outcome and renders it with the correlation header.
fn respond<T: Serialize>(
    correlation_id: Uuid,
    org: &OrganizationId,
    operation: &'static str,
    success: StatusCode,
    result: EngineResult<T>,
) -> HandlerResult {
    let header = [(CORRELATION_HEADER, correlation_id.to_string())];
    match result {
        Ok(body) => {
            info!(
                correlation_id = %correlation_id,
                organization_id = %org,
                operation,
                "Request completed"
            );
            Ok((success, header, Json(body)).into_response())
        }
        Err(err) => {
            warn!(
                correlation_id = %correlation_id,
                organization_id = %org,
                operation,
                error = %err,
                "Request failed"
            );
            Ok((header, ApiErrorResponse::from(err)).into_response())
        }
    }
}

// =============================================================================
// Children and enrollments
// =============================================================================

async fn create_child(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    payload: Result<Json<CreateChildRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let request = read_body(payload, correlation_id)?;
    let at = state.time_or_now(request.at);
    let result = state
        .engine()
        .lifecycle()
        .create_child(&org, request.child, at)
        .await;
    respond(correlation_id, &org, "create_child", StatusCode::CREATED, result)
}

async fn get_child(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<Uuid>,
) -> HandlerResult {
    let result = state.engine().lifecycle().get_child(&org, id).await;
    respond(Uuid::new_v4(), &org, "get_child", StatusCode::OK, result)
}

async fn tombstone_child(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<Uuid>,
    payload: Result<Json<TimestampRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let request = read_body(payload, correlation_id)?;
    let at = state.time_or_now(request.at);
    let result = state
        .engine()
        .lifecycle()
        .tombstone_child(&org, id, at)
        .await;
    respond(correlation_id, &org, "tombstone_child", StatusCode::OK, result)
}

async fn enroll(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    payload: Result<Json<EnrollRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let request = read_body(payload, correlation_id)?;
    let at = state.time_or_now(request.at);
    let result = state
        .engine()
        .lifecycle()
        .enroll(&org, request.child, request.terms, at)
        .await;
    respond(correlation_id, &org, "enroll", StatusCode::CREATED, result)
}

async fn create_enrollment(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    payload: Result<Json<CreateEnrollmentRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let request = read_body(payload, correlation_id)?;
    let at = state.time_or_now(request.at);
    let result = state
        .engine()
        .lifecycle()
        .create_enrollment(&org, request.enrollment, at)
        .await;
    respond(
        correlation_id,
        &org,
        "create_enrollment",
        StatusCode::CREATED,
        result,
    )
}

async fn get_enrollment(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<Uuid>,
) -> HandlerResult {
    let result = state.engine().lifecycle().get_enrollment(&org, id).await;
    respond(Uuid::new_v4(), &org, "get_enrollment", StatusCode::OK, result)
}

async fn pause_enrollment(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<Uuid>,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let request = read_body(payload, correlation_id)?;
    let at = state.time_or_now(request.at);
    let result = state
        .engine()
        .lifecycle()
        .pause(&org, id, &request.reason, at)
        .await;
    respond(correlation_id, &org, "pause_enrollment", StatusCode::OK, result)
}

async fn resume_enrollment(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<Uuid>,
    payload: Result<Json<TimestampRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let request = read_body(payload, correlation_id)?;
    let at = state.time_or_now(request.at);
    let result = state.engine().lifecycle().resume(&org, id, at).await;
    respond(correlation_id, &org, "resume_enrollment", StatusCode::OK, result)
}

async fn cancel_enrollment(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<Uuid>,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let request = read_body(payload, correlation_id)?;
    let at = state.time_or_now(request.at);
    let result = state
        .engine()
        .lifecycle()
        .cancel(&org, id, &request.reason, at)
        .await;
    respond(correlation_id, &org, "cancel_enrollment", StatusCode::OK, result)
}

async fn enrollment_rates(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<Uuid>,
) -> HandlerResult {
    let result = state.engine().lifecycle().resolve_rates(&org, id).await;
    respond(Uuid::new_v4(), &org, "resolve_rates", StatusCode::OK, result)
}

async fn open_session(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<Uuid>,
) -> HandlerResult {
    let result = state.engine().ledger().open_session(&org, id).await;
    respond(Uuid::new_v4(), &org, "open_session", StatusCode::OK, result)
}

// =============================================================================
// Attendance
// =============================================================================

async fn check_in(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    payload: Result<Json<CheckInRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let request = read_body(payload, correlation_id)?;
    let time = state.time_or_now(request.time);
    let result = state
        .engine()
        .ledger()
        .check_in(
            &org,
            request.enrollment_id,
            time,
            &request.actor,
            request.notes,
        )
        .await;
    respond(correlation_id, &org, "check_in", StatusCode::CREATED, result)
}

async fn get_attendance(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<Uuid>,
) -> HandlerResult {
    let result = state.engine().ledger().get(&org, id).await;
    respond(Uuid::new_v4(), &org, "get_attendance", StatusCode::OK, result)
}

async fn check_out(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<Uuid>,
    payload: Result<Json<CheckOutRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let request = read_body(payload, correlation_id)?;
    let time = state.time_or_now(request.time);
    let result = state
        .engine()
        .ledger()
        .check_out(&org, id, time, &request.actor)
        .await;
    respond(correlation_id, &org, "check_out", StatusCode::OK, result)
}

async fn correct_attendance(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<Uuid>,
    payload: Result<Json<CorrectAttendanceRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let request = read_body(payload, correlation_id)?;
    let at = state.time_or_now(request.at);
    let result = state
        .engine()
        .ledger()
        .manual_correct(
            &org,
            id,
            request.correction,
            &request.actor,
            &request.reason,
            at,
        )
        .await;
    respond(correlation_id, &org, "manual_correct", StatusCode::OK, result)
}

// =============================================================================
// Rate schedules
// =============================================================================

async fn create_schedule(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    payload: Result<Json<CreateScheduleRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let request = read_body(payload, correlation_id)?;
    let at = state.time_or_now(request.at);
    let result = state
        .engine()
        .lifecycle()
        .create_schedule(&org, request.schedule, at)
        .await;
    respond(
        correlation_id,
        &org,
        "create_schedule",
        StatusCode::CREATED,
        result,
    )
}

async fn list_schedules(State(state): State<AppState>, Tenant(org): Tenant) -> HandlerResult {
    let result = state.engine().lifecycle().list_schedules(&org).await;
    respond(Uuid::new_v4(), &org, "list_schedules", StatusCode::OK, result)
}

async fn activate_schedule(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<Uuid>,
) -> HandlerResult {
    let result = state.engine().lifecycle().activate_schedule(&org, id).await;
    respond(Uuid::new_v4(), &org, "activate_schedule", StatusCode::OK, result)
}

// =============================================================================
// Payments
// =============================================================================

async fn record_payment(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    payload: Result<Json<RecordPaymentRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let request = read_body(payload, correlation_id)?;
    let at = state.time_or_now(request.at);
    let result = state
        .engine()
        .payments()
        .record_payment(&org, request.payment, at)
        .await;
    respond(
        correlation_id,
        &org,
        "record_payment",
        StatusCode::CREATED,
        result,
    )
}

async fn get_payment(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<Uuid>,
) -> HandlerResult {
    let result = state.engine().payments().get_payment(&org, id).await;
    respond(Uuid::new_v4(), &org, "get_payment", StatusCode::OK, result)
}

async fn settle_payment(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<Uuid>,
    payload: Result<Json<SettlePaymentRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let request = read_body(payload, correlation_id)?;
    let at = state.time_or_now(request.at);
    let result = state
        .engine()
        .payments()
        .settle_payment(&org, id, request.status, at)
        .await;
    respond(correlation_id, &org, "settle_payment", StatusCode::OK, result)
}

async fn correct_payment(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<Uuid>,
    payload: Result<Json<CorrectPaymentRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let request = read_body(payload, correlation_id)?;
    let at = state.time_or_now(request.at);
    let result = state
        .engine()
        .payments()
        .correct_payment(
            &org,
            id,
            request.correction,
            &request.actor,
            &request.reason,
            at,
        )
        .await;
    respond(correlation_id, &org, "correct_payment", StatusCode::OK, result)
}

// =============================================================================
// Reports and sweeps
// =============================================================================

async fn stats_snapshot(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Query(query): Query<StatsQuery>,
) -> HandlerResult {
    let today = query.date.unwrap_or_else(|| state.time_or_now(None).date());
    let result = state.engine().revenue().stats_snapshot(&org, today).await;
    respond(Uuid::new_v4(), &org, "stats_snapshot", StatusCode::OK, result)
}

async fn monthly_revenue(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path((year, month)): Path<(i32, u32)>,
) -> HandlerResult {
    let result = state
        .engine()
        .revenue()
        .monthly_revenue(&org, year, month)
        .await;
    respond(Uuid::new_v4(), &org, "monthly_revenue", StatusCode::OK, result)
}

async fn daily_revenue(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(date): Path<NaiveDate>,
) -> HandlerResult {
    let result = state.engine().revenue().daily_revenue(&org, date).await;
    respond(Uuid::new_v4(), &org, "daily_revenue", StatusCode::OK, result)
}

async fn attendance_report(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path((child_id, year, month)): Path<(Uuid, i32, u32)>,
) -> HandlerResult {
    let result = state
        .engine()
        .revenue()
        .attendance_report(&org, child_id, year, month)
        .await;
    respond(
        Uuid::new_v4(),
        &org,
        "attendance_report",
        StatusCode::OK,
        result,
    )
}

async fn conversion_rate(State(state): State<AppState>, Tenant(org): Tenant) -> HandlerResult {
    let result = state.engine().revenue().conversion_rate(&org).await;
    respond(Uuid::new_v4(), &org, "conversion_rate", StatusCode::OK, result)
}

async fn pending_payments(State(state): State<AppState>, Tenant(org): Tenant) -> HandlerResult {
    let result = state.engine().revenue().pending_payments(&org).await;
    respond(Uuid::new_v4(), &org, "pending_payments", StatusCode::OK, result)
}

async fn outstanding_balances(
    State(state): State<AppState>,
    Tenant(org): Tenant,
) -> HandlerResult {
    let result = state.engine().revenue().outstanding_balances(&org).await;
    respond(
        Uuid::new_v4(),
        &org,
        "outstanding_balances",
        StatusCode::OK,
        result,
    )
}

async fn run_sweep(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    payload: Result<Json<TimestampRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let request = read_body(payload, correlation_id)?;
    let now = state.time_or_now(request.at);
    let result = state.engine().sweeper().run(&org, now).await;
    respond(correlation_id, &org, "expiry_sweep", StatusCode::OK, result)
}
