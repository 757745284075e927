//! HTTP API module for the daycare billing engine.
//!
//! This module exposes the engine's operations as a REST API. Every request
//! names its tenant in the `x-organization-id` header.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::{CORRELATION_HEADER, ORGANIZATION_HEADER, Tenant, create_router};
pub use request::{
    CheckInRequest, CheckOutRequest, CorrectAttendanceRequest, CorrectPaymentRequest,
    CreateChildRequest, CreateEnrollmentRequest, CreateScheduleRequest, EnrollRequest,
    RecordPaymentRequest, SettlePaymentRequest, StatsQuery, TimestampRequest, TransitionRequest,
};
pub use response::{ApiError, ApiErrorResponse};
pub use state::AppState;
