//! Request types for the billing API.
//!
//! Every body may carry an explicit timestamp. When it is absent the handler
//! stamps the operation with the server clock.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    AttendanceCorrection, EnrollmentTerms, NewChild, NewEnrollment, NewPayment, NewRateSchedule,
    PaymentCorrection, PaymentStatus,
};

/// Body for `POST /children`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChildRequest {
    /// Child intake fields.
    #[serde(flatten)]
    pub child: NewChild,
    /// Operation time.
    #[serde(default)]
    pub at: Option<NaiveDateTime>,
}

/// Body for `POST /enroll`: a new child and its first enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollRequest {
    /// Child intake fields.
    pub child: NewChild,
    /// Enrollment terms.
    pub terms: EnrollmentTerms,
    /// Operation time.
    #[serde(default)]
    pub at: Option<NaiveDateTime>,
}

/// Body for `POST /enrollments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEnrollmentRequest {
    /// Enrollment fields.
    #[serde(flatten)]
    pub enrollment: NewEnrollment,
    /// Operation time.
    #[serde(default)]
    pub at: Option<NaiveDateTime>,
}

/// Body for enrollment status changes and other reasoned actions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionRequest {
    /// Why the change is made; required for pause and cancel.
    #[serde(default)]
    pub reason: String,
    /// Operation time.
    #[serde(default)]
    pub at: Option<NaiveDateTime>,
}

/// Body carrying only an optional timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimestampRequest {
    /// Operation time.
    #[serde(default)]
    pub at: Option<NaiveDateTime>,
}

/// Body for `POST /attendance/check-in`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInRequest {
    /// Enrollment the session is billed under.
    pub enrollment_id: Uuid,
    /// Arrival time.
    #[serde(default)]
    pub time: Option<NaiveDateTime>,
    /// Staff member checking the child in.
    pub actor: String,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Body for `POST /attendance/:id/check-out`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutRequest {
    /// Departure time.
    #[serde(default)]
    pub time: Option<NaiveDateTime>,
    /// Staff member checking the child out.
    pub actor: String,
}

/// Body for `POST /attendance/:id/correct`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectAttendanceRequest {
    /// Fields to change.
    #[serde(flatten)]
    pub correction: AttendanceCorrection,
    /// Administrator making the change.
    pub actor: String,
    /// Why the record is corrected.
    pub reason: String,
    /// Operation time.
    #[serde(default)]
    pub at: Option<NaiveDateTime>,
}

/// Body for `POST /rate-schedules`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleRequest {
    /// Schedule fields.
    #[serde(flatten)]
    pub schedule: NewRateSchedule,
    /// Operation time.
    #[serde(default)]
    pub at: Option<NaiveDateTime>,
}

/// Body for `POST /payments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPaymentRequest {
    /// Payment fields.
    #[serde(flatten)]
    pub payment: NewPayment,
    /// Operation time.
    #[serde(default)]
    pub at: Option<NaiveDateTime>,
}

/// Body for `POST /payments/:id/settle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlePaymentRequest {
    /// `completed` or `failed`.
    pub status: PaymentStatus,
    /// Operation time.
    #[serde(default)]
    pub at: Option<NaiveDateTime>,
}

/// Body for `POST /payments/:id/correct`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectPaymentRequest {
    /// Amounts to change.
    #[serde(flatten)]
    pub correction: PaymentCorrection,
    /// Administrator making the change.
    pub actor: String,
    /// Why the payment is corrected.
    pub reason: String,
    /// Operation time.
    #[serde(default)]
    pub at: Option<NaiveDateTime>,
}

/// Query for `GET /reports/stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsQuery {
    /// Business day the snapshot is taken for; defaults to today.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}
