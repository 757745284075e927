//! Core data models for the daycare billing engine.
//!
//! This module contains all the domain models used throughout the engine.

mod attendance;
mod audit;
mod child;
mod enrollment;
mod inquiry;
mod notification;
mod organization;
mod payment;
mod rate_schedule;
mod report;

pub use attendance::{AttendanceCorrection, AttendanceRecord, BillingType, SessionBilling};
pub use audit::AuditStep;
pub use child::{Child, GuardianContact, NewChild, RecordState};
pub use enrollment::{
    CustomRateOverride, Enrollment, EnrollmentStatus, EnrollmentTerms, NewEnrollment,
};
pub use inquiry::{InquiryRecord, InquiryStatus};
pub use notification::{
    NotificationEvent, NotificationKey, NotificationKind, NotificationPriority, PendingNotification,
};
pub use organization::OrganizationId;
pub use payment::{
    NewPayment, Payment, PaymentCorrection, PaymentPurpose, PaymentStatus, payment_total,
};
pub use rate_schedule::{BillingMode, NewRateSchedule, RateSchedule, RateSource, RateTiers};
pub use report::{
    AttendanceReport, ConversionRate, OutstandingBalance, RevenueSummary, StatsSnapshot,
    SweepReport,
};
