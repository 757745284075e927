//! Persistence boundary for the billing engine.
//!
//! The engine talks to storage only through the [`Store`] trait. Every call
//! takes the tenant's [`OrganizationId`]; there is no unscoped read or write.
//!
//! Invariants that would otherwise need a lock around a read-then-write are
//! expressed as single atomic calls:
//!
//! * [`Store::insert_attendance_if_no_open`] for the one-open-session rule,
//!   checked against the enrollment's status and version
//! * [`Store::insert_enrollment_exclusive`] for the one-live-enrollment rule
//! * [`Store::activate_schedule_exclusive`] for the single active schedule
//! * the `update_*` calls, which compare the caller's `version` with the
//!   stored one and fail with `Conflict` when another writer got there first
//!
//! [`InMemoryStore`] is the implementation that ships with the crate.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::{
    AttendanceRecord, Child, Enrollment, InquiryRecord, NotificationEvent, NotificationKey,
    OrganizationId, Payment, PaymentStatus, PendingNotification, RateSchedule,
};

/// Tenant-scoped storage operations used by the engine.
#[async_trait]
pub trait Store: Send + Sync {
    /// Organizations that have any stored data, in id order.
    async fn list_organizations(&self) -> EngineResult<Vec<OrganizationId>>;

    /// Write counter for an organization; any write moves it forward.
    async fn revision(&self, org: &OrganizationId) -> EngineResult<u64>;

    /// Returns the next value of the `(prefix, year)` sequence, starting at 1.
    async fn next_sequence(&self, org: &OrganizationId, prefix: &str, year: i32)
        -> EngineResult<u64>;

    // Children

    /// Stores a new child. Fails with `Conflict` on a duplicate child code.
    async fn insert_child(&self, org: &OrganizationId, child: Child) -> EngineResult<Child>;

    /// Looks up a child, tombstoned or not.
    async fn get_child(&self, org: &OrganizationId, id: Uuid) -> EngineResult<Option<Child>>;

    /// Replaces a stored child.
    async fn update_child(&self, org: &OrganizationId, child: Child) -> EngineResult<Child>;

    /// Children that are not tombstoned.
    async fn count_active_children(&self, org: &OrganizationId) -> EngineResult<u64>;

    // Rate schedules

    /// Stores a new, inactive schedule.
    async fn insert_schedule(
        &self,
        org: &OrganizationId,
        schedule: RateSchedule,
    ) -> EngineResult<RateSchedule>;

    /// Looks up a schedule.
    async fn get_schedule(&self, org: &OrganizationId, id: Uuid)
        -> EngineResult<Option<RateSchedule>>;

    /// All schedules, oldest first.
    async fn list_schedules(&self, org: &OrganizationId) -> EngineResult<Vec<RateSchedule>>;

    /// The organization's active schedule, if any.
    async fn active_schedule(&self, org: &OrganizationId) -> EngineResult<Option<RateSchedule>>;

    /// Marks `id` active and every other schedule of the organization
    /// inactive in one step. Fails with `NotFound` for an unknown schedule.
    async fn activate_schedule_exclusive(
        &self,
        org: &OrganizationId,
        id: Uuid,
    ) -> EngineResult<RateSchedule>;

    // Enrollments

    /// Stores an enrollment unless the child already holds an active or
    /// paused one, in which case it fails with `Conflict`.
    async fn insert_enrollment_exclusive(
        &self,
        org: &OrganizationId,
        enrollment: Enrollment,
    ) -> EngineResult<Enrollment>;

    /// Looks up an enrollment.
    async fn get_enrollment(&self, org: &OrganizationId, id: Uuid)
        -> EngineResult<Option<Enrollment>>;

    /// Compare-and-swap on `enrollment.version`; returns the stored copy with
    /// the bumped version.
    async fn update_enrollment(
        &self,
        org: &OrganizationId,
        enrollment: Enrollment,
    ) -> EngineResult<Enrollment>;

    /// The child's active or paused enrollment, if any.
    async fn live_enrollment_for_child(
        &self,
        org: &OrganizationId,
        child_id: Uuid,
    ) -> EngineResult<Option<Enrollment>>;

    /// Active enrollments with an end date on or before `date`.
    async fn active_enrollments_ending_by(
        &self,
        org: &OrganizationId,
        date: NaiveDate,
    ) -> EngineResult<Vec<Enrollment>>;

    /// Enrollments with status active.
    async fn count_active_enrollments(&self, org: &OrganizationId) -> EngineResult<u64>;

    // Attendance

    /// Stores an open session. Fails with `Conflict` when the enrollment
    /// already has one, is no longer active, or has moved past
    /// `enrollment_version`.
    async fn insert_attendance_if_no_open(
        &self,
        org: &OrganizationId,
        record: AttendanceRecord,
        enrollment_version: u64,
    ) -> EngineResult<AttendanceRecord>;

    /// Looks up a session.
    async fn get_attendance(
        &self,
        org: &OrganizationId,
        id: Uuid,
    ) -> EngineResult<Option<AttendanceRecord>>;

    /// Compare-and-swap on `record.version`.
    async fn update_attendance(
        &self,
        org: &OrganizationId,
        record: AttendanceRecord,
    ) -> EngineResult<AttendanceRecord>;

    /// The enrollment's open session, if any.
    async fn open_attendance_for_enrollment(
        &self,
        org: &OrganizationId,
        enrollment_id: Uuid,
    ) -> EngineResult<Option<AttendanceRecord>>;

    /// Sessions without a check-out.
    async fn count_open_attendance(&self, org: &OrganizationId) -> EngineResult<u64>;

    /// A child's sessions with `attendance_date` in `[start, end]`, ordered
    /// by check-in time.
    async fn attendance_for_child_between(
        &self,
        org: &OrganizationId,
        child_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<AttendanceRecord>>;

    // Payments

    /// Stores a payment. Fails with `Conflict` on a duplicate payment or
    /// receipt number.
    async fn insert_payment(&self, org: &OrganizationId, payment: Payment)
        -> EngineResult<Payment>;

    /// Looks up a payment.
    async fn get_payment(&self, org: &OrganizationId, id: Uuid) -> EngineResult<Option<Payment>>;

    /// Compare-and-swap on `payment.version`.
    async fn update_payment(&self, org: &OrganizationId, payment: Payment)
        -> EngineResult<Payment>;

    /// The payment linked to an attendance session, if any.
    async fn payment_for_attendance(
        &self,
        org: &OrganizationId,
        attendance_id: Uuid,
    ) -> EngineResult<Option<Payment>>;

    /// Payments with `payment_date` in `[start, end]`, optionally filtered by
    /// status.
    async fn payments_between(
        &self,
        org: &OrganizationId,
        start: NaiveDate,
        end: NaiveDate,
        status: Option<PaymentStatus>,
    ) -> EngineResult<Vec<Payment>>;

    /// Payments with the given status, oldest first.
    async fn payments_with_status(
        &self,
        org: &OrganizationId,
        status: PaymentStatus,
    ) -> EngineResult<Vec<Payment>>;

    // Inquiries (read model fed by the CRM)

    /// Inserts or replaces an inquiry's pipeline state.
    async fn record_inquiry(&self, org: &OrganizationId, inquiry: InquiryRecord)
        -> EngineResult<()>;

    /// Returns `(total, enrolled)` inquiry counts.
    async fn inquiry_counts(&self, org: &OrganizationId) -> EngineResult<(u64, u64)>;

    // Notification outbox

    /// Queues `event` under `key`. Returns false when the key was already
    /// queued or delivered.
    async fn enqueue_notification(
        &self,
        org: &OrganizationId,
        key: NotificationKey,
        event: NotificationEvent,
    ) -> EngineResult<bool>;

    /// Queued notifications not yet delivered, oldest first.
    async fn undelivered_notifications(
        &self,
        org: &OrganizationId,
    ) -> EngineResult<Vec<PendingNotification>>;

    /// Marks a queued notification as delivered.
    async fn mark_delivered(&self, org: &OrganizationId, key: NotificationKey)
        -> EngineResult<()>;
}
