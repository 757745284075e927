//! Report shapes produced by the revenue aggregator and the expiry sweeper.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AttendanceRecord;

/// Dashboard counters for one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Children that are not tombstoned.
    pub total_children: u64,
    /// Enrollments with status active.
    pub active_enrollments: u64,
    /// Open attendance records.
    pub checked_in_now: u64,
    /// Completed payment total for today.
    pub today_revenue: Decimal,
    /// Completed payment total from the first of the month through today.
    pub month_to_date_revenue: Decimal,
    /// Payments awaiting collection.
    pub pending_payments: u64,
}

/// Completed payment total over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSummary {
    /// First day counted.
    pub period_start: NaiveDate,
    /// Last day counted.
    pub period_end: NaiveDate,
    /// Sum of `total_amount` over completed payments.
    pub total: Decimal,
    /// Number of completed payments counted.
    pub payment_count: u64,
}

/// Parent-facing monthly statement for one child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceReport {
    /// The child.
    pub child_id: Uuid,
    /// Statement year.
    pub year: i32,
    /// Statement month (1-12).
    pub month: u32,
    /// Distinct days with at least one session.
    pub days_present: u64,
    /// Minutes across closed sessions.
    pub total_minutes: i64,
    /// Hours across closed sessions, to two decimal places.
    pub total_hours: Decimal,
    /// Tier charges plus late fees across closed sessions.
    pub total_charges: Decimal,
    /// Sessions in the month, oldest first.
    pub records: Vec<AttendanceRecord>,
}

/// Share of inquiries that reached enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRate {
    /// All inquiries.
    pub total_inquiries: u64,
    /// Inquiries with status enrolled.
    pub enrolled_inquiries: u64,
    /// `enrolled / total` to four decimal places, zero without inquiries.
    pub rate: Decimal,
}

/// Amount still owed by one child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutstandingBalance {
    /// The child.
    pub child_id: Uuid,
    /// Sum of pending payment totals.
    pub pending_total: Decimal,
    /// Number of pending payments.
    pub pending_count: u64,
}

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Enrollments found in the look-ahead window.
    pub expiring_count: u64,
    /// Enrollments transitioned to expired.
    pub expired_count: u64,
    /// Notifications handed to the sink.
    pub notifications_emitted: u64,
    /// Items that failed and were skipped.
    pub failures: u64,
}

impl SweepReport {
    /// Adds another report's counters into this one.
    pub fn absorb(&mut self, other: &SweepReport) {
        self.expiring_count += other.expiring_count;
        self.expired_count += other.expired_count;
        self.notifications_emitted += other.notifications_emitted;
        self.failures += other.failures;
    }
}
