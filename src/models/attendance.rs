//! Attendance records.
//!
//! An [`AttendanceRecord`] is one physical presence session. Its times and
//! its derived billing are private and only change together through
//! [`AttendanceRecord::apply_times`], which refuses billing that does not
//! match the times it is stored with.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

use super::{AuditStep, Enrollment, OrganizationId, RateSource};

/// The billing bracket a session falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BillingType {
    /// Billed per started hour.
    Hourly,
    /// Flat half-day charge.
    HalfDay,
    /// Flat full-day charge.
    FullDay,
}

impl fmt::Display for BillingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BillingType::Hourly => "hourly",
            BillingType::HalfDay => "half-day",
            BillingType::FullDay => "full-day",
        };
        f.write_str(s)
    }
}

/// Billing derived from a closed session's times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBilling {
    /// Minutes between check-in and check-out.
    pub duration_minutes: i64,
    /// Tier the session fell into.
    pub billing_type: BillingType,
    /// Tier charge.
    pub calculated_charge: Decimal,
    /// Late pickup fee, zero when picked up on time.
    pub late_pickup_fee: Decimal,
    /// Where the tiers came from.
    pub rate_source: RateSource,
    /// Whether a per-session payment is due for this charge.
    pub payable_per_session: bool,
    /// How the charge was derived.
    pub audit_trace: Vec<AuditStep>,
}

/// Fields an administrator may change on a session.
///
/// Unset fields keep their stored value. A closed session cannot be reopened,
/// so leaving `check_out_time` unset never clears a check-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceCorrection {
    /// Corrected arrival time.
    #[serde(default)]
    pub check_in_time: Option<NaiveDateTime>,
    /// Corrected departure time.
    #[serde(default)]
    pub check_out_time: Option<NaiveDateTime>,
    /// Replacement notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// One presence session of a child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Internal identifier.
    pub id: Uuid,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Enrollment the session is billed under.
    pub enrollment_id: Uuid,
    /// The child who attended.
    pub child_id: Uuid,
    /// Calendar day of the check-in.
    pub attendance_date: NaiveDate,
    check_in_time: NaiveDateTime,
    check_out_time: Option<NaiveDateTime>,
    billing: Option<SessionBilling>,
    /// Who checked the child in.
    pub checked_in_by: String,
    /// Who checked the child out.
    pub checked_out_by: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Set once an administrator has corrected the record.
    pub is_manual_edit: bool,
    /// Who made the last manual correction.
    pub edited_by: Option<String>,
    /// Why the last manual correction was made.
    pub edit_reason: Option<String>,
    /// When the last manual correction was made.
    pub edited_at: Option<NaiveDateTime>,
    /// Optimistic concurrency version, bumped by the store on every write.
    pub version: u64,
}

impl AttendanceRecord {
    /// Opens a session for `enrollment` at `check_in_time`.
    pub fn open(
        enrollment: &Enrollment,
        check_in_time: NaiveDateTime,
        actor: impl Into<String>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: enrollment.organization_id.clone(),
            enrollment_id: enrollment.id,
            child_id: enrollment.child_id,
            attendance_date: check_in_time.date(),
            check_in_time,
            check_out_time: None,
            billing: None,
            checked_in_by: actor.into(),
            checked_out_by: None,
            notes,
            is_manual_edit: false,
            edited_by: None,
            edit_reason: None,
            edited_at: None,
            version: 0,
        }
    }

    /// When the child arrived.
    pub fn check_in_time(&self) -> NaiveDateTime {
        self.check_in_time
    }

    /// When the child left, if they have.
    pub fn check_out_time(&self) -> Option<NaiveDateTime> {
        self.check_out_time
    }

    /// Derived billing; present exactly when the session is closed.
    pub fn billing(&self) -> Option<&SessionBilling> {
        self.billing.as_ref()
    }

    /// True while the child is on premises.
    pub fn is_open(&self) -> bool {
        self.check_out_time.is_none()
    }

    /// Tier charge plus late fee, zero while open.
    pub fn total_charge(&self) -> Decimal {
        self.billing
            .as_ref()
            .map(|b| b.calculated_charge + b.late_pickup_fee)
            .unwrap_or(Decimal::ZERO)
    }

    /// Replaces the times and billing as one unit.
    ///
    /// The billing must be present exactly when a check-out is, and its
    /// duration must match the new times.
    pub(crate) fn apply_times(
        &mut self,
        check_in_time: NaiveDateTime,
        check_out_time: Option<NaiveDateTime>,
        billing: Option<SessionBilling>,
    ) -> EngineResult<()> {
        match (check_out_time, &billing) {
            (None, None) => {}
            (Some(out), Some(b)) => {
                if out <= check_in_time {
                    return Err(EngineError::Validation {
                        field: "check_out_time".to_string(),
                        message: "must be after check_in_time".to_string(),
                    });
                }
                if (out - check_in_time).num_minutes() != b.duration_minutes {
                    return Err(EngineError::Validation {
                        field: "billing".to_string(),
                        message: "duration does not match session times".to_string(),
                    });
                }
            }
            _ => {
                return Err(EngineError::Validation {
                    field: "billing".to_string(),
                    message: "billing must be present exactly when checked out".to_string(),
                });
            }
        }

        self.check_in_time = check_in_time;
        self.attendance_date = check_in_time.date();
        self.check_out_time = check_out_time;
        self.billing = billing;
        Ok(())
    }

    /// Records an administrative correction.
    pub(crate) fn stamp_manual_edit(&mut self, actor: &str, reason: &str, at: NaiveDateTime) {
        self.is_manual_edit = true;
        self.edited_by = Some(actor.to_string());
        self.edit_reason = Some(reason.to_string());
        self.edited_at = Some(at);
    }
}
