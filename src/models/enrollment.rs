//! Enrollment model and its status state machine.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

use super::OrganizationId;

/// Status of an enrollment contract.
///
/// ```text
/// active ──pause──▶ paused ──resume──▶ active
///   │                  │
///   ├──cancel──▶ cancelled ◀──cancel──┘
///   └──expire──▶ expired
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    /// Eligible for metered attendance.
    Active,
    /// Temporarily suspended; no attendance.
    Paused,
    /// Terminated by the organization or guardian.
    Cancelled,
    /// Contract period ran out.
    Expired,
}

impl EnrollmentStatus {
    /// Cancelled and expired enrollments never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EnrollmentStatus::Cancelled | EnrollmentStatus::Expired)
    }

    /// Active and paused enrollments occupy the child's single enrollment slot.
    pub fn holds_slot(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: EnrollmentStatus) -> bool {
        use EnrollmentStatus::*;
        matches!(
            (self, next),
            (Active, Paused) | (Paused, Active) | (Active, Cancelled) | (Paused, Cancelled) | (Active, Expired)
        )
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Paused => "paused",
            EnrollmentStatus::Cancelled => "cancelled",
            EnrollmentStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Per-enrollment pricing that replaces the organization's schedules.
///
/// All three tier rates are required. Thresholds left unset fall back to
/// the engine's configured tier defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRateOverride {
    /// Charge per started hour.
    pub hourly_rate: Decimal,
    /// Flat half-day charge.
    pub half_day_rate: Decimal,
    /// Flat full-day charge.
    pub full_day_rate: Decimal,
    /// Monthly subscription price; when set the enrollment bills monthly.
    #[serde(default)]
    pub monthly_rate: Option<Decimal>,
    /// Half-day threshold override.
    #[serde(default)]
    pub half_day_hours: Option<Decimal>,
    /// Full-day threshold override.
    #[serde(default)]
    pub full_day_hours: Option<Decimal>,
    /// Hourly rounding floor override.
    #[serde(default)]
    pub min_chargeable_minutes: Option<u32>,
}

/// Input for creating an enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEnrollment {
    /// The child being enrolled.
    pub child_id: Uuid,
    /// First day of the contract.
    pub start_date: NaiveDate,
    /// Day the contract ends; attendance is accepted strictly before it.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Assigned schedule, if not the organization default.
    #[serde(default)]
    pub rate_schedule_id: Option<Uuid>,
    /// Custom pricing that takes precedence over any schedule.
    #[serde(default)]
    pub custom_rates: Option<CustomRateOverride>,
}

impl NewEnrollment {
    /// Checks dates and custom rates.
    pub fn validate(&self) -> EngineResult<()> {
        if self.end_date.is_some_and(|end| end <= self.start_date) {
            return Err(EngineError::Validation {
                field: "end_date".to_string(),
                message: format!("must be after start_date {}", self.start_date),
            });
        }
        if let Some(custom) = &self.custom_rates {
            let rates = [
                ("custom_rates.hourly_rate", Some(custom.hourly_rate)),
                ("custom_rates.half_day_rate", Some(custom.half_day_rate)),
                ("custom_rates.full_day_rate", Some(custom.full_day_rate)),
                ("custom_rates.monthly_rate", custom.monthly_rate),
            ];
            for (field, rate) in rates {
                if rate.is_some_and(|r| r < Decimal::ZERO) {
                    return Err(EngineError::Validation {
                        field: field.to_string(),
                        message: "must not be negative".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Enrollment terms for a child that does not exist yet.
///
/// Used when an intake creates the child and its first enrollment together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentTerms {
    /// First day of the contract.
    pub start_date: NaiveDate,
    /// Day the contract ends.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Assigned schedule.
    #[serde(default)]
    pub rate_schedule_id: Option<Uuid>,
    /// Custom pricing.
    #[serde(default)]
    pub custom_rates: Option<CustomRateOverride>,
}

impl EnrollmentTerms {
    /// Binds the terms to a child.
    pub fn for_child(self, child_id: Uuid) -> NewEnrollment {
        NewEnrollment {
            child_id,
            start_date: self.start_date,
            end_date: self.end_date,
            rate_schedule_id: self.rate_schedule_id,
            custom_rates: self.custom_rates,
        }
    }
}

/// A contract period during which a child is eligible for metered attendance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    /// Internal identifier.
    pub id: Uuid,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// The enrolled child.
    pub child_id: Uuid,
    /// Human-readable number (e.g., "ENR20260001").
    pub enrollment_number: String,
    /// First day of the contract.
    pub start_date: NaiveDate,
    /// End of the contract, exclusive.
    pub end_date: Option<NaiveDate>,
    /// Assigned schedule.
    pub rate_schedule_id: Option<Uuid>,
    /// Custom pricing.
    pub custom_rates: Option<CustomRateOverride>,
    /// Current status.
    pub status: EnrollmentStatus,
    /// Why the enrollment was last paused.
    pub pause_reason: Option<String>,
    /// Why the enrollment was cancelled.
    pub cancellation_reason: Option<String>,
    /// When the enrollment was created.
    pub created_at: NaiveDateTime,
    /// When the enrollment last changed.
    pub updated_at: NaiveDateTime,
    /// Optimistic concurrency version, bumped by the store on every write.
    pub version: u64,
}

impl Enrollment {
    /// Builds an active enrollment from validated input.
    pub fn new(
        organization_id: OrganizationId,
        enrollment_number: String,
        input: NewEnrollment,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            child_id: input.child_id,
            enrollment_number,
            start_date: input.start_date,
            end_date: input.end_date,
            rate_schedule_id: input.rate_schedule_id,
            custom_rates: input.custom_rates,
            status: EnrollmentStatus::Active,
            pause_reason: None,
            cancellation_reason: None,
            created_at,
            updated_at: created_at,
            version: 0,
        }
    }

    /// Moves to `next`, rejecting transitions the state machine forbids.
    pub fn transition_to(&mut self, next: EnrollmentStatus, at: NaiveDateTime) -> EngineResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::Conflict {
                message: format!(
                    "enrollment {} cannot move from {} to {}",
                    self.enrollment_number, self.status, next
                ),
            });
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    /// Returns true once the contract end date has been reached.
    pub fn has_lapsed(&self, today: NaiveDate) -> bool {
        self.end_date.is_some_and(|end| end <= today)
    }

    /// Verifies a session may start on `date`.
    ///
    /// Only active enrollments accept attendance, and only inside the
    /// contract period. A lapsed enrollment the sweeper has not reached yet
    /// is treated as expired.
    pub fn ensure_accepts_attendance(&self, date: NaiveDate) -> EngineResult<()> {
        if self.status != EnrollmentStatus::Active {
            return Err(EngineError::Conflict {
                message: format!(
                    "enrollment {} is {}, attendance requires an active enrollment",
                    self.enrollment_number, self.status
                ),
            });
        }
        if self.has_lapsed(date) {
            return Err(EngineError::Conflict {
                message: format!(
                    "enrollment {} ended on {}",
                    self.enrollment_number,
                    self.end_date.map(|d| d.to_string()).unwrap_or_default()
                ),
            });
        }
        if date < self.start_date {
            return Err(EngineError::Validation {
                field: "time".to_string(),
                message: format!(
                    "enrollment {} starts on {}",
                    self.enrollment_number, self.start_date
                ),
            });
        }
        Ok(())
    }
}
