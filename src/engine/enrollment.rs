//! Enrollment lifecycle.
//!
//! Owns children, enrollments and rate schedules: creation, the status state
//! machine, and rate source resolution.
//!
//! ```text
//! active ──pause──▶ paused ──resume──▶ active
//! active ──cancel─▶ cancelled ◀─cancel── paused
//! active ──expire─▶ expired
//! ```
//!
//! When an enrollment leaves `active` its open session, if any, is closed
//! as the system actor at the transition time.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::calculation::{ResolvedRates, resolve_rates};
use crate::config::{EngineSettings, TierDefaults};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Child, Enrollment, EnrollmentStatus, EnrollmentTerms, NewChild, NewEnrollment,
    NewRateSchedule, OrganizationId, RateSchedule,
};
use crate::store::Store;

use super::attendance::AttendanceLedger;
use super::identifiers::next_identifier;

/// Resolves the tiers for `enrollment` against the store.
pub(crate) async fn resolve_enrollment_rates(
    store: &dyn Store,
    org: &OrganizationId,
    enrollment: &Enrollment,
    defaults: &TierDefaults,
) -> EngineResult<ResolvedRates> {
    let assigned = match (enrollment.custom_rates.is_some(), enrollment.rate_schedule_id) {
        (false, Some(id)) => store.get_schedule(org, id).await?,
        _ => None,
    };
    let organization_default = if enrollment.custom_rates.is_none() && assigned.is_none() {
        store.active_schedule(org).await?
    } else {
        None
    };
    resolve_rates(
        enrollment,
        assigned.as_ref(),
        organization_default.as_ref(),
        defaults,
        1,
    )
}

fn require_reason(reason: &str, action: &str) -> EngineResult<()> {
    if reason.trim().is_empty() {
        return Err(EngineError::Validation {
            field: "reason".to_string(),
            message: format!("{} requires a reason", action),
        });
    }
    Ok(())
}

/// A child created together with its first enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrolled {
    /// The new child.
    pub child: Child,
    /// The child's first enrollment.
    pub enrollment: Enrollment,
}

/// Manages children, enrollments and rate schedules.
pub struct EnrollmentLifecycle {
    store: Arc<dyn Store>,
    ledger: Arc<AttendanceLedger>,
    settings: Arc<EngineSettings>,
}

impl EnrollmentLifecycle {
    /// Creates a lifecycle manager; `ledger` closes sessions on deactivation.
    pub fn new(
        store: Arc<dyn Store>,
        ledger: Arc<AttendanceLedger>,
        settings: Arc<EngineSettings>,
    ) -> Self {
        Self {
            store,
            ledger,
            settings,
        }
    }

    // =========================================================================
    // Children
    // =========================================================================

    /// Registers a child under a fresh child code.
    pub async fn create_child(
        &self,
        org: &OrganizationId,
        intake: NewChild,
        at: NaiveDateTime,
    ) -> EngineResult<Child> {
        intake.validate()?;
        let ids = &self.settings.identifiers;
        let code = next_identifier(
            self.store.as_ref(),
            org,
            &ids.child_prefix,
            at.date(),
            ids.sequence_width,
        )
        .await?;
        let child = self
            .store
            .insert_child(org, Child::new(org.clone(), code, intake, at))
            .await?;

        info!(
            organization_id = %org,
            child_id = %child.id,
            child_code = %child.child_code,
            "Child created"
        );
        Ok(child)
    }

    /// Looks up a live child.
    pub async fn get_child(&self, org: &OrganizationId, child_id: Uuid) -> EngineResult<Child> {
        self.store
            .get_child(org, child_id)
            .await?
            .filter(|c| c.is_active())
            .ok_or_else(|| EngineError::NotFound {
                entity: "child",
                id: child_id.to_string(),
            })
    }

    /// Soft-deletes a child. The child must not hold a live enrollment.
    pub async fn tombstone_child(
        &self,
        org: &OrganizationId,
        child_id: Uuid,
        at: NaiveDateTime,
    ) -> EngineResult<Child> {
        let mut child = self
            .store
            .get_child(org, child_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "child",
                id: child_id.to_string(),
            })?;
        if let Some(live) = self.store.live_enrollment_for_child(org, child_id).await? {
            return Err(EngineError::Conflict {
                message: format!(
                    "child {} still has {} enrollment {}",
                    child.child_code, live.status, live.enrollment_number
                ),
            });
        }
        child.tombstone(at)?;
        let child = self.store.update_child(org, child).await?;

        info!(organization_id = %org, child_id = %child.id, "Child tombstoned");
        Ok(child)
    }

    // =========================================================================
    // Enrollments
    // =========================================================================

    /// Enrolls an existing child.
    ///
    /// # Errors
    ///
    /// * `Validation` for bad dates or negative custom rates.
    /// * `NotFound` for an unknown or tombstoned child, or an unknown
    ///   assigned schedule.
    /// * `Conflict` if the child already has an active or paused enrollment.
    pub async fn create_enrollment(
        &self,
        org: &OrganizationId,
        input: NewEnrollment,
        at: NaiveDateTime,
    ) -> EngineResult<Enrollment> {
        input.validate()?;
        self.get_child(org, input.child_id).await?;
        self.check_assigned_schedule(org, input.rate_schedule_id)
            .await?;
        self.insert_enrollment(org, input, at).await
    }

    /// Creates a child and its first enrollment.
    ///
    /// The terms are checked before the child is written, so a rejected
    /// enrollment never leaves an orphan child behind.
    pub async fn enroll(
        &self,
        org: &OrganizationId,
        intake: NewChild,
        terms: EnrollmentTerms,
        at: NaiveDateTime,
    ) -> EngineResult<Enrolled> {
        intake.validate()?;
        // Validate against a placeholder child id; the real one is bound below.
        terms.clone().for_child(Uuid::nil()).validate()?;
        self.check_assigned_schedule(org, terms.rate_schedule_id)
            .await?;

        let child = self.create_child(org, intake, at).await?;
        let enrollment = self
            .insert_enrollment(org, terms.for_child(child.id), at)
            .await?;
        Ok(Enrolled { child, enrollment })
    }

    /// Looks up an enrollment.
    pub async fn get_enrollment(
        &self,
        org: &OrganizationId,
        enrollment_id: Uuid,
    ) -> EngineResult<Enrollment> {
        self.store
            .get_enrollment(org, enrollment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "enrollment",
                id: enrollment_id.to_string(),
            })
    }

    /// Pauses an active enrollment.
    pub async fn pause(
        &self,
        org: &OrganizationId,
        enrollment_id: Uuid,
        reason: &str,
        at: NaiveDateTime,
    ) -> EngineResult<Enrollment> {
        require_reason(reason, "pausing an enrollment")?;
        let reason = reason.to_string();
        self.transition(org, enrollment_id, EnrollmentStatus::Paused, at, |e| {
            e.pause_reason = Some(reason);
        })
        .await
    }

    /// Resumes a paused enrollment.
    pub async fn resume(
        &self,
        org: &OrganizationId,
        enrollment_id: Uuid,
        at: NaiveDateTime,
    ) -> EngineResult<Enrollment> {
        self.transition(org, enrollment_id, EnrollmentStatus::Active, at, |e| {
            e.pause_reason = None;
        })
        .await
    }

    /// Cancels an active or paused enrollment. Sets the end date to the
    /// cancellation day when none was set.
    pub async fn cancel(
        &self,
        org: &OrganizationId,
        enrollment_id: Uuid,
        reason: &str,
        at: NaiveDateTime,
    ) -> EngineResult<Enrollment> {
        require_reason(reason, "cancelling an enrollment")?;
        let reason = reason.to_string();
        self.transition(org, enrollment_id, EnrollmentStatus::Cancelled, at, |e| {
            e.cancellation_reason = Some(reason);
            if e.end_date.is_none() {
                e.end_date = Some(at.date());
            }
        })
        .await
    }

    /// Expires an active enrollment whose end date has been reached.
    pub async fn expire(
        &self,
        org: &OrganizationId,
        enrollment_id: Uuid,
        at: NaiveDateTime,
    ) -> EngineResult<Enrollment> {
        let enrollment = self.get_enrollment(org, enrollment_id).await?;
        if !enrollment.has_lapsed(at.date()) {
            return Err(EngineError::Conflict {
                message: format!(
                    "enrollment {} has not reached its end date",
                    enrollment.enrollment_number
                ),
            });
        }
        self.apply_transition(org, enrollment, EnrollmentStatus::Expired, at, |_| {})
            .await
    }

    /// Resolves the tiers an enrollment is billed under right now.
    pub async fn resolve_rates(
        &self,
        org: &OrganizationId,
        enrollment_id: Uuid,
    ) -> EngineResult<ResolvedRates> {
        let enrollment = self.get_enrollment(org, enrollment_id).await?;
        resolve_enrollment_rates(
            self.store.as_ref(),
            org,
            &enrollment,
            &self.settings.tier_defaults,
        )
        .await
    }

    // =========================================================================
    // Rate schedules
    // =========================================================================

    /// Creates an inactive schedule.
    pub async fn create_schedule(
        &self,
        org: &OrganizationId,
        input: NewRateSchedule,
        at: NaiveDateTime,
    ) -> EngineResult<RateSchedule> {
        let schedule = RateSchedule::new(org.clone(), input, at)?;
        let schedule = self.store.insert_schedule(org, schedule).await?;

        info!(
            organization_id = %org,
            schedule_id = %schedule.id,
            name = %schedule.name,
            "Rate schedule created"
        );
        Ok(schedule)
    }

    /// Makes `schedule_id` the organization's only active schedule.
    pub async fn activate_schedule(
        &self,
        org: &OrganizationId,
        schedule_id: Uuid,
    ) -> EngineResult<RateSchedule> {
        let schedule = self
            .store
            .activate_schedule_exclusive(org, schedule_id)
            .await?;

        info!(
            organization_id = %org,
            schedule_id = %schedule.id,
            name = %schedule.name,
            "Rate schedule activated"
        );
        Ok(schedule)
    }

    /// All schedules of the organization, oldest first.
    pub async fn list_schedules(&self, org: &OrganizationId) -> EngineResult<Vec<RateSchedule>> {
        self.store.list_schedules(org).await
    }

    async fn insert_enrollment(
        &self,
        org: &OrganizationId,
        input: NewEnrollment,
        at: NaiveDateTime,
    ) -> EngineResult<Enrollment> {
        let ids = &self.settings.identifiers;
        let number = next_identifier(
            self.store.as_ref(),
            org,
            &ids.enrollment_prefix,
            at.date(),
            ids.sequence_width,
        )
        .await?;
        let enrollment = self
            .store
            .insert_enrollment_exclusive(org, Enrollment::new(org.clone(), number, input, at))
            .await?;

        info!(
            organization_id = %org,
            enrollment_id = %enrollment.id,
            enrollment_number = %enrollment.enrollment_number,
            child_id = %enrollment.child_id,
            "Enrollment created"
        );
        Ok(enrollment)
    }

    async fn check_assigned_schedule(
        &self,
        org: &OrganizationId,
        schedule_id: Option<Uuid>,
    ) -> EngineResult<()> {
        if let Some(id) = schedule_id {
            if self.store.get_schedule(org, id).await?.is_none() {
                return Err(EngineError::NotFound {
                    entity: "rate schedule",
                    id: id.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn transition<F>(
        &self,
        org: &OrganizationId,
        enrollment_id: Uuid,
        next: EnrollmentStatus,
        at: NaiveDateTime,
        update: F,
    ) -> EngineResult<Enrollment>
    where
        F: FnOnce(&mut Enrollment) + Send,
    {
        let enrollment = self.get_enrollment(org, enrollment_id).await?;
        self.apply_transition(org, enrollment, next, at, update).await
    }

    async fn apply_transition<F>(
        &self,
        org: &OrganizationId,
        mut enrollment: Enrollment,
        next: EnrollmentStatus,
        at: NaiveDateTime,
        update: F,
    ) -> EngineResult<Enrollment>
    where
        F: FnOnce(&mut Enrollment) + Send,
    {
        let previous = enrollment.status;
        enrollment.transition_to(next, at)?;
        update(&mut enrollment);
        let enrollment = self.store.update_enrollment(org, enrollment).await?;

        info!(
            organization_id = %org,
            enrollment_id = %enrollment.id,
            from = %previous,
            to = %enrollment.status,
            "Enrollment transitioned"
        );

        if previous == EnrollmentStatus::Active {
            if let Err(err) = self.ledger.force_check_out(org, enrollment.id, at).await {
                warn!(
                    organization_id = %org,
                    enrollment_id = %enrollment.id,
                    error = %err,
                    "Failed to close open session after enrollment left active; it can be checked out directly"
                );
            }
        }
        Ok(enrollment)
    }
}
