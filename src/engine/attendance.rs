//! Attendance ledger.
//!
//! Check-in opens a session, check-out closes and bills it, and manual
//! correction rewrites its times under an audit stamp. Session times are
//! only ever written together with billing recomputed from them.

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::calculation::{ResolvedRates, calculate_session_billing};
use crate::config::EngineSettings;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AttendanceCorrection, AttendanceRecord, Enrollment, OrganizationId, Payment, PaymentCorrection,
    SessionBilling,
};
use crate::store::Store;

use super::enrollment::resolve_enrollment_rates;
use super::payments::PaymentRecorder;

/// A session after it was closed or corrected, with the payment it produced
/// or adjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
    /// The stored session.
    pub record: AttendanceRecord,
    /// The session payment that was created or corrected, if any.
    pub payment: Option<Payment>,
}

pub(crate) fn require_actor(actor: &str) -> EngineResult<()> {
    if actor.trim().is_empty() {
        return Err(EngineError::Validation {
            field: "actor".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Records presence sessions and bills them.
pub struct AttendanceLedger {
    store: Arc<dyn Store>,
    payments: Arc<dyn PaymentRecorder>,
    settings: Arc<EngineSettings>,
}

impl AttendanceLedger {
    /// Creates a ledger over `store` that hands session charges to `payments`.
    pub fn new(
        store: Arc<dyn Store>,
        payments: Arc<dyn PaymentRecorder>,
        settings: Arc<EngineSettings>,
    ) -> Self {
        Self {
            store,
            payments,
            settings,
        }
    }

    /// Opens a session for an active enrollment.
    ///
    /// # Errors
    ///
    /// * `NotFound` for an unknown enrollment or a tombstoned child.
    /// * `Conflict` if the enrollment is not active, has ended, already has
    ///   an open session, or changed status while the check-in was running.
    /// * `Validation` for an empty actor or a time before the enrollment starts.
    pub async fn check_in(
        &self,
        org: &OrganizationId,
        enrollment_id: Uuid,
        time: NaiveDateTime,
        actor: &str,
        notes: Option<String>,
    ) -> EngineResult<AttendanceRecord> {
        require_actor(actor)?;
        let enrollment = self.load_enrollment(org, enrollment_id).await?;
        enrollment.ensure_accepts_attendance(time.date())?;
        self.store
            .get_child(org, enrollment.child_id)
            .await?
            .filter(|c| c.is_active())
            .ok_or_else(|| EngineError::NotFound {
                entity: "child",
                id: enrollment.child_id.to_string(),
            })?;

        let record = AttendanceRecord::open(&enrollment, time, actor, notes);
        let record = self
            .store
            .insert_attendance_if_no_open(org, record, enrollment.version)
            .await?;

        info!(
            organization_id = %org,
            enrollment_id = %enrollment.id,
            attendance_id = %record.id,
            check_in_time = %time,
            actor = %actor,
            "Checked in"
        );
        Ok(record)
    }

    /// Closes an open session, bills it and, when due, creates its payment.
    ///
    /// Sessions only open under an active enrollment, so one still open after
    /// its enrollment was paused or cancelled is closed here like any other.
    /// If the payment cannot be recorded the session is left open.
    ///
    /// # Errors
    ///
    /// * `NotFound` for an unknown session.
    /// * `Conflict` if the session is already closed or a concurrent
    ///   check-out won.
    /// * `Validation` if `time` is not after check-in.
    /// * `Configuration` if no rate source resolves.
    pub async fn check_out(
        &self,
        org: &OrganizationId,
        attendance_id: Uuid,
        time: NaiveDateTime,
        actor: &str,
    ) -> EngineResult<SessionOutcome> {
        require_actor(actor)?;
        let record = self.get(org, attendance_id).await?;
        if let Some(out) = record.check_out_time() {
            return Err(EngineError::Conflict {
                message: format!("attendance record {} was already checked out at {}", record.id, out),
            });
        }
        let enrollment = self.load_enrollment(org, record.enrollment_id).await?;
        self.close(org, record, &enrollment, time, actor).await
    }

    /// Administratively corrects a session.
    ///
    /// When the times change, billing is recomputed from scratch and the
    /// linked session payment is corrected to match. Closing an open session
    /// this way behaves like a check-out. The manual-edit stamp is always
    /// written, even if nothing else changed.
    pub async fn manual_correct(
        &self,
        org: &OrganizationId,
        attendance_id: Uuid,
        correction: AttendanceCorrection,
        actor: &str,
        reason: &str,
        at: NaiveDateTime,
    ) -> EngineResult<SessionOutcome> {
        require_actor(actor)?;
        if reason.trim().is_empty() {
            return Err(EngineError::Validation {
                field: "reason".to_string(),
                message: "a manual correction requires a reason".to_string(),
            });
        }

        let mut record = self.get(org, attendance_id).await?;
        let original = record.clone();
        let was_open = record.is_open();
        let check_in = correction.check_in_time.unwrap_or(record.check_in_time());
        let check_out = correction.check_out_time.or(record.check_out_time());
        let times_changed =
            check_in != record.check_in_time() || check_out != record.check_out_time();

        let mut payable = false;
        if times_changed {
            match check_out {
                Some(out) => {
                    let enrollment = self.load_enrollment(org, record.enrollment_id).await?;
                    let rates = self.rates_for(org, &enrollment).await?;
                    let billing = self.bill(check_in, out, &rates)?;
                    payable = billing.payable_per_session;
                    record.apply_times(check_in, Some(out), Some(billing))?;
                }
                None => record.apply_times(check_in, None, None)?,
            }
        }
        if was_open && !record.is_open() {
            record.checked_out_by = Some(actor.to_string());
        }
        if let Some(notes) = correction.notes {
            record.notes = Some(notes);
        }
        record.stamp_manual_edit(actor, reason, at);
        let record = self.store.update_attendance(org, record).await?;

        let payment = if times_changed && !record.is_open() {
            match self
                .sync_session_payment(org, &record, payable, actor, reason, at)
                .await
            {
                Ok(payment) => payment,
                Err(err) => {
                    self.restore(org, original, &record).await;
                    return Err(err);
                }
            }
        } else {
            None
        };

        info!(
            organization_id = %org,
            attendance_id = %record.id,
            actor = %actor,
            reason = %reason,
            times_changed,
            total_charge = %record.total_charge(),
            "Attendance manually corrected"
        );
        Ok(SessionOutcome { record, payment })
    }

    /// Closes the enrollment's open session, if any, as the system actor.
    ///
    /// Used when an enrollment leaves the active state. The enrollment's
    /// status is not checked and the session is billed like any other. The
    /// session is closed no earlier than one minute after check-in, so a
    /// transition stamped within the first minute, or before check-in,
    /// bills a one-minute session.
    pub async fn force_check_out(
        &self,
        org: &OrganizationId,
        enrollment_id: Uuid,
        at: NaiveDateTime,
    ) -> EngineResult<Option<SessionOutcome>> {
        let Some(record) = self
            .store
            .open_attendance_for_enrollment(org, enrollment_id)
            .await?
        else {
            return Ok(None);
        };
        let enrollment = self.load_enrollment(org, enrollment_id).await?;
        let actor = self.settings.system_actor.clone();
        let closed_at = at.max(record.check_in_time() + Duration::minutes(1));
        let outcome = self
            .close(org, record, &enrollment, closed_at, &actor)
            .await?;

        warn!(
            organization_id = %org,
            enrollment_id = %enrollment_id,
            attendance_id = %outcome.record.id,
            status = %enrollment.status,
            requested_at = %at,
            closed_at = %closed_at,
            "Open session force-closed"
        );
        Ok(Some(outcome))
    }

    /// Looks up a session.
    pub async fn get(
        &self,
        org: &OrganizationId,
        attendance_id: Uuid,
    ) -> EngineResult<AttendanceRecord> {
        self.store
            .get_attendance(org, attendance_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "attendance record",
                id: attendance_id.to_string(),
            })
    }

    /// The enrollment's open session, if the child is on premises.
    pub async fn open_session(
        &self,
        org: &OrganizationId,
        enrollment_id: Uuid,
    ) -> EngineResult<Option<AttendanceRecord>> {
        self.store
            .open_attendance_for_enrollment(org, enrollment_id)
            .await
    }

    async fn close(
        &self,
        org: &OrganizationId,
        mut record: AttendanceRecord,
        enrollment: &Enrollment,
        time: NaiveDateTime,
        actor: &str,
    ) -> EngineResult<SessionOutcome> {
        let rates = self.rates_for(org, enrollment).await?;
        let check_in = record.check_in_time();
        let billing = self.bill(check_in, time, &rates)?;
        let payable = billing.payable_per_session;
        let original = record.clone();

        record.apply_times(check_in, Some(time), Some(billing))?;
        record.checked_out_by = Some(actor.to_string());
        let record = self.store.update_attendance(org, record).await?;

        let payment = if payable {
            match self.payments.record_session_charge(org, &record, time).await {
                Ok(payment) => Some(payment),
                Err(err) => {
                    self.restore(org, original, &record).await;
                    return Err(err);
                }
            }
        } else {
            None
        };

        if let Some(billing) = record.billing() {
            info!(
                organization_id = %org,
                enrollment_id = %enrollment.id,
                attendance_id = %record.id,
                duration_minutes = billing.duration_minutes,
                billing_type = %billing.billing_type,
                charge = %billing.calculated_charge,
                late_pickup_fee = %billing.late_pickup_fee,
                payment_created = payment.is_some(),
                "Checked out"
            );
        }
        Ok(SessionOutcome { record, payment })
    }

    async fn sync_session_payment(
        &self,
        org: &OrganizationId,
        record: &AttendanceRecord,
        payable: bool,
        actor: &str,
        reason: &str,
        at: NaiveDateTime,
    ) -> EngineResult<Option<Payment>> {
        let Some(billing) = record.billing() else {
            return Ok(None);
        };
        match self.store.payment_for_attendance(org, record.id).await? {
            Some(existing) => {
                let correction = PaymentCorrection {
                    amount: Some(billing.calculated_charge),
                    discount: None,
                    late_fee: Some(billing.late_pickup_fee),
                };
                let payment = self
                    .payments
                    .correct_payment(org, existing.id, correction, actor, reason, at)
                    .await?;
                Ok(Some(payment))
            }
            None if payable => {
                let payment = self
                    .payments
                    .record_session_charge(org, record, at)
                    .await?;
                Ok(Some(payment))
            }
            None => Ok(None),
        }
    }

    /// Puts `original` back over `current` after a failed payment write.
    async fn restore(
        &self,
        org: &OrganizationId,
        mut original: AttendanceRecord,
        current: &AttendanceRecord,
    ) {
        original.version = current.version;
        match self.store.update_attendance(org, original).await {
            Ok(_) => warn!(
                organization_id = %org,
                attendance_id = %current.id,
                "Session change rolled back after payment failure"
            ),
            Err(err) => error!(
                organization_id = %org,
                attendance_id = %current.id,
                error = %err,
                "Session could not be rolled back after payment failure"
            ),
        }
    }

    async fn rates_for(
        &self,
        org: &OrganizationId,
        enrollment: &Enrollment,
    ) -> EngineResult<ResolvedRates> {
        resolve_enrollment_rates(
            self.store.as_ref(),
            org,
            enrollment,
            &self.settings.tier_defaults,
        )
        .await
    }

    fn bill(
        &self,
        check_in: NaiveDateTime,
        check_out: NaiveDateTime,
        rates: &ResolvedRates,
    ) -> EngineResult<SessionBilling> {
        calculate_session_billing(
            check_in,
            check_out,
            check_in.date(),
            rates,
            self.settings.operating_hours.closing_time,
            self.settings.payment_policy,
        )
    }

    async fn load_enrollment(
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
}
