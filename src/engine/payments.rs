//! Payment recording.
//!
//! [`PaymentRecorder`] is the seam between attendance billing and money
//! collection. [`StorePaymentRecorder`] writes payments straight into the
//! engine's [`Store`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::config::IdentifierConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AttendanceRecord, NewPayment, OrganizationId, Payment, PaymentCorrection, PaymentPurpose,
    PaymentStatus,
};
use crate::store::Store;

use super::identifiers::next_identifier;

/// Creates and settles payments.
#[async_trait]
pub trait PaymentRecorder: Send + Sync {
    /// Creates the pending payment for a closed, billed session.
    async fn record_session_charge(
        &self,
        org: &OrganizationId,
        record: &AttendanceRecord,
        at: NaiveDateTime,
    ) -> EngineResult<Payment>;

    /// Records an ad hoc payment such as a registration fee.
    async fn record_payment(
        &self,
        org: &OrganizationId,
        input: NewPayment,
        at: NaiveDateTime,
    ) -> EngineResult<Payment>;

    /// Moves a pending payment to completed or failed.
    async fn settle_payment(
        &self,
        org: &OrganizationId,
        payment_id: Uuid,
        outcome: PaymentStatus,
        at: NaiveDateTime,
    ) -> EngineResult<Payment>;

    /// Rewrites a payment's amounts under an administrative correction.
    async fn correct_payment(
        &self,
        org: &OrganizationId,
        payment_id: Uuid,
        correction: PaymentCorrection,
        actor: &str,
        reason: &str,
        at: NaiveDateTime,
    ) -> EngineResult<Payment>;

    /// Looks up a payment.
    async fn get_payment(&self, org: &OrganizationId, payment_id: Uuid) -> EngineResult<Payment>;
}

/// [`PaymentRecorder`] that writes to the engine's store.
pub struct StorePaymentRecorder {
    store: Arc<dyn Store>,
    identifiers: IdentifierConfig,
}

impl StorePaymentRecorder {
    /// Creates a recorder numbering payments with `identifiers`.
    pub fn new(store: Arc<dyn Store>, identifiers: IdentifierConfig) -> Self {
        Self { store, identifiers }
    }

    async fn insert(
        &self,
        org: &OrganizationId,
        input: NewPayment,
        at: NaiveDateTime,
    ) -> EngineResult<Payment> {
        let date = at.date();
        let width = self.identifiers.sequence_width;
        let payment_number = next_identifier(
            self.store.as_ref(),
            org,
            &self.identifiers.payment_prefix,
            date,
            width,
        )
        .await?;
        let receipt_number = next_identifier(
            self.store.as_ref(),
            org,
            &self.identifiers.receipt_prefix,
            date,
            width,
        )
        .await?;

        let payment = Payment::new(org.clone(), payment_number, receipt_number, input, at)?;
        let payment = self.store.insert_payment(org, payment).await?;

        info!(
            organization_id = %org,
            payment_id = %payment.id,
            payment_number = %payment.payment_number,
            child_id = %payment.child_id,
            purpose = ?payment.purpose,
            total_amount = %payment.total_amount,
            status = %payment.status,
            "Payment recorded"
        );
        Ok(payment)
    }
}

#[async_trait]
impl PaymentRecorder for StorePaymentRecorder {
    async fn record_session_charge(
        &self,
        org: &OrganizationId,
        record: &AttendanceRecord,
        at: NaiveDateTime,
    ) -> EngineResult<Payment> {
        let billing = record.billing().ok_or_else(|| EngineError::Validation {
            field: "attendance_id".to_string(),
            message: format!("attendance record {} has not been billed", record.id),
        })?;
        let payment_date = record
            .check_out_time()
            .map(|t| t.date())
            .unwrap_or(record.attendance_date);

        let input = NewPayment {
            child_id: record.child_id,
            enrollment_id: Some(record.enrollment_id),
            attendance_id: Some(record.id),
            purpose: PaymentPurpose::SessionCharge,
            amount: billing.calculated_charge,
            discount: Decimal::ZERO,
            late_fee: billing.late_pickup_fee,
            payment_date,
            status: PaymentStatus::Pending,
            description: Some(format!(
                "{} session on {}",
                billing.billing_type, record.attendance_date
            )),
        };
        self.insert(org, input, at).await
    }

    async fn record_payment(
        &self,
        org: &OrganizationId,
        input: NewPayment,
        at: NaiveDateTime,
    ) -> EngineResult<Payment> {
        let child = self
            .store
            .get_child(org, input.child_id)
            .await?
            .filter(|c| c.is_active())
            .ok_or_else(|| EngineError::NotFound {
                entity: "child",
                id: input.child_id.to_string(),
            })?;
        if let Some(enrollment_id) = input.enrollment_id {
            let enrollment = self
                .store
                .get_enrollment(org, enrollment_id)
                .await?
                .ok_or_else(|| EngineError::NotFound {
                    entity: "enrollment",
                    id: enrollment_id.to_string(),
                })?;
            if enrollment.child_id != child.id {
                return Err(EngineError::Validation {
                    field: "enrollment_id".to_string(),
                    message: format!(
                        "enrollment {} does not belong to child {}",
                        enrollment.enrollment_number, child.child_code
                    ),
                });
            }
        }
        self.insert(org, input, at).await
    }

    async fn settle_payment(
        &self,
        org: &OrganizationId,
        payment_id: Uuid,
        outcome: PaymentStatus,
        at: NaiveDateTime,
    ) -> EngineResult<Payment> {
        let mut payment = self.get_payment(org, payment_id).await?;
        payment.settle(outcome, at.date(), at)?;
        let payment = self.store.update_payment(org, payment).await?;

        info!(
            organization_id = %org,
            payment_id = %payment.id,
            status = %payment.status,
            "Payment settled"
        );
        Ok(payment)
    }

    async fn correct_payment(
        &self,
        org: &OrganizationId,
        payment_id: Uuid,
        correction: PaymentCorrection,
        actor: &str,
        reason: &str,
        at: NaiveDateTime,
    ) -> EngineResult<Payment> {
        let mut payment = self.get_payment(org, payment_id).await?;
        let previous_total = payment.total_amount;
        payment.apply_correction(&correction, actor, reason, at)?;
        let payment = self.store.update_payment(org, payment).await?;

        info!(
            organization_id = %org,
            payment_id = %payment.id,
            actor = %actor,
            reason = %reason,
            previous_total = %previous_total,
            total_amount = %payment.total_amount,
            "Payment corrected"
        );
        Ok(payment)
    }

    async fn get_payment(&self, org: &OrganizationId, payment_id: Uuid) -> EngineResult<Payment> {
        self.store
            .get_payment(org, payment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "payment",
                id: payment_id.to_string(),
            })
    }
}
