//! Payment model.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

use super::OrganizationId;

/// Settlement status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting collection.
    Pending,
    /// Collected; counts toward revenue.
    Completed,
    /// Collection failed.
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a payment is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    /// Charge for a single attendance session.
    SessionCharge,
    /// Monthly subscription fee.
    MonthlyFee,
    /// One-time registration fee.
    RegistrationFee,
    /// Refundable security deposit.
    SecurityDeposit,
    /// Anything else collected ad hoc.
    Other,
}

/// Input for recording a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    /// The child the payment is for.
    pub child_id: Uuid,
    /// Related enrollment.
    #[serde(default)]
    pub enrollment_id: Option<Uuid>,
    /// Related attendance session.
    #[serde(default)]
    pub attendance_id: Option<Uuid>,
    /// What the payment is for.
    pub purpose: PaymentPurpose,
    /// Gross amount before discount and late fee.
    pub amount: Decimal,
    /// Discount subtracted from the amount.
    #[serde(default)]
    pub discount: Decimal,
    /// Late fee added to the amount.
    #[serde(default)]
    pub late_fee: Decimal,
    /// Business date of the payment.
    pub payment_date: NaiveDate,
    /// Initial status; ad hoc collections are usually completed on the spot.
    #[serde(default = "default_status")]
    pub status: PaymentStatus,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

fn default_status() -> PaymentStatus {
    PaymentStatus::Pending
}

/// Amount fields an administrative correction may rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentCorrection {
    /// New gross amount.
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// New discount.
    #[serde(default)]
    pub discount: Option<Decimal>,
    /// New late fee.
    #[serde(default)]
    pub late_fee: Option<Decimal>,
}

/// A monetary transaction against a child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Internal identifier.
    pub id: Uuid,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// The child the payment is for.
    pub child_id: Uuid,
    /// Related enrollment.
    pub enrollment_id: Option<Uuid>,
    /// Related attendance session.
    pub attendance_id: Option<Uuid>,
    /// Human-readable payment number (e.g., "PAY20260001").
    pub payment_number: String,
    /// Unique receipt number (e.g., "RCP20260001").
    pub receipt_number: String,
    /// What the payment is for.
    pub purpose: PaymentPurpose,
    /// Gross amount.
    pub amount: Decimal,
    /// Discount.
    pub discount: Decimal,
    /// Late fee.
    pub late_fee: Decimal,
    /// `amount - discount + late_fee`.
    pub total_amount: Decimal,
    /// Business date of the payment.
    pub payment_date: NaiveDate,
    /// Settlement status.
    pub status: PaymentStatus,
    /// Free-form description.
    pub description: Option<String>,
    /// Who last corrected the payment administratively.
    pub corrected_by: Option<String>,
    /// Why the payment was last corrected.
    pub correction_reason: Option<String>,
    /// When the payment was created.
    pub created_at: NaiveDateTime,
    /// When the payment last changed.
    pub updated_at: NaiveDateTime,
    /// Optimistic concurrency version, bumped by the store on every write.
    pub version: u64,
}

/// Computes `amount - discount + late_fee`, rejecting negative inputs or totals.
///
/// # Example
///
/// ```
/// use daycare_billing::models::payment_total;
/// use rust_decimal::Decimal;
///
/// let total = payment_total(Decimal::from(600), Decimal::from(50), Decimal::from(150)).unwrap();
/// assert_eq!(total, Decimal::from(700));
/// ```
pub fn payment_total(amount: Decimal, discount: Decimal, late_fee: Decimal) -> EngineResult<Decimal> {
    for (field, value) in [("amount", amount), ("discount", discount), ("late_fee", late_fee)] {
        if value < Decimal::ZERO {
            return Err(EngineError::Validation {
                field: field.to_string(),
                message: "must not be negative".to_string(),
            });
        }
    }
    let total = amount - discount + late_fee;
    if total < Decimal::ZERO {
        return Err(EngineError::Validation {
            field: "discount".to_string(),
            message: format!("discount {} exceeds amount plus late fee", discount),
        });
    }
    Ok(total)
}

impl Payment {
    /// Builds a payment with its generated numbers.
    pub fn new(
        organization_id: OrganizationId,
        payment_number: String,
        receipt_number: String,
        input: NewPayment,
        created_at: NaiveDateTime,
    ) -> EngineResult<Self> {
        let total_amount = payment_total(input.amount, input.discount, input.late_fee)?;
        Ok(Self {
            id: Uuid::new_v4(),
            organization_id,
            child_id: input.child_id,
            enrollment_id: input.enrollment_id,
            attendance_id: input.attendance_id,
            payment_number,
            receipt_number,
            purpose: input.purpose,
            amount: input.amount,
            discount: input.discount,
            late_fee: input.late_fee,
            total_amount,
            payment_date: input.payment_date,
            status: input.status,
            description: input.description,
            corrected_by: None,
            correction_reason: None,
            created_at,
            updated_at: created_at,
            version: 0,
        })
    }

    /// Settles a pending payment.
    pub fn settle(
        &mut self,
        outcome: PaymentStatus,
        payment_date: NaiveDate,
        at: NaiveDateTime,
    ) -> EngineResult<()> {
        if self.status != PaymentStatus::Pending {
            return Err(EngineError::Conflict {
                message: format!(
                    "payment {} is already {}",
                    self.payment_number, self.status
                ),
            });
        }
        if outcome == PaymentStatus::Pending {
            return Err(EngineError::Validation {
                field: "status".to_string(),
                message: "a payment can only be settled as completed or failed".to_string(),
            });
        }
        self.status = outcome;
        self.payment_date = payment_date;
        self.updated_at = at;
        Ok(())
    }

    /// Rewrites amounts under an administrative correction.
    ///
    /// This is the only path that may change a completed payment.
    pub fn apply_correction(
        &mut self,
        correction: &PaymentCorrection,
        actor: &str,
        reason: &str,
        at: NaiveDateTime,
    ) -> EngineResult<()> {
        if reason.trim().is_empty() {
            return Err(EngineError::Validation {
                field: "reason".to_string(),
                message: "a correction requires a reason".to_string(),
            });
        }
        let amount = correction.amount.unwrap_or(self.amount);
        let discount = correction.discount.unwrap_or(self.discount);
        let late_fee = correction.late_fee.unwrap_or(self.late_fee);
        self.total_amount = payment_total(amount, discount, late_fee)?;
        self.amount = amount;
        self.discount = discount;
        self.late_fee = late_fee;
        self.corrected_by = Some(actor.to_string());
        self.correction_reason = Some(reason.to_string());
        self.updated_at = at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 15)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap()
    }

    fn payment(status: PaymentStatus) -> Payment {
        Payment::new(
            OrganizationId::new("org"),
            "PAY20260001".to_string(),
            "RCP20260001".to_string(),
            NewPayment {
                child_id: Uuid::new_v4(),
                enrollment_id: None,
                attendance_id: None,
                purpose: PaymentPurpose::SessionCharge,
                amount: dec("600"),
                discount: dec("50"),
                late_fee: dec("150"),
                payment_date: at().date(),
                status,
                description: None,
            },
            at(),
        )
        .unwrap()
    }

    #[test]
    fn test_total_is_amount_minus_discount_plus_late_fee() {
        assert_eq!(payment(PaymentStatus::Pending).total_amount, dec("700"));
    }

    #[test]
    fn test_discount_larger_than_amount_is_rejected() {
        let result = payment_total(dec("100"), dec("150"), dec("0"));
        assert!(matches!(result, Err(EngineError::Validation { .. })));
    }

    #[test]
    fn test_completed_payment_cannot_be_settled_again() {
        let mut p = payment(PaymentStatus::Completed);
        let result = p.settle(PaymentStatus::Failed, at().date(), at());
        assert!(matches!(result, Err(EngineError::Conflict { .. })));
        assert_eq!(p.status, PaymentStatus::Completed);
    }

    #[test]
    fn test_settle_pending_payment() {
        let mut p = payment(PaymentStatus::Pending);
        p.settle(PaymentStatus::Completed, at().date(), at()).unwrap();
        assert_eq!(p.status, PaymentStatus::Completed);
    }

    #[test]
    fn test_correction_recomputes_total_and_records_actor() {
        let mut p = payment(PaymentStatus::Completed);
        let correction = PaymentCorrection {
            amount: Some(dec("350")),
            ..Default::default()
        };

        p.apply_correction(&correction, "admin", "re-billed as half day", at())
            .unwrap();

        assert_eq!(p.total_amount, dec("450"));
        assert_eq!(p.corrected_by.as_deref(), Some("admin"));
    }

    #[test]
    fn test_correction_requires_reason() {
        let mut p = payment(PaymentStatus::Completed);
        let result = p.apply_correction(&PaymentCorrection::default(), "admin", " ", at());
        assert!(matches!(result, Err(EngineError::Validation { .. })));
    }
}
