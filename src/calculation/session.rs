//! Session billing.
//!
//! [`calculate_session_billing`] is the only place a [`SessionBilling`] is
//! built. Every path that sets or changes session times goes through it.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::config::PaymentPolicy;
use crate::error::{EngineError, EngineResult};
use crate::models::{BillingMode, SessionBilling};

use super::charge::calculate_charge;
use super::late_pickup::calculate_late_pickup_fee;
use super::rate_resolution::ResolvedRates;

/// Bills a closed session.
///
/// The audit trace starts with the rate resolution step, followed by the
/// tier charge and, when a closing time is configured, the late pickup check.
///
/// # Errors
///
/// Returns `Validation` if `check_out` is not after `check_in`, or if the
/// session is shorter than one whole minute.
pub fn calculate_session_billing(
    check_in: NaiveDateTime,
    check_out: NaiveDateTime,
    attendance_date: NaiveDate,
    rates: &ResolvedRates,
    closing_time: Option<NaiveTime>,
    policy: PaymentPolicy,
) -> EngineResult<SessionBilling> {
    if check_out <= check_in {
        return Err(EngineError::Validation {
            field: "check_out_time".to_string(),
            message: format!("{} is not after check-in {}", check_out, check_in),
        });
    }

    let duration_minutes = (check_out - check_in).num_minutes();
    let mut audit_trace = vec![rates.audit_step.clone()];
    let mut step_number = rates.audit_step.step_number + 1;

    let charge = calculate_charge(duration_minutes, &rates.tiers, step_number)?;
    audit_trace.push(charge.audit_step);
    step_number += 1;

    let late_pickup_fee = match closing_time {
        Some(closing) => {
            let late = calculate_late_pickup_fee(
                attendance_date,
                check_out,
                closing,
                &rates.tiers,
                step_number,
            );
            audit_trace.push(late.audit_step);
            late.fee
        }
        None => Decimal::ZERO,
    };

    let payable_per_session =
        policy == PaymentPolicy::PerSession && rates.tiers.billing_mode == BillingMode::PerSession;

    Ok(SessionBilling {
        duration_minutes,
        billing_type: charge.billing_type,
        calculated_charge: charge.amount,
        late_pickup_fee,
        rate_source: rates.source,
        payable_per_session,
        audit_trace,
    })
}
