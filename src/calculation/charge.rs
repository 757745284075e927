//! Tiered session charge calculation.
//!
//! This module converts a session duration into a billing tier and amount.
//! Tiers are evaluated top-down and the highest tier reached wins.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::{AuditStep, BillingType, RateTiers};

const MINUTES_PER_HOUR: i64 = 60;

/// The result of a tier charge calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeCalculation {
    /// The tier the session fell into.
    pub billing_type: BillingType,
    /// The charge for the session.
    pub amount: Decimal,
    /// Whole hours billed in the hourly tier; `None` for flat tiers.
    pub billed_hours: Option<i64>,
    /// The audit step recording this calculation.
    pub audit_step: AuditStep,
}

/// Calculates the charge for a session of `duration_minutes`.
///
/// 1. At least `full_day_hours` → full-day rate.
/// 2. At least `half_day_hours` → half-day rate.
/// 3. Otherwise the duration, raised to `min_chargeable_minutes`, is rounded
///    up to whole hours and billed at the hourly rate.
///
/// Thresholds are inclusive lower bounds, so a session exactly on a
/// threshold belongs to the higher tier. A lower tier is capped at the flat
/// charge of the tier above it, which keeps the charge non-decreasing in
/// duration for any valid schedule.
///
/// # Errors
///
/// A duration of zero or less is a `Validation` error; it is never billed
/// as zero.
///
/// # Examples
///
/// ```
/// use daycare_billing::calculation::calculate_charge;
/// use daycare_billing::models::{BillingMode, BillingType, RateTiers};
/// use rust_decimal::Decimal;
///
/// let tiers = RateTiers {
///     hourly_rate: Decimal::from(100),
///     min_chargeable_minutes: 60,
///     half_day_rate: Decimal::from(350),
///     half_day_hours: Decimal::from(4),
///     full_day_rate: Decimal::from(600),
///     full_day_hours: Decimal::from(8),
///     grace_period_minutes: 0,
///     late_pickup_rate_per_hour: Decimal::ZERO,
///     billing_mode: BillingMode::PerSession,
/// };
///
/// // 4.5 hours is half-day, not 5 hourly units.
/// let result = calculate_charge(270, &tiers, 1).unwrap();
/// assert_eq!(result.billing_type, BillingType::HalfDay);
/// assert_eq!(result.amount, Decimal::from(350));
/// ```
pub fn calculate_charge(
    duration_minutes: i64,
    tiers: &RateTiers,
    step_number: u32,
) -> EngineResult<ChargeCalculation> {
    if duration_minutes <= 0 {
        return Err(EngineError::Validation {
            field: "duration_minutes".to_string(),
            message: format!("must be greater than zero, got {}", duration_minutes),
        });
    }

    let minutes = Decimal::from(duration_minutes);
    let sixty = Decimal::from(MINUTES_PER_HOUR);

    // A lower tier never costs more than the flat tier above it.
    let half_day_charge = tiers.half_day_rate.min(tiers.full_day_rate);

    let (billing_type, amount, billed_hours, reasoning) = if minutes >= tiers.full_day_hours * sixty
    {
        (
            BillingType::FullDay,
            tiers.full_day_rate,
            None,
            format!(
                "{} minutes reaches the {} hour full-day threshold",
                duration_minutes,
                tiers.full_day_hours.normalize()
            ),
        )
    } else if minutes >= tiers.half_day_hours * sixty {
        (
            BillingType::HalfDay,
            half_day_charge,
            None,
            format!(
                "{} minutes reaches the {} hour half-day threshold",
                duration_minutes,
                tiers.half_day_hours.normalize()
            ),
        )
    } else {
        let chargeable_minutes = duration_minutes.max(i64::from(tiers.min_chargeable_minutes));
        // Round up to the next whole hour.
        let hours = (chargeable_minutes + MINUTES_PER_HOUR - 1) / MINUTES_PER_HOUR;
        let hourly_charge = tiers.hourly_rate * Decimal::from(hours);
        let amount = hourly_charge.min(half_day_charge);
        let cap_note = if amount < hourly_charge {
            format!(", capped at the ${} half-day charge", amount.normalize())
        } else {
            String::new()
        };
        (
            BillingType::Hourly,
            amount,
            Some(hours),
            format!(
                "{} minutes is under the half-day threshold; billed {} hour(s) at ${} (minimum {} minutes){}",
                duration_minutes,
                hours,
                tiers.hourly_rate.normalize(),
                tiers.min_chargeable_minutes,
                cap_note
            ),
        )
    };

    let audit_step = AuditStep {
        step_number,
        rule_id: "tier_charge".to_string(),
        rule_name: "Tier Charge".to_string(),
        input: serde_json::json!({
            "duration_minutes": duration_minutes,
            "half_day_hours": tiers.half_day_hours.normalize().to_string(),
            "full_day_hours": tiers.full_day_hours.normalize().to_string(),
            "min_chargeable_minutes": tiers.min_chargeable_minutes
        }),
        output: serde_json::json!({
            "billing_type": billing_type,
            "amount": amount.normalize().to_string(),
            "billed_hours": billed_hours
        }),
        reasoning,
    };

    Ok(ChargeCalculation {
        billing_type,
        amount,
        billed_hours,
        audit_step,
    })
}
