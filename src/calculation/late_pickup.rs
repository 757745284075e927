//! Late pickup fee calculation.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{AuditStep, RateTiers};

/// The result of a late pickup check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatePickupResult {
    /// Minutes past closing time, zero when on time.
    pub late_minutes: i64,
    /// The fee, zero when within the grace period.
    pub fee: Decimal,
    /// The audit step recording this check.
    pub audit_step: AuditStep,
}

/// Charges for pickups past `closing_time` on the attendance date.
///
/// Pickups up to `grace_period_minutes` late are free. Beyond that, every
/// started hour past closing time is billed at `late_pickup_rate_per_hour`.
///
/// # Examples
///
/// ```
/// use daycare_billing::calculation::calculate_late_pickup_fee;
/// use daycare_billing::models::{BillingMode, RateTiers};
/// use chrono::{NaiveDate, NaiveTime};
/// use rust_decimal::Decimal;
///
/// let tiers = RateTiers {
///     hourly_rate: Decimal::from(100),
///     min_chargeable_minutes: 60,
///     half_day_rate: Decimal::from(350),
///     half_day_hours: Decimal::from(4),
///     full_day_rate: Decimal::from(600),
///     full_day_hours: Decimal::from(8),
///     grace_period_minutes: 15,
///     late_pickup_rate_per_hour: Decimal::from(150),
///     billing_mode: BillingMode::PerSession,
/// };
/// let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
/// let closing = NaiveTime::from_hms_opt(18, 30, 0).unwrap();
///
/// let result = calculate_late_pickup_fee(date, date.and_hms_opt(18, 50, 0).unwrap(), closing, &tiers, 3);
/// assert_eq!(result.late_minutes, 20);
/// assert_eq!(result.fee, Decimal::from(150));
/// ```
pub fn calculate_late_pickup_fee(
    attendance_date: NaiveDate,
    check_out_time: NaiveDateTime,
    closing_time: NaiveTime,
    tiers: &RateTiers,
    step_number: u32,
) -> LatePickupResult {
    let closing = attendance_date.and_time(closing_time);
    let late_minutes = (check_out_time - closing).num_minutes().max(0);
    let grace = i64::from(tiers.grace_period_minutes);

    let (fee, reasoning) = if late_minutes == 0 {
        (
            Decimal::ZERO,
            format!("Picked up at or before closing time {}", closing_time),
        )
    } else if late_minutes <= grace {
        (
            Decimal::ZERO,
            format!(
                "Picked up {} minutes after closing, within the {} minute grace period",
                late_minutes, grace
            ),
        )
    } else {
        let hours = (late_minutes + 59) / 60;
        (
            tiers.late_pickup_rate_per_hour * Decimal::from(hours),
            format!(
                "Picked up {} minutes after closing; {} started hour(s) at ${}",
                late_minutes,
                hours,
                tiers.late_pickup_rate_per_hour.normalize()
            ),
        )
    };

    let audit_step = AuditStep {
        step_number,
        rule_id: "late_pickup".to_string(),
        rule_name: "Late Pickup Fee".to_string(),
        input: serde_json::json!({
            "closing_time": closing_time.to_string(),
            "check_out_time": check_out_time.to_string(),
            "grace_period_minutes": grace
        }),
        output: serde_json::json!({
            "late_minutes": late_minutes,
            "fee": fee.normalize().to_string()
        }),
        reasoning,
    };

    LatePickupResult {
        late_minutes,
        fee,
        audit_step,
    }
}
