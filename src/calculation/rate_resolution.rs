//! Rate source resolution.
//!
//! Picks the tier set that bills an enrollment's sessions. The order is
//! fixed: custom override, then the assigned schedule, then the
//! organization's active schedule.

use serde::{Deserialize, Serialize};

use crate::config::TierDefaults;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AuditStep, BillingMode, CustomRateOverride, Enrollment, RateSchedule, RateSource, RateTiers,
};

/// The tiers an enrollment is billed under and where they came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRates {
    /// Which source won.
    pub source: RateSource,
    /// The tier set to bill with.
    pub tiers: RateTiers,
    /// The audit step recording the resolution.
    pub audit_step: AuditStep,
}

/// Builds a full tier set from a custom override.
///
/// Thresholds the override leaves unset come from `defaults`, as do the
/// grace period and late pickup rate. An override carrying a monthly rate
/// bills in monthly mode.
pub fn custom_override_tiers(
    custom: &CustomRateOverride,
    defaults: &TierDefaults,
) -> EngineResult<RateTiers> {
    let tiers = RateTiers {
        hourly_rate: custom.hourly_rate,
        min_chargeable_minutes: custom
            .min_chargeable_minutes
            .unwrap_or(defaults.min_chargeable_minutes),
        half_day_rate: custom.half_day_rate,
        half_day_hours: custom.half_day_hours.unwrap_or(defaults.half_day_hours),
        full_day_rate: custom.full_day_rate,
        full_day_hours: custom.full_day_hours.unwrap_or(defaults.full_day_hours),
        grace_period_minutes: defaults.grace_period_minutes,
        late_pickup_rate_per_hour: defaults.late_pickup_rate_per_hour,
        billing_mode: if custom.monthly_rate.is_some() {
            BillingMode::Monthly
        } else {
            BillingMode::PerSession
        },
    };
    tiers.validate()?;
    Ok(tiers)
}

/// Resolves the tiers for `enrollment`.
///
/// The caller looks up `assigned` (the schedule named by the enrollment's
/// `rate_schedule_id`) and `organization_default` (the organization's active
/// schedule) beforehand, so this function stays pure. Resolving the same
/// inputs twice always yields the same result.
///
/// # Errors
///
/// * `NotFound` if the enrollment names a schedule that `assigned` does not
///   supply.
/// * `Configuration` if no source applies.
/// * `Validation` if a custom override's thresholds are inconsistent.
pub fn resolve_rates(
    enrollment: &Enrollment,
    assigned: Option<&RateSchedule>,
    organization_default: Option<&RateSchedule>,
    defaults: &TierDefaults,
    step_number: u32,
) -> EngineResult<ResolvedRates> {
    let (source, tiers, reasoning) = if let Some(custom) = &enrollment.custom_rates {
        (
            RateSource::CustomOverride,
            custom_override_tiers(custom, defaults)?,
            format!(
                "Enrollment {} carries a custom rate override",
                enrollment.enrollment_number
            ),
        )
    } else if let Some(schedule_id) = enrollment.rate_schedule_id {
        let schedule = assigned
            .filter(|s| s.id == schedule_id)
            .ok_or_else(|| EngineError::NotFound {
                entity: "rate schedule",
                id: schedule_id.to_string(),
            })?;
        (
            RateSource::AssignedSchedule { schedule_id },
            schedule.tiers.clone(),
            format!(
                "Enrollment {} is assigned schedule '{}'",
                enrollment.enrollment_number, schedule.name
            ),
        )
    } else if let Some(schedule) = organization_default {
        (
            RateSource::OrganizationDefault {
                schedule_id: schedule.id,
            },
            schedule.tiers.clone(),
            format!(
                "Enrollment {} falls back to the organization's active schedule '{}'",
                enrollment.enrollment_number, schedule.name
            ),
        )
    } else {
        return Err(EngineError::Configuration {
            message: format!(
                "no rate source for enrollment {}: no custom rates, no assigned schedule and no active schedule in organization {}",
                enrollment.enrollment_number, enrollment.organization_id
            ),
        });
    };

    let audit_step = AuditStep {
        step_number,
        rule_id: "rate_resolution".to_string(),
        rule_name: "Rate Source Resolution".to_string(),
        input: serde_json::json!({
            "enrollment_id": enrollment.id,
            "has_custom_rates": enrollment.custom_rates.is_some(),
            "rate_schedule_id": enrollment.rate_schedule_id
        }),
        output: serde_json::json!({
            "source": source,
            "billing_mode": tiers.billing_mode
        }),
        reasoning,
    };

    Ok(ResolvedRates {
        source,
        tiers,
        audit_step,
    })
}
