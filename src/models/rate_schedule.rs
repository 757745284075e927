//! Rate schedule model.
//!
//! A [`RateSchedule`] is the organization-level tiered price list. The part of
//! it the billing calculator consumes is the immutable [`RateTiers`] snapshot.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

use super::OrganizationId;

/// How sessions under a schedule are paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingMode {
    /// Every closed session produces a payment.
    #[default]
    PerSession,
    /// A monthly subscription covers attendance; sessions are metered only.
    Monthly,
}

/// The tier set and rounding rules the billing calculator works from.
///
/// # Example
///
/// ```
/// use daycare_billing::models::{BillingMode, RateTiers};
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
/// assert!(tiers.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTiers {
    /// Charge per started hour in the hourly tier.
    pub hourly_rate: Decimal,
    /// Hourly sessions are billed for at least this many minutes.
    pub min_chargeable_minutes: u32,
    /// Flat charge for the half-day tier.
    pub half_day_rate: Decimal,
    /// Sessions of at least this many hours are half-day.
    pub half_day_hours: Decimal,
    /// Flat charge for the full-day tier.
    pub full_day_rate: Decimal,
    /// Sessions of at least this many hours are full-day.
    pub full_day_hours: Decimal,
    /// Minutes after closing time before a late pickup fee applies.
    #[serde(default)]
    pub grace_period_minutes: u32,
    /// Late pickup fee per started hour past closing time.
    #[serde(default)]
    pub late_pickup_rate_per_hour: Decimal,
    /// Whether sessions are paid individually or by subscription.
    #[serde(default)]
    pub billing_mode: BillingMode,
}

impl RateTiers {
    /// Checks the tier invariants: `full_day_hours >= half_day_hours > 0` and
    /// every rate non-negative.
    pub fn validate(&self) -> EngineResult<()> {
        if self.half_day_hours <= Decimal::ZERO {
            return Err(EngineError::Validation {
                field: "half_day_hours".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.full_day_hours < self.half_day_hours {
            return Err(EngineError::Validation {
                field: "full_day_hours".to_string(),
                message: format!(
                    "must be at least half_day_hours ({})",
                    self.half_day_hours.normalize()
                ),
            });
        }

        let rates = [
            ("hourly_rate", self.hourly_rate),
            ("half_day_rate", self.half_day_rate),
            ("full_day_rate", self.full_day_rate),
            ("late_pickup_rate_per_hour", self.late_pickup_rate_per_hour),
        ];
        for (field, rate) in rates {
            if rate < Decimal::ZERO {
                return Err(EngineError::Validation {
                    field: field.to_string(),
                    message: "must not be negative".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Where the tiers used for a session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateSource {
    /// The enrollment's custom rate override.
    CustomOverride,
    /// The schedule assigned to the enrollment.
    AssignedSchedule {
        /// The assigned schedule.
        schedule_id: Uuid,
    },
    /// The organization's active schedule.
    OrganizationDefault {
        /// The active schedule at resolution time.
        schedule_id: Uuid,
    },
}

/// Input for creating a rate schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRateSchedule {
    /// Display name (e.g., "Standard 2026").
    pub name: String,
    /// The tier set.
    #[serde(flatten)]
    pub tiers: RateTiers,
    /// Monthly subscription price.
    #[serde(default)]
    pub monthly_unlimited_rate: Decimal,
    /// One-time registration fee.
    #[serde(default)]
    pub registration_fee: Decimal,
    /// One-time refundable deposit.
    #[serde(default)]
    pub security_deposit: Decimal,
}

impl NewRateSchedule {
    /// Validates the tiers and the one-time fees.
    pub fn validate(&self) -> EngineResult<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::Validation {
                field: "name".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        self.tiers.validate()?;
        let fees = [
            ("monthly_unlimited_rate", self.monthly_unlimited_rate),
            ("registration_fee", self.registration_fee),
            ("security_deposit", self.security_deposit),
        ];
        for (field, fee) in fees {
            if fee < Decimal::ZERO {
                return Err(EngineError::Validation {
                    field: field.to_string(),
                    message: "must not be negative".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A named tier set owned by an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSchedule {
    /// Internal identifier.
    pub id: Uuid,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Display name.
    pub name: String,
    /// The tier set.
    #[serde(flatten)]
    pub tiers: RateTiers,
    /// Monthly subscription price.
    pub monthly_unlimited_rate: Decimal,
    /// One-time registration fee.
    pub registration_fee: Decimal,
    /// One-time refundable deposit.
    pub security_deposit: Decimal,
    /// Whether this is the organization's default schedule.
    pub is_active: bool,
    /// When the schedule was created.
    pub created_at: NaiveDateTime,
}

impl RateSchedule {
    /// Builds an inactive schedule after validating the input.
    pub fn new(
        organization_id: OrganizationId,
        input: NewRateSchedule,
        created_at: NaiveDateTime,
    ) -> EngineResult<Self> {
        input.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            organization_id,
            name: input.name,
            tiers: input.tiers,
            monthly_unlimited_rate: input.monthly_unlimited_rate,
            registration_fee: input.registration_fee,
            security_deposit: input.security_deposit,
            is_active: false,
            created_at,
        })
    }
}
