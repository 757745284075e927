//! Configuration types for the billing engine.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files.

use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{NewRateSchedule, OrganizationId};

/// How the organization collects money for attendance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPolicy {
    /// Each closed session creates a pending payment.
    #[default]
    PerSession,
    /// Attendance is covered by subscriptions; sessions are metered only.
    Subscription,
}

/// Threshold and rounding defaults for custom rate overrides that leave them unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierDefaults {
    /// Half-day threshold in hours.
    pub half_day_hours: Decimal,
    /// Full-day threshold in hours.
    pub full_day_hours: Decimal,
    /// Hourly rounding floor in minutes.
    pub min_chargeable_minutes: u32,
    /// Grace period after closing time in minutes.
    #[serde(default)]
    pub grace_period_minutes: u32,
    /// Late pickup fee per started hour.
    #[serde(default)]
    pub late_pickup_rate_per_hour: Decimal,
}

impl Default for TierDefaults {
    fn default() -> Self {
        Self {
            half_day_hours: Decimal::from(4),
            full_day_hours: Decimal::from(8),
            min_chargeable_minutes: 60,
            grace_period_minutes: 0,
            late_pickup_rate_per_hour: Decimal::ZERO,
        }
    }
}

/// Center opening hours.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    /// Pickups after this time (plus grace) incur the late pickup fee.
    #[serde(default)]
    pub closing_time: Option<NaiveTime>,
}

/// Expiry sweeper settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryConfig {
    /// How many days ahead the expiring-soon pass looks.
    #[serde(default = "default_look_ahead_days")]
    pub look_ahead_days: u32,
    /// Upper bound on store work for a single enrollment.
    #[serde(default = "default_item_timeout_secs")]
    pub item_timeout_secs: u64,
    /// Seconds between sweeps when running in the background.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_look_ahead_days() -> u32 {
    1
}

fn default_item_timeout_secs() -> u64 {
    5
}

fn default_interval_secs() -> u64 {
    86_400
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            look_ahead_days: default_look_ahead_days(),
            item_timeout_secs: default_item_timeout_secs(),
            interval_secs: default_interval_secs(),
        }
    }
}

/// Prefixes and padding for human-readable codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierConfig {
    /// Child code prefix.
    pub child_prefix: String,
    /// Enrollment number prefix.
    pub enrollment_prefix: String,
    /// Payment number prefix.
    pub payment_prefix: String,
    /// Receipt number prefix.
    pub receipt_prefix: String,
    /// Zero-padded width of the sequence part.
    pub sequence_width: usize,
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            child_prefix: "CH".to_string(),
            enrollment_prefix: "ENR".to_string(),
            payment_prefix: "PAY".to_string(),
            receipt_prefix: "RCP".to_string(),
            sequence_width: 4,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind.
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Engine settings from engine.yaml.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Organizations served by this deployment.
    #[serde(default)]
    pub organizations: Vec<OrganizationId>,
    /// Payment policy for attendance.
    #[serde(default)]
    pub payment_policy: PaymentPolicy,
    /// Actor recorded on system-initiated changes.
    #[serde(default = "default_system_actor")]
    pub system_actor: String,
    /// Defaults for custom rate overrides.
    #[serde(default)]
    pub tier_defaults: TierDefaults,
    /// Opening hours.
    #[serde(default)]
    pub operating_hours: OperatingHours,
    /// Sweeper settings.
    #[serde(default)]
    pub expiry: ExpiryConfig,
    /// Identifier formats.
    #[serde(default)]
    pub identifiers: IdentifierConfig,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_system_actor() -> String {
    "system".to_string()
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            organizations: Vec::new(),
            payment_policy: PaymentPolicy::default(),
            system_actor: default_system_actor(),
            tier_defaults: TierDefaults::default(),
            operating_hours: OperatingHours::default(),
            expiry: ExpiryConfig::default(),
            identifiers: IdentifierConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// A rate schedule to create for every organization at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSeed {
    /// The schedule definition.
    #[serde(flatten)]
    pub schedule: NewRateSchedule,
    /// Whether the seed becomes the organization default.
    #[serde(default)]
    pub active: bool,
}

/// The complete engine configuration loaded from YAML files.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    settings: EngineSettings,
    schedules: Vec<ScheduleSeed>,
}

impl EngineConfig {
    /// Creates a new EngineConfig from its component parts.
    pub fn new(settings: EngineSettings, schedules: Vec<ScheduleSeed>) -> Self {
        Self {
            settings,
            schedules,
        }
    }

    /// Returns the engine settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Returns the seed schedules in file-name order.
    pub fn schedules(&self) -> &[ScheduleSeed] {
        &self.schedules
    }
}
