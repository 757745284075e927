//! Configuration loading and management for the billing engine.
//!
//! This module loads engine settings and seed rate schedules from YAML files.
//!
//! # Example
//!
//! ```no_run
//! use daycare_billing::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/daycare").unwrap();
//! println!("Payment policy: {:?}", config.settings().payment_policy);
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    EngineConfig, EngineSettings, ExpiryConfig, IdentifierConfig, OperatingHours, PaymentPolicy,
    ScheduleSeed, ServerConfig, TierDefaults,
};
