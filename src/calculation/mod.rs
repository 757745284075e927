//! Billing calculations for the daycare engine.
//!
//! This module contains the pure functions that turn a session into money:
//! rate source resolution, the tiered charge, the late pickup fee, and the
//! session billing that combines them. None of them touch the store.

mod charge;
mod late_pickup;
mod rate_resolution;
mod session;

pub use charge::{ChargeCalculation, calculate_charge};
pub use late_pickup::{LatePickupResult, calculate_late_pickup_fee};
pub use rate_resolution::{ResolvedRates, custom_override_tiers, resolve_rates};
pub use session::calculate_session_billing;
