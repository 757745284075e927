//! Attendance metering and usage billing for daycare enrollments.
//!
//! The crate tracks children, their enrollment contracts and every
//! check-in/check-out session, bills each closed session against a tiered
//! rate schedule, records payments, and aggregates revenue reports. All
//! state lives behind the [`store::Store`] trait and every operation is
//! scoped to an [`models::OrganizationId`].

#![warn(missing_docs)]

pub mod api;
pub mod calculation;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod store;
