//! The daycare billing engine.
//!
//! Components, leaf first:
//!
//! * [`AttendanceLedger`] opens, closes and corrects sessions and bills them
//!   through [`crate::calculation`].
//! * [`PaymentRecorder`] turns billed sessions and ad hoc collections into
//!   payments.
//! * [`EnrollmentLifecycle`] owns children, enrollments and rate schedules.
//! * [`ExpirySweeper`] expires lapsed enrollments and sends reminders.
//! * [`RevenueAggregator`] builds the read-side reports.
//!
//! [`DaycareEngine`] wires them together over one [`Store`].

mod attendance;
mod enrollment;
mod identifiers;
mod notifications;
mod payments;
mod revenue;
mod sweeper;

#[cfg(test)]
mod test_support;

pub use attendance::{AttendanceLedger, SessionOutcome};
pub use enrollment::{Enrolled, EnrollmentLifecycle};
pub use identifiers::{format_identifier, next_identifier};
pub use notifications::{MemoryNotificationSink, NotificationSink, TracingNotificationSink};
pub use payments::{PaymentRecorder, StorePaymentRecorder};
pub use revenue::{RevenueAggregator, month_bounds};
pub use sweeper::ExpirySweeper;

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::info;

use crate::config::{EngineSettings, ScheduleSeed};
use crate::error::EngineResult;
use crate::models::{OrganizationId, RateSchedule};
use crate::store::Store;

/// All engine components sharing one store and one set of settings.
pub struct DaycareEngine {
    store: Arc<dyn Store>,
    settings: Arc<EngineSettings>,
    payments: Arc<dyn PaymentRecorder>,
    ledger: Arc<AttendanceLedger>,
    lifecycle: Arc<EnrollmentLifecycle>,
    sweeper: Arc<ExpirySweeper>,
    revenue: Arc<RevenueAggregator>,
}

impl DaycareEngine {
    /// Builds the engine with payments recorded in `store`.
    pub fn new(
        store: Arc<dyn Store>,
        sink: Arc<dyn NotificationSink>,
        settings: EngineSettings,
    ) -> Self {
        let payments: Arc<dyn PaymentRecorder> = Arc::new(StorePaymentRecorder::new(
            store.clone(),
            settings.identifiers.clone(),
        ));
        Self::with_payment_recorder(store, sink, payments, settings)
    }

    /// Builds the engine around a caller-supplied payment recorder.
    pub fn with_payment_recorder(
        store: Arc<dyn Store>,
        sink: Arc<dyn NotificationSink>,
        payments: Arc<dyn PaymentRecorder>,
        settings: EngineSettings,
    ) -> Self {
        let settings = Arc::new(settings);
        let ledger = Arc::new(AttendanceLedger::new(
            store.clone(),
            payments.clone(),
            settings.clone(),
        ));
        let lifecycle = Arc::new(EnrollmentLifecycle::new(
            store.clone(),
            ledger.clone(),
            settings.clone(),
        ));
        let sweeper = Arc::new(ExpirySweeper::new(
            store.clone(),
            lifecycle.clone(),
            sink,
            settings.expiry.clone(),
        ));
        let revenue = Arc::new(RevenueAggregator::new(store.clone()));

        Self {
            store,
            settings,
            payments,
            ledger,
            lifecycle,
            sweeper,
            revenue,
        }
    }

    /// Creates the seed schedules for `org` and activates the one marked
    /// active, if any.
    pub async fn seed_schedules(
        &self,
        org: &OrganizationId,
        seeds: &[ScheduleSeed],
        at: NaiveDateTime,
    ) -> EngineResult<Vec<RateSchedule>> {
        let mut created = Vec::with_capacity(seeds.len());
        for seed in seeds {
            let mut schedule = self
                .lifecycle
                .create_schedule(org, seed.schedule.clone(), at)
                .await?;
            if seed.active {
                schedule = self.lifecycle.activate_schedule(org, schedule.id).await?;
            }
            created.push(schedule);
        }
        info!(organization_id = %org, count = created.len(), "Seed schedules loaded");
        Ok(created)
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The engine settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The payment recorder.
    pub fn payments(&self) -> &Arc<dyn PaymentRecorder> {
        &self.payments
    }

    /// The attendance ledger.
    pub fn ledger(&self) -> &Arc<AttendanceLedger> {
        &self.ledger
    }

    /// The enrollment lifecycle.
    pub fn lifecycle(&self) -> &Arc<EnrollmentLifecycle> {
        &self.lifecycle
    }

    /// The expiry sweeper.
    pub fn sweeper(&self) -> &Arc<ExpirySweeper> {
        &self.sweeper
    }

    /// The revenue aggregator.
    pub fn revenue(&self) -> &Arc<RevenueAggregator> {
        &self.revenue
    }
}
