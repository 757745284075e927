//! Enrollment expiry sweeper.
//!
//! Each run makes two passes over an organization's active enrollments:
//!
//! 1. **Expiring soon**: `today < end_date <= today + look_ahead_days`. One
//!    "renew soon" notification per enrollment and end date.
//! 2. **Expired**: `end_date <= today`. The enrollment is expired and one
//!    "expired" notification is sent.
//!
//! Notifications go through the store's outbox, keyed by kind, enrollment
//! and end date, so re-running a sweep on the same day emits nothing new.
//! A notification whose delivery failed stays queued and every run starts
//! by redelivering the queue. A failing item is logged and counted and the
//! sweep moves on.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate, NaiveDateTime};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ExpiryConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Child, Enrollment, NotificationEvent, NotificationKey, OrganizationId, SweepReport,
};
use crate::store::Store;

use super::enrollment::EnrollmentLifecycle;
use super::notifications::NotificationSink;

/// Runs the expiry passes.
pub struct ExpirySweeper {
    store: Arc<dyn Store>,
    lifecycle: Arc<EnrollmentLifecycle>,
    sink: Arc<dyn NotificationSink>,
    config: ExpiryConfig,
}

impl ExpirySweeper {
    /// Creates a sweeper.
    pub fn new(
        store: Arc<dyn Store>,
        lifecycle: Arc<EnrollmentLifecycle>,
        sink: Arc<dyn NotificationSink>,
        config: ExpiryConfig,
    ) -> Self {
        Self {
            store,
            lifecycle,
            sink,
            config,
        }
    }

    /// Sweeps one organization as of `now`.
    ///
    /// Only the initial enrollment scan can fail the run; item failures are
    /// reported in [`SweepReport::failures`].
    pub async fn run(&self, org: &OrganizationId, now: NaiveDateTime) -> EngineResult<SweepReport> {
        let today = now.date();
        let horizon = today
            .checked_add_days(Days::new(u64::from(self.config.look_ahead_days)))
            .unwrap_or(NaiveDate::MAX);
        let candidates = self.store.active_enrollments_ending_by(org, horizon).await?;

        let (expired, expiring): (Vec<Enrollment>, Vec<Enrollment>) = candidates
            .into_iter()
            .partition(|e| e.has_lapsed(today));

        let mut report = SweepReport {
            expiring_count: expiring.len() as u64,
            ..Default::default()
        };

        self.redeliver(org, &mut report).await;

        for enrollment in &expiring {
            match self.bounded(self.remind(org, enrollment)).await {
                Ok(true) => report.notifications_emitted += 1,
                Ok(false) => {}
                Err(err) => self.record_failure(&mut report, org, enrollment.id, &err),
            }
        }

        for enrollment in &expired {
            let (event, end_date) = match self.bounded(self.expire(org, enrollment, now)).await {
                Ok(notice) => notice,
                Err(err) => {
                    self.record_failure(&mut report, org, enrollment.id, &err);
                    continue;
                }
            };
            report.expired_count += 1;
            match self.bounded(self.notify_once(org, event, end_date)).await {
                Ok(true) => report.notifications_emitted += 1,
                Ok(false) => {}
                Err(err) => self.record_failure(&mut report, org, enrollment.id, &err),
            }
        }

        info!(
            organization_id = %org,
            today = %today,
            expiring_count = report.expiring_count,
            expired_count = report.expired_count,
            notifications_emitted = report.notifications_emitted,
            failures = report.failures,
            "Expiry sweep completed"
        );
        Ok(report)
    }

    /// Sweeps every organization in the store.
    ///
    /// An organization whose scan fails counts as one failure.
    pub async fn run_all(&self, now: NaiveDateTime) -> EngineResult<SweepReport> {
        let mut total = SweepReport::default();
        for org in self.store.list_organizations().await? {
            match self.run(&org, now).await {
                Ok(report) => total.absorb(&report),
                Err(err) => {
                    error!(organization_id = %org, error = %err, "Expiry sweep failed");
                    total.failures += 1;
                }
            }
        }
        Ok(total)
    }

    /// Runs [`run_all`](Self::run_all) every `interval_secs` on a background
    /// task, reading the current time from `clock`.
    pub fn spawn<C>(self: Arc<Self>, clock: C) -> JoinHandle<()>
    where
        C: Fn() -> NaiveDateTime + Send + Sync + 'static,
    {
        let period = Duration::from_secs(self.config.interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(err) = self.run_all(clock()).await {
                    error!(error = %err, "Expiry sweep could not list organizations");
                }
            }
        })
    }

    async fn remind(&self, org: &OrganizationId, enrollment: &Enrollment) -> EngineResult<bool> {
        let Some(end_date) = enrollment.end_date else {
            return Ok(false);
        };
        let child = self.child_of(org, enrollment).await?;
        let event = NotificationEvent::expiring_soon(enrollment, &child, end_date);
        self.notify_once(org, event, end_date).await
    }

    /// Expires the enrollment and returns the notice to send for it.
    async fn expire(
        &self,
        org: &OrganizationId,
        enrollment: &Enrollment,
        now: NaiveDateTime,
    ) -> EngineResult<(NotificationEvent, NaiveDate)> {
        let child = self.child_of(org, enrollment).await?;
        let expired = self.lifecycle.expire(org, enrollment.id, now).await?;
        let end_date = expired.end_date.unwrap_or(now.date());
        Ok((NotificationEvent::expired(&expired, &child), end_date))
    }

    /// Queues the event and delivers it. Returns false if it was queued
    /// before; a failed delivery stays queued for the next run.
    async fn notify_once(
        &self,
        org: &OrganizationId,
        event: NotificationEvent,
        date: NaiveDate,
    ) -> EngineResult<bool> {
        let key = event.key(date);
        if !self.store.enqueue_notification(org, key, event.clone()).await? {
            return Ok(false);
        }
        self.deliver(org, key, event).await?;
        Ok(true)
    }

    async fn deliver(
        &self,
        org: &OrganizationId,
        key: NotificationKey,
        event: NotificationEvent,
    ) -> EngineResult<()> {
        self.sink.emit(event).await?;
        self.store.mark_delivered(org, key).await
    }

    async fn redeliver(&self, org: &OrganizationId, report: &mut SweepReport) {
        let pending = match self.bounded(self.store.undelivered_notifications(org)).await {
            Ok(pending) => pending,
            Err(err) => {
                error!(organization_id = %org, error = %err, "Could not read notification outbox");
                report.failures += 1;
                return;
            }
        };
        for notification in pending {
            let target = notification.key.target;
            match self
                .bounded(self.deliver(org, notification.key, notification.event))
                .await
            {
                Ok(()) => report.notifications_emitted += 1,
                Err(err) => self.record_failure(report, org, target, &err),
            }
        }
    }

    async fn child_of(&self, org: &OrganizationId, enrollment: &Enrollment) -> EngineResult<Child> {
        self.store
            .get_child(org, enrollment.child_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "child",
                id: enrollment.child_id.to_string(),
            })
    }

    async fn bounded<T>(&self, work: impl Future<Output = EngineResult<T>>) -> EngineResult<T> {
        let limit = Duration::from_secs(self.config.item_timeout_secs);
        match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Storage {
                operation: "expiry sweep item".to_string(),
                message: format!("timed out after {}s", self.config.item_timeout_secs),
            }),
        }
    }

    fn record_failure(
        &self,
        report: &mut SweepReport,
        org: &OrganizationId,
        enrollment_id: Uuid,
        err: &EngineError,
    ) {
        let failure = EngineError::Aggregation {
            item: format!("enrollment {}", enrollment_id),
            message: err.to_string(),
        };
        warn!(
            organization_id = %org,
            enrollment_id = %enrollment_id,
            error = %failure,
            "Expiry sweep item failed"
        );
        report.failures += 1;
    }
}
