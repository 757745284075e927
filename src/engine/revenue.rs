//! Revenue aggregation.
//!
//! Read-only reports over payments and attendance. Only completed payments
//! count toward revenue. Empty data yields zeros rather than errors.
//!
//! Dashboard-style reports are cached per organization and keyed by the
//! store's write revision, so any write makes the cached copy unreachable.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    AttendanceReport, ConversionRate, OrganizationId, OutstandingBalance, Payment, PaymentStatus,
    RevenueSummary, StatsSnapshot,
};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ReportKey {
    Stats(NaiveDate),
    Revenue(NaiveDate, NaiveDate),
}

#[derive(Debug, Clone)]
enum CachedReport {
    Stats(StatsSnapshot),
    Revenue(RevenueSummary),
}

type ReportCache = HashMap<(OrganizationId, ReportKey), (u64, CachedReport)>;

/// Returns the first and last day of a month.
///
/// # Example
///
/// ```
/// use daycare_billing::engine::month_bounds;
/// use chrono::NaiveDate;
///
/// let (first, last) = month_bounds(2028, 2).unwrap();
/// assert_eq!(first, NaiveDate::from_ymd_opt(2028, 2, 1).unwrap());
/// assert_eq!(last, NaiveDate::from_ymd_opt(2028, 2, 29).unwrap());
/// ```
pub fn month_bounds(year: i32, month: u32) -> EngineResult<(NaiveDate, NaiveDate)> {
    let invalid = || EngineError::Validation {
        field: "month".to_string(),
        message: format!("{}-{} is not a valid month", year, month),
    };
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(invalid)?;
    Ok((first, last))
}

/// Builds reports from the store.
pub struct RevenueAggregator {
    store: Arc<dyn Store>,
    cache: RwLock<ReportCache>,
}

impl RevenueAggregator {
    /// Creates an aggregator with an empty cache.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Dashboard counters as of `today`.
    pub async fn stats_snapshot(
        &self,
        org: &OrganizationId,
        today: NaiveDate,
    ) -> EngineResult<StatsSnapshot> {
        let key = ReportKey::Stats(today);
        let revision = self.store.revision(org).await?;
        if let Some(CachedReport::Stats(stats)) = self.cached(org, &key, revision).await {
            return Ok(stats);
        }

        let month_start = today.with_day(1).unwrap_or(today);
        let month = self
            .store
            .payments_between(org, month_start, today, Some(PaymentStatus::Completed))
            .await?;
        let today_revenue = month
            .iter()
            .filter(|p| p.payment_date == today)
            .map(|p| p.total_amount)
            .sum();

        let stats = StatsSnapshot {
            total_children: self.store.count_active_children(org).await?,
            active_enrollments: self.store.count_active_enrollments(org).await?,
            checked_in_now: self.store.count_open_attendance(org).await?,
            today_revenue,
            month_to_date_revenue: month.iter().map(|p| p.total_amount).sum(),
            pending_payments: self
                .store
                .payments_with_status(org, PaymentStatus::Pending)
                .await?
                .len() as u64,
        };

        self.remember(org, key, revision, CachedReport::Stats(stats.clone()))
            .await;
        Ok(stats)
    }

    /// Completed revenue for a calendar month.
    pub async fn monthly_revenue(
        &self,
        org: &OrganizationId,
        year: i32,
        month: u32,
    ) -> EngineResult<RevenueSummary> {
        let (first, last) = month_bounds(year, month)?;
        self.revenue_between(org, first, last).await
    }

    /// Completed revenue for a single day.
    pub async fn daily_revenue(
        &self,
        org: &OrganizationId,
        date: NaiveDate,
    ) -> EngineResult<RevenueSummary> {
        self.revenue_between(org, date, date).await
    }

    /// Completed revenue over `[start, end]`.
    pub async fn revenue_between(
        &self,
        org: &OrganizationId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<RevenueSummary> {
        if end < start {
            return Err(EngineError::Validation {
                field: "period_end".to_string(),
                message: format!("{} is before period start {}", end, start),
            });
        }
        let key = ReportKey::Revenue(start, end);
        let revision = self.store.revision(org).await?;
        if let Some(CachedReport::Revenue(summary)) = self.cached(org, &key, revision).await {
            return Ok(summary);
        }

        let payments = self
            .store
            .payments_between(org, start, end, Some(PaymentStatus::Completed))
            .await?;
        let summary = RevenueSummary {
            period_start: start,
            period_end: end,
            total: payments.iter().map(|p| p.total_amount).sum(),
            payment_count: payments.len() as u64,
        };

        self.remember(org, key, revision, CachedReport::Revenue(summary.clone()))
            .await;
        Ok(summary)
    }

    /// Monthly statement for one child.
    pub async fn attendance_report(
        &self,
        org: &OrganizationId,
        child_id: Uuid,
        year: i32,
        month: u32,
    ) -> EngineResult<AttendanceReport> {
        let (first, last) = month_bounds(year, month)?;
        self.store
            .get_child(org, child_id)
            .await?
            .filter(|c| c.is_active())
            .ok_or_else(|| EngineError::NotFound {
                entity: "child",
                id: child_id.to_string(),
            })?;

        let records = self
            .store
            .attendance_for_child_between(org, child_id, first, last)
            .await?;

        let days: BTreeSet<NaiveDate> = records.iter().map(|r| r.attendance_date).collect();
        let total_minutes: i64 = records
            .iter()
            .filter_map(|r| r.billing())
            .map(|b| b.duration_minutes)
            .sum();
        let total_charges: Decimal = records.iter().map(|r| r.total_charge()).sum();

        Ok(AttendanceReport {
            child_id,
            year,
            month,
            days_present: days.len() as u64,
            total_minutes,
            total_hours: (Decimal::from(total_minutes) / Decimal::from(60)).round_dp(2),
            total_charges,
            records,
        })
    }

    /// Share of inquiries that reached enrollment.
    pub async fn conversion_rate(&self, org: &OrganizationId) -> EngineResult<ConversionRate> {
        let (total, enrolled) = self.store.inquiry_counts(org).await?;
        let rate = if total == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(enrolled) / Decimal::from(total)).round_dp(4)
        };
        Ok(ConversionRate {
            total_inquiries: total,
            enrolled_inquiries: enrolled,
            rate,
        })
    }

    /// Payments awaiting collection, oldest first.
    pub async fn pending_payments(&self, org: &OrganizationId) -> EngineResult<Vec<Payment>> {
        self.store
            .payments_with_status(org, PaymentStatus::Pending)
            .await
    }

    /// Pending totals per child, largest balance first.
    pub async fn outstanding_balances(
        &self,
        org: &OrganizationId,
    ) -> EngineResult<Vec<OutstandingBalance>> {
        let pending = self.pending_payments(org).await?;
        let mut by_child: BTreeMap<Uuid, OutstandingBalance> = BTreeMap::new();
        for payment in &pending {
            let entry = by_child
                .entry(payment.child_id)
                .or_insert_with(|| OutstandingBalance {
                    child_id: payment.child_id,
                    pending_total: Decimal::ZERO,
                    pending_count: 0,
                });
            entry.pending_total += payment.total_amount;
            entry.pending_count += 1;
        }

        let mut balances: Vec<OutstandingBalance> = by_child.into_values().collect();
        balances.sort_by(|a, b| b.pending_total.cmp(&a.pending_total));
        Ok(balances)
    }

    async fn cached(
        &self,
        org: &OrganizationId,
        key: &ReportKey,
        revision: u64,
    ) -> Option<CachedReport> {
        let cache = self.cache.read().await;
        match cache.get(&(org.clone(), key.clone())) {
            Some((cached_revision, report)) if *cached_revision == revision => {
                debug!(organization_id = %org, revision, "Report served from cache");
                Some(report.clone())
            }
            _ => None,
        }
    }

    async fn remember(
        &self,
        org: &OrganizationId,
        key: ReportKey,
        revision: u64,
        report: CachedReport,
    ) {
        let mut cache = self.cache.write().await;
        cache.retain(|(o, _), (r, _)| o != org || *r == revision);
        cache.insert((org.clone(), key), (revision, report));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{Harness, date, dt, org};
    use crate::models::{InquiryRecord, InquiryStatus, NewPayment, PaymentPurpose};

    async fn pay(
        h: &Harness,
        child_id: Uuid,
        amount: i64,
        on: NaiveDate,
        status: PaymentStatus,
    ) -> Payment {
        h.engine
            .payments()
            .record_payment(
                &org(),
                NewPayment {
                    child_id,
                    enrollment_id: None,
                    attendance_id: None,
                    purpose: PaymentPurpose::Other,
                    amount: Decimal::from(amount),
                    discount: Decimal::ZERO,
                    late_fee: Decimal::ZERO,
                    payment_date: on,
                    status,
                    description: None,
                },
                on.and_hms_opt(12, 0, 0).unwrap(),
            )
            .await
            .unwrap()
    }

    #[test]
    fn test_month_bounds_rejects_month_13() {
        assert!(matches!(
            month_bounds(2026, 13),
            Err(EngineError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_month_is_zero() {
        let h = Harness::new().await;
        let summary = h.engine.revenue().monthly_revenue(&org(), 2026, 4).await.unwrap();

        assert_eq!(summary.total, Decimal::ZERO);
        assert_eq!(summary.payment_count, 0);
        assert_eq!(summary.period_end, date(2026, 4, 30));
    }

    #[tokio::test]
    async fn test_only_completed_payments_count() {
        let h = Harness::new().await;
        let child = h.enroll("Asha", date(2026, 1, 1), None).await.child.id;
        pay(&h, child, 600, date(2026, 1, 10), PaymentStatus::Completed).await;
        pay(&h, child, 350, date(2026, 1, 11), PaymentStatus::Pending).await;
        pay(&h, child, 100, date(2026, 1, 12), PaymentStatus::Failed).await;

        let summary = h.engine.revenue().monthly_revenue(&org(), 2026, 1).await.unwrap();
        assert_eq!(summary.total, Decimal::from(600));
        assert_eq!(summary.payment_count, 1);
    }

    #[tokio::test]
    async fn test_month_boundaries_are_inclusive() {
        let h = Harness::new().await;
        let child = h.enroll("Asha", date(2026, 1, 1), None).await.child.id;
        pay(&h, child, 100, date(2026, 1, 31), PaymentStatus::Completed).await;
        pay(&h, child, 200, date(2026, 2, 1), PaymentStatus::Completed).await;
        pay(&h, child, 300, date(2026, 2, 28), PaymentStatus::Completed).await;
        pay(&h, child, 400, date(2026, 3, 1), PaymentStatus::Completed).await;

        let revenue = h.engine.revenue();
        let feb = revenue.monthly_revenue(&org(), 2026, 2).await.unwrap();
        assert_eq!(feb.total, Decimal::from(500));
        assert_eq!(feb.payment_count, 2);

        let day = revenue.daily_revenue(&org(), date(2026, 1, 31)).await.unwrap();
        assert_eq!(day.total, Decimal::from(100));
    }

    #[tokio::test]
    async fn test_reversed_range_is_rejected() {
        let h = Harness::new().await;
        let result = h
            .engine
            .revenue()
            .revenue_between(&org(), date(2026, 2, 1), date(2026, 1, 1))
            .await;
        assert!(matches!(result, Err(EngineError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_cached_report_refreshes_after_write() {
        let h = Harness::new().await;
        let child = h.enroll("Asha", date(2026, 1, 1), None).await.child.id;
        let revenue = h.engine.revenue();

        let before = revenue.monthly_revenue(&org(), 2026, 1).await.unwrap();
        assert_eq!(before.total, Decimal::ZERO);

        let pending = pay(&h, child, 600, date(2026, 1, 10), PaymentStatus::Pending).await;
        h.engine
            .payments()
            .settle_payment(&org(), pending.id, PaymentStatus::Completed, dt(2026, 1, 10, 17, 0))
            .await
            .unwrap();

        let after = revenue.monthly_revenue(&org(), 2026, 1).await.unwrap();
        assert_eq!(after.total, Decimal::from(600));
    }

    #[tokio::test]
    async fn test_stats_snapshot_counts() {
        let h = Harness::new().await;
        let asha = h.enroll("Asha", date(2026, 1, 1), None).await;
        h.enroll("Ravi", date(2026, 1, 1), None).await;
        h.engine
            .ledger()
            .check_in(&org(), asha.enrollment.id, dt(2026, 1, 15, 9, 0), "staff", None)
            .await
            .unwrap();
        pay(&h, asha.child.id, 600, date(2026, 1, 15), PaymentStatus::Completed).await;
        pay(&h, asha.child.id, 350, date(2026, 1, 3), PaymentStatus::Completed).await;
        pay(&h, asha.child.id, 100, date(2026, 1, 15), PaymentStatus::Pending).await;

        let stats = h
            .engine
            .revenue()
            .stats_snapshot(&org(), date(2026, 1, 15))
            .await
            .unwrap();
        assert_eq!(stats.total_children, 2);
        assert_eq!(stats.active_enrollments, 2);
        assert_eq!(stats.checked_in_now, 1);
        assert_eq!(stats.today_revenue, Decimal::from(600));
        assert_eq!(stats.month_to_date_revenue, Decimal::from(950));
        assert_eq!(stats.pending_payments, 1);
    }

    #[tokio::test]
    async fn test_attendance_report_totals() {
        let h = Harness::new().await;
        let enrolled = h.enroll("Asha", date(2026, 1, 1), None).await;
        let ledger = h.engine.ledger();
        let sessions = [
            (dt(2026, 1, 5, 9, 0), dt(2026, 1, 5, 9, 50)),
            (dt(2026, 1, 5, 14, 0), dt(2026, 1, 5, 15, 0)),
            (dt(2026, 1, 6, 9, 0), dt(2026, 1, 6, 13, 30)),
        ];
        for (check_in, check_out) in sessions {
            let record = ledger
                .check_in(&org(), enrolled.enrollment.id, check_in, "staff", None)
                .await
                .unwrap();
            ledger
                .check_out(&org(), record.id, check_out, "staff")
                .await
                .unwrap();
        }

        let report = h
            .engine
            .revenue()
            .attendance_report(&org(), enrolled.child.id, 2026, 1)
            .await
            .unwrap();
        assert_eq!(report.days_present, 2);
        assert_eq!(report.total_minutes, 50 + 60 + 270);
        assert_eq!(report.total_hours, Decimal::new(633, 2));
        assert_eq!(report.total_charges, Decimal::from(100 + 100 + 350));
        assert_eq!(report.records.len(), 3);
    }

    #[tokio::test]
    async fn test_attendance_report_for_unknown_child_is_not_found() {
        let h = Harness::new().await;
        let result = h
            .engine
            .revenue()
            .attendance_report(&org(), Uuid::new_v4(), 2026, 1)
            .await;
        assert!(matches!(result, Err(EngineError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_conversion_rate() {
        let h = Harness::new().await;
        let revenue = h.engine.revenue();
        assert_eq!(revenue.conversion_rate(&org()).await.unwrap().rate, Decimal::ZERO);

        let statuses = [
            InquiryStatus::Enrolled,
            InquiryStatus::Lost,
            InquiryStatus::Contacted,
        ];
        for status in statuses {
            h.engine
                .store()
                .record_inquiry(
                    &org(),
                    InquiryRecord {
                        id: Uuid::new_v4(),
                        organization_id: org(),
                        status,
                    },
                )
                .await
                .unwrap();
        }

        let rate = revenue.conversion_rate(&org()).await.unwrap();
        assert_eq!(rate.total_inquiries, 3);
        assert_eq!(rate.enrolled_inquiries, 1);
        assert_eq!(rate.rate, Decimal::new(3333, 4));
    }

    #[tokio::test]
    async fn test_outstanding_balances_sorted_by_total() {
        let h = Harness::new().await;
        let asha = h.enroll("Asha", date(2026, 1, 1), None).await.child.id;
        let ravi = h.enroll("Ravi", date(2026, 1, 1), None).await.child.id;
        pay(&h, asha, 100, date(2026, 1, 10), PaymentStatus::Pending).await;
        pay(&h, ravi, 350, date(2026, 1, 10), PaymentStatus::Pending).await;
        pay(&h, asha, 100, date(2026, 1, 11), PaymentStatus::Pending).await;
        pay(&h, asha, 900, date(2026, 1, 12), PaymentStatus::Completed).await;

        let balances = h.engine.revenue().outstanding_balances(&org()).await.unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].child_id, ravi);
        assert_eq!(balances[0].pending_total, Decimal::from(350));
        assert_eq!(balances[1].pending_total, Decimal::from(200));
        assert_eq!(balances[1].pending_count, 2);
    }
}
