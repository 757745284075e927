//! In-memory [`Store`] backed by a single async lock.
//!
//! Each compound operation runs under one write guard, which is what makes
//! the check-and-insert and compare-and-swap calls atomic.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    AttendanceRecord, Child, Enrollment, EnrollmentStatus, InquiryRecord, InquiryStatus,
    NotificationEvent, NotificationKey, OrganizationId, Payment, PaymentPurpose, PaymentStatus,
    PendingNotification, RateSchedule,
};

use super::Store;

#[derive(Debug, Default)]
struct Tenant {
    children: HashMap<Uuid, Child>,
    schedules: HashMap<Uuid, RateSchedule>,
    enrollments: HashMap<Uuid, Enrollment>,
    attendance: HashMap<Uuid, AttendanceRecord>,
    payments: HashMap<Uuid, Payment>,
    inquiries: HashMap<Uuid, InquiryRecord>,
    sequences: HashMap<(String, i32), u64>,
    outbox: HashMap<NotificationKey, OutboxEntry>,
    outbox_sequence: u64,
    revision: u64,
}

#[derive(Debug)]
struct OutboxEntry {
    sequence: u64,
    event: NotificationEvent,
    delivered: bool,
}

impl Tenant {
    fn touch(&mut self) {
        self.revision += 1;
    }
}

fn check_version(entity: &str, id: Uuid, stored: u64, given: u64) -> EngineResult<()> {
    if stored != given {
        return Err(EngineError::Conflict {
            message: format!(
                "{} {} was modified concurrently (expected version {}, found {})",
                entity, id, given, stored
            ),
        });
    }
    Ok(())
}

/// Process-local store for tests, demos and single-node deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tenants: Arc<RwLock<HashMap<OrganizationId, Tenant>>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn list_organizations(&self) -> EngineResult<Vec<OrganizationId>> {
        let tenants = self.tenants.read().await;
        let mut orgs: Vec<OrganizationId> = tenants.keys().cloned().collect();
        orgs.sort();
        Ok(orgs)
    }

    async fn revision(&self, org: &OrganizationId) -> EngineResult<u64> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(org).map(|t| t.revision).unwrap_or(0))
    }

    async fn next_sequence(
        &self,
        org: &OrganizationId,
        prefix: &str,
        year: i32,
    ) -> EngineResult<u64> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.entry(org.clone()).or_default();
        let counter = tenant
            .sequences
            .entry((prefix.to_string(), year))
            .or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn insert_child(&self, org: &OrganizationId, child: Child) -> EngineResult<Child> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.entry(org.clone()).or_default();
        if tenant
            .children
            .values()
            .any(|c| c.child_code == child.child_code)
        {
            return Err(EngineError::Conflict {
                message: format!("child code {} already exists", child.child_code),
            });
        }
        tenant.children.insert(child.id, child.clone());
        tenant.touch();
        Ok(child)
    }

    async fn get_child(&self, org: &OrganizationId, id: Uuid) -> EngineResult<Option<Child>> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(org).and_then(|t| t.children.get(&id).cloned()))
    }

    async fn update_child(&self, org: &OrganizationId, child: Child) -> EngineResult<Child> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.get_mut(org).ok_or_else(|| EngineError::NotFound {
            entity: "child",
            id: child.id.to_string(),
        })?;
        if !tenant.children.contains_key(&child.id) {
            return Err(EngineError::NotFound {
                entity: "child",
                id: child.id.to_string(),
            });
        }
        tenant.children.insert(child.id, child.clone());
        tenant.touch();
        Ok(child)
    }

    async fn count_active_children(&self, org: &OrganizationId) -> EngineResult<u64> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(org)
            .map(|t| t.children.values().filter(|c| c.is_active()).count() as u64)
            .unwrap_or(0))
    }

    async fn insert_schedule(
        &self,
        org: &OrganizationId,
        mut schedule: RateSchedule,
    ) -> EngineResult<RateSchedule> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.entry(org.clone()).or_default();
        // Activation only happens through activate_schedule_exclusive.
        schedule.is_active = false;
        tenant.schedules.insert(schedule.id, schedule.clone());
        tenant.touch();
        Ok(schedule)
    }

    async fn get_schedule(
        &self,
        org: &OrganizationId,
        id: Uuid,
    ) -> EngineResult<Option<RateSchedule>> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(org).and_then(|t| t.schedules.get(&id).cloned()))
    }

    async fn list_schedules(&self, org: &OrganizationId) -> EngineResult<Vec<RateSchedule>> {
        let tenants = self.tenants.read().await;
        let mut schedules: Vec<RateSchedule> = tenants
            .get(org)
            .map(|t| t.schedules.values().cloned().collect())
            .unwrap_or_default();
        schedules.sort_by_key(|s| s.created_at);
        Ok(schedules)
    }

    async fn active_schedule(&self, org: &OrganizationId) -> EngineResult<Option<RateSchedule>> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(org)
            .and_then(|t| t.schedules.values().find(|s| s.is_active).cloned()))
    }

    async fn activate_schedule_exclusive(
        &self,
        org: &OrganizationId,
        id: Uuid,
    ) -> EngineResult<RateSchedule> {
        let mut tenants = self.tenants.write().await;
        let not_found = || EngineError::NotFound {
            entity: "rate schedule",
            id: id.to_string(),
        };
        let tenant = tenants.get_mut(org).ok_or_else(not_found)?;
        if !tenant.schedules.contains_key(&id) {
            return Err(not_found());
        }
        for schedule in tenant.schedules.values_mut() {
            schedule.is_active = schedule.id == id;
        }
        tenant.touch();
        tenant.schedules.get(&id).cloned().ok_or_else(not_found)
    }

    async fn insert_enrollment_exclusive(
        &self,
        org: &OrganizationId,
        enrollment: Enrollment,
    ) -> EngineResult<Enrollment> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.entry(org.clone()).or_default();
        if let Some(existing) = tenant
            .enrollments
            .values()
            .find(|e| e.child_id == enrollment.child_id && e.status.holds_slot())
        {
            return Err(EngineError::Conflict {
                message: format!(
                    "child {} already has {} enrollment {}",
                    enrollment.child_id, existing.status, existing.enrollment_number
                ),
            });
        }
        tenant.enrollments.insert(enrollment.id, enrollment.clone());
        tenant.touch();
        Ok(enrollment)
    }

    async fn get_enrollment(
        &self,
        org: &OrganizationId,
        id: Uuid,
    ) -> EngineResult<Option<Enrollment>> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(org).and_then(|t| t.enrollments.get(&id).cloned()))
    }

    async fn update_enrollment(
        &self,
        org: &OrganizationId,
        mut enrollment: Enrollment,
    ) -> EngineResult<Enrollment> {
        let mut tenants = self.tenants.write().await;
        let not_found = || EngineError::NotFound {
            entity: "enrollment",
            id: enrollment.id.to_string(),
        };
        let tenant = tenants.get_mut(org).ok_or_else(not_found)?;
        let stored = tenant.enrollments.get(&enrollment.id).ok_or_else(not_found)?;
        check_version("enrollment", enrollment.id, stored.version, enrollment.version)?;
        enrollment.version += 1;
        tenant.enrollments.insert(enrollment.id, enrollment.clone());
        tenant.touch();
        Ok(enrollment)
    }

    async fn live_enrollment_for_child(
        &self,
        org: &OrganizationId,
        child_id: Uuid,
    ) -> EngineResult<Option<Enrollment>> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(org).and_then(|t| {
            t.enrollments
                .values()
                .find(|e| e.child_id == child_id && e.status.holds_slot())
                .cloned()
        }))
    }

    async fn active_enrollments_ending_by(
        &self,
        org: &OrganizationId,
        date: NaiveDate,
    ) -> EngineResult<Vec<Enrollment>> {
        let tenants = self.tenants.read().await;
        let mut found: Vec<Enrollment> = tenants
            .get(org)
            .map(|t| {
                t.enrollments
                    .values()
                    .filter(|e| e.status == EnrollmentStatus::Active)
                    .filter(|e| e.end_date.is_some_and(|end| end <= date))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by_key(|e| (e.end_date, e.created_at));
        Ok(found)
    }

    async fn count_active_enrollments(&self, org: &OrganizationId) -> EngineResult<u64> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(org)
            .map(|t| {
                t.enrollments
                    .values()
                    .filter(|e| e.status == EnrollmentStatus::Active)
                    .count() as u64
            })
            .unwrap_or(0))
    }

    async fn insert_attendance_if_no_open(
        &self,
        org: &OrganizationId,
        record: AttendanceRecord,
        enrollment_version: u64,
    ) -> EngineResult<AttendanceRecord> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.entry(org.clone()).or_default();
        let enrollment =
            tenant
                .enrollments
                .get(&record.enrollment_id)
                .ok_or_else(|| EngineError::NotFound {
                    entity: "enrollment",
                    id: record.enrollment_id.to_string(),
                })?;
        if enrollment.status != EnrollmentStatus::Active {
            return Err(EngineError::Conflict {
                message: format!(
                    "enrollment {} is {}, check-in requires an active enrollment",
                    enrollment.enrollment_number, enrollment.status
                ),
            });
        }
        check_version("enrollment", enrollment.id, enrollment.version, enrollment_version)?;
        if tenant
            .attendance
            .values()
            .any(|r| r.enrollment_id == record.enrollment_id && r.is_open())
        {
            return Err(EngineError::Conflict {
                message: format!(
                    "enrollment {} already has an open attendance record",
                    record.enrollment_id
                ),
            });
        }
        tenant.attendance.insert(record.id, record.clone());
        tenant.touch();
        Ok(record)
    }

    async fn get_attendance(
        &self,
        org: &OrganizationId,
        id: Uuid,
    ) -> EngineResult<Option<AttendanceRecord>> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(org).and_then(|t| t.attendance.get(&id).cloned()))
    }

    async fn update_attendance(
        &self,
        org: &OrganizationId,
        mut record: AttendanceRecord,
    ) -> EngineResult<AttendanceRecord> {
        let mut tenants = self.tenants.write().await;
        let not_found = || EngineError::NotFound {
            entity: "attendance record",
            id: record.id.to_string(),
        };
        let tenant = tenants.get_mut(org).ok_or_else(not_found)?;
        let stored = tenant.attendance.get(&record.id).ok_or_else(not_found)?;
        check_version("attendance record", record.id, stored.version, record.version)?;
        if record.is_open()
            && tenant
                .attendance
                .values()
                .any(|r| r.id != record.id && r.enrollment_id == record.enrollment_id && r.is_open())
        {
            return Err(EngineError::Conflict {
                message: format!(
                    "enrollment {} already has an open attendance record",
                    record.enrollment_id
                ),
            });
        }
        record.version += 1;
        tenant.attendance.insert(record.id, record.clone());
        tenant.touch();
        Ok(record)
    }

    async fn open_attendance_for_enrollment(
        &self,
        org: &OrganizationId,
        enrollment_id: Uuid,
    ) -> EngineResult<Option<AttendanceRecord>> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(org).and_then(|t| {
            t.attendance
                .values()
                .find(|r| r.enrollment_id == enrollment_id && r.is_open())
                .cloned()
        }))
    }

    async fn count_open_attendance(&self, org: &OrganizationId) -> EngineResult<u64> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(org)
            .map(|t| t.attendance.values().filter(|r| r.is_open()).count() as u64)
            .unwrap_or(0))
    }

    async fn attendance_for_child_between(
        &self,
        org: &OrganizationId,
        child_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<AttendanceRecord>> {
        let tenants = self.tenants.read().await;
        let mut records: Vec<AttendanceRecord> = tenants
            .get(org)
            .map(|t| {
                t.attendance
                    .values()
                    .filter(|r| r.child_id == child_id)
                    .filter(|r| r.attendance_date >= start && r.attendance_date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by_key(|r| r.check_in_time());
        Ok(records)
    }

    async fn insert_payment(
        &self,
        org: &OrganizationId,
        payment: Payment,
    ) -> EngineResult<Payment> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.entry(org.clone()).or_default();
        if tenant.payments.values().any(|p| {
            p.payment_number == payment.payment_number || p.receipt_number == payment.receipt_number
        }) {
            return Err(EngineError::Conflict {
                message: format!(
                    "payment number {} or receipt number {} already exists",
                    payment.payment_number, payment.receipt_number
                ),
            });
        }
        tenant.payments.insert(payment.id, payment.clone());
        tenant.touch();
        Ok(payment)
    }

    async fn get_payment(&self, org: &OrganizationId, id: Uuid) -> EngineResult<Option<Payment>> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(org).and_then(|t| t.payments.get(&id).cloned()))
    }

    async fn update_payment(
        &self,
        org: &OrganizationId,
        mut payment: Payment,
    ) -> EngineResult<Payment> {
        let mut tenants = self.tenants.write().await;
        let not_found = || EngineError::NotFound {
            entity: "payment",
            id: payment.id.to_string(),
        };
        let tenant = tenants.get_mut(org).ok_or_else(not_found)?;
        let stored = tenant.payments.get(&payment.id).ok_or_else(not_found)?;
        check_version("payment", payment.id, stored.version, payment.version)?;
        payment.version += 1;
        tenant.payments.insert(payment.id, payment.clone());
        tenant.touch();
        Ok(payment)
    }

    async fn payment_for_attendance(
        &self,
        org: &OrganizationId,
        attendance_id: Uuid,
    ) -> EngineResult<Option<Payment>> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(org).and_then(|t| {
            t.payments
                .values()
                .find(|p| {
                    p.attendance_id == Some(attendance_id)
                        && p.purpose == PaymentPurpose::SessionCharge
                })
                .cloned()
        }))
    }

    async fn payments_between(
        &self,
        org: &OrganizationId,
        start: NaiveDate,
        end: NaiveDate,
        status: Option<PaymentStatus>,
    ) -> EngineResult<Vec<Payment>> {
        let tenants = self.tenants.read().await;
        let mut payments: Vec<Payment> = tenants
            .get(org)
            .map(|t| {
                t.payments
                    .values()
                    .filter(|p| p.payment_date >= start && p.payment_date <= end)
                    .filter(|p| status.is_none_or(|s| p.status == s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        payments.sort_by_key(|p| (p.payment_date, p.created_at));
        Ok(payments)
    }

    async fn payments_with_status(
        &self,
        org: &OrganizationId,
        status: PaymentStatus,
    ) -> EngineResult<Vec<Payment>> {
        let tenants = self.tenants.read().await;
        let mut payments: Vec<Payment> = tenants
            .get(org)
            .map(|t| {
                t.payments
                    .values()
                    .filter(|p| p.status == status)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        payments.sort_by_key(|p| (p.created_at, p.payment_number.clone()));
        Ok(payments)
    }

    async fn record_inquiry(
        &self,
        org: &OrganizationId,
        inquiry: InquiryRecord,
    ) -> EngineResult<()> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.entry(org.clone()).or_default();
        tenant.inquiries.insert(inquiry.id, inquiry);
        tenant.touch();
        Ok(())
    }

    async fn inquiry_counts(&self, org: &OrganizationId) -> EngineResult<(u64, u64)> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(org)
            .map(|t| {
                let total = t.inquiries.len() as u64;
                let enrolled = t
                    .inquiries
                    .values()
                    .filter(|i| i.status == InquiryStatus::Enrolled)
                    .count() as u64;
                (total, enrolled)
            })
            .unwrap_or((0, 0)))
    }

    async fn enqueue_notification(
        &self,
        org: &OrganizationId,
        key: NotificationKey,
        event: NotificationEvent,
    ) -> EngineResult<bool> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.entry(org.clone()).or_default();
        if tenant.outbox.contains_key(&key) {
            return Ok(false);
        }
        tenant.outbox_sequence += 1;
        let entry = OutboxEntry {
            sequence: tenant.outbox_sequence,
            event,
            delivered: false,
        };
        tenant.outbox.insert(key, entry);
        Ok(true)
    }

    async fn undelivered_notifications(
        &self,
        org: &OrganizationId,
    ) -> EngineResult<Vec<PendingNotification>> {
        let tenants = self.tenants.read().await;
        let mut pending: Vec<(u64, PendingNotification)> = tenants
            .get(org)
            .map(|t| {
                t.outbox
                    .iter()
                    .filter(|(_, entry)| !entry.delivered)
                    .map(|(key, entry)| {
                        let notification = PendingNotification {
                            key: *key,
                            event: entry.event.clone(),
                        };
                        (entry.sequence, notification)
                    })
                    .collect()
            })
            .unwrap_or_default();
        pending.sort_by_key(|(sequence, _)| *sequence);
        Ok(pending.into_iter().map(|(_, n)| n).collect())
    }

    async fn mark_delivered(&self, org: &OrganizationId, key: NotificationKey) -> EngineResult<()> {
        let mut tenants = self.tenants.write().await;
        let entry = tenants
            .get_mut(org)
            .and_then(|t| t.outbox.get_mut(&key))
            .ok_or_else(|| EngineError::NotFound {
                entity: "notification",
                id: format!("{:?}/{}/{}", key.kind, key.target, key.date),
            })?;
        entry.delivered = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        NewEnrollment, NewRateSchedule, NotificationKind, NotificationPriority, RateTiers,
    };
    use chrono::NaiveDateTime;
    use rust_decimal::Decimal;

    fn org() -> OrganizationId {
        OrganizationId::new("org")
    }

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 5)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn enrollment(child_id: Uuid) -> Enrollment {
        Enrollment::new(
            org(),
            format!("ENR-{}", Uuid::new_v4()),
            NewEnrollment {
                child_id,
                start_date: at().date(),
                end_date: None,
                rate_schedule_id: None,
                custom_rates: None,
            },
            at(),
        )
    }

    fn schedule(name: &str) -> RateSchedule {
        RateSchedule::new(
            org(),
            NewRateSchedule {
                name: name.to_string(),
                tiers: RateTiers {
                    hourly_rate: Decimal::from(100),
                    min_chargeable_minutes: 60,
                    half_day_rate: Decimal::from(350),
                    half_day_hours: Decimal::from(4),
                    full_day_rate: Decimal::from(600),
                    full_day_hours: Decimal::from(8),
                    grace_period_minutes: 0,
                    late_pickup_rate_per_hour: Decimal::ZERO,
                    billing_mode: Default::default(),
                },
                monthly_unlimited_rate: Decimal::ZERO,
                registration_fee: Decimal::ZERO,
                security_deposit: Decimal::ZERO,
            },
            at(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_sequences_are_per_prefix_and_year() {
        let store = InMemoryStore::new();
        assert_eq!(store.next_sequence(&org(), "CH", 2026).await.unwrap(), 1);
        assert_eq!(store.next_sequence(&org(), "CH", 2026).await.unwrap(), 2);
        assert_eq!(store.next_sequence(&org(), "PAY", 2026).await.unwrap(), 1);
        assert_eq!(store.next_sequence(&org(), "CH", 2027).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stale_enrollment_update_conflicts() {
        let store = InMemoryStore::new();
        let stored = store
            .insert_enrollment_exclusive(&org(), enrollment(Uuid::new_v4()))
            .await
            .unwrap();

        let mut first = stored.clone();
        first.pause_reason = Some("holiday".to_string());
        let updated = store.update_enrollment(&org(), first).await.unwrap();
        assert_eq!(updated.version, 1);

        let result = store.update_enrollment(&org(), stored).await;
        assert!(matches!(result, Err(EngineError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_second_live_enrollment_for_child_conflicts() {
        let store = InMemoryStore::new();
        let child_id = Uuid::new_v4();
        store
            .insert_enrollment_exclusive(&org(), enrollment(child_id))
            .await
            .unwrap();

        let result = store
            .insert_enrollment_exclusive(&org(), enrollment(child_id))
            .await;
        assert!(matches!(result, Err(EngineError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_activation_is_exclusive() {
        let store = InMemoryStore::new();
        let a = store.insert_schedule(&org(), schedule("A")).await.unwrap();
        let b = store.insert_schedule(&org(), schedule("B")).await.unwrap();

        store.activate_schedule_exclusive(&org(), a.id).await.unwrap();
        store.activate_schedule_exclusive(&org(), b.id).await.unwrap();

        let schedules = store.list_schedules(&org()).await.unwrap();
        let active: Vec<_> = schedules.iter().filter(|s| s.is_active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, b.id);
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let store = InMemoryStore::new();
        let stored = store
            .insert_enrollment_exclusive(&org(), enrollment(Uuid::new_v4()))
            .await
            .unwrap();

        let other = OrganizationId::new("other");
        assert!(store.get_enrollment(&other, stored.id).await.unwrap().is_none());
        assert_eq!(store.count_active_enrollments(&other).await.unwrap(), 0);
    }

    fn expired_event(target: Uuid) -> NotificationEvent {
        NotificationEvent {
            organization_id: org(),
            kind: NotificationKind::EnrollmentExpired,
            title: "Enrollment expired".to_string(),
            message: "expired".to_string(),
            priority: NotificationPriority::High,
            target_entity_id: target,
        }
    }

    #[tokio::test]
    async fn test_outbox_dedups_and_tracks_delivery() {
        let store = InMemoryStore::new();
        let event = expired_event(Uuid::new_v4());
        let key = event.key(at().date());

        assert!(store.enqueue_notification(&org(), key, event.clone()).await.unwrap());
        assert!(!store.enqueue_notification(&org(), key, event.clone()).await.unwrap());

        let pending = store.undelivered_notifications(&org()).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key, key);

        store.mark_delivered(&org(), key).await.unwrap();
        assert!(store.undelivered_notifications(&org()).await.unwrap().is_empty());
        // Delivered keys still dedup.
        assert!(!store.enqueue_notification(&org(), key, event).await.unwrap());
    }

    #[tokio::test]
    async fn test_undelivered_notifications_are_oldest_first() {
        let store = InMemoryStore::new();
        let first = expired_event(Uuid::new_v4());
        let second = expired_event(Uuid::new_v4());
        store
            .enqueue_notification(&org(), first.key(at().date()), first.clone())
            .await
            .unwrap();
        store
            .enqueue_notification(&org(), second.key(at().date()), second.clone())
            .await
            .unwrap();

        let pending = store.undelivered_notifications(&org()).await.unwrap();
        let targets: Vec<Uuid> = pending.iter().map(|p| p.event.target_entity_id).collect();
        assert_eq!(targets, vec![first.target_entity_id, second.target_entity_id]);
    }

    #[tokio::test]
    async fn test_check_in_insert_rejects_stale_enrollment_version() {
        let store = InMemoryStore::new();
        let stored = store
            .insert_enrollment_exclusive(&org(), enrollment(Uuid::new_v4()))
            .await
            .unwrap();
        let record = AttendanceRecord::open(&stored, at(), "staff", None);

        let mut paused = stored.clone();
        paused.transition_to(EnrollmentStatus::Paused, at()).unwrap();
        paused.pause_reason = Some("holiday".to_string());
        store.update_enrollment(&org(), paused).await.unwrap();

        let result = store
            .insert_attendance_if_no_open(&org(), record, stored.version)
            .await;
        assert!(matches!(result, Err(EngineError::Conflict { .. })));
        assert_eq!(store.count_open_attendance(&org()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_check_in_insert_rejects_version_moved_on() {
        let store = InMemoryStore::new();
        let stored = store
            .insert_enrollment_exclusive(&org(), enrollment(Uuid::new_v4()))
            .await
            .unwrap();
        let record = AttendanceRecord::open(&stored, at(), "staff", None);
        store.update_enrollment(&org(), stored.clone()).await.unwrap();

        let result = store
            .insert_attendance_if_no_open(&org(), record, stored.version)
            .await;
        assert!(matches!(result, Err(EngineError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_revision_moves_on_write() {
        let store = InMemoryStore::new();
        let before = store.revision(&org()).await.unwrap();
        store.insert_schedule(&org(), schedule("A")).await.unwrap();
        assert!(store.revision(&org()).await.unwrap() > before);
    }
}
