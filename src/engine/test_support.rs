//! Shared fixtures for engine tests.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::config::{EngineSettings, OperatingHours};
use crate::models::{
    BillingMode, EnrollmentTerms, GuardianContact, NewChild, NewRateSchedule, OrganizationId,
    RateSchedule, RateTiers,
};
use crate::store::{InMemoryStore, Store};

use super::{DaycareEngine, Enrolled, MemoryNotificationSink, PaymentRecorder};

pub(crate) fn org() -> OrganizationId {
    OrganizationId::new("sunrise")
}

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub(crate) fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, mi, 0).unwrap()
}

pub(crate) fn standard_tiers() -> RateTiers {
    RateTiers {
        hourly_rate: Decimal::from(100),
        min_chargeable_minutes: 60,
        half_day_rate: Decimal::from(350),
        half_day_hours: Decimal::from(4),
        full_day_rate: Decimal::from(600),
        full_day_hours: Decimal::from(8),
        grace_period_minutes: 15,
        late_pickup_rate_per_hour: Decimal::from(150),
        billing_mode: BillingMode::PerSession,
    }
}

pub(crate) fn schedule_input(name: &str, tiers: RateTiers) -> NewRateSchedule {
    NewRateSchedule {
        name: name.to_string(),
        tiers,
        monthly_unlimited_rate: Decimal::from(9000),
        registration_fee: Decimal::from(2000),
        security_deposit: Decimal::from(5000),
    }
}

pub(crate) fn intake(first_name: &str) -> NewChild {
    NewChild {
        first_name: first_name.to_string(),
        last_name: "Rao".to_string(),
        date_of_birth: date(2022, 5, 1),
        guardian: GuardianContact {
            name: "Meera Rao".to_string(),
            phone: "555-0100".to_string(),
            email: Some("meera@example.com".to_string()),
            relationship: Some("mother".to_string()),
        },
        medical_flags: vec!["peanut allergy".to_string()],
    }
}

pub(crate) fn terms(start: NaiveDate, end: Option<NaiveDate>) -> EnrollmentTerms {
    EnrollmentTerms {
        start_date: start,
        end_date: end,
        rate_schedule_id: None,
        custom_rates: None,
    }
}

pub(crate) struct Harness {
    pub engine: DaycareEngine,
    pub sink: MemoryNotificationSink,
    pub schedule: RateSchedule,
}

impl Harness {
    pub(crate) async fn new() -> Self {
        let mut settings = EngineSettings::default();
        settings.operating_hours = OperatingHours {
            closing_time: NaiveTime::from_hms_opt(18, 30, 0),
        };
        Self::with_settings(settings).await
    }

    pub(crate) async fn with_settings(settings: EngineSettings) -> Self {
        let sink = MemoryNotificationSink::new();
        let engine = DaycareEngine::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(sink.clone()),
            settings,
        );
        Self::seeded(engine, sink).await
    }

    pub(crate) async fn with_payment_recorder(
        store: Arc<dyn Store>,
        payments: Arc<dyn PaymentRecorder>,
    ) -> Self {
        let sink = MemoryNotificationSink::new();
        let engine = DaycareEngine::with_payment_recorder(
            store,
            Arc::new(sink.clone()),
            payments,
            EngineSettings::default(),
        );
        Self::seeded(engine, sink).await
    }

    async fn seeded(engine: DaycareEngine, sink: MemoryNotificationSink) -> Self {
        let at = dt(2026, 1, 1, 8, 0);
        let schedule = engine
            .lifecycle()
            .create_schedule(&org(), schedule_input("Standard", standard_tiers()), at)
            .await
            .unwrap();
        let schedule = engine
            .lifecycle()
            .activate_schedule(&org(), schedule.id)
            .await
            .unwrap();
        Self {
            engine,
            sink,
            schedule,
        }
    }

    pub(crate) async fn enroll(
        &self,
        first_name: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Enrolled {
        self.engine
            .lifecycle()
            .enroll(&org(), intake(first_name), terms(start, end), dt(2026, 1, 1, 9, 0))
            .await
            .unwrap()
    }
}
