//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use office_monitor::alerts::{AlertMeta, AlertStore, DetectorReport, OpenOutcome};
use office_monitor::context::{SiteContext, Space};
use office_monitor::telemetry::TelemetryReading;
use office_monitor::twin::{DevicePatch, TwinStore};
use office_monitor::{
    config::DebounceConfig, Alert, AlertEngine, AlertKind, EngineDeps, EventSink, InMemoryStore, LiveEvent,
    ManualClock, MessageRouter, MonitorError, MonitorResult, Verdict,
};

/// Monday 2025-03-03 12:00 UTC.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap()
}

pub fn at(minutes: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(minutes)
}

pub fn co2(ppm: f64) -> TelemetryReading {
    TelemetryReading {
        co2_ppm: Some(ppm),
        ..TelemetryReading::default()
    }
}

pub fn occupancy(people: u32) -> TelemetryReading {
    TelemetryReading {
        occupancy: Some(people),
        ..TelemetryReading::default()
    }
}

/// Sink that keeps every published event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LiveEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<LiveEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.event_type() == event_type)
            .count()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: LiveEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Alert store whose writes can be switched to fail.
pub struct FlakyAlerts {
    pub inner: Arc<InMemoryStore>,
    pub failing: AtomicBool,
}

impl FlakyAlerts {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> MonitorResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MonitorError::Store {
                reason: "database unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AlertStore for FlakyAlerts {
    async fn open_if_absent(&self, office_id: &str, kind: AlertKind, meta: AlertMeta) -> MonitorResult<OpenOutcome> {
        self.check()?;
        self.inner.open_if_absent(office_id, kind, meta).await
    }

    async fn resolve_if_open(&self, office_id: &str, kind: AlertKind) -> MonitorResult<Option<Alert>> {
        self.check()?;
        self.inner.resolve_if_open(office_id, kind).await
    }

    async fn active_alerts(&self, office_id: &str) -> MonitorResult<Vec<Alert>> {
        self.inner.active_alerts(office_id).await
    }

    async fn alert(&self, id: Uuid) -> MonitorResult<Option<Alert>> {
        self.inner.alert(id).await
    }
}

/// Site context whose business-hours lookup always fails.
pub struct HoursUnavailable {
    pub inner: Arc<InMemoryStore>,
}

#[async_trait]
impl SiteContext for HoursUnavailable {
    async fn space_for_office(&self, office_id: &str) -> MonitorResult<Option<Space>> {
        self.inner.space_for_office(office_id).await
    }

    async fn is_within_business_hours(&self, _office_id: &str, _at: DateTime<Utc>) -> MonitorResult<bool> {
        Err(MonitorError::Lookup {
            reason: "office hours service timed out".to_string(),
        })
    }

    async fn has_active_reservation(&self, space_id: &str, at: DateTime<Utc>) -> MonitorResult<bool> {
        self.inner.has_active_reservation(space_id, at).await
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryStore>,
    pub sink: Arc<RecordingSink>,
    pub engine: Arc<AlertEngine>,
    pub router: MessageRouter,
}

impl Harness {
    pub fn new() -> Self {
        Self::wrapped(|store| (store.clone() as Arc<dyn AlertStore>, store as Arc<dyn SiteContext>))
    }

    /// Build with replacement alert store and site context around the
    /// shared in-memory store.
    pub fn wrapped(
        wrap: impl FnOnce(Arc<InMemoryStore>) -> (Arc<dyn AlertStore>, Arc<dyn SiteContext>),
    ) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(InMemoryStore::new(clock.clone()));
        let sink = Arc::new(RecordingSink::default());
        let (alerts, site) = wrap(store.clone());

        let engine = Arc::new(AlertEngine::new(
            EngineDeps {
                alerts,
                twin: store.clone(),
                site,
                sink: sink.clone(),
                clock: clock.clone(),
            },
            &DebounceConfig::default(),
        ));
        let router = MessageRouter::new(engine.clone(), store.clone(), sink.clone());

        Self {
            clock,
            store,
            sink,
            engine,
            router,
        }
    }

    /// Desired config with a 900 ppm threshold.
    pub async fn configure_device(&self, office_id: &str) {
        self.store
            .upsert_desired(
                office_id,
                DevicePatch {
                    sampling_interval_sec: Some(30),
                    co2_alert_threshold: Some(900),
                },
            )
            .await
            .unwrap();
    }

    pub async fn add_space(&self, office_id: &str, capacity: u32) -> String {
        let id = format!("space-{office_id}");
        self.store
            .add_space(Space {
                id: id.clone(),
                office_external_id: office_id.to_string(),
                name: format!("Room {office_id}"),
                capacity,
            })
            .await;
        id
    }

    /// Process a reading at `minutes` past [`t0`].
    pub async fn send(&self, office_id: &str, minutes: i64, reading: TelemetryReading) -> Vec<DetectorReport> {
        self.clock.set(at(minutes));
        self.engine.process(office_id, &reading).await
    }

    pub async fn active(&self, office_id: &str) -> Vec<Alert> {
        self.store.active_alerts(office_id).await.unwrap()
    }
}

pub fn verdict(reports: &[DetectorReport], kind: AlertKind) -> &Verdict {
    &reports
        .iter()
        .find(|report| report.kind == kind)
        .expect("every detector reports")
        .verdict
}
