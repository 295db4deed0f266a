//! In-memory backing store.
//!
//! Implements [`TwinStore`], [`AlertStore`] and [`SiteContext`] over
//! `RwLock`-guarded maps. Used by the binary and by tests; a database
//! backed store would implement the same traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::alerts::{Alert, AlertKind, AlertMeta, AlertStore, OpenOutcome};
use crate::clock::Clock;
use crate::config::SeedData;
use crate::context::{OfficeHours, Reservation, SiteContext, Space};
use crate::error::MonitorResult;
use crate::twin::types::TwinRecord;
use crate::twin::{DeviceDesired, DevicePatch, DeviceReported, TwinStore};

#[derive(Debug, Default)]
struct AlertTable {
    alerts: HashMap<Uuid, Alert>,
    /// Open alert per `(office_id, kind)`.
    open: HashMap<(String, AlertKind), Uuid>,
}

#[derive(Debug, Default)]
struct SiteTable {
    spaces: HashMap<String, Space>,
    hours: HashMap<String, OfficeHours>,
    reservations: Vec<Reservation>,
}

/// Process-local store for twins, alerts and site context.
pub struct InMemoryStore {
    clock: Arc<dyn Clock>,
    desired: RwLock<HashMap<String, TwinRecord<DeviceDesired>>>,
    reported: RwLock<HashMap<String, TwinRecord<DeviceReported>>>,
    alerts: RwLock<AlertTable>,
    site: RwLock<SiteTable>,
}

impl InMemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            desired: RwLock::new(HashMap::new()),
            reported: RwLock::new(HashMap::new()),
            alerts: RwLock::new(AlertTable::default()),
            site: RwLock::new(SiteTable::default()),
        }
    }

    /// Register a space, keyed by its office external id.
    pub async fn add_space(&self, space: Space) {
        self.site
            .write()
            .await
            .spaces
            .insert(space.office_external_id.clone(), space);
    }

    pub async fn set_office_hours(&self, office_id: &str, hours: OfficeHours) {
        self.site.write().await.hours.insert(office_id.to_string(), hours);
    }

    pub async fn add_reservation(&self, reservation: Reservation) {
        self.site.write().await.reservations.push(reservation);
    }

    /// Load validated seed records.
    pub async fn seed(&self, data: SeedData) -> MonitorResult<()> {
        for space in data.spaces {
            self.add_space(space).await;
        }
        for (office_id, hours) in data.office_hours {
            self.set_office_hours(&office_id, hours).await;
        }
        for reservation in data.reservations {
            self.add_reservation(reservation).await;
        }
        for (office_id, desired) in data.devices {
            self.upsert_desired(&office_id, desired.into()).await?;
        }
        Ok(())
    }

    /// Stored desired row with its bookkeeping.
    pub async fn desired_record(&self, office_id: &str) -> Option<TwinRecord<DeviceDesired>> {
        self.desired.read().await.get(office_id).cloned()
    }

    pub async fn reported_record(&self, office_id: &str) -> Option<TwinRecord<DeviceReported>> {
        self.reported.read().await.get(office_id).cloned()
    }

    /// Every alert ever stored for an office, open or not.
    pub async fn alert_history(&self, office_id: &str) -> Vec<Alert> {
        let table = self.alerts.read().await;
        let mut alerts: Vec<Alert> = table
            .alerts
            .values()
            .filter(|alert| alert.office_id == office_id)
            .cloned()
            .collect();
        alerts.sort_by_key(|alert| alert.started_at);
        alerts
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[async_trait]
impl TwinStore for InMemoryStore {
    async fn desired(&self, office_id: &str) -> MonitorResult<Option<DeviceDesired>> {
        Ok(self.desired.read().await.get(office_id).map(|record| record.config))
    }

    async fn reported(&self, office_id: &str) -> MonitorResult<Option<DeviceReported>> {
        Ok(self.reported.read().await.get(office_id).map(|record| record.config))
    }

    async fn upsert_desired(&self, office_id: &str, patch: DevicePatch) -> MonitorResult<DeviceDesired> {
        let mut rows = self.desired.write().await;
        let current = rows.get(office_id).map(|record| record.config);
        let config = patch.apply_desired(office_id, current)?;

        rows.insert(
            office_id.to_string(),
            TwinRecord {
                office_id: office_id.to_string(),
                config,
                updated_at: self.now(),
            },
        );
        Ok(config)
    }

    async fn upsert_reported(&self, office_id: &str, patch: DevicePatch) -> MonitorResult<DeviceReported> {
        let mut rows = self.reported.write().await;
        let current = rows.get(office_id).map(|record| record.config).unwrap_or_default();
        let config = patch.apply_reported(current);

        rows.insert(
            office_id.to_string(),
            TwinRecord {
                office_id: office_id.to_string(),
                config,
                updated_at: self.now(),
            },
        );
        Ok(config)
    }
}

#[async_trait]
impl AlertStore for InMemoryStore {
    async fn open_if_absent(&self, office_id: &str, kind: AlertKind, meta: AlertMeta) -> MonitorResult<OpenOutcome> {
        let now = self.now();
        let mut table = self.alerts.write().await;
        let key = (office_id.to_string(), kind);

        if let Some(id) = table.open.get(&key).copied() {
            if let Some(alert) = table.alerts.get_mut(&id) {
                if alert.refresh_meta(meta, now) {
                    debug!(office_id, kind = %kind, alert_id = %id, "Refreshed open alert meta");
                }
                return Ok(OpenOutcome {
                    alert: alert.clone(),
                    created: false,
                });
            }
        }

        let alert = Alert::open(office_id, kind, meta, now);
        table.open.insert(key, alert.id);
        table.alerts.insert(alert.id, alert.clone());

        Ok(OpenOutcome {
            alert,
            created: true,
        })
    }

    async fn resolve_if_open(&self, office_id: &str, kind: AlertKind) -> MonitorResult<Option<Alert>> {
        let now = self.now();
        let mut table = self.alerts.write().await;

        let Some(id) = table.open.remove(&(office_id.to_string(), kind)) else {
            return Ok(None);
        };

        Ok(table.alerts.get_mut(&id).map(|alert| {
            alert.resolve(now);
            alert.clone()
        }))
    }

    async fn active_alerts(&self, office_id: &str) -> MonitorResult<Vec<Alert>> {
        let table = self.alerts.read().await;
        let mut alerts: Vec<Alert> = table
            .open
            .iter()
            .filter(|((office, _), _)| office == office_id)
            .filter_map(|(_, id)| table.alerts.get(id).cloned())
            .collect();
        alerts.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(alerts)
    }

    async fn alert(&self, id: Uuid) -> MonitorResult<Option<Alert>> {
        Ok(self.alerts.read().await.alerts.get(&id).cloned())
    }
}

#[async_trait]
impl SiteContext for InMemoryStore {
    async fn space_for_office(&self, office_id: &str) -> MonitorResult<Option<Space>> {
        Ok(self.site.read().await.spaces.get(office_id).cloned())
    }

    async fn is_within_business_hours(&self, office_id: &str, at: DateTime<Utc>) -> MonitorResult<bool> {
        Ok(self
            .site
            .read()
            .await
            .hours
            .get(office_id)
            .map_or(true, |hours| hours.contains(at)))
    }

    async fn has_active_reservation(&self, space_id: &str, at: DateTime<Utc>) -> MonitorResult<bool> {
        Ok(self
            .site
            .read()
            .await
            .reservations
            .iter()
            .any(|r| r.space_id == space_id && r.covers(at)))
    }
}
