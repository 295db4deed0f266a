//! Debounce tracking per `(office, kind)`.
//!
//! [`TrackingState::step`] is the pure decision: it moves the anomaly/normal
//! timers and says whether the caller should try to open or resolve an
//! alert. The engine performs the store call and then reports back with
//! [`TrackingState::record_opened`], [`TrackingState::settle_resolved`] or
//! [`TrackingState::record_nothing_to_resolve`].
//!
//! ```text
//!            anomalous                 held >= open_after
//!   Quiet ─────────────► AnomalyPending ───────────────────► Open
//!     ▲                      │    ▲                          │  ▲
//!     │        normal        │    │ anomalous       normal   │  │ anomalous
//!     └──────────────────────┘    └──────────── Recovering ◄─┘  │
//!     ▲                                             │  └────────┘
//!     └──────── resolved (held >= resolve_after) ───┘
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::types::AlertKind;

/// How long a condition must hold before an alert opens or resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceWindow {
    pub open_after: Duration,
    pub resolve_after: Duration,
}

impl DebounceWindow {
    pub fn minutes(open_after: i64, resolve_after: i64) -> Self {
        Self {
            open_after: Duration::minutes(open_after),
            resolve_after: Duration::minutes(resolve_after),
        }
    }
}

/// Classification of one reading by a detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub anomalous: bool,
    /// Resolve without waiting for the normal window.
    pub instant_resolve: bool,
}

impl Observation {
    pub const fn anomalous() -> Self {
        Self {
            anomalous: true,
            instant_resolve: false,
        }
    }

    pub const fn normal() -> Self {
        Self {
            anomalous: false,
            instant_resolve: false,
        }
    }

    pub const fn cleared() -> Self {
        Self {
            anomalous: false,
            instant_resolve: true,
        }
    }
}

/// What the caller should do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Anomalous, window not yet elapsed.
    Pending,
    /// Anomalous long enough: open (idempotently).
    Open,
    /// Normal, window not yet elapsed.
    Recovering,
    /// Normal long enough: resolve (idempotently).
    Resolve,
}

/// Diagnostic view of a tracking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Quiet,
    AnomalyPending,
    Open,
    Recovering,
}

/// Last metric values a detector looked at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LastObserved {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co2_ppm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupancy: Option<u32>,
}

/// Timers for one `(office, kind)`. `anomaly_since` and `normal_since`
/// are never both set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingState {
    pub anomaly_since: Option<DateTime<Utc>>,
    pub normal_since: Option<DateTime<Utc>>,
    pub last_observed: LastObserved,
    /// Whether the store last reported an open alert for this key.
    pub alert_open: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

impl TrackingState {
    /// Advance the timers for one observation taken at `now`.
    pub fn step(&mut self, observation: Observation, now: DateTime<Utc>, window: &DebounceWindow) -> Step {
        self.last_seen = Some(now);

        if observation.anomalous {
            let since = *self.anomaly_since.get_or_insert(now);
            self.normal_since = None;

            if now - since >= window.open_after {
                Step::Open
            } else {
                Step::Pending
            }
        } else {
            let since = *self.normal_since.get_or_insert(now);
            // Any normal reading breaks the anomaly streak.
            self.anomaly_since = None;

            if observation.instant_resolve || now - since >= window.resolve_after {
                Step::Resolve
            } else {
                Step::Recovering
            }
        }
    }

    /// The store confirmed an open alert (new or existing).
    pub fn record_opened(&mut self) {
        self.alert_open = true;
    }

    /// The store resolved an open alert: back to quiet.
    pub fn settle_resolved(&mut self) {
        self.anomaly_since = None;
        self.normal_since = None;
        self.alert_open = false;
    }

    /// A resolve found nothing open. Timers are left running.
    pub fn record_nothing_to_resolve(&mut self) {
        self.alert_open = false;
    }

    pub fn phase(&self) -> Phase {
        match (self.anomaly_since, self.normal_since, self.alert_open) {
            (Some(_), _, true) => Phase::Open,
            (Some(_), _, false) => Phase::AnomalyPending,
            (None, Some(_), true) => Phase::Recovering,
            (None, _, true) => Phase::Open,
            (None, _, false) => Phase::Quiet,
        }
    }
}

/// Registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackingKey {
    pub office_id: String,
    pub kind: AlertKind,
}

impl TrackingKey {
    pub fn new(office_id: impl Into<String>, kind: AlertKind) -> Self {
        Self {
            office_id: office_id.into(),
            kind,
        }
    }
}

/// In-memory tracking states owned by one engine.
///
/// Each key has its own async mutex: updates to the same key serialize,
/// different keys proceed in parallel.
#[derive(Debug, Default)]
pub struct TrackingRegistry {
    entries: RwLock<HashMap<TrackingKey, Arc<Mutex<TrackingState>>>>,
}

impl TrackingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for a key, created on first use.
    pub async fn entry(&self, office_id: &str, kind: AlertKind) -> Arc<Mutex<TrackingState>> {
        let key = TrackingKey::new(office_id, kind);

        if let Some(entry) = self.entries.read().await.get(&key) {
            return Arc::clone(entry);
        }

        let mut entries = self.entries.write().await;
        Arc::clone(entries.entry(key).or_default())
    }

    /// Copy of the current state, if the key has been seen.
    pub async fn snapshot(&self, office_id: &str, kind: AlertKind) -> Option<TrackingState> {
        let entry = {
            let entries = self.entries.read().await;
            Arc::clone(entries.get(&TrackingKey::new(office_id, kind))?)
        };
        let state = entry.lock().await;
        Some(state.clone())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop keys not seen within `ttl` of `now`. Entries currently held by
    /// a detector are kept. Returns the number of evicted keys.
    pub async fn sweep_idle(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();

        entries.retain(|_, entry| {
            if Arc::strong_count(entry) > 1 {
                return true;
            }
            match entry.try_lock() {
                Ok(state) => state.last_seen.is_some_and(|seen| now - seen < ttl),
                Err(_) => true,
            }
        });

        before - entries.len()
    }
}
