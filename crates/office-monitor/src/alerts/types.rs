//! Core types for the alert system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Free-form snapshot of the condition that opened an alert.
pub type AlertMeta = Map<String, Value>;

/// The fixed set of alert kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    /// CO₂ above the device's configured threshold
    Co2,
    /// More people than the space holds
    OccupancyMax,
    /// People present outside hours or without a booking
    OccupancyUnexpected,
}

impl AlertKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Co2 => "CO2",
            Self::OccupancyMax => "OCCUPANCY_MAX",
            Self::OccupancyUnexpected => "OCCUPANCY_UNEXPECTED",
        }
    }

    /// Human-readable title.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Co2 => "High CO2 Concentration",
            Self::OccupancyMax => "Occupancy Over Capacity",
            Self::OccupancyUnexpected => "Unexpected Occupancy",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Open,
    Resolved,
}

/// A persisted alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    pub office_id: String,
    pub kind: AlertKind,
    pub status: AlertStatus,
    pub started_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub meta: AlertMeta,
}

impl Alert {
    /// A freshly opened alert.
    pub fn open(office_id: impl Into<String>, kind: AlertKind, meta: AlertMeta, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            office_id: office_id.into(),
            kind,
            status: AlertStatus::Open,
            started_at: at,
            resolved_at: None,
            updated_at: at,
            meta,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == AlertStatus::Open
    }

    /// Mark resolved at `at`.
    pub fn resolve(&mut self, at: DateTime<Utc>) {
        self.status = AlertStatus::Resolved;
        self.resolved_at = Some(at);
        self.updated_at = at;
    }

    /// Replace the meta snapshot. Returns whether anything changed;
    /// `started_at` is never touched.
    pub fn refresh_meta(&mut self, meta: AlertMeta, at: DateTime<Utc>) -> bool {
        if self.meta == meta {
            return false;
        }
        self.meta = meta;
        self.updated_at = at;
        true
    }
}
