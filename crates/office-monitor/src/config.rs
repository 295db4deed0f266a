//! Monitor configuration loaded from an optional TOML file.
//!
//! ```toml
//! [debounce.co2]
//! open_after_secs = 300
//! resolve_after_secs = 120
//!
//! [tracking]
//! idle_ttl_secs = 86400
//!
//! [[spaces]]
//! id = "space-1"
//! office_external_id = "OFFICE_1"
//! capacity = 8
//!
//! [[office_hours]]
//! office_id = "OFFICE_1"
//! open = "09:00"
//! close = "18:00"
//! timezone = "America/Sao_Paulo"
//!
//! [[devices]]
//! office_id = "OFFICE_1"
//! sampling_interval_sec = 30
//! co2_alert_threshold = 900
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::alerts::{AlertKind, DebounceWindow};
use crate::context::{OfficeHours, Reservation, Space};
use crate::error::{MonitorError, MonitorResult};
use crate::twin::DeviceDesired;

/// Open/resolve delays for one alert kind, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub open_after_secs: u64,
    pub resolve_after_secs: u64,
}

impl WindowConfig {
    const fn minutes(open: u64, resolve: u64) -> Self {
        Self {
            open_after_secs: open * 60,
            resolve_after_secs: resolve * 60,
        }
    }

    fn to_window(self) -> DebounceWindow {
        DebounceWindow {
            open_after: secs(self.open_after_secs),
            resolve_after: secs(self.resolve_after_secs),
        }
    }
}

fn secs(value: u64) -> Duration {
    Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX / 1_000))
}

/// Debounce windows per alert kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    pub co2: WindowConfig,
    pub occupancy_max: WindowConfig,
    pub occupancy_unexpected: WindowConfig,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            co2: WindowConfig::minutes(5, 2),
            occupancy_max: WindowConfig::minutes(2, 1),
            occupancy_unexpected: WindowConfig::minutes(10, 5),
        }
    }
}

impl DebounceConfig {
    pub fn window(&self, kind: AlertKind) -> DebounceWindow {
        match kind {
            AlertKind::Co2 => self.co2,
            AlertKind::OccupancyMax => self.occupancy_max,
            AlertKind::OccupancyUnexpected => self.occupancy_unexpected,
        }
        .to_window()
    }
}

/// Eviction policy for in-memory tracking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Keys idle longer than this are dropped by the sweep.
    pub idle_ttl_secs: u64,
    /// How often the sweep runs.
    pub sweep_interval_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 60 * 60,
        }
    }
}

impl TrackingConfig {
    pub fn idle_ttl(&self) -> Duration {
        secs(self.idle_ttl_secs)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceSeed {
    pub id: String,
    pub office_external_id: String,
    #[serde(default)]
    pub name: String,
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficeHoursSeed {
    pub office_id: String,
    /// `HH:MM`
    pub open: String,
    /// `HH:MM`
    pub close: String,
    /// IANA zone name, UTC when omitted.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSeed {
    pub id: String,
    pub space_id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSeed {
    pub office_id: String,
    pub sampling_interval_sec: u32,
    pub co2_alert_threshold: u32,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub debounce: DebounceConfig,
    pub tracking: TrackingConfig,
    pub spaces: Vec<SpaceSeed>,
    pub office_hours: Vec<OfficeHoursSeed>,
    pub reservations: Vec<ReservationSeed>,
    pub devices: Vec<DeviceSeed>,
}

/// Seed records after validation.
#[derive(Debug, Clone, Default)]
pub struct SeedData {
    pub spaces: Vec<Space>,
    pub office_hours: Vec<(String, OfficeHours)>,
    pub reservations: Vec<Reservation>,
    pub devices: Vec<(String, DeviceDesired)>,
}

impl MonitorConfig {
    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> MonitorResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> MonitorResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.seed_data()?;
        Ok(config)
    }

    /// Validate seed records and convert them to domain types.
    pub fn seed_data(&self) -> MonitorResult<SeedData> {
        let invalid = |reason: String| MonitorError::Config { reason };

        let spaces = self
            .spaces
            .iter()
            .map(|s| {
                if s.capacity == 0 {
                    return Err(invalid(format!("space '{}' must have a positive capacity", s.id)));
                }
                Ok(Space {
                    id: s.id.clone(),
                    office_external_id: s.office_external_id.clone(),
                    name: s.name.clone(),
                    capacity: s.capacity,
                })
            })
            .collect::<MonitorResult<Vec<_>>>()?;

        let office_hours = self
            .office_hours
            .iter()
            .map(|h| {
                OfficeHours::parse(&h.open, &h.close, &h.timezone)
                    .map(|hours| (h.office_id.clone(), hours))
                    .map_err(|e| invalid(format!("office '{}': {e}", h.office_id)))
            })
            .collect::<MonitorResult<Vec<_>>>()?;

        let reservations = self
            .reservations
            .iter()
            .map(|r| {
                if r.ends_at <= r.starts_at {
                    return Err(invalid(format!("reservation '{}' must end after it starts", r.id)));
                }
                Ok(Reservation {
                    id: r.id.clone(),
                    space_id: r.space_id.clone(),
                    starts_at: r.starts_at,
                    ends_at: r.ends_at,
                })
            })
            .collect::<MonitorResult<Vec<_>>>()?;

        let devices = self
            .devices
            .iter()
            .map(|d| {
                if d.sampling_interval_sec == 0 || d.co2_alert_threshold == 0 {
                    return Err(invalid(format!(
                        "device for office '{}' needs positive sampling interval and threshold",
                        d.office_id
                    )));
                }
                Ok((
                    d.office_id.clone(),
                    DeviceDesired {
                        sampling_interval_sec: d.sampling_interval_sec,
                        co2_alert_threshold: d.co2_alert_threshold,
                    },
                ))
            })
            .collect::<MonitorResult<Vec<_>>>()?;

        Ok(SeedData {
            spaces,
            office_hours,
            reservations,
            devices,
        })
    }
}
