//! The three detectors.
//!
//! Each detector turns one reading plus its context into an [`Assessment`].
//! The predicates are plain functions; [`Detector::assess`] only adds the
//! lookups. Everything else (timers, store calls, events) is shared by the
//! engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::tracking::{DebounceWindow, LastObserved, Observation};
use super::types::{AlertKind, AlertMeta};
use crate::context::SiteContext;
use crate::error::MonitorResult;
use crate::telemetry::TelemetryReading;
use crate::twin::TwinStore;

/// Detector input after lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub observation: Observation,
    /// Snapshot stored on the alert when it opens.
    pub meta: AlertMeta,
    pub observed: LastObserved,
}

/// Why occupancy was unexpected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnexpectedReason {
    OutsideBusinessHours,
    NoActiveReservation,
}

impl UnexpectedReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OutsideBusinessHours => "outside_business_hours",
            Self::NoActiveReservation => "no_active_reservation",
        }
    }
}

fn meta<const N: usize>(entries: [(&str, Value); N]) -> AlertMeta {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// CO₂ above the configured threshold.
pub fn assess_co2(co2_ppm: f64, threshold: u32) -> Assessment {
    let observation = if co2_ppm > f64::from(threshold) {
        Observation::anomalous()
    } else {
        Observation::normal()
    };

    Assessment {
        observation,
        meta: meta([("co2_ppm", json!(co2_ppm)), ("threshold", json!(threshold))]),
        observed: LastObserved {
            co2_ppm: Some(co2_ppm),
            occupancy: None,
        },
    }
}

/// More people than the space holds.
pub fn assess_occupancy_max(occupancy: u32, capacity: u32) -> Assessment {
    let observation = if occupancy > capacity {
        Observation::anomalous()
    } else {
        Observation::normal()
    };

    Assessment {
        observation,
        meta: meta([("occupancy", json!(occupancy)), ("capacity", json!(capacity))]),
        observed: LastObserved {
            co2_ppm: None,
            occupancy: Some(occupancy),
        },
    }
}

/// Occupied while closed, or open but not booked. An empty room clears the
/// alert immediately.
///
/// `has_active_reservation` is `None` when it was not needed to decide
/// (empty room, or outside business hours).
pub fn assess_unexpected_occupancy(
    occupancy: u32,
    within_business_hours: Option<bool>,
    has_active_reservation: Option<bool>,
) -> Assessment {
    let observed = LastObserved {
        co2_ppm: None,
        occupancy: Some(occupancy),
    };

    let reason = match (occupancy, within_business_hours, has_active_reservation) {
        (0, _, _) => None,
        (_, Some(false), _) => Some(UnexpectedReason::OutsideBusinessHours),
        (_, Some(true), Some(false)) => Some(UnexpectedReason::NoActiveReservation),
        _ => None,
    };

    let observation = match reason {
        Some(_) => Observation::anomalous(),
        None if occupancy == 0 => Observation::cleared(),
        None => Observation::normal(),
    };

    let mut snapshot = meta([("occupancy", json!(occupancy))]);
    if let Some(reason) = reason {
        snapshot.insert("reason".to_string(), json!(reason.as_str()));
    }
    if let Some(within) = within_business_hours {
        snapshot.insert("within_business_hours".to_string(), json!(within));
    }
    if let Some(reserved) = has_active_reservation {
        snapshot.insert("has_active_reservation".to_string(), json!(reserved));
    }

    Assessment {
        observation,
        meta: snapshot,
        observed,
    }
}

/// Collaborators a detector may consult.
#[derive(Clone, Copy)]
pub struct Lookups<'a> {
    pub twin: &'a dyn TwinStore,
    pub site: &'a dyn SiteContext,
}

/// One debounced detector: a kind plus its windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detector {
    pub kind: AlertKind,
    pub window: DebounceWindow,
}

impl Detector {
    pub const fn new(kind: AlertKind, window: DebounceWindow) -> Self {
        Self { kind, window }
    }

    /// Classify a reading. `Ok(None)` means the detector does not apply:
    /// the metric is missing or the office lacks the needed configuration.
    pub async fn assess(
        &self,
        office_id: &str,
        reading: &TelemetryReading,
        now: DateTime<Utc>,
        lookups: Lookups<'_>,
    ) -> MonitorResult<Option<Assessment>> {
        match self.kind {
            AlertKind::Co2 => {
                let Some(co2_ppm) = reading.co2_ppm else {
                    return Ok(None);
                };
                let Some(desired) = lookups.twin.desired(office_id).await? else {
                    return Ok(None);
                };
                Ok(Some(assess_co2(co2_ppm, desired.co2_alert_threshold)))
            }

            AlertKind::OccupancyMax => {
                let Some(occupancy) = reading.occupancy else {
                    return Ok(None);
                };
                let Some(space) = lookups.site.space_for_office(office_id).await? else {
                    return Ok(None);
                };
                Ok(Some(assess_occupancy_max(occupancy, space.capacity)))
            }

            AlertKind::OccupancyUnexpected => {
                let Some(occupancy) = reading.occupancy else {
                    return Ok(None);
                };
                let Some(space) = lookups.site.space_for_office(office_id).await? else {
                    return Ok(None);
                };
                if occupancy == 0 {
                    return Ok(Some(assess_unexpected_occupancy(0, None, None)));
                }

                let within = lookups.site.is_within_business_hours(office_id, now).await?;
                let reserved = if within {
                    Some(lookups.site.has_active_reservation(&space.id, now).await?)
                } else {
                    None
                };

                Ok(Some(assess_unexpected_occupancy(
                    occupancy,
                    Some(within),
                    reserved,
                )))
            }
        }
    }
}
