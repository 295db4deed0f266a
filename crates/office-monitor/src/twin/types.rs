//! Device twin records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

use crate::error::{MonitorError, MonitorResult};

/// Wire name of the sampling interval field.
pub const WIRE_SAMPLING_INTERVAL: &str = "samplingIntervalSec";
/// Wire name of the CO₂ threshold field (differs from the internal name).
pub const WIRE_CO2_THRESHOLD: &str = "co2_alert_threshold";

/// Configuration an operator wants a device to run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDesired {
    pub sampling_interval_sec: u32,
    pub co2_alert_threshold: u32,
}

impl DeviceDesired {
    /// JSON body published on the retained `desired` topic.
    pub fn to_wire(&self) -> Value {
        let mut body = Map::new();
        body.insert(WIRE_SAMPLING_INTERVAL.to_string(), json!(self.sampling_interval_sec));
        body.insert(WIRE_CO2_THRESHOLD.to_string(), json!(self.co2_alert_threshold));
        Value::Object(body)
    }
}

/// Configuration a device says it is running with. Either field may be
/// missing until the device reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceReported {
    pub sampling_interval_sec: Option<u32>,
    pub co2_alert_threshold: Option<u32>,
}

/// Partial update parsed from a `reported` or `desired` message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DevicePatch {
    pub sampling_interval_sec: Option<u32>,
    pub co2_alert_threshold: Option<u32>,
}

impl DevicePatch {
    /// Parse a twin message body using the on-wire field names.
    pub fn from_value(value: &Value) -> MonitorResult<Self> {
        let object = value.as_object().ok_or_else(|| MonitorError::InvalidPayload {
            reason: "device twin body must be a JSON object".to_string(),
        })?;

        let patch = Self {
            sampling_interval_sec: positive_field(object.get(WIRE_SAMPLING_INTERVAL), WIRE_SAMPLING_INTERVAL)?,
            co2_alert_threshold: positive_field(object.get(WIRE_CO2_THRESHOLD), WIRE_CO2_THRESHOLD)?,
        };

        if patch.is_empty() {
            return Err(MonitorError::InvalidPayload {
                reason: format!("expected {WIRE_SAMPLING_INTERVAL} and/or {WIRE_CO2_THRESHOLD}"),
            });
        }

        Ok(patch)
    }

    pub fn is_empty(&self) -> bool {
        self.sampling_interval_sec.is_none() && self.co2_alert_threshold.is_none()
    }

    /// Overlay this patch on an existing reported record.
    pub fn apply_reported(&self, current: DeviceReported) -> DeviceReported {
        DeviceReported {
            sampling_interval_sec: self.sampling_interval_sec.or(current.sampling_interval_sec),
            co2_alert_threshold: self.co2_alert_threshold.or(current.co2_alert_threshold),
        }
    }

    /// Overlay this patch on the current desired record, or build a new one
    /// when every field is present.
    pub fn apply_desired(
        &self,
        office_id: &str,
        current: Option<DeviceDesired>,
    ) -> MonitorResult<DeviceDesired> {
        if let Some(current) = current {
            return Ok(DeviceDesired {
                sampling_interval_sec: self.sampling_interval_sec.unwrap_or(current.sampling_interval_sec),
                co2_alert_threshold: self.co2_alert_threshold.unwrap_or(current.co2_alert_threshold),
            });
        }

        match (self.sampling_interval_sec, self.co2_alert_threshold) {
            (Some(sampling_interval_sec), Some(co2_alert_threshold)) => Ok(DeviceDesired {
                sampling_interval_sec,
                co2_alert_threshold,
            }),
            (None, _) => Err(MonitorError::IncompleteDesired {
                office_id: office_id.to_string(),
                missing: WIRE_SAMPLING_INTERVAL.to_string(),
            }),
            (_, None) => Err(MonitorError::IncompleteDesired {
                office_id: office_id.to_string(),
                missing: WIRE_CO2_THRESHOLD.to_string(),
            }),
        }
    }
}

impl From<DeviceDesired> for DevicePatch {
    fn from(desired: DeviceDesired) -> Self {
        Self {
            sampling_interval_sec: Some(desired.sampling_interval_sec),
            co2_alert_threshold: Some(desired.co2_alert_threshold),
        }
    }
}

fn positive_field(value: Option<&Value>, field: &str) -> MonitorResult<Option<u32>> {
    let Some(value) = value else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }

    value
        .as_u64()
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| MonitorError::InvalidField {
            field: field.to_string(),
            reason: format!("must be a positive integer, got {value}"),
        })
}

/// Stored twin row with bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwinRecord<T> {
    pub office_id: String,
    #[serde(flatten)]
    pub config: T,
    pub updated_at: DateTime<Utc>,
}

/// Twin configuration field compared by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TwinField {
    #[serde(rename = "samplingIntervalSec")]
    SamplingIntervalSec,
    #[serde(rename = "co2AlertThreshold")]
    Co2AlertThreshold,
}

impl TwinField {
    pub const ALL: [Self; 2] = [Self::SamplingIntervalSec, Self::Co2AlertThreshold];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SamplingIntervalSec => "samplingIntervalSec",
            Self::Co2AlertThreshold => "co2AlertThreshold",
        }
    }

    pub const fn desired(self, desired: &DeviceDesired) -> u32 {
        match self {
            Self::SamplingIntervalSec => desired.sampling_interval_sec,
            Self::Co2AlertThreshold => desired.co2_alert_threshold,
        }
    }

    pub const fn reported(self, reported: &DeviceReported) -> Option<u32> {
        match self {
            Self::SamplingIntervalSec => reported.sampling_interval_sec,
            Self::Co2AlertThreshold => reported.co2_alert_threshold,
        }
    }
}

impl fmt::Display for TwinField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
