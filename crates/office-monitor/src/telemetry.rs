//! Telemetry envelope parsing.
//!
//! Topics follow `sites/{site}/offices/{office}/{channel}`. Payloads are
//! decoded as JSON when possible and passed through as text otherwise, so a
//! broken sensor still shows up on the live feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{MonitorError, MonitorResult};

/// Last segment of a device topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicChannel {
    /// Sensor readings.
    Telemetry,
    /// Configuration the device reports it is running with.
    Reported,
    /// Configuration echoed back by the device after applying it.
    Desired,
}

impl TopicChannel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Telemetry => "telemetry",
            Self::Reported => "reported",
            Self::Desired => "desired",
        }
    }
}

impl fmt::Display for TopicChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopicChannel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "telemetry" => Ok(Self::Telemetry),
            "reported" => Ok(Self::Reported),
            "desired" => Ok(Self::Desired),
            _ => Err(()),
        }
    }
}

/// Identifiers extracted from a device topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRoute {
    pub site_id: String,
    pub office_id: String,
    pub channel: TopicChannel,
}

impl TopicRoute {
    pub fn new(site_id: impl Into<String>, office_id: impl Into<String>, channel: TopicChannel) -> Self {
        Self {
            site_id: site_id.into(),
            office_id: office_id.into(),
            channel,
        }
    }

    /// Parse a raw topic string.
    pub fn parse(topic: &str) -> MonitorResult<Self> {
        let unrecognized = || MonitorError::UnrecognizedTopic {
            topic: topic.to_string(),
        };

        let parts: Vec<&str> = topic.split('/').collect();
        let [sites, site_id, offices, office_id, channel] = parts.as_slice() else {
            return Err(unrecognized());
        };

        if *sites != "sites" || *offices != "offices" || site_id.is_empty() || office_id.is_empty()
        {
            return Err(unrecognized());
        }

        let channel = channel.parse::<TopicChannel>().map_err(|()| unrecognized())?;

        Ok(Self::new(*site_id, *office_id, channel))
    }

    /// Canonical topic string for this route.
    pub fn topic(&self) -> String {
        format!(
            "sites/{}/offices/{}/{}",
            self.site_id, self.office_id, self.channel
        )
    }
}

/// Decoded message body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    /// Body that failed to parse as JSON, kept verbatim (lossy UTF-8).
    Raw(String),
}

impl Payload {
    pub fn decode(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Raw(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    /// JSON view used on the live feed; raw text becomes a JSON string.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Raw(text) => Value::String(text.clone()),
        }
    }
}

/// A demultiplexed message with its routing metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub route: TopicRoute,
    pub topic: String,
    pub payload: Payload,
    pub received_at: DateTime<Utc>,
}

impl Envelope {
    /// Decode a `(topic, payload)` pair. Only an unrecognized topic is an
    /// error; an unparseable body becomes [`Payload::Raw`].
    pub fn decode(topic: &str, bytes: &[u8], received_at: DateTime<Utc>) -> MonitorResult<Self> {
        let route = TopicRoute::parse(topic)?;
        Ok(Self {
            route,
            topic: topic.to_string(),
            payload: Payload::decode(bytes),
            received_at,
        })
    }
}

/// Sensor values carried by a telemetry message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co2_ppm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupancy: Option<u32>,
    /// Device-side timestamp, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl TelemetryReading {
    /// Extract a reading from a JSON body. Returns `None` for non-objects;
    /// fields of the wrong type are treated as absent.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        let co2_ppm = object
            .get("co2_ppm")
            .and_then(Value::as_f64)
            .filter(|ppm| ppm.is_finite());

        let occupancy = object
            .get("occupancy")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok());

        let ts = object.get("ts").and_then(Value::as_str).map(str::to_string);

        Some(Self {
            co2_ppm,
            occupancy,
            ts,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.co2_ppm.is_none() && self.occupancy.is_none()
    }
}
