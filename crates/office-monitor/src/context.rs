//! Business context the detectors consult: which space an office maps to,
//! when the office is open, and whether someone booked the space.

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{MonitorError, MonitorResult};

/// A bookable space backed by one office sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    pub id: String,
    /// Office id as it appears in device topics.
    pub office_external_id: String,
    #[serde(default)]
    pub name: String,
    pub capacity: u32,
}

/// Daily opening window of an office, in the office's local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficeHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    /// IANA zone the window is expressed in.
    pub timezone: Tz,
}

impl OfficeHours {
    /// Parse `HH:MM` open/close strings and an IANA zone name such as
    /// `Europe/Lisbon`.
    pub fn parse(open: &str, close: &str, timezone: &str) -> MonitorResult<Self> {
        let timezone = Tz::from_str(timezone).map_err(|e| MonitorError::InvalidField {
            field: "timezone".to_string(),
            reason: format!("'{timezone}' is not an IANA time zone ({e})"),
        })?;
        Ok(Self {
            open: parse_hhmm(open)?,
            close: parse_hhmm(close)?,
            timezone,
        })
    }

    /// Whether `at` falls inside the window. Local time is truncated to the
    /// minute and both ends are inclusive; `close < open` wraps past midnight.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.timezone).time();
        let minute = NaiveTime::from_hms_opt(local.hour(), local.minute(), 0).unwrap_or(local);

        if self.open <= self.close {
            self.open <= minute && minute <= self.close
        } else {
            minute >= self.open || minute <= self.close
        }
    }
}

fn parse_hhmm(value: &str) -> MonitorResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| MonitorError::InvalidField {
        field: "office_hours".to_string(),
        reason: format!("'{value}' is not HH:MM ({e})"),
    })
}

/// A time-boxed booking of a space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: String,
    pub space_id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl Reservation {
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && at <= self.ends_at
    }
}

/// Lookups the occupancy detectors depend on.
#[async_trait]
pub trait SiteContext: Send + Sync {
    /// Space whose external office id matches, if any.
    async fn space_for_office(&self, office_id: &str) -> MonitorResult<Option<Space>>;

    /// Whether the office is open at `at`. Offices without configured hours
    /// are always open.
    async fn is_within_business_hours(&self, office_id: &str, at: DateTime<Utc>) -> MonitorResult<bool>;

    /// Whether any reservation of the space covers `at`.
    async fn has_active_reservation(&self, space_id: &str, at: DateTime<Utc>) -> MonitorResult<bool>;
}
