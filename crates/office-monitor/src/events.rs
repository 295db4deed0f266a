//! Events pushed to live subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::alerts::{Alert, AlertKind};
use crate::telemetry::Envelope;

/// Event on the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// Every telemetry message, parsed or not.
    #[serde(rename_all = "camelCase")]
    Telemetry {
        site_id: String,
        office_id: String,
        topic: String,
        payload: Value,
        /// `true` when the body was not valid JSON and `payload` is the raw text.
        raw: bool,
        received_at: DateTime<Utc>,
    },

    #[serde(rename_all = "camelCase")]
    AlertOpened {
        office_id: String,
        kind: AlertKind,
        alert: Alert,
    },

    #[serde(rename_all = "camelCase")]
    AlertResolved {
        office_id: String,
        kind: AlertKind,
        alert: Alert,
    },
}

impl LiveEvent {
    pub fn telemetry(envelope: &Envelope) -> Self {
        Self::Telemetry {
            site_id: envelope.route.site_id.clone(),
            office_id: envelope.route.office_id.clone(),
            topic: envelope.topic.clone(),
            payload: envelope.payload.to_value(),
            raw: envelope.payload.is_raw(),
            received_at: envelope.received_at,
        }
    }

    pub fn alert_opened(alert: &Alert) -> Self {
        Self::AlertOpened {
            office_id: alert.office_id.clone(),
            kind: alert.kind,
            alert: alert.clone(),
        }
    }

    pub fn alert_resolved(alert: &Alert) -> Self {
        Self::AlertResolved {
            office_id: alert.office_id.clone(),
            kind: alert.kind,
            alert: alert.clone(),
        }
    }

    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Telemetry { .. } => "telemetry",
            Self::AlertOpened { .. } => "alert_opened",
            Self::AlertResolved { .. } => "alert_resolved",
        }
    }
}

/// Fire-and-forget destination for live events. Implementations must not
/// block the caller and never fail it.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: LiveEvent);
}

impl EventSink for notify::Notifier {
    fn publish(&self, event: LiveEvent) {
        self.notify(&event);
    }
}
