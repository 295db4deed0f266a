//! Message routing.
//!
//! Every inbound `(topic, payload)` pair goes through [`MessageRouter::handle`],
//! which never fails: bad input and failing collaborators are logged and
//! reported back as a [`Disposition`].

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::alerts::{AlertEngine, DetectorReport};
use crate::error::{MonitorError, MonitorResult};
use crate::events::{EventSink, LiveEvent};
use crate::telemetry::{Envelope, TelemetryReading, TopicChannel};
use crate::twin::{compare, DeviceDesired, DevicePatch, DeviceStateComparison, TwinStore};

/// What happened to one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Topic did not match `sites/{site}/offices/{office}/{channel}`.
    Dropped,
    /// Telemetry broadcast; `reports` is empty when the body was not a JSON
    /// object.
    Telemetry { reports: Vec<DetectorReport> },
    /// Reported config stored; comparison is `None` without a desired row.
    Reported(Option<DeviceStateComparison>),
    /// Desired config stored.
    Desired(DeviceDesired),
    /// Twin message refused.
    Rejected(String),
}

pub struct MessageRouter {
    engine: Arc<AlertEngine>,
    twin: Arc<dyn TwinStore>,
    sink: Arc<dyn EventSink>,
}

impl MessageRouter {
    pub fn new(engine: Arc<AlertEngine>, twin: Arc<dyn TwinStore>, sink: Arc<dyn EventSink>) -> Self {
        Self { engine, twin, sink }
    }

    pub fn engine(&self) -> &Arc<AlertEngine> {
        &self.engine
    }

    pub async fn handle(&self, topic: &str, payload: &[u8]) -> Disposition {
        let received_at = self.engine.clock().now();

        let envelope = match Envelope::decode(topic, payload, received_at) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(topic, error = %e, "Dropping message");
                return Disposition::Dropped;
            }
        };

        match envelope.route.channel {
            TopicChannel::Telemetry => self.handle_telemetry(&envelope).await,
            TopicChannel::Reported => self.handle_reported(&envelope).await,
            TopicChannel::Desired => self.handle_desired(&envelope).await,
        }
    }

    async fn handle_telemetry(&self, envelope: &Envelope) -> Disposition {
        self.sink.publish(LiveEvent::telemetry(envelope));

        let office_id = envelope.route.office_id.as_str();
        let Some(reading) = envelope.payload.as_json().and_then(TelemetryReading::from_value) else {
            warn!(
                topic = %envelope.topic,
                raw = envelope.payload.is_raw(),
                "Telemetry body is not a JSON object, skipping detectors"
            );
            return Disposition::Telemetry { reports: Vec::new() };
        };

        if reading.is_empty() {
            debug!(office_id, "Telemetry carries no co2_ppm or occupancy");
        }

        let reports = self.engine.process_at(office_id, &reading, envelope.received_at).await;
        Disposition::Telemetry { reports }
    }

    fn patch(envelope: &Envelope) -> MonitorResult<DevicePatch> {
        let body = envelope.payload.as_json().ok_or_else(|| MonitorError::InvalidPayload {
            reason: "device twin body is not valid JSON".to_string(),
        })?;
        DevicePatch::from_value(body)
    }

    async fn handle_reported(&self, envelope: &Envelope) -> Disposition {
        let office_id = envelope.route.office_id.as_str();
        let patch = match Self::patch(envelope) {
            Ok(patch) => patch,
            Err(e) => return Self::reject(envelope, &e),
        };

        if let Err(e) = self.twin.upsert_reported(office_id, patch).await {
            return Self::reject(envelope, &e);
        }

        match compare(self.twin.as_ref(), office_id).await {
            Ok(Some(comparison)) => {
                if comparison.is_synced {
                    debug!(office_id, "Device configuration in sync");
                } else {
                    let diff = serde_json::to_string(&comparison.diff).unwrap_or_default();
                    warn!(office_id, %diff, "Device configuration diverges from desired");
                }
                Disposition::Reported(Some(comparison))
            }
            Ok(None) => {
                debug!(office_id, "No desired configuration to compare against");
                Disposition::Reported(None)
            }
            Err(e) => {
                warn!(office_id, error = %e, "Failed to compare device configuration");
                Disposition::Reported(None)
            }
        }
    }

    async fn handle_desired(&self, envelope: &Envelope) -> Disposition {
        let office_id = envelope.route.office_id.as_str();
        let patch = match Self::patch(envelope) {
            Ok(patch) => patch,
            Err(e) => return Self::reject(envelope, &e),
        };

        match self.twin.upsert_desired(office_id, patch).await {
            Ok(desired) => {
                info!(office_id, desired = %desired.to_wire(), "Desired configuration updated from device");
                Disposition::Desired(desired)
            }
            Err(e) => Self::reject(envelope, &e),
        }
    }

    fn reject(envelope: &Envelope, err: &MonitorError) -> Disposition {
        if err.is_malformed_input() || matches!(err, MonitorError::IncompleteDesired { .. }) {
            warn!(topic = %envelope.topic, error = %err, "Rejected device twin message");
        } else {
            error!(topic = %envelope.topic, error = %err, "Failed to store device twin message");
        }
        Disposition::Rejected(err.to_string())
    }
}
