//! Alert tracking engine.
//!
//! Runs the three detectors for every telemetry reading, drives their
//! tracking states and turns debounce crossings into store calls and live
//! events. A detector that cannot get its context or reach the store logs
//! and does nothing for that reading; its siblings are unaffected.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::detectors::{Detector, Lookups};
use super::store::AlertStore;
use super::tracking::{Step, TrackingRegistry};
use super::types::{Alert, AlertKind};
use crate::clock::Clock;
use crate::config::DebounceConfig;
use crate::context::SiteContext;
use crate::events::{EventSink, LiveEvent};
use crate::telemetry::TelemetryReading;
use crate::twin::TwinStore;

/// Outcome of one detector for one reading.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Metric absent or office not configured for this kind.
    Skipped,
    /// A lookup or store call failed; no alert was opened or resolved.
    Degraded(String),
    /// Anomalous, still inside the open window.
    Pending,
    /// Normal reading, nothing to resolve yet (or nothing open).
    Normal,
    /// This reading opened a new alert.
    Opened(Alert),
    /// Alert was already open; its meta may have been refreshed.
    StillOpen(Alert),
    /// This reading resolved the open alert.
    Resolved(Alert),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorReport {
    pub kind: AlertKind,
    pub verdict: Verdict,
}

/// Collaborators the engine is wired with.
#[derive(Clone)]
pub struct EngineDeps {
    pub alerts: Arc<dyn AlertStore>,
    pub twin: Arc<dyn TwinStore>,
    pub site: Arc<dyn SiteContext>,
    pub sink: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
}

pub struct AlertEngine {
    deps: EngineDeps,
    registry: TrackingRegistry,
    co2: Detector,
    occupancy_max: Detector,
    occupancy_unexpected: Detector,
}

impl AlertEngine {
    pub fn new(deps: EngineDeps, debounce: &DebounceConfig) -> Self {
        Self {
            deps,
            registry: TrackingRegistry::new(),
            co2: Detector::new(AlertKind::Co2, debounce.window(AlertKind::Co2)),
            occupancy_max: Detector::new(
                AlertKind::OccupancyMax,
                debounce.window(AlertKind::OccupancyMax),
            ),
            occupancy_unexpected: Detector::new(
                AlertKind::OccupancyUnexpected,
                debounce.window(AlertKind::OccupancyUnexpected),
            ),
        }
    }

    pub fn registry(&self) -> &TrackingRegistry {
        &self.registry
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.deps.clock
    }

    /// Evaluate one telemetry reading for an office, at the current clock time.
    pub async fn process(&self, office_id: &str, reading: &TelemetryReading) -> Vec<DetectorReport> {
        let now = self.deps.clock.now();
        self.process_at(office_id, reading, now).await
    }

    /// Evaluate one reading as if processed at `now`.
    pub async fn process_at(
        &self,
        office_id: &str,
        reading: &TelemetryReading,
        now: DateTime<Utc>,
    ) -> Vec<DetectorReport> {
        let (co2, occupancy_max, occupancy_unexpected) = tokio::join!(
            self.run(&self.co2, office_id, reading, now),
            self.run(&self.occupancy_max, office_id, reading, now),
            self.run(&self.occupancy_unexpected, office_id, reading, now),
        );
        vec![co2, occupancy_max, occupancy_unexpected]
    }

    async fn run(
        &self,
        detector: &Detector,
        office_id: &str,
        reading: &TelemetryReading,
        now: DateTime<Utc>,
    ) -> DetectorReport {
        let kind = detector.kind;
        let report = |verdict| DetectorReport { kind, verdict };

        let lookups = Lookups {
            twin: self.deps.twin.as_ref(),
            site: self.deps.site.as_ref(),
        };

        let assessment = match detector.assess(office_id, reading, now, lookups).await {
            Ok(Some(assessment)) => assessment,
            Ok(None) => return report(Verdict::Skipped),
            Err(e) => {
                warn!(office_id, kind = %kind, error = %e, "Detector context unavailable, skipping reading");
                return report(Verdict::Degraded(e.to_string()));
            }
        };

        let entry = self.registry.entry(office_id, kind).await;
        let mut state = entry.lock().await;
        state.last_observed = assessment.observed;

        let step = state.step(assessment.observation, now, &detector.window);
        debug!(office_id, kind = %kind, ?step, phase = ?state.phase(), "Tracked reading");

        let verdict = match step {
            Step::Pending => Verdict::Pending,
            Step::Recovering => Verdict::Normal,

            Step::Open => match self
                .deps
                .alerts
                .open_if_absent(office_id, kind, assessment.meta)
                .await
            {
                Ok(outcome) => {
                    state.record_opened();
                    if outcome.created {
                        info!(
                            office_id,
                            kind = %kind,
                            alert_id = %outcome.alert.id,
                            title = kind.name(),
                            "Alert opened"
                        );
                        self.deps.sink.publish(LiveEvent::alert_opened(&outcome.alert));
                        Verdict::Opened(outcome.alert)
                    } else {
                        Verdict::StillOpen(outcome.alert)
                    }
                }
                Err(e) => {
                    warn!(office_id, kind = %kind, error = %e, "Failed to open alert");
                    Verdict::Degraded(e.to_string())
                }
            },

            Step::Resolve => match self.deps.alerts.resolve_if_open(office_id, kind).await {
                Ok(Some(alert)) => {
                    state.settle_resolved();
                    info!(office_id, kind = %kind, alert_id = %alert.id, "Alert resolved");
                    self.deps.sink.publish(LiveEvent::alert_resolved(&alert));
                    Verdict::Resolved(alert)
                }
                Ok(None) => {
                    state.record_nothing_to_resolve();
                    Verdict::Normal
                }
                Err(e) => {
                    warn!(office_id, kind = %kind, error = %e, "Failed to resolve alert");
                    Verdict::Degraded(e.to_string())
                }
            },
        };

        report(verdict)
    }
}
