//! Alert detection for office telemetry.
//!
//! Three detectors share one debounced state machine:
//!
//! | Kind | Anomalous when | Opens after | Resolves after |
//! |---|---|---|---|
//! | `CO2` | `co2_ppm > desired threshold` | 5 min | 2 min |
//! | `OCCUPANCY_MAX` | `occupancy > space capacity` | 2 min | 1 min |
//! | `OCCUPANCY_UNEXPECTED` | occupied outside hours, or open without a booking | 10 min | 5 min, or at once when empty |
//!
//! Windows are configurable through [`crate::config::DebounceConfig`].

pub mod detectors;
pub mod engine;
pub mod store;
pub mod tracking;
pub mod types;

pub use detectors::{Assessment, Detector, UnexpectedReason};
pub use engine::{AlertEngine, DetectorReport, EngineDeps, Verdict};
pub use store::{AlertStore, OpenOutcome};
pub use tracking::{DebounceWindow, Observation, Phase, Step, TrackingRegistry, TrackingState};
pub use types::{Alert, AlertKind, AlertMeta, AlertStatus};
