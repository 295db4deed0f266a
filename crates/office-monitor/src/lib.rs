//! Office telemetry monitor.
//!
//! Consumes sensor messages published on
//! `sites/{site}/offices/{office}/{telemetry|reported|desired}` and:
//!
//! - fans every telemetry message out to live subscribers,
//! - runs three debounced detectors (CO₂, over-capacity, unexpected
//!   occupancy) that open and resolve alerts,
//! - keeps a device twin per office and reports when the configuration a
//!   device runs with drifts from the desired one.
//!
//! Storage and business context sit behind the [`twin::TwinStore`],
//! [`alerts::AlertStore`] and [`context::SiteContext`] traits;
//! [`memory::InMemoryStore`] implements all three.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alerts;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod ingest;
pub mod memory;
pub mod telemetry;
pub mod twin;

pub use alerts::{Alert, AlertEngine, AlertKind, AlertStatus, EngineDeps, Verdict};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MonitorConfig;
pub use error::{MonitorError, MonitorResult};
pub use events::{EventSink, LiveEvent};
pub use ingest::{Disposition, MessageRouter};
pub use memory::InMemoryStore;
