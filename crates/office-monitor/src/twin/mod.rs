//! Device twin: desired vs. reported configuration per office.

pub mod reconcile;
pub mod store;
pub mod types;

pub use reconcile::{compare, diff, DeviceStateComparison, FieldDiff};
pub use store::TwinStore;
pub use types::{DeviceDesired, DevicePatch, DeviceReported, TwinField};
