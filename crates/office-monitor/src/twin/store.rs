//! Device twin storage interface.

use async_trait::async_trait;

use super::types::{DeviceDesired, DevicePatch, DeviceReported};
use crate::error::MonitorResult;

/// Persistence for desired and reported device configuration, one row of
/// each per office.
#[async_trait]
pub trait TwinStore: Send + Sync {
    /// Desired configuration, if the office has been configured.
    async fn desired(&self, office_id: &str) -> MonitorResult<Option<DeviceDesired>>;

    /// Last configuration reported by the device, if any.
    async fn reported(&self, office_id: &str) -> MonitorResult<Option<DeviceReported>>;

    /// Create or update the desired row. Creating requires every field.
    async fn upsert_desired(&self, office_id: &str, patch: DevicePatch) -> MonitorResult<DeviceDesired>;

    /// Create or update the reported row; absent fields keep their value.
    async fn upsert_reported(&self, office_id: &str, patch: DevicePatch) -> MonitorResult<DeviceReported>;
}
