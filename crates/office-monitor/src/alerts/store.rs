//! Alert storage interface.

use async_trait::async_trait;
use uuid::Uuid;

use super::types::{Alert, AlertKind, AlertMeta};
use crate::error::MonitorResult;

/// Result of an idempotent open.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOutcome {
    pub alert: Alert,
    /// `true` when this call created the alert, `false` when one was
    /// already open (its meta may have been refreshed).
    pub created: bool,
}

/// Persistence for alerts. Implementations guarantee at most one open
/// alert per `(office_id, kind)`.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Open an alert unless one is already open for the pair.
    async fn open_if_absent(&self, office_id: &str, kind: AlertKind, meta: AlertMeta) -> MonitorResult<OpenOutcome>;

    /// Resolve the open alert for the pair. `Ok(None)` when none was open.
    async fn resolve_if_open(&self, office_id: &str, kind: AlertKind) -> MonitorResult<Option<Alert>>;

    /// Open alerts of an office, newest first.
    async fn active_alerts(&self, office_id: &str) -> MonitorResult<Vec<Alert>>;

    /// Single alert by id.
    async fn alert(&self, id: Uuid) -> MonitorResult<Option<Alert>>;
}
