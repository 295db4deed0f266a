//! Desired vs. reported configuration diff.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::store::TwinStore;
use super::types::{DeviceDesired, DeviceReported, TwinField};
use crate::error::MonitorResult;

/// One diverging field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub desired: u32,
    pub reported: u32,
}

/// Outcome of comparing an office's desired and reported configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStateComparison {
    pub is_synced: bool,
    pub diff: BTreeMap<TwinField, FieldDiff>,
}

/// Compare two configurations. A field only diverges when the device has
/// reported it and the value differs.
pub fn diff(desired: &DeviceDesired, reported: Option<&DeviceReported>) -> DeviceStateComparison {
    let diff: BTreeMap<TwinField, FieldDiff> = reported
        .map(|reported| {
            TwinField::ALL
                .into_iter()
                .filter_map(|field| {
                    let want = field.desired(desired);
                    let have = field.reported(reported)?;
                    (want != have).then_some((
                        field,
                        FieldDiff {
                            desired: want,
                            reported: have,
                        },
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    DeviceStateComparison {
        is_synced: diff.is_empty(),
        diff,
    }
}

/// Compare the stored twin rows for one office. Returns `None` when no
/// desired configuration exists.
pub async fn compare(store: &dyn TwinStore, office_id: &str) -> MonitorResult<Option<DeviceStateComparison>> {
    let Some(desired) = store.desired(office_id).await? else {
        return Ok(None);
    };
    let reported = store.reported(office_id).await?;

    Ok(Some(diff(&desired, reported.as_ref())))
}
