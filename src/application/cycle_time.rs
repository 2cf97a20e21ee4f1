// Cycle-time lookup against the mold mapping reference dataset
use crate::application::document_store::DocumentStore;
use crate::domain::telemetry::{FieldCodes, TelemetryDocument};
use std::time::Duration;

/// Cycle time of the first mapping entry named like the mold, when it is a
/// finite positive number; `0.0` otherwise.
pub fn find_cycle_time(mapping: &[TelemetryDocument], codes: &FieldCodes, mold: &str) -> f64 {
    mapping
        .iter()
        .find(|entry| entry.matches_mold(&codes.mapping_name, mold))
        .and_then(|entry| entry.number(&codes.mapping_cycle_time))
        .filter(|seconds| *seconds > 0.0)
        .unwrap_or(0.0)
}

/// Fetch the mapping and resolve the cycle time. Store failures and timeouts
/// degrade to `0.0` ("unknown"), which disables the downtime penalty.
pub async fn lookup_cycle_time(
    store: &dyn DocumentStore,
    reference_device_id: &str,
    limit: usize,
    timeout: Duration,
    codes: &FieldCodes,
    mold: &str,
) -> f64 {
    match tokio::time::timeout(timeout, store.fetch_reference(reference_device_id, limit)).await {
        Ok(Ok(mapping)) => {
            let seconds = find_cycle_time(&mapping, codes, mold);
            tracing::debug!("Cycle time for {}: {}s ({} mapping entries)", mold, seconds, mapping.len());
            seconds
        }
        Ok(Err(e)) => {
            tracing::warn!("Mold mapping fetch failed, cycle time unknown: {:#}", e);
            0.0
        }
        Err(_) => {
            tracing::warn!("Mold mapping fetch timed out after {:?}", timeout);
            0.0
        }
    }
}
