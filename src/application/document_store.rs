// Document store trait for telemetry data access
use crate::domain::telemetry::TelemetryDocument;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch telemetry documents of one device within `[start, end)`
    async fn fetch(
        &self,
        device_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<TelemetryDocument>>;

    /// Fetch the reference dataset (mold to cycle-time mapping) stored
    /// under a fixed device identifier, independent of time range
    async fn fetch_reference(
        &self,
        reference_device_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<TelemetryDocument>>;
}
