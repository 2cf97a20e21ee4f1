// HTTP document store implementation
use crate::application::document_store::DocumentStore;
use crate::domain::telemetry::TelemetryDocument;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct HttpDocumentStore {
    base_url: String,
    identity_header: String,
    identity_token: String,
    client: reqwest::Client,
}

/// The store answers either with a bare array or with `{ "data": [...] }`.
/// Elements stay raw so one malformed entry cannot fail the whole batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DocumentsPayload {
    List(Vec<Value>),
    Wrapped { data: Vec<Value> },
}

impl DocumentsPayload {
    fn into_documents(self) -> Vec<TelemetryDocument> {
        let raw = match self {
            DocumentsPayload::List(values) => values,
            DocumentsPayload::Wrapped { data } => data,
        };
        let total = raw.len();
        let documents: Vec<TelemetryDocument> = raw
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();
        if documents.len() < total {
            tracing::debug!("Skipped {} malformed documents of {}", total - documents.len(), total);
        }
        documents
    }
}

impl HttpDocumentStore {
    pub fn new(base_url: String, identity_header: String, identity_token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            identity_header,
            identity_token,
            client: reqwest::Client::new(),
        }
    }

    fn telemetry_url(
        &self,
        device_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> String {
        format!(
            "{}/api/devices/{}/telemetry?startTs={}&endTs={}&limit={}",
            self.base_url,
            urlencoding::encode(device_id),
            start.timestamp_millis(),
            end.timestamp_millis(),
            limit
        )
    }

    fn reference_url(&self, reference_device_id: &str, limit: usize) -> String {
        format!(
            "{}/api/devices/{}/telemetry?limit={}",
            self.base_url,
            urlencoding::encode(reference_device_id),
            limit
        )
    }

    async fn get_documents(&self, url: &str, device_id: &str) -> Result<Vec<TelemetryDocument>> {
        let mut request = self.client.get(url).header("Accept", "application/json");
        if !self.identity_token.is_empty() {
            request = request.header(self.identity_header.as_str(), self.identity_token.as_str());
        }

        let response = request
            .send()
            .await
            .context("Failed to send request to document store")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Document store request failed with status {}: {}", status, body);
        }

        let payload = response
            .json::<DocumentsPayload>()
            .await
            .context("Failed to parse document store response")?;

        Ok(tag_device(payload.into_documents(), device_id))
    }
}

/// Documents may omit `deviceId`; they belong to the device that was queried.
fn tag_device(mut documents: Vec<TelemetryDocument>, device_id: &str) -> Vec<TelemetryDocument> {
    for doc in documents.iter_mut().filter(|d| d.device_id.is_empty()) {
        doc.device_id = device_id.to_string();
    }
    documents
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn fetch(
        &self,
        device_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TelemetryDocument>> {
        let url = self.telemetry_url(device_id, start, end, limit);
        tracing::debug!("Fetching telemetry: {}", url);
        self.get_documents(&url, device_id).await
    }

    async fn fetch_reference(
        &self,
        reference_device_id: &str,
        limit: usize,
    ) -> Result<Vec<TelemetryDocument>> {
        let url = self.reference_url(reference_device_id, limit);
        tracing::debug!("Fetching reference dataset: {}", url);
        self.get_documents(&url, reference_device_id).await
    }
}
