use crate::application::kpi_service::KpiSettings;
use crate::application::post_event::{DOWNTIME_KEYWORDS, PRODUCTION_KEYWORDS};
use crate::domain::telemetry::FieldCodes;
use anyhow::Context;
use chrono::FixedOffset;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub store: StoreSettings,
    #[serde(default)]
    pub plant: PlantSettings,
    #[serde(default)]
    pub kpi: KpiSection,
    #[serde(default)]
    pub fields: FieldCodes,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub base_url: String,
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
    #[serde(default)]
    pub identity_token: String,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    pub reference_device_id: String,
    #[serde(default = "default_reference_limit")]
    pub reference_limit: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_identity_header() -> String {
    "X-Authorization".to_string()
}

fn default_fetch_limit() -> usize {
    10_000
}

fn default_reference_limit() -> usize {
    1_000
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PlantSettings {
    pub utc_offset_minutes: i32,
    pub cycle_boundary_hour: u32,
}

impl Default for PlantSettings {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            cycle_boundary_hour: 8,
        }
    }
}

impl PlantSettings {
    pub fn offset(&self) -> anyhow::Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .with_context(|| format!("invalid plant UTC offset: {} minutes", self.utc_offset_minutes))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct KpiSection {
    pub top_reasons: usize,
    pub downtime_keywords: Vec<String>,
    pub production_keywords: Vec<String>,
    /// Fixed seed for degraded-mode placeholders; random when unset.
    pub synthetic_seed: Option<u64>,
}

impl Default for KpiSection {
    fn default() -> Self {
        Self {
            top_reasons: 3,
            downtime_keywords: DOWNTIME_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            production_keywords: PRODUCTION_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            synthetic_seed: None,
        }
    }
}

impl AppConfig {
    pub fn kpi_settings(&self) -> anyhow::Result<KpiSettings> {
        Ok(KpiSettings {
            fetch_limit: self.store.fetch_limit,
            reference_device_id: self.store.reference_device_id.clone(),
            reference_limit: self.store.reference_limit,
            timeout: Duration::from_secs(self.store.timeout_secs),
            top_reasons: self.kpi.top_reasons,
            offset: self.plant.offset()?,
            codes: self.fields.clone(),
        })
    }
}

/// Load `config/kpi.*`, overridden by `KPI_<SECTION>__<KEY>` environment variables
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/kpi").required(false))
        .add_source(
            config::Environment::with_prefix("KPI")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
