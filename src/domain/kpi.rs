// KPI result domain models
use super::period::{TimeRange, YearMonth};
use serde::Serialize;

/// Machine and mold the KPIs were computed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub machine: String,
    pub mold: String,
}

impl Selection {
    pub fn new(machine: impl Into<String>, mold: impl Into<String>) -> Self {
        Self {
            machine: machine.into(),
            mold: mold.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyEntry {
    pub month: YearMonth,
    pub units_produced: f64,
    pub defect_units: f64,
    pub defect_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySeries {
    pub months: Vec<MonthlyEntry>,
    pub synthetic: bool,
}

impl MonthlySeries {
    pub fn total_units(&self) -> f64 {
        self.months.iter().map(|m| m.units_produced).sum()
    }

    pub fn total_defects(&self) -> f64 {
        self.months.iter().map(|m| m.defect_units).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionTargetEntry {
    pub month: YearMonth,
    pub actual: f64,
    pub target: f64,
    pub attainment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionVsTarget {
    pub months: Vec<ProductionTargetEntry>,
    pub synthetic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectionReasonEntry {
    pub reason: String,
    pub count: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectionBreakdown {
    pub reasons: Vec<RejectionReasonEntry>,
    pub synthetic: bool,
}

/// Snapshot of every KPI for one selection. Built once per request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiResult {
    pub selection: Selection,
    pub range: TimeRange,
    pub total_units: f64,
    pub total_rejections: f64,
    pub post_event_defect_rate: f64,
    pub total_downtime_hours: f64,
    pub mold_health_index: f64,
    pub top_reasons: Vec<RejectionReasonEntry>,
    pub matched_documents: usize,
    pub synthetic: bool,
}

/// `part / whole * 100`, or 0 when `whole` is not positive.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole * 100.0 } else { 0.0 }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
