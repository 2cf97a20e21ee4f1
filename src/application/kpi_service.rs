// KPI service - Public surface for the four KPI read paths
use crate::application::cycle_time::lookup_cycle_time;
use crate::application::document_store::DocumentStore;
use crate::application::filter::{filter_by_mold, sum_field};
use crate::application::health::mold_health_index;
use crate::application::monthly::{aggregate_monthly, aggregate_production_vs_target};
use crate::application::post_event::{post_event_defect_rate, KeywordClassifier, StatusClassifier};
use crate::application::rejection::top_reasons;
use crate::application::synthesis::{SyntheticDataset, Synthesizer};
use crate::domain::kpi::{
    round_to, KpiResult, MonthlySeries, ProductionVsTarget, RejectionBreakdown, Selection,
};
use crate::domain::period::TimeRange;
use crate::domain::telemetry::{FieldCodes, TelemetryDocument};
use chrono::FixedOffset;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct KpiSettings {
    pub fetch_limit: usize,
    pub reference_device_id: String,
    pub reference_limit: usize,
    pub timeout: Duration,
    pub top_reasons: usize,
    pub offset: FixedOffset,
    pub codes: FieldCodes,
}

/// Computes KPIs for a machine/mold/range selection.
///
/// None of the public operations fail: store errors, timeouts, and empty or
/// unusable data all fall back to synthesized results flagged `synthetic`.
#[derive(Clone)]
pub struct KpiService {
    store: Arc<dyn DocumentStore>,
    classifier: Arc<dyn StatusClassifier>,
    synthesizer: Arc<Synthesizer>,
    settings: KpiSettings,
}

impl KpiService {
    pub fn new(store: Arc<dyn DocumentStore>, settings: KpiSettings, synthesizer: Synthesizer) -> Self {
        Self {
            store,
            classifier: Arc::new(KeywordClassifier::default()),
            synthesizer: Arc::new(synthesizer),
            settings,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn StatusClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub async fn compute_kpis(&self, selection: &Selection, range: &TimeRange) -> KpiResult {
        let codes = &self.settings.codes;
        let (documents, cycle_time_seconds) = futures::join!(
            self.fetch_documents(&selection.machine, range),
            lookup_cycle_time(
                self.store.as_ref(),
                &self.settings.reference_device_id,
                self.settings.reference_limit,
                self.settings.timeout,
                codes,
                &selection.mold,
            )
        );

        let Some(documents) = documents else {
            return self
                .synthesize(range)
                .kpi(selection.clone(), range.clone(), self.settings.top_reasons);
        };
        let matched = filter_by_mold(&documents, codes, &selection.mold);
        let monthly = aggregate_monthly(&matched, range, codes, self.settings.offset);
        if matched.is_empty() || monthly.total_units() <= 0.0 {
            tracing::warn!(
                "No usable data for {}/{} ({} matched), synthesizing KPIs",
                selection.machine,
                selection.mold,
                matched.len()
            );
            return self
                .synthesize(range)
                .kpi(selection.clone(), range.clone(), self.settings.top_reasons);
        }

        let total_units = monthly.total_units();
        let total_rejections = monthly.total_defects();
        let total_downtime_hours = sum_field(&matched, &codes.downtime) / 3600.0;

        KpiResult {
            selection: selection.clone(),
            range: range.clone(),
            total_units,
            total_rejections,
            post_event_defect_rate: post_event_defect_rate(
                &documents,
                &selection.mold,
                codes,
                self.settings.offset,
                self.classifier.as_ref(),
            ),
            total_downtime_hours: round_to(total_downtime_hours, 2),
            mold_health_index: mold_health_index(
                total_units,
                total_rejections,
                total_downtime_hours,
                cycle_time_seconds,
            ),
            top_reasons: top_reasons(&matched, codes, &selection.mold, self.settings.top_reasons),
            matched_documents: matched.len(),
            synthetic: false,
        }
    }

    pub async fn compute_monthly_series(&self, selection: &Selection, range: &TimeRange) -> MonthlySeries {
        let codes = &self.settings.codes;
        if let Some(documents) = self.fetch_documents(&selection.machine, range).await {
            let matched = filter_by_mold(&documents, codes, &selection.mold);
            let series = aggregate_monthly(&matched, range, codes, self.settings.offset);
            if series.total_units() > 0.0 {
                return series;
            }
            tracing::warn!("Monthly series for {} has no units, synthesizing", selection.mold);
        }
        self.synthesize(range).monthly
    }

    pub async fn compute_rejection_breakdown(
        &self,
        selection: &Selection,
        range: &TimeRange,
    ) -> RejectionBreakdown {
        let codes = &self.settings.codes;
        if let Some(documents) = self.fetch_documents(&selection.machine, range).await {
            let matched = filter_by_mold(&documents, codes, &selection.mold);
            if !matched.is_empty() {
                return RejectionBreakdown {
                    reasons: top_reasons(&matched, codes, &selection.mold, self.settings.top_reasons),
                    synthetic: false,
                };
            }
            tracing::warn!("No documents for mold {}, synthesizing reasons", selection.mold);
        }
        self.synthesize(range).breakdown(self.settings.top_reasons)
    }

    pub async fn compute_production_vs_target(
        &self,
        selection: &Selection,
        range: &TimeRange,
    ) -> ProductionVsTarget {
        let codes = &self.settings.codes;
        if let Some(documents) = self.fetch_documents(&selection.machine, range).await {
            let matched = filter_by_mold(&documents, codes, &selection.mold);
            let result = aggregate_production_vs_target(&matched, range, codes, self.settings.offset);
            let total: f64 = result.months.iter().map(|m| m.actual + m.target).sum();
            if total > 0.0 {
                return result;
            }
            tracing::warn!("Production vs target for {} is empty, synthesizing", selection.mold);
        }
        self.synthesize(range).production
    }

    /// Fetch the machine's documents; `None` when the store fails or times out.
    async fn fetch_documents(&self, machine: &str, range: &TimeRange) -> Option<Vec<TelemetryDocument>> {
        let fetch = self
            .store
            .fetch(machine, range.start, range.end, self.settings.fetch_limit);

        match tokio::time::timeout(self.settings.timeout, fetch).await {
            Ok(Ok(documents)) => {
                tracing::debug!("Fetched {} documents for {} ({})", documents.len(), machine, range.label);
                Some(documents)
            }
            Ok(Err(e)) => {
                tracing::warn!("Telemetry fetch for {} failed: {:#}", machine, e);
                None
            }
            Err(_) => {
                tracing::warn!("Telemetry fetch for {} timed out after {:?}", machine, self.settings.timeout);
                None
            }
        }
    }

    fn synthesize(&self, range: &TimeRange) -> SyntheticDataset {
        self.synthesizer.generate(range, self.settings.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::document_store::fake::FakeStore;
    use crate::domain::period::{CalendarResolver, PeriodSelector};
    use chrono::{TimeZone, Utc};

    fn settings() -> KpiSettings {
        KpiSettings {
            fetch_limit: 1000,
            reference_device_id: "MOLD-MAP".to_string(),
            reference_limit: 100,
            timeout: Duration::from_millis(200),
            top_reasons: 3,
            offset: FixedOffset::east_opt(0).unwrap(),
            codes: FieldCodes::default(),
        }
    }

    fn range() -> TimeRange {
        CalendarResolver::new(FixedOffset::east_opt(0).unwrap(), 8)
            .resolve(
                &PeriodSelector::Quarter(3),
                2025,
                None,
                None,
                Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            )
            .unwrap()
    }

    fn doc(ts: &str, status: &str, units: i64, defects: i64, reason: &str) -> TelemetryDocument {
        TelemetryDocument::new("M1")
            .at(ts)
            .with("moldIdentifier", "TRAY-A")
            .with("statusIndicator", status)
            .with("unitsProduced", units)
            .with("rejectionCount", defects)
            .with("rejectionReason", reason)
    }

    fn machine_docs() -> Vec<TelemetryDocument> {
        vec![
            doc("2025-07-02T10:00:00Z", "RUN", 100, 2, "Flash"),
            doc("2025-07-10T10:00:00Z", "RUN", 150, 3, "Short Shot"),
            doc("2025-07-28T10:00:00Z", "RUN", 50, 1, "Flash"),
            doc("2025-08-03T10:00:00Z", "RUN", 200, 4, ""),
            doc("2025-08-20T10:00:00Z", "RUN", 100, 2, "Flash"),
            TelemetryDocument::new("M1")
                .at("2025-08-01T09:00:00Z")
                .with("moldIdentifier", "TRAY-A")
                .with("statusIndicator", "DOWN")
                .with("downtimeSeconds", 7200),
        ]
    }

    fn mapping() -> Vec<TelemetryDocument> {
        vec![TelemetryDocument::new("MOLD-MAP")
            .with("moldName", "TRAY-A")
            .with("cycleTimeSeconds", 60)]
    }

    fn service(store: FakeStore) -> KpiService {
        KpiService::new(Arc::new(store), settings(), Synthesizer::seeded(3))
    }

    #[tokio::test]
    async fn test_monthly_series_scenario() {
        let svc = service(FakeStore::default().with_device("M1", machine_docs()));
        let series = svc
            .compute_monthly_series(&Selection::new("M1", "TRAY-A"), &range())
            .await;

        assert!(!series.synthetic);
        let rows: Vec<(String, f64, f64, f64)> = series
            .months
            .iter()
            .map(|m| (m.month.to_string(), m.units_produced, m.defect_units, m.defect_rate))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("2025-07".to_string(), 300.0, 6.0, 2.0),
                ("2025-08".to_string(), 300.0, 6.0, 2.0),
                ("2025-09".to_string(), 0.0, 0.0, 0.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_kpis_from_live_data() {
        let store = FakeStore::default()
            .with_device("M1", machine_docs())
            .with_device("MOLD-MAP", mapping());
        let kpi = service(store)
            .compute_kpis(&Selection::new("M1", "TRAY-A"), &range())
            .await;

        assert!(!kpi.synthetic);
        assert_eq!(kpi.total_units, 600.0);
        assert_eq!(kpi.total_rejections, 12.0);
        assert_eq!(kpi.total_downtime_hours, 2.0);
        assert_eq!(kpi.matched_documents, 6);
        // Only the two August runs follow the downtime record: 6 / 300.
        assert_eq!(kpi.post_event_defect_rate, 2.0);
        // Rejection 2%; expected runtime 600 * 60s = 10h, 2h down = 20%.
        assert_eq!(kpi.mold_health_index, 78.0);
        assert_eq!(kpi.top_reasons[0].reason, "Flash");
        assert_eq!(kpi.top_reasons[0].count, 5.0);
    }

    #[tokio::test]
    async fn test_missing_mapping_keeps_rejection_penalty_only() {
        let store = FakeStore::default().with_device("M1", machine_docs());
        let kpi = service(store)
            .compute_kpis(&Selection::new("M1", "TRAY-A"), &range())
            .await;
        assert!(!kpi.synthetic);
        assert_eq!(kpi.mold_health_index, 98.0);
    }

    #[tokio::test]
    async fn test_store_failure_synthesizes_consistent_views() {
        let svc = service(FakeStore::default());
        let selection = Selection::new("M1", "TRAY-A");

        let kpi = svc.compute_kpis(&selection, &range()).await;
        assert!(kpi.synthetic);
        assert_eq!(kpi.matched_documents, 0);
        assert_eq!(kpi.range, range());

        let again = Synthesizer::seeded(3).generate(&range(), settings().offset);
        assert_eq!(kpi.total_units, again.monthly.total_units());

        let series = svc.compute_monthly_series(&selection, &range()).await;
        assert!(series.synthetic);
        assert_eq!(series.months.len(), 3);

        let reasons = svc.compute_rejection_breakdown(&selection, &range()).await;
        assert!(reasons.synthetic);
        assert!(!reasons.reasons.is_empty());

        let production = svc.compute_production_vs_target(&selection, &range()).await;
        assert!(production.synthetic);
    }

    #[tokio::test]
    async fn test_unmatched_mold_synthesizes() {
        let svc = service(FakeStore::default().with_device("M1", machine_docs()));
        let kpi = svc
            .compute_kpis(&Selection::new("M1", "LID-B"), &range())
            .await;
        assert!(kpi.synthetic);
    }

    #[tokio::test]
    async fn test_timeout_synthesizes() {
        let store = FakeStore {
            delay: Some(Duration::from_secs(2)),
            ..FakeStore::default()
        }
        .with_device("M1", machine_docs());
        let series = service(store)
            .compute_monthly_series(&Selection::new("M1", "TRAY-A"), &range())
            .await;
        assert!(series.synthetic);
    }

    #[tokio::test]
    async fn test_breakdown_with_no_rejections_stays_live() {
        let docs = vec![doc("2025-07-02T10:00:00Z", "RUN", 100, 0, "Flash")];
        let svc = service(FakeStore::default().with_device("M1", docs));
        let breakdown = svc
            .compute_rejection_breakdown(&Selection::new("M1", "TRAY-A"), &range())
            .await;
        assert!(!breakdown.synthetic);
        assert!(breakdown.reasons.is_empty());
    }
}
