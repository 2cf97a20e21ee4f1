// Post-event detection - Defect rate of production that follows downtime
use crate::domain::kpi::{percentage, round_to};
use crate::domain::telemetry::{FieldCodes, TelemetryDocument};
use chrono::FixedOffset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Downtime,
    Production,
    Unknown,
}

/// Classifies free-text machine status.
pub trait StatusClassifier: Send + Sync {
    fn classify(&self, text: &str) -> StatusClass;
}

pub const DOWNTIME_KEYWORDS: &[&str] = &["DOWN", "STOP", "STOPPED", "MAINTENANCE", "OFF", "IDLE", "0"];
pub const PRODUCTION_KEYWORDS: &[&str] = &["RUN", "RUNNING", "ACTIVE", "ON", "PRODUCING", "1"];

/// Matches whole tokens of the status text, case-insensitively. Decimal
/// points stay inside a token so `1.0` is not read as `1` and `0`.
/// Downtime keywords win when both sets match.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    downtime: Vec<String>,
    production: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DOWNTIME_KEYWORDS, PRODUCTION_KEYWORDS)
    }
}

impl KeywordClassifier {
    pub fn new(downtime: &[impl AsRef<str>], production: &[impl AsRef<str>]) -> Self {
        fn upper(words: &[impl AsRef<str>]) -> Vec<String> {
            words.iter().map(|w| w.as_ref().to_ascii_uppercase()).collect()
        }
        Self {
            downtime: upper(downtime),
            production: upper(production),
        }
    }
}

impl StatusClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> StatusClass {
        let upper = text.to_ascii_uppercase();
        let tokens: Vec<&str> = upper
            .split(|c: char| !c.is_ascii_alphanumeric() && c != '.')
            .map(|t| t.trim_matches('.'))
            .filter(|t| !t.is_empty())
            .collect();

        let any_of = |set: &[String]| tokens.iter().any(|t| set.iter().any(|k| k == t));
        if any_of(&self.downtime) {
            StatusClass::Downtime
        } else if any_of(&self.production) {
            StatusClass::Production
        } else {
            StatusClass::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    FollowingDowntime,
}

/// Production documents that come strictly after a downtime document in
/// time order. Runs over the whole machine stream; undated documents are
/// dropped. A document without a recognised status counts as production
/// when it reports a positive unit count.
pub fn post_event_candidates<'a>(
    documents: &'a [TelemetryDocument],
    codes: &FieldCodes,
    offset: FixedOffset,
    classifier: &dyn StatusClassifier,
) -> Vec<&'a TelemetryDocument> {
    let mut dated: Vec<_> = documents
        .iter()
        .filter_map(|doc| {
            doc.resolve_timestamp(&codes.fallback_timestamps, offset)
                .map(|instant| (instant, doc))
        })
        .collect();
    // Stable, so equal instants keep store order.
    dated.sort_by_key(|(instant, _)| *instant);

    let mut state = ScanState::Normal;
    let mut candidates = Vec::new();
    for (_, doc) in dated {
        let class = match doc.text(&codes.status).map(|s| classifier.classify(&s)) {
            Some(StatusClass::Downtime) => StatusClass::Downtime,
            Some(StatusClass::Production) => StatusClass::Production,
            _ if doc.number(&codes.units).is_some_and(|u| u > 0.0) => StatusClass::Production,
            _ => StatusClass::Unknown,
        };

        match (class, state) {
            (StatusClass::Downtime, _) => state = ScanState::FollowingDowntime,
            (StatusClass::Production, ScanState::FollowingDowntime) => candidates.push(doc),
            _ => {}
        }
    }
    candidates
}

/// Defect rate (%) over post-event production of the selected mold,
/// rounded to 2 decimals.
pub fn post_event_defect_rate(
    documents: &[TelemetryDocument],
    mold: &str,
    codes: &FieldCodes,
    offset: FixedOffset,
    classifier: &dyn StatusClassifier,
) -> f64 {
    let candidates: Vec<_> = post_event_candidates(documents, codes, offset, classifier)
        .into_iter()
        .filter(|doc| doc.matches_mold(&codes.mold, mold))
        .collect();

    let units: f64 = candidates.iter().filter_map(|d| d.number(&codes.units)).sum();
    let defects: f64 = candidates.iter().filter_map(|d| d.number(&codes.rejections)).sum();
    tracing::debug!(
        "Post-event population for {}: {} documents, {} units",
        mold,
        candidates.len(),
        units
    );
    round_to(percentage(defects, units), 2)
}
