// Rejection reason ranking
use crate::domain::kpi::{percentage, round_to, RejectionReasonEntry};
use crate::domain::telemetry::{FieldCodes, TelemetryDocument};
use std::collections::HashMap;

pub const UNKNOWN_REASON: &str = "Unknown Reason";

/// Rank rejection reasons of mold-matching documents by total count.
///
/// Documents with a missing, non-numeric or non-positive rejection count are
/// ignored entirely, including in the grand total the percentages use.
pub fn top_reasons(
    documents: &[&TelemetryDocument],
    codes: &FieldCodes,
    mold: &str,
    limit: usize,
) -> Vec<RejectionReasonEntry> {
    let mut per_reason: HashMap<String, f64> = HashMap::new();
    let mut grand_total = 0.0;

    for doc in documents.iter().filter(|d| d.matches_mold(&codes.mold, mold)) {
        let Some(count) = doc.number(&codes.rejections).filter(|c| *c > 0.0) else {
            continue;
        };
        let reason = doc
            .text(&codes.reason)
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| UNKNOWN_REASON.to_string());

        *per_reason.entry(reason).or_insert(0.0) += count;
        grand_total += count;
    }

    rank(per_reason, grand_total, limit)
}

/// Sort descending by count (ties by reason name) and keep the top `limit`.
pub fn rank(
    per_reason: HashMap<String, f64>,
    grand_total: f64,
    limit: usize,
) -> Vec<RejectionReasonEntry> {
    let mut ranked: Vec<(String, f64)> = per_reason.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .take(limit)
        .map(|(reason, count)| RejectionReasonEntry {
            reason,
            count,
            percentage: round_to(percentage(count, grand_total), 1),
        })
        .collect()
}
