// Mold selection over fetched documents
use crate::domain::telemetry::{FieldCodes, TelemetryDocument};

/// Documents whose trimmed mold field equals the trimmed selection key
/// (case-sensitive). Numeric fields are coerced later, at read time.
pub fn filter_by_mold<'a>(
    documents: &'a [TelemetryDocument],
    codes: &FieldCodes,
    mold: &str,
) -> Vec<&'a TelemetryDocument> {
    documents
        .iter()
        .filter(|doc| doc.matches_mold(&codes.mold, mold))
        .collect()
}

/// Sum of a numeric field; documents without a valid value contribute nothing.
pub fn sum_field(documents: &[&TelemetryDocument], code: &str) -> f64 {
    documents.iter().filter_map(|doc| doc.number(code)).sum()
}
