// Monthly aggregation - Units/defects and actual/target per calendar month
use crate::domain::kpi::{
    percentage, round_to, MonthlyEntry, MonthlySeries, ProductionTargetEntry, ProductionVsTarget,
};
use crate::domain::period::{TimeRange, YearMonth};
use crate::domain::telemetry::{FieldCodes, TelemetryDocument};
use chrono::FixedOffset;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, Copy)]
struct MonthBucket {
    first: f64,
    second: f64,
}

/// Sum two numeric fields per month. Every month touched by `range` is
/// seeded before any document is read, so the series has no gaps.
///
/// The range check is inclusive on both ends, unlike the half-open fetch.
fn bucket_sums(
    documents: &[&TelemetryDocument],
    range: &TimeRange,
    codes: &FieldCodes,
    offset: FixedOffset,
    first: &str,
    second: &str,
) -> BTreeMap<YearMonth, MonthBucket> {
    let mut buckets: BTreeMap<YearMonth, MonthBucket> = range
        .months(offset)
        .into_iter()
        .map(|month| (month, MonthBucket::default()))
        .collect();

    let mut skipped = 0usize;
    for doc in documents {
        let Some(instant) = doc.resolve_timestamp(&codes.fallback_timestamps, offset) else {
            skipped += 1;
            continue;
        };
        if !range.contains_inclusive(instant) {
            skipped += 1;
            continue;
        }

        let bucket = buckets.entry(YearMonth::of(instant, offset)).or_default();
        if let Some(value) = doc.number(first) {
            bucket.first += value;
        }
        if let Some(value) = doc.number(second) {
            bucket.second += value;
        }
    }

    if skipped > 0 {
        tracing::debug!("Skipped {} undated or out-of-range documents", skipped);
    }
    buckets
}

pub fn aggregate_monthly(
    documents: &[&TelemetryDocument],
    range: &TimeRange,
    codes: &FieldCodes,
    offset: FixedOffset,
) -> MonthlySeries {
    let months = bucket_sums(documents, range, codes, offset, &codes.units, &codes.rejections)
        .into_iter()
        .map(|(month, bucket)| MonthlyEntry {
            month,
            units_produced: bucket.first,
            defect_units: bucket.second,
            defect_rate: round_to(percentage(bucket.second, bucket.first), 2),
        })
        .collect();

    MonthlySeries {
        months,
        synthetic: false,
    }
}

pub fn aggregate_production_vs_target(
    documents: &[&TelemetryDocument],
    range: &TimeRange,
    codes: &FieldCodes,
    offset: FixedOffset,
) -> ProductionVsTarget {
    let months = bucket_sums(documents, range, codes, offset, &codes.units, &codes.target)
        .into_iter()
        .map(|(month, bucket)| ProductionTargetEntry {
            month,
            actual: bucket.first,
            target: bucket.second,
            attainment: round_to(percentage(bucket.first, bucket.second), 2),
        })
        .collect();

    ProductionVsTarget {
        months,
        synthetic: false,
    }
}
