// Degraded-mode synthesis - Placeholder KPIs when live data is unavailable
use crate::application::health::mold_health_index;
use crate::application::rejection::rank;
use crate::domain::kpi::{
    percentage, round_to, KpiResult, MonthlyEntry, MonthlySeries, ProductionTargetEntry,
    ProductionVsTarget, RejectionBreakdown, Selection,
};
use crate::domain::period::TimeRange;
use chrono::FixedOffset;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Mutex;

const PLACEHOLDER_REASONS: &[&str] = &["Short Shot", "Flash", "Sink Marks", "Warpage", "Burn Marks"];

/// One internally consistent fabricated dataset. Every view is derived from
/// the monthly series, so totals reconcile across views.
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub monthly: MonthlySeries,
    pub production: ProductionVsTarget,
    pub reasons: HashMap<String, f64>,
    pub total_downtime_hours: f64,
    pub cycle_time_seconds: f64,
    pub post_event_defect_rate: f64,
}

impl SyntheticDataset {
    pub fn kpi(&self, selection: Selection, range: TimeRange, top_reasons: usize) -> KpiResult {
        let total_units = self.monthly.total_units();
        let total_rejections = self.monthly.total_defects();
        KpiResult {
            selection,
            range,
            total_units,
            total_rejections,
            post_event_defect_rate: self.post_event_defect_rate,
            total_downtime_hours: self.total_downtime_hours,
            mold_health_index: mold_health_index(
                total_units,
                total_rejections,
                self.total_downtime_hours,
                self.cycle_time_seconds,
            ),
            top_reasons: self.breakdown(top_reasons).reasons,
            matched_documents: 0,
            synthetic: true,
        }
    }

    pub fn breakdown(&self, limit: usize) -> RejectionBreakdown {
        RejectionBreakdown {
            reasons: rank(self.reasons.clone(), self.monthly.total_defects(), limit),
            synthetic: true,
        }
    }
}

/// Generates placeholder data from an injectable random source.
pub struct Synthesizer {
    rng: Mutex<StdRng>,
}

impl Synthesizer {
    pub fn new(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn generate(&self, range: &TimeRange, offset: FixedOffset) -> SyntheticDataset {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut months = Vec::new();
        let mut targets = Vec::new();
        for month in range.months(offset) {
            let units = f64::from(rng.gen_range(800u32..=1600));
            let defects = (units * rng.gen_range(0.01..0.05)).round();
            let target = (units * rng.gen_range(1.0..1.2)).round();
            months.push(MonthlyEntry {
                month,
                units_produced: units,
                defect_units: defects,
                defect_rate: round_to(percentage(defects, units), 2),
            });
            targets.push(ProductionTargetEntry {
                month,
                actual: units,
                target,
                attainment: round_to(percentage(units, target), 2),
            });
        }

        let monthly = MonthlySeries {
            months,
            synthetic: true,
        };
        let total_units = monthly.total_units();
        let total_defects = monthly.total_defects();

        let cycle_time_seconds = round_to(rng.gen_range(15.0..45.0), 1);
        let expected_runtime_hours = cycle_time_seconds * total_units / 3600.0;
        let total_downtime_hours = round_to(expected_runtime_hours * rng.gen_range(0.02..0.10), 2);
        let post_event_defect_rate =
            round_to(percentage(total_defects, total_units) * rng.gen_range(1.0..1.5), 2);

        let reasons = split_reasons(&mut *rng, total_defects);

        SyntheticDataset {
            monthly,
            production: ProductionVsTarget {
                months: targets,
                synthetic: true,
            },
            reasons,
            total_downtime_hours,
            cycle_time_seconds,
            post_event_defect_rate,
        }
    }
}

/// Distribute a whole-number defect total over the placeholder reasons so
/// the counts add up exactly.
fn split_reasons<R: Rng>(rng: &mut R, total: f64) -> HashMap<String, f64> {
    let weights: Vec<u32> = PLACEHOLDER_REASONS.iter().map(|_| rng.gen_range(1..=10)).collect();
    let weight_sum: u32 = weights.iter().sum();
    let total = total.max(0.0).round() as u64;

    let mut counts: Vec<u64> = weights
        .iter()
        .map(|w| total * u64::from(*w) / u64::from(weight_sum))
        .collect();
    let assigned: u64 = counts.iter().sum();
    counts[0] += total - assigned;

    PLACEHOLDER_REASONS
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(reason, count)| (reason.to_string(), count as f64))
        .collect()
}
