// Mold Health Index
use crate::domain::kpi::{percentage, round_to};

/// Composite 0-100 score: 100 minus the rejection penalty and the downtime
/// penalty, floored at 0. Neither penalty is capped on its own.
///
/// The downtime penalty compares downtime against the runtime the units
/// should have taken (`cycle_time_seconds * total_units`); an unknown cycle
/// time (`0`) removes that term.
pub fn mold_health_index(
    total_units: f64,
    total_rejections: f64,
    total_downtime_hours: f64,
    cycle_time_seconds: f64,
) -> f64 {
    let rejection_penalty = percentage(total_rejections, total_units);

    let expected_runtime_hours = if cycle_time_seconds > 0.0 && total_units > 0.0 {
        cycle_time_seconds * total_units / 3600.0
    } else {
        0.0
    };
    let downtime_penalty = percentage(total_downtime_hours, expected_runtime_hours);

    round_to((100.0 - (rejection_penalty + downtime_penalty)).max(0.0), 2)
}
