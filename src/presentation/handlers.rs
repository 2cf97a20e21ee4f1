// HTTP request handlers
use crate::domain::kpi::{KpiResult, MonthlySeries, ProductionVsTarget, RejectionBreakdown, Selection};
use crate::domain::period::{CalendarResolver, PeriodSelector, TimeRange};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

type HandlerResult<T> = Result<Json<T>, (StatusCode, String)>;

#[derive(Debug, Deserialize)]
pub struct KpiQuery {
    pub machine: String,
    pub mold: String,
    pub period: Option<String>,
    pub year: Option<i32>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl KpiQuery {
    fn selection(&self) -> Selection {
        Selection::new(self.machine.trim(), self.mold.trim())
    }

    /// Resolve the requested period. An invalid quarter is the only
    /// request error this surface reports.
    fn resolve(&self, resolver: &CalendarResolver, now: DateTime<Utc>) -> Result<TimeRange, (StatusCode, String)> {
        let selector = PeriodSelector::from(self.period.as_deref().unwrap_or("current"));
        let year = self
            .year
            .unwrap_or_else(|| now.with_timezone(&resolver.offset()).year());

        resolver
            .resolve(&selector, year, self.start, self.end, now)
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn get_kpis(
    Query(query): Query<KpiQuery>,
    State(state): State<Arc<AppState>>,
) -> HandlerResult<KpiResult> {
    let range = query.resolve(&state.resolver, Utc::now())?;
    Ok(Json(state.kpi_service.compute_kpis(&query.selection(), &range).await))
}

pub async fn get_monthly_series(
    Query(query): Query<KpiQuery>,
    State(state): State<Arc<AppState>>,
) -> HandlerResult<MonthlySeries> {
    let range = query.resolve(&state.resolver, Utc::now())?;
    Ok(Json(state.kpi_service.compute_monthly_series(&query.selection(), &range).await))
}

pub async fn get_rejection_breakdown(
    Query(query): Query<KpiQuery>,
    State(state): State<Arc<AppState>>,
) -> HandlerResult<RejectionBreakdown> {
    let range = query.resolve(&state.resolver, Utc::now())?;
    Ok(Json(
        state
            .kpi_service
            .compute_rejection_breakdown(&query.selection(), &range)
            .await,
    ))
}

pub async fn get_production_vs_target(
    Query(query): Query<KpiQuery>,
    State(state): State<Arc<AppState>>,
) -> HandlerResult<ProductionVsTarget> {
    let range = query.resolve(&state.resolver, Utc::now())?;
    Ok(Json(
        state
            .kpi_service
            .compute_production_vs_target(&query.selection(), &range)
            .await,
    ))
}
