// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::kpi_service::KpiService;
use crate::application::post_event::KeywordClassifier;
use crate::application::synthesis::Synthesizer;
use crate::domain::period::CalendarResolver;
use crate::infrastructure::config::load_app_config;
use crate::infrastructure::http_store::HttpDocumentStore;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    get_kpis, get_monthly_series, get_production_vs_target, get_rejection_breakdown, health_check,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_app_config()?;
    let settings = config.kpi_settings()?;

    // Create document store (infrastructure layer)
    let store = Arc::new(HttpDocumentStore::new(
        config.store.base_url.clone(),
        config.store.identity_header.clone(),
        config.store.identity_token.clone(),
    ));

    // Create services (application layer)
    let classifier = KeywordClassifier::new(&config.kpi.downtime_keywords, &config.kpi.production_keywords);
    let resolver = CalendarResolver::new(settings.offset, config.plant.cycle_boundary_hour);
    let synthesizer = match config.kpi.synthetic_seed {
        Some(seed) => Synthesizer::seeded(seed),
        None => Synthesizer::from_entropy(),
    };
    let kpi_service = KpiService::new(store, settings, synthesizer)
        .with_classifier(Arc::new(classifier));

    // Create application state
    let state = Arc::new(AppState {
        kpi_service,
        resolver,
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/kpis", get(get_kpis))
        .route("/kpis/monthly", get(get_monthly_series))
        .route("/kpis/rejections", get(get_rejection_breakdown))
        .route("/kpis/production-vs-target", get(get_production_vs_target))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!("Starting molding-kpi service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
