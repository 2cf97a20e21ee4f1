// Application layer - KPI use cases over fetched telemetry
pub mod cycle_time;
pub mod document_store;
pub mod filter;
pub mod health;
pub mod kpi_service;
pub mod monthly;
pub mod post_event;
pub mod rejection;
pub mod synthesis;
