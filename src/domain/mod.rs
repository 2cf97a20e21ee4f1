// Domain layer - Plain data types and calendar rules
pub mod kpi;
pub mod period;
pub mod telemetry;
