//! In-process metrics rendered in Prometheus text format by `/metrics`.

pub mod metrics;

pub use metrics::GatewayMetrics;
