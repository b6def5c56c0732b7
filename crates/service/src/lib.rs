//! Abalone prediction service
//!
//! HTTP front end over the trained artifact pair: a liveness probe, the
//! prediction endpoint, readiness, explicit artifact reload and Prometheus
//! metrics.

pub mod api;
pub mod config;
pub mod context;
