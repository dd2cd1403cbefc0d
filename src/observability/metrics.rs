//! Metrics collection and exposition.
//!
//! # Metrics
//! - `upgrade_requests_total` (counter): upgrade attempts by outcome
//! - `upgrade_match_total` (counter): resolved mappings by spec group
//! - `upgrade_mappings` (gauge): registered mappings
//! - `upgrade_active_sessions` (gauge): live upgraded sessions
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are static strings to keep cardinality bounded

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::pathspec::PathSpecGroup;

/// Outcome label values for `upgrade_requests_total`.
pub mod outcome {
    pub const ACCEPTED: &str = "accepted";
    pub const NO_MATCH: &str = "no_match";
    pub const REJECTED: &str = "rejected";
    pub const OVER_CAPACITY: &str = "over_capacity";
    pub const NOT_UPGRADE: &str = "not_upgrade";
}

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_upgrade(outcome: &'static str) {
    metrics::counter!("upgrade_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_match(group: PathSpecGroup) {
    metrics::counter!("upgrade_match_total", "group" => group.as_str()).increment(1);
}

pub fn record_mapping_count(count: usize) {
    metrics::gauge!("upgrade_mappings").set(count as f64);
}

pub fn record_active_sessions(count: usize) {
    metrics::gauge!("upgrade_active_sessions").set(count as f64);
}
