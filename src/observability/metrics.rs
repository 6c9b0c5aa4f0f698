//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `opa_controller_reconciliations_total{kind}` - Total number of reconciliations
//! - `opa_controller_reconciliation_errors_total{kind}` - Total number of failed reconciliations
//! - `opa_controller_reconciliation_duration_seconds{kind}` - Duration of reconciliations
//! - `opa_controller_reported_errors_total` - Failures caused by the controller or remote APIs,
//!   excluding known user errors
//! - `opa_controller_system_ready{namespace,name,control_plane}` - 1 when a System is ready
//! - `opa_controller_external_requests_total{api,operation,outcome}` - Calls to DAS,
//!   the self-hosted control plane, object storage and webhooks

use anyhow::Result;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry};
use std::sync::LazyLock;

use crate::constants::{CONTROL_PLANE_DAS, CONTROL_PLANE_OCP};

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "opa_controller_reconciliations_total",
            "Total number of reconciliations",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "opa_controller_reconciliation_errors_total",
            "Total number of reconciliation errors",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "opa_controller_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REPORTED_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "opa_controller_reported_errors_total",
        "Reconcile failures not caused by the resource author",
    )
    .expect("Failed to create REPORTED_ERRORS_TOTAL metric - this should never happen")
});

static SYSTEM_READY: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "opa_controller_system_ready",
            "Whether a System reconciled successfully (1) or not (0)",
        ),
        &["namespace", "name", "control_plane"],
    )
    .expect("Failed to create SYSTEM_READY metric - this should never happen")
});

static EXTERNAL_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "opa_controller_external_requests_total",
            "Requests to external APIs by outcome",
        ),
        &["api", "operation", "outcome"],
    )
    .expect("Failed to create EXTERNAL_REQUESTS_TOTAL metric - this should never happen")
});

/// Register all metrics with the registry
///
/// # Errors
///
/// Fails when called twice, as every collector can only be registered once.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REPORTED_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SYSTEM_READY.clone()))?;
    REGISTRY.register(Box::new(EXTERNAL_REQUESTS_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(kind: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[kind])
        .observe(duration);
}

pub fn increment_reported_errors() {
    REPORTED_ERRORS_TOTAL.inc();
}

pub fn set_system_ready(namespace: &str, name: &str, control_plane: &str, ready: bool) {
    SYSTEM_READY
        .with_label_values(&[namespace, name, control_plane])
        .set(i64::from(ready));
}

/// Drop the readiness series of a System that no longer exists
pub fn clear_system_ready(namespace: &str, name: &str) {
    for control_plane in [CONTROL_PLANE_DAS, CONTROL_PLANE_OCP] {
        // Absent series are fine
        let _ = SYSTEM_READY.remove_label_values(&[namespace, name, control_plane]);
    }
}

pub fn record_external_request(api: &str, operation: &str, outcome: &str) {
    EXTERNAL_REQUESTS_TOTAL
        .with_label_values(&[api, operation, outcome])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_ready_cleared() {
        set_system_ready("team-a", "metrics-test", CONTROL_PLANE_DAS, true);
        assert_eq!(
            SYSTEM_READY
                .with_label_values(&["team-a", "metrics-test", CONTROL_PLANE_DAS])
                .get(),
            1
        );
        clear_system_ready("team-a", "metrics-test");
        // Removing a series that no longer exists fails
        assert!(SYSTEM_READY
            .remove_label_values(&["team-a", "metrics-test", CONTROL_PLANE_DAS])
            .is_err());
    }

    #[test]
    fn test_external_requests_by_outcome() {
        record_external_request("das", "metrics_test_op", "404");
        record_external_request("das", "metrics_test_op", "404");
        assert_eq!(
            EXTERNAL_REQUESTS_TOTAL
                .with_label_values(&["das", "metrics_test_op", "404"])
                .get(),
            2
        );
    }
}
