//! Prometheus metrics for sweep observability.
//!
//! The engine has no end-user request path; failures and progress surface
//! only through logs, the sweep report, and these metrics.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use thiserror::Error;

/// Histogram buckets for sweep duration, in seconds.
const SWEEP_DURATION_BUCKETS: &[f64] = &[0.05, 0.25, 1.0, 5.0, 15.0, 60.0, 300.0];

/// Errors raised while registering or encoding metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Failed to register a metric with the registry.
    #[error("failed to register metric: {0}")]
    RegistrationFailed(#[from] prometheus::Error),

    /// Failed to encode the metrics output.
    #[error("failed to encode metrics: {0}")]
    EncodingFailed(String),
}

/// Sweep metrics, registered against one registry and shared across
/// workers.
#[derive(Debug)]
pub struct SweepMetrics {
    registry: Registry,
    sweeps_total: IntCounter,
    sweep_duration_seconds: Histogram,
    entities_evaluated_total: IntCounter,
    violations_total: IntCounterVec,
    tenant_failures_total: IntCounterVec,
    notifications_rejected_total: IntCounter,
}

impl SweepMetrics {
    /// Creates and registers the metric families.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::RegistrationFailed`] when a family cannot
    /// be registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let sweeps_total = IntCounter::with_opts(Opts::new(
            "pacer_sweeps_total",
            "Completed sweep runs",
        ))?;
        registry.register(Box::new(sweeps_total.clone()))?;

        let sweep_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("pacer_sweep_duration_seconds", "Sweep wall-clock duration")
                .buckets(SWEEP_DURATION_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(sweep_duration_seconds.clone()))?;

        let entities_evaluated_total = IntCounter::with_opts(Opts::new(
            "pacer_entities_evaluated_total",
            "Entities run through the evaluation pipeline",
        ))?;
        registry.register(Box::new(entities_evaluated_total.clone()))?;

        let violations_total = IntCounterVec::new(
            Opts::new("pacer_violations_total", "Violations recorded"),
            &["kind"],
        )?;
        registry.register(Box::new(violations_total.clone()))?;

        let tenant_failures_total = IntCounterVec::new(
            Opts::new(
                "pacer_tenant_failures_total",
                "Tenant sweeps skipped by failure class",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(tenant_failures_total.clone()))?;

        let notifications_rejected_total = IntCounter::with_opts(Opts::new(
            "pacer_notifications_rejected_total",
            "Notification requests refused by the dispatcher",
        ))?;
        registry.register(Box::new(notifications_rejected_total.clone()))?;

        Ok(Self {
            registry,
            sweeps_total,
            sweep_duration_seconds,
            entities_evaluated_total,
            violations_total,
            tenant_failures_total,
            notifications_rejected_total,
        })
    }

    /// Records one completed sweep and its duration.
    pub fn observe_sweep(&self, seconds: f64) {
        self.sweeps_total.inc();
        self.sweep_duration_seconds.observe(seconds);
    }

    /// Records evaluated entities.
    pub fn entities_evaluated(&self, count: u64) {
        self.entities_evaluated_total.inc_by(count);
    }

    /// Records one violation by kind label.
    pub fn violation_recorded(&self, kind: &str) {
        self.violations_total.with_label_values(&[kind]).inc();
    }

    /// Records one tenant skipped by failure class.
    pub fn tenant_failure(&self, reason: &str) {
        self.tenant_failures_total.with_label_values(&[reason]).inc();
    }

    /// Records one rejected notification request.
    pub fn notification_rejected(&self) {
        self.notifications_rejected_total.inc();
    }

    /// Encodes the registry in Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::EncodingFailed`] when encoding fails.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|err| MetricsError::EncodingFailed(err.to_string()))?;
        String::from_utf8(buffer).map_err(|err| MetricsError::EncodingFailed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_register_and_encode() {
        let metrics = SweepMetrics::new().unwrap();
        metrics.observe_sweep(0.5);
        metrics.entities_evaluated(3);
        metrics.violation_recorded("response_breach");
        metrics.tenant_failure("config_invalid");
        metrics.notification_rejected();

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("pacer_sweeps_total 1"));
        assert!(text.contains("pacer_entities_evaluated_total 3"));
        assert!(text.contains("response_breach"));
    }
}
