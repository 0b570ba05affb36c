//! Prometheus metrics for the Integration Health Agent
//!
//! - `telemetry_samples_total` (counter) - samples processed per component
//! - `decisions_total` (counter) - decisions by action
//! - `quarantine_transitions_total` (counter) - quarantine/restore transitions
//! - `throttle_level`, `debt_score`, `imbalance` (gauges) - per component
//! - `gate_evaluations_total` (counter) - gate results by gate and outcome
//! - `evaluation_duration_seconds` (histogram) - evaluation cycle latency

use prometheus::{CounterVec, Gauge, GaugeVec, Histogram, HistogramOpts, Opts, Registry};
use std::sync::Arc;
use std::time::Instant;

use super::{Result, TelemetryError};
use synapse_core::{EvaluationOutcome, PolicyGateResult, PruneTransition};

const NAMESPACE: &str = "synapse";

/// Mitigation metrics for Prometheus
pub struct MitigationMetrics {
    telemetry_samples_total: CounterVec,
    decisions_total: CounterVec,
    quarantine_transitions_total: CounterVec,
    throttle_level: GaugeVec,
    debt_score: GaugeVec,
    imbalance: GaugeVec,
    gate_evaluations_total: CounterVec,
    evaluation_duration_seconds: Histogram,
    active_evaluations: Gauge,
}

impl MitigationMetrics {
    /// Create the metrics and register them with the provided registry
    pub fn new(registry: Arc<Registry>) -> Result<Self> {
        let telemetry_samples_total = CounterVec::new(
            Opts::new("telemetry_samples_total", "Telemetry samples processed")
                .namespace(NAMESPACE),
            &["component"],
        )?;

        let decisions_total = CounterVec::new(
            Opts::new("decisions_total", "Mitigation decisions by action").namespace(NAMESPACE),
            &["action"],
        )?;

        let quarantine_transitions_total = CounterVec::new(
            Opts::new(
                "quarantine_transitions_total",
                "Components entering or leaving quarantine",
            )
            .namespace(NAMESPACE),
            &["transition"],
        )?;

        let throttle_level = GaugeVec::new(
            Opts::new("throttle_level", "Current throttle level (0.0 - 1.0)").namespace(NAMESPACE),
            &["component"],
        )?;

        let debt_score = GaugeVec::new(
            Opts::new("debt_score", "Current integration debt score").namespace(NAMESPACE),
            &["component"],
        )?;

        let imbalance = GaugeVec::new(
            Opts::new("imbalance", "Smoothed hardware/software imbalance (-1.0 - 1.0)")
                .namespace(NAMESPACE),
            &["component"],
        )?;

        let gate_evaluations_total = CounterVec::new(
            Opts::new("gate_evaluations_total", "Policy gate evaluations by result")
                .namespace(NAMESPACE),
            &["gate", "result"],
        )?;

        let evaluation_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "evaluation_duration_seconds",
                "Evaluation cycle duration in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        )?;

        let active_evaluations = Gauge::new(
            "synapse_active_evaluations",
            "Number of evaluation cycles in progress",
        )?;

        registry.register(Box::new(telemetry_samples_total.clone()))?;
        registry.register(Box::new(decisions_total.clone()))?;
        registry.register(Box::new(quarantine_transitions_total.clone()))?;
        registry.register(Box::new(throttle_level.clone()))?;
        registry.register(Box::new(debt_score.clone()))?;
        registry.register(Box::new(imbalance.clone()))?;
        registry.register(Box::new(gate_evaluations_total.clone()))?;
        registry.register(Box::new(evaluation_duration_seconds.clone()))?;
        registry.register(Box::new(active_evaluations.clone()))?;

        Ok(Self {
            telemetry_samples_total,
            decisions_total,
            quarantine_transitions_total,
            throttle_level,
            debt_score,
            imbalance,
            gate_evaluations_total,
            evaluation_duration_seconds,
            active_evaluations,
        })
    }

    /// Record everything an evaluation cycle produced
    pub fn record_outcome(&self, outcome: &EvaluationOutcome) {
        let component = outcome.component_id.as_str();
        self.telemetry_samples_total
            .with_label_values(&[component])
            .inc();
        self.decisions_total
            .with_label_values(&[outcome.decision.action.as_str()])
            .inc();

        match &outcome.transition {
            PruneTransition::Quarantined { .. } => self.record_transition("quarantined"),
            PruneTransition::Restored { .. } => self.record_transition("restored"),
            PruneTransition::Unchanged { .. } => {}
        }

        self.throttle_level
            .with_label_values(&[component])
            .set(outcome.throttle_level);
        self.debt_score
            .with_label_values(&[component])
            .set(outcome.debt_score.value);
        if let Some(balance) = &outcome.balance {
            self.imbalance
                .with_label_values(&[component])
                .set(balance.smoothed_imbalance);
        }
    }

    pub fn record_transition(&self, transition: &str) {
        self.quarantine_transitions_total
            .with_label_values(&[transition])
            .inc();
    }

    pub fn set_debt_score(&self, component: &str, debt: f64) {
        self.debt_score.with_label_values(&[component]).set(debt);
    }

    /// Drop per-component series of a removed component
    pub fn forget_component(&self, component: &str) {
        let _ = self.telemetry_samples_total.remove_label_values(&[component]);
        let _ = self.throttle_level.remove_label_values(&[component]);
        let _ = self.debt_score.remove_label_values(&[component]);
        let _ = self.imbalance.remove_label_values(&[component]);
    }

    pub fn record_gate_result(&self, result: &PolicyGateResult) {
        let outcome = if result.passed { "passed" } else { "failed" };
        self.gate_evaluations_total
            .with_label_values(&[result.gate_id.as_str(), outcome])
            .inc();
    }

    pub fn record_gate_results<'a>(&self, results: impl IntoIterator<Item = &'a PolicyGateResult>) {
        for result in results {
            self.record_gate_result(result);
        }
    }

    /// Start an evaluation timer (records duration on drop)
    pub fn start_timer(&self) -> EvaluationTimer<'_> {
        self.active_evaluations.inc();
        EvaluationTimer {
            start: Instant::now(),
            metrics: self,
        }
    }
}

/// RAII guard for timing evaluation cycles
pub struct EvaluationTimer<'a> {
    start: Instant,
    metrics: &'a MitigationMetrics,
}

impl<'a> Drop for EvaluationTimer<'a> {
    fn drop(&mut self) {
        self.metrics
            .evaluation_duration_seconds
            .observe(self.start.elapsed().as_secs_f64());
        self.metrics.active_evaluations.dec();
    }
}

/// Registry for all mitigation metrics
pub struct MitigationMetricsRegistry {
    registry: Arc<Registry>,
    mitigation: MitigationMetrics,
}

impl MitigationMetricsRegistry {
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create with an existing Prometheus registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let mitigation = MitigationMetrics::new(Arc::clone(&registry))?;
        Ok(Self {
            registry,
            mitigation,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn mitigation(&self) -> &MitigationMetrics {
        &self.mitigation
    }

    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Encode metrics as text for scraping
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| TelemetryError::MetricsError(prometheus::Error::Msg(e.to_string())))
    }
}
