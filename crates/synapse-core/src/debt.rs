//! Integration debt scoring
//!
//! `debt = days * (lines_changed / 1000) * (dependency_count / 10)`
//!
//! Raw inputs are floored before they are combined: days and lines at 0,
//! dependencies at 1. The same floors apply to forecasts.

use serde::{Deserialize, Serialize};

use crate::config::SeverityBands;
use crate::flavor::{Flavor, FlavorDebtCalculator};

/// Severity band of a debt score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Healthy,
    Warning,
    Critical,
    Quarantine,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Quarantine => "quarantine",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integration facts for one component, owned by the integration tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtInputs {
    pub component_id: String,
    pub days_since_integration: i64,
    pub lines_changed: i64,
    #[serde(default = "default_dependency_count")]
    pub dependency_count: i64,
}

fn default_dependency_count() -> i64 {
    1
}

impl DebtInputs {
    pub fn new(
        component_id: impl Into<String>,
        days_since_integration: i64,
        lines_changed: i64,
        dependency_count: i64,
    ) -> Self {
        Self {
            component_id: component_id.into(),
            days_since_integration,
            lines_changed,
            dependency_count,
        }
    }
}

/// Computed debt value and its band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DebtScore {
    pub value: f64,
    pub severity: Severity,
}

/// Debt forecast for a future horizon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DebtForecast {
    pub horizon_days: u32,
    pub daily_rate: f64,
    pub score: DebtScore,
}

/// Debt calculator bound to a set of severity bands
#[derive(Debug, Clone, Copy, Default)]
pub struct DebtCalculator {
    bands: SeverityBands,
}

impl DebtCalculator {
    pub fn new(bands: SeverityBands) -> Self {
        Self { bands }
    }

    pub fn bands(&self) -> &SeverityBands {
        &self.bands
    }

    /// Calculator using a discipline's own inputs, formula and bands
    pub fn for_flavor(flavor: Flavor) -> FlavorDebtCalculator {
        FlavorDebtCalculator::new(flavor)
    }

    /// Compute the raw debt value
    pub fn compute_debt(&self, days: i64, lines_changed: i64, dependency_count: i64) -> f64 {
        let days = days.max(0) as f64;
        let lines = lines_changed.max(0) as f64 / 1000.0;
        let deps = dependency_count.max(1) as f64 / 10.0;
        days * lines * deps
    }

    /// Classify a debt value.
    ///
    /// Below `healthy` is Healthy, up to and including `warning` is Warning,
    /// below `quarantine` is Critical and anything higher is Quarantine.
    pub fn classify(&self, debt: f64) -> Severity {
        if debt < self.bands.healthy {
            Severity::Healthy
        } else if debt <= self.bands.warning {
            Severity::Warning
        } else if debt < self.bands.quarantine {
            Severity::Critical
        } else {
            Severity::Quarantine
        }
    }

    /// Score a component's current inputs
    pub fn score(&self, inputs: &DebtInputs) -> DebtScore {
        let value = self.compute_debt(
            inputs.days_since_integration,
            inputs.lines_changed,
            inputs.dependency_count,
        );
        DebtScore {
            value,
            severity: self.classify(value),
        }
    }

    /// Average churn per day since the last integration
    pub fn daily_rate(&self, inputs: &DebtInputs) -> f64 {
        inputs.lines_changed.max(0) as f64 / inputs.days_since_integration.max(1) as f64
    }

    /// Extrapolate the score `horizon_days` ahead.
    ///
    /// Without an explicit `daily_rate` the historical average churn is used.
    pub fn predict(
        &self,
        inputs: &DebtInputs,
        horizon_days: u32,
        daily_rate: Option<f64>,
    ) -> DebtForecast {
        let rate = daily_rate
            .filter(|r| r.is_finite())
            .unwrap_or_else(|| self.daily_rate(inputs))
            .max(0.0);
        let horizon = i64::from(horizon_days);
        let future_days = inputs.days_since_integration.max(0).saturating_add(horizon);
        let future_lines = inputs
            .lines_changed
            .max(0)
            .saturating_add((rate * horizon as f64) as i64);

        let value = self.compute_debt(future_days, future_lines, inputs.dependency_count);
        DebtForecast {
            horizon_days,
            daily_rate: rate,
            score: DebtScore {
                value,
                severity: self.classify(value),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn calc() -> DebtCalculator {
        DebtCalculator::default()
    }

    #[test]
    fn test_formula() {
        // 10 days * 2.5 * 0.4
        assert!((calc().compute_debt(10, 2500, 4) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_floors_applied_to_raw_inputs() {
        let c = calc();
        assert_eq!(c.compute_debt(-5, 1000, 10), 0.0);
        assert_eq!(c.compute_debt(10, -200, 10), 0.0);
        // zero dependencies counts as one
        assert_eq!(c.compute_debt(10, 1000, 0), c.compute_debt(10, 1000, 1));
        assert!((c.compute_debt(10, 1000, 0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_severity_boundaries() {
        let c = calc();
        assert_eq!(c.classify(0.0), Severity::Healthy);
        assert_eq!(c.classify(2.999), Severity::Healthy);
        assert_eq!(c.classify(3.0), Severity::Warning);
        assert_eq!(c.classify(5.0), Severity::Warning);
        assert_eq!(c.classify(5.0001), Severity::Critical);
        assert_eq!(c.classify(9.99), Severity::Critical);
        assert_eq!(c.classify(10.0), Severity::Quarantine);
    }

    #[test]
    fn test_custom_bands() {
        let c = DebtCalculator::new(SeverityBands {
            healthy: 1.0,
            warning: 2.0,
            critical: 3.0,
            quarantine: 4.0,
        });
        assert_eq!(c.classify(1.5), Severity::Warning);
        assert_eq!(c.classify(4.0), Severity::Quarantine);
    }

    #[test]
    fn test_flavor_calculator_uses_flavor_bands() {
        let embedded = DebtCalculator::for_flavor(Flavor::Embedded);
        assert_eq!(embedded.bands().quarantine, 7.0);
        let score = embedded
            .score(&Flavor::Embedded.inputs(70, 500, 1))
            .unwrap();
        assert_eq!(score.severity, Severity::Quarantine);
        // same value is only critical on the canonical bands
        assert_eq!(calc().classify(score.value), Severity::Critical);
    }

    #[test]
    fn test_score_inputs() {
        let score = calc().score(&DebtInputs::new("mcu", 7, 1000, 5));
        assert!((score.value - 3.5).abs() < 1e-9);
        assert_eq!(score.severity, Severity::Warning);
    }

    #[test]
    fn test_predict_with_historical_rate() {
        let inputs = DebtInputs::new("mcu", 10, 1000, 10);
        let forecast = calc().predict(&inputs, 5, None);
        // 100 lines/day -> 1500 lines over 15 days
        assert_eq!(forecast.daily_rate, 100.0);
        assert!((forecast.score.value - 15.0 * 1.5 * 1.0).abs() < 1e-9);
        assert_eq!(forecast.score.severity, Severity::Quarantine);
    }

    #[test]
    fn test_predict_with_explicit_rate() {
        let inputs = DebtInputs::new("mcu", 0, 0, 10);
        let forecast = calc().predict(&inputs, 2, Some(250.0));
        assert!((forecast.score.value - 2.0 * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_predict_zero_horizon_matches_score() {
        let inputs = DebtInputs::new("dsp", 4, 800, 3);
        let c = calc();
        assert_eq!(c.predict(&inputs, 0, None).score, c.score(&inputs));
    }

    proptest! {
        #[test]
        fn prop_debt_monotonic_in_each_factor(
            days in 0i64..10_000,
            lines in 0i64..1_000_000,
            deps in 0i64..500,
            bump in 1i64..1_000,
        ) {
            let c = calc();
            let base = c.compute_debt(days, lines, deps);
            prop_assert!(base >= 0.0);
            prop_assert!(c.compute_debt(days + bump, lines, deps) >= base);
            prop_assert!(c.compute_debt(days, lines + bump, deps) >= base);
            prop_assert!(c.compute_debt(days, lines, deps + bump) >= base);
        }

        #[test]
        fn prop_classify_monotonic(a in 0.0f64..50.0, b in 0.0f64..50.0) {
            let c = calc();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(c.classify(lo) <= c.classify(hi));
        }
    }
}
