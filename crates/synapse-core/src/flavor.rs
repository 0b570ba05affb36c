//! Discipline-specific debt indices
//!
//! Each flavor measures integration debt with its own inputs, formula and
//! bands. Infra reports a configuration debt index (CDI), data a schema debt
//! index (SDI), everything else an integration debt index (IDI).
//!
//! | Flavor   | Formula                                        | Bands (h/w/c/q)    |
//! |----------|------------------------------------------------|--------------------|
//! | iot      | days * (lines / 1000) * (deps / 10) / 10       | 3 / 5 / 7 / 10     |
//! | cloud    | pr_age_days * changed_files * services / 100   | 2 / 4 / 6 / 8      |
//! | embedded | days * (lines / 500) * modules / 10            | 2 / 3.5 / 5 / 7    |
//! | infra    | hours * changed_resources * environments / 100 | 5 / 10 / 20 / 50   |
//! | data     | days * breaking_changes * consumers / 50       | 3 / 6 / 10 / 15    |
//! | mobile   | days * changed_screens * platform_factor / 100 | 3 / 5 / 8 / 12     |
//!
//! Flavored scores are rounded to two decimals and classified with strict
//! upper bounds: below `healthy` is healthy, below `warning` is a warning,
//! below `quarantine` is critical.

use serde::{Deserialize, Serialize};

use crate::config::SeverityBands;
use crate::debt::Severity;
use crate::error::{CoreError, Result};

/// Project discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flavor {
    Iot,
    Cloud,
    Embedded,
    Infra,
    Data,
    Mobile,
}

impl Flavor {
    pub const ALL: [Flavor; 6] = [
        Self::Iot,
        Self::Cloud,
        Self::Embedded,
        Self::Infra,
        Self::Data,
        Self::Mobile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iot => "iot",
            Self::Cloud => "cloud",
            Self::Embedded => "embedded",
            Self::Infra => "infra",
            Self::Data => "data",
            Self::Mobile => "mobile",
        }
    }

    /// Name of the index this flavor reports
    pub fn metric_name(&self) -> &'static str {
        match self {
            Self::Infra => "CDI",
            Self::Data => "SDI",
            _ => "IDI",
        }
    }

    pub fn bands(&self) -> SeverityBands {
        let (healthy, warning, critical, quarantine) = match self {
            Self::Iot => (3.0, 5.0, 7.0, 10.0),
            Self::Cloud => (2.0, 4.0, 6.0, 8.0),
            Self::Embedded => (2.0, 3.5, 5.0, 7.0),
            Self::Infra => (5.0, 10.0, 20.0, 50.0),
            Self::Data => (3.0, 6.0, 10.0, 15.0),
            Self::Mobile => (3.0, 5.0, 8.0, 12.0),
        };
        SeverityBands {
            healthy,
            warning,
            critical,
            quarantine,
        }
    }

    /// Build inputs from three generic factors.
    ///
    /// `age` is the time factor (days, PR age or hours since apply),
    /// `changes` the change volume and `spread` the fan-out. Mobile ignores
    /// `spread` and starts at a platform factor of 1.0.
    pub fn inputs(&self, age: i64, changes: i64, spread: i64) -> FlavorInputs {
        match self {
            Self::Iot => FlavorInputs::Iot {
                days: age,
                lines_changed: changes,
                dependencies: spread,
            },
            Self::Cloud => FlavorInputs::Cloud {
                pr_age_days: age,
                changed_files: changes,
                dependent_services: spread,
            },
            Self::Embedded => FlavorInputs::Embedded {
                days: age,
                lines_changed: changes,
                modules: spread,
            },
            Self::Infra => FlavorInputs::Infra {
                hours_since_apply: age,
                changed_resources: changes,
                environments: spread,
            },
            Self::Data => FlavorInputs::Data {
                days_since_sync: age,
                breaking_changes: changes,
                downstream_consumers: spread,
            },
            Self::Mobile => FlavorInputs::Mobile {
                days: age,
                changed_screens: changes,
                platform_factor: 1.0,
            },
        }
    }
}

impl std::fmt::Display for Flavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Flavor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "iot" => Ok(Self::Iot),
            "cloud" => Ok(Self::Cloud),
            "embedded" => Ok(Self::Embedded),
            "infra" => Ok(Self::Infra),
            "data" => Ok(Self::Data),
            "mobile" => Ok(Self::Mobile),
            other => Err(format!("unknown flavor: {}", other)),
        }
    }
}

/// Release targets of a mobile project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobilePlatform {
    Ios,
    Android,
    CrossPlatform,
    WebMobile,
}

impl MobilePlatform {
    pub fn factor(&self) -> f64 {
        match self {
            Self::Ios | Self::Android => 1.0,
            Self::CrossPlatform => 1.5,
            Self::WebMobile => 2.0,
        }
    }
}

impl std::str::FromStr for MobilePlatform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "ios" => Ok(Self::Ios),
            "android" => Ok(Self::Android),
            "cross_platform" => Ok(Self::CrossPlatform),
            "web_mobile" => Ok(Self::WebMobile),
            other => Err(format!("unknown mobile platform: {}", other)),
        }
    }
}

/// Raw facts for one flavored score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "flavor", rename_all = "snake_case")]
pub enum FlavorInputs {
    Iot {
        days: i64,
        lines_changed: i64,
        dependencies: i64,
    },
    Cloud {
        pr_age_days: i64,
        changed_files: i64,
        dependent_services: i64,
    },
    Embedded {
        days: i64,
        lines_changed: i64,
        modules: i64,
    },
    Infra {
        hours_since_apply: i64,
        changed_resources: i64,
        environments: i64,
    },
    Data {
        days_since_sync: i64,
        breaking_changes: i64,
        downstream_consumers: i64,
    },
    Mobile {
        days: i64,
        changed_screens: i64,
        platform_factor: f64,
    },
}

impl FlavorInputs {
    pub fn flavor(&self) -> Flavor {
        match self {
            Self::Iot { .. } => Flavor::Iot,
            Self::Cloud { .. } => Flavor::Cloud,
            Self::Embedded { .. } => Flavor::Embedded,
            Self::Infra { .. } => Flavor::Infra,
            Self::Data { .. } => Flavor::Data,
            Self::Mobile { .. } => Flavor::Mobile,
        }
    }

    /// Replace the platform factor of mobile inputs; other flavors are unchanged
    pub fn on_platform(self, platform: MobilePlatform) -> Self {
        match self {
            Self::Mobile {
                days,
                changed_screens,
                ..
            } => Self::Mobile {
                days,
                changed_screens,
                platform_factor: platform.factor(),
            },
            other => other,
        }
    }

    /// Index value before rounding
    fn raw(&self) -> f64 {
        let floor = |v: i64, min: i64| v.max(min) as f64;
        match *self {
            Self::Iot {
                days,
                lines_changed,
                dependencies,
            } => floor(days, 0) * (floor(lines_changed, 0) / 1000.0) * (floor(dependencies, 1) / 10.0) / 10.0,
            Self::Cloud {
                pr_age_days,
                changed_files,
                dependent_services,
            } => floor(pr_age_days, 0) * floor(changed_files, 0) * floor(dependent_services, 1) / 100.0,
            Self::Embedded {
                days,
                lines_changed,
                modules,
            } => floor(days, 0) * (floor(lines_changed, 0) / 500.0) * floor(modules, 1) / 10.0,
            Self::Infra {
                hours_since_apply,
                changed_resources,
                environments,
            } => floor(hours_since_apply, 0) * floor(changed_resources, 0) * floor(environments, 1) / 100.0,
            Self::Data {
                days_since_sync,
                breaking_changes,
                downstream_consumers,
            } => floor(days_since_sync, 0) * floor(breaking_changes, 0) * floor(downstream_consumers, 1) / 50.0,
            Self::Mobile {
                days,
                changed_screens,
                platform_factor,
            } => {
                let factor = if platform_factor.is_finite() {
                    platform_factor.max(1.0)
                } else {
                    1.0
                };
                floor(days, 0) * floor(changed_screens, 0) * factor / 100.0
            }
        }
    }

    /// The same inputs `days` later.
    ///
    /// Time factors advance (infra by 24 hours per day). Iot and embedded
    /// also extrapolate lines changed at the historical daily rate; other
    /// change counts stay as they are.
    pub fn advanced(&self, days: u32) -> Self {
        let ahead = i64::from(days);
        let churn = |elapsed: i64, lines: i64| {
            let lines = lines.max(0);
            let rate = lines as f64 / elapsed.max(1) as f64;
            lines.saturating_add((rate * ahead as f64) as i64)
        };
        match *self {
            Self::Iot {
                days,
                lines_changed,
                dependencies,
            } => Self::Iot {
                days: days.max(0).saturating_add(ahead),
                lines_changed: churn(days, lines_changed),
                dependencies,
            },
            Self::Embedded {
                days,
                lines_changed,
                modules,
            } => Self::Embedded {
                days: days.max(0).saturating_add(ahead),
                lines_changed: churn(days, lines_changed),
                modules,
            },
            Self::Cloud {
                pr_age_days,
                changed_files,
                dependent_services,
            } => Self::Cloud {
                pr_age_days: pr_age_days.max(0).saturating_add(ahead),
                changed_files,
                dependent_services,
            },
            Self::Infra {
                hours_since_apply,
                changed_resources,
                environments,
            } => Self::Infra {
                hours_since_apply: hours_since_apply.max(0).saturating_add(ahead.saturating_mul(24)),
                changed_resources,
                environments,
            },
            Self::Data {
                days_since_sync,
                breaking_changes,
                downstream_consumers,
            } => Self::Data {
                days_since_sync: days_since_sync.max(0).saturating_add(ahead),
                breaking_changes,
                downstream_consumers,
            },
            Self::Mobile {
                days,
                changed_screens,
                platform_factor,
            } => Self::Mobile {
                days: days.max(0).saturating_add(ahead),
                changed_screens,
                platform_factor,
            },
        }
    }
}

/// A flavored index value and its band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlavorScore {
    pub flavor: Flavor,
    pub metric: String,
    pub value: f64,
    pub severity: Severity,
}

/// Debt calculator for one flavor
#[derive(Debug, Clone, Copy)]
pub struct FlavorDebtCalculator {
    flavor: Flavor,
    bands: SeverityBands,
}

impl FlavorDebtCalculator {
    pub fn new(flavor: Flavor) -> Self {
        Self {
            flavor,
            bands: flavor.bands(),
        }
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn bands(&self) -> &SeverityBands {
        &self.bands
    }

    pub fn classify(&self, value: f64) -> Severity {
        if value < self.bands.healthy {
            Severity::Healthy
        } else if value < self.bands.warning {
            Severity::Warning
        } else if value < self.bands.quarantine {
            Severity::Critical
        } else {
            Severity::Quarantine
        }
    }

    /// Score inputs of this calculator's flavor
    pub fn score(&self, inputs: &FlavorInputs) -> Result<FlavorScore> {
        if inputs.flavor() != self.flavor {
            return Err(CoreError::config(format!(
                "{} inputs given to the {} debt calculator",
                inputs.flavor(),
                self.flavor
            )));
        }
        let value = (inputs.raw() * 100.0).round() / 100.0;
        Ok(FlavorScore {
            flavor: self.flavor,
            metric: self.flavor.metric_name().to_string(),
            value,
            severity: self.classify(value),
        })
    }

    /// Score the inputs as they will be `horizon_days` from now
    pub fn predict(&self, inputs: &FlavorInputs, horizon_days: u32) -> Result<FlavorScore> {
        self.score(&inputs.advanced(horizon_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(inputs: FlavorInputs) -> FlavorScore {
        FlavorDebtCalculator::new(inputs.flavor())
            .score(&inputs)
            .unwrap()
    }

    #[test]
    fn test_iot_formula_and_bands() {
        // 30 * 1.0 * 1.0 / 10
        let s = score(Flavor::Iot.inputs(30, 1000, 10));
        assert_eq!(s.value, 3.0);
        assert_eq!(s.severity, Severity::Warning);
        assert_eq!(s.metric, "IDI");

        assert_eq!(score(Flavor::Iot.inputs(29, 1000, 10)).severity, Severity::Healthy);
        assert_eq!(score(Flavor::Iot.inputs(50, 1000, 10)).severity, Severity::Critical);
        assert_eq!(score(Flavor::Iot.inputs(99, 1000, 10)).severity, Severity::Critical);
        assert_eq!(score(Flavor::Iot.inputs(100, 1000, 10)).severity, Severity::Quarantine);
    }

    #[test]
    fn test_iot_floors() {
        assert_eq!(score(Flavor::Iot.inputs(-3, 1000, 10)).value, 0.0);
        assert_eq!(
            score(Flavor::Iot.inputs(100, 1000, 0)).value,
            score(Flavor::Iot.inputs(100, 1000, 1)).value
        );
    }

    #[test]
    fn test_cloud_formula_and_bands() {
        // 2 * 10 * 1 / 100
        let s = score(Flavor::Cloud.inputs(2, 10, 1));
        assert_eq!(s.value, 0.2);
        assert_eq!(s.severity, Severity::Healthy);

        assert_eq!(score(Flavor::Cloud.inputs(2, 10, 10)).value, 2.0);
        assert_eq!(score(Flavor::Cloud.inputs(2, 10, 10)).severity, Severity::Warning);
        assert_eq!(score(Flavor::Cloud.inputs(4, 10, 10)).severity, Severity::Critical);
        assert_eq!(score(Flavor::Cloud.inputs(8, 10, 10)).severity, Severity::Quarantine);
        // zero dependent services counts as one
        assert_eq!(score(Flavor::Cloud.inputs(10, 10, 0)).value, 1.0);
    }

    #[test]
    fn test_embedded_is_stricter_than_iot() {
        // 10 * 2.0 * 1 / 10
        let s = score(Flavor::Embedded.inputs(10, 1000, 1));
        assert_eq!(s.value, 2.0);
        assert_eq!(s.severity, Severity::Warning);

        assert_eq!(score(Flavor::Embedded.inputs(35, 500, 1)).value, 3.5);
        assert_eq!(score(Flavor::Embedded.inputs(35, 500, 1)).severity, Severity::Critical);
        assert_eq!(score(Flavor::Embedded.inputs(70, 500, 1)).severity, Severity::Quarantine);

        let iot = score(Flavor::Iot.inputs(10, 1000, 1));
        assert!(iot.value < s.value);
    }

    #[test]
    fn test_infra_reports_cdi() {
        // 50 hours * 10 resources * 1 env / 100
        let s = score(Flavor::Infra.inputs(50, 10, 1));
        assert_eq!(s.value, 5.0);
        assert_eq!(s.metric, "CDI");
        assert_eq!(s.severity, Severity::Warning);

        assert_eq!(score(Flavor::Infra.inputs(49, 10, 1)).severity, Severity::Healthy);
        assert_eq!(score(Flavor::Infra.inputs(100, 10, 1)).severity, Severity::Critical);
        assert_eq!(score(Flavor::Infra.inputs(100, 10, 5)).severity, Severity::Quarantine);
    }

    #[test]
    fn test_data_reports_sdi() {
        // 15 days * 2 changes * 5 consumers / 50
        let s = score(Flavor::Data.inputs(15, 2, 5));
        assert_eq!(s.value, 3.0);
        assert_eq!(s.metric, "SDI");
        assert_eq!(s.severity, Severity::Warning);

        assert_eq!(score(Flavor::Data.inputs(30, 2, 5)).severity, Severity::Critical);
        assert_eq!(score(Flavor::Data.inputs(75, 2, 5)).value, 15.0);
        assert_eq!(score(Flavor::Data.inputs(75, 2, 5)).severity, Severity::Quarantine);
        // no breaking changes, no schema debt
        assert_eq!(score(Flavor::Data.inputs(400, 0, 9)).value, 0.0);
    }

    #[test]
    fn test_mobile_platform_factor() {
        let native = Flavor::Mobile.inputs(20, 10, 0);
        assert_eq!(score(native).value, 2.0);
        assert_eq!(score(native).severity, Severity::Healthy);

        let cross = native.on_platform(MobilePlatform::CrossPlatform);
        assert_eq!(score(cross).value, 3.0);
        assert_eq!(score(cross).severity, Severity::Warning);

        let web = native.on_platform(MobilePlatform::WebMobile);
        assert_eq!(score(web).value, 4.0);

        assert_eq!(score(Flavor::Mobile.inputs(60, 20, 0)).severity, Severity::Quarantine);
        assert_eq!(score(Flavor::Mobile.inputs(40, 20, 0)).severity, Severity::Critical);

        // factors below one are raised to one
        let low = FlavorInputs::Mobile {
            days: 20,
            changed_screens: 10,
            platform_factor: 0.2,
        };
        assert_eq!(score(low).value, 2.0);
    }

    #[test]
    fn test_bands_are_valid_for_every_flavor() {
        for flavor in Flavor::ALL {
            let b = flavor.bands();
            assert!(b.healthy < b.warning && b.warning < b.critical && b.critical < b.quarantine);
            assert_eq!(flavor.inputs(1, 1, 1).flavor(), flavor);
        }
    }

    #[test]
    fn test_mismatched_inputs_rejected() {
        let err = FlavorDebtCalculator::new(Flavor::Cloud)
            .score(&Flavor::Data.inputs(1, 1, 1))
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_predict_advances_time_factors() {
        let infra = FlavorDebtCalculator::new(Flavor::Infra);
        // 2 days ahead adds 48 hours
        let s = infra.predict(&Flavor::Infra.inputs(2, 10, 1), 2).unwrap();
        assert_eq!(s.value, 5.0);

        let iot = FlavorDebtCalculator::new(Flavor::Iot);
        // 100 lines/day: 20 days, 2000 lines
        let s = iot.predict(&Flavor::Iot.inputs(10, 1000, 10), 10).unwrap();
        assert_eq!(s.value, 4.0);

        let cloud = FlavorDebtCalculator::new(Flavor::Cloud);
        let s = cloud.predict(&Flavor::Cloud.inputs(1, 10, 10), 3).unwrap();
        assert_eq!(s.value, 4.0);
        assert_eq!(s.severity, Severity::Critical);
    }

    #[test]
    fn test_inputs_from_json() {
        let inputs: FlavorInputs = serde_json::from_str(
            r#"{"flavor":"data","days_since_sync":15,"breaking_changes":2,"downstream_consumers":5}"#,
        )
        .unwrap();
        assert_eq!(inputs.flavor(), Flavor::Data);
        assert_eq!(score(inputs).value, 3.0);
        assert_eq!("cross-platform".parse::<MobilePlatform>(), Ok(MobilePlatform::CrossPlatform));
    }
}
