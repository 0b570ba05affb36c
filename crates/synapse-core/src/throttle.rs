//! Final throttle resolution
//!
//! Quarantine forces zero. Otherwise the more conservative signal wins;
//! signals are never averaged.

use crate::mitigation::clamp_unit;

#[derive(Debug, Clone, Copy, Default)]
pub struct ThrottleResolver;

impl ThrottleResolver {
    pub fn resolve(debt_throttle: f64, balance_throttle: f64, is_quarantined: bool) -> f64 {
        if is_quarantined {
            return 0.0;
        }
        clamp_unit(debt_throttle).min(clamp_unit(balance_throttle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_wins() {
        assert_eq!(ThrottleResolver::resolve(0.4, 0.9, false), 0.4);
        assert_eq!(ThrottleResolver::resolve(0.9, 0.4, false), 0.4);
    }

    #[test]
    fn test_quarantine_overrides() {
        assert_eq!(ThrottleResolver::resolve(0.9, 0.4, true), 0.0);
        assert_eq!(ThrottleResolver::resolve(1.0, 1.0, true), 0.0);
    }

    #[test]
    fn test_out_of_range_inputs() {
        assert_eq!(ThrottleResolver::resolve(1.7, 2.0, false), 1.0);
        assert_eq!(ThrottleResolver::resolve(-0.2, 0.5, false), 0.0);
        assert_eq!(ThrottleResolver::resolve(f64::NAN, 0.5, false), 0.0);
    }
}
