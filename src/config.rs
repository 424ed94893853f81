//! The planner's configuration record (spec.md §4.4, §6).
//!
//! Everything the cost function, slot evaluator, and ephemeris cache need
//! that isn't per-OB data lives here, constructible from defaults, built up
//! programmatically, or loaded from a TOML file — grounded on the teacher's
//! `toml` dependency (`db/config.rs`).

use serde::{Deserialize, Serialize};

use crate::error::PlannerError;

/// Recognized cost-function weight keys (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub w_slew: f64,
    pub w_delay: f64,
    pub w_filterchange: f64,
    pub w_rank: f64,
    pub w_priority: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            w_rank: 0.3,
            w_delay: 0.2,
            w_slew: 0.2,
            w_priority: 0.1,
            w_filterchange: 0.3,
        }
    }
}

/// Normalization ceilings for the cost function (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostLimits {
    pub max_slew_sec: f64,
    pub max_delay_sec: f64,
    pub max_filterchange_sec: f64,
    pub max_rank: f64,
}

impl Default for CostLimits {
    fn default() -> Self {
        Self {
            max_slew_sec: 20.0 * 60.0,
            max_delay_sec: 10.0 * 3600.0,
            max_filterchange_sec: 35.0 * 60.0,
            max_rank: 10.0,
        }
    }
}

/// Per-axis telescope slew rate, degrees/second (spec.md §4.3 step 7).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlewRates {
    pub az_deg_per_sec: f64,
    pub el_deg_per_sec: f64,
}

impl Default for SlewRates {
    fn default() -> Self {
        Self {
            az_deg_per_sec: 0.5,
            el_deg_per_sec: 0.5,
        }
    }
}

/// Ephemeris cache grid and precision settings (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EphemerisCacheConfig {
    pub grid_minutes: f64,
    pub precision_minutes: f64,
}

impl Default for EphemerisCacheConfig {
    fn default() -> Self {
        Self {
            grid_minutes: 5.0,
            precision_minutes: 5.0,
        }
    }
}

/// A parked (stowed) telescope position used as the slew origin when there
/// is no previous OB and the schedule payload carries no current az/el
/// (spec.md §4.3 step 7).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParkedPosition {
    pub az_deg: f64,
    pub el_deg: f64,
}

impl Default for ParkedPosition {
    fn default() -> Self {
        Self {
            az_deg: 0.0,
            el_deg: 90.0,
        }
    }
}

/// The complete set of planner-wide configuration: weights, normalization
/// limits, slew rates, ephemeris cache grid, parked position, and the
/// "dark night" illumination ceiling used by the moon check (spec.md §4.3
/// step 11, §8).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub weights: Weights,
    pub cost_limits: CostLimits,
    pub slew_rates: SlewRates,
    pub ephemeris_cache: EphemerisCacheConfig,
    pub parked_position: ParkedPosition,
    /// Moon illumination fraction at or below which a night interval
    /// qualifies as "dark" (spec.md §4.3 step 11): default 0.25.
    pub dark_illumination_ceiling: f64,
    /// Cap applied to a moon-separation requirement when the moon is below
    /// the horizon for the whole interval (spec.md §4.3 step 11, §9 Open
    /// Question 1): default 30 degrees.
    pub moon_down_separation_cap_deg: f64,
    /// Teardown time appended after the science exposure before the fit
    /// check (spec.md §4.3 step 10).
    pub teardown_sec: f64,
    /// Duration of the always-inserted "Setup OB" helper slot (spec.md
    /// §4.5.i).
    pub setup_sec: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            cost_limits: CostLimits::default(),
            slew_rates: SlewRates::default(),
            ephemeris_cache: EphemerisCacheConfig::default(),
            parked_position: ParkedPosition::default(),
            dark_illumination_ceiling: 0.25,
            moon_down_separation_cap_deg: 30.0,
            teardown_sec: 0.0,
            setup_sec: 1.0,
        }
    }
}

impl PlannerConfig {
    /// Load a configuration from a TOML document, falling back to defaults
    /// for any field the document omits.
    pub fn from_toml_str(s: &str) -> Result<Self, PlannerError> {
        toml::from_str(s).map_err(|e| PlannerError::InvalidConfig(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = PlannerConfig::default();
        assert_eq!(cfg.weights.w_rank, 0.3);
        assert_eq!(cfg.weights.w_filterchange, 0.3);
        assert_eq!(cfg.cost_limits.max_slew_sec, 1200.0);
        assert_eq!(cfg.slew_rates.az_deg_per_sec, 0.5);
        assert_eq!(cfg.dark_illumination_ceiling, 0.25);
        assert_eq!(cfg.moon_down_separation_cap_deg, 30.0);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let toml = r#"
            [weights]
            w_rank = 0.5
            w_delay = 0.2
            w_slew = 0.2
            w_priority = 0.1
            w_filterchange = 0.3

            [cost_limits]
            max_slew_sec = 1200.0
            max_delay_sec = 36000.0
            max_filterchange_sec = 2100.0
            max_rank = 10.0

            [slew_rates]
            az_deg_per_sec = 0.5
            el_deg_per_sec = 0.5

            [ephemeris_cache]
            grid_minutes = 5.0
            precision_minutes = 5.0

            [parked_position]
            az_deg = 180.0
            el_deg = 45.0

            dark_illumination_ceiling = 0.25
            moon_down_separation_cap_deg = 30.0
            teardown_sec = 0.0
            setup_sec = 1.0
        "#;
        let cfg = PlannerConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.weights.w_rank, 0.5);
        assert_eq!(cfg.parked_position.az_deg, 180.0);
    }

    #[test]
    fn invalid_toml_is_an_invalid_config_error() {
        let err = PlannerConfig::from_toml_str("not valid toml {{{").unwrap_err();
        assert!(matches!(err, PlannerError::InvalidConfig(_)));
    }
}
