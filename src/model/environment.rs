//! EnvironmentConfiguration (spec.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoonPhase {
    Dark,
    Gray,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfiguration {
    pub seeing_ceiling_arcsec: f64,
    pub airmass_ceiling: f64,
    pub moon: MoonPhase,
    pub moon_sep_deg: f64,
    pub transparency_floor: Option<f64>,
    pub time_lower: Option<DateTime<Utc>>,
    pub time_upper: Option<DateTime<Utc>>,
}

impl Default for EnvironmentConfiguration {
    fn default() -> Self {
        Self {
            seeing_ceiling_arcsec: 2.0,
            airmass_ceiling: 2.0,
            moon: MoonPhase::Any,
            moon_sep_deg: 0.0,
            transparency_floor: None,
            time_lower: None,
            time_upper: None,
        }
    }
}

impl EnvironmentConfiguration {
    /// Whether `start_time` lies within this environment's optional clock
    /// window (spec.md §4.3 step 2, §8's boundary property on time limits).
    pub fn allows_start_time(&self, start_time: DateTime<Utc>) -> bool {
        if let Some(lower) = self.time_lower {
            if start_time < lower {
                return false;
            }
        }
        if let Some(upper) = self.time_upper {
            if start_time > upper {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_moon_phase_is_any() {
        assert_eq!(EnvironmentConfiguration::default().moon, MoonPhase::Any);
    }

    #[test]
    fn time_window_rejects_outside_bounds() {
        let mut env = EnvironmentConfiguration::default();
        env.time_lower = Some(chrono::Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap());
        env.time_upper = Some(chrono::Utc.with_ymd_and_hms(2024, 6, 1, 23, 0, 0).unwrap());
        assert!(env.allows_start_time(chrono::Utc.with_ymd_and_hms(2024, 6, 1, 21, 0, 0).unwrap()));
        assert!(!env.allows_start_time(chrono::Utc.with_ymd_and_hms(2024, 6, 1, 19, 0, 0).unwrap()));
        assert!(!env.allows_start_time(chrono::Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap()));
    }
}
