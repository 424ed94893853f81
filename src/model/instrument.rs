//! InstrumentConfiguration (spec.md §3, §9): a tagged variant replacing the
//! source's polymorphic per-instrument records, with the small common
//! capability interface spec.md §9 calls for: installed-filter check,
//! filter-change cost, setup time, teardown time, on-source time, total
//! time.
//!
//! Per-instrument filter-change costs are grounded on
//! `original_source/qplan/entity.py`'s `SPCAMConfiguration`,
//! `HSCConfiguration`, and `FOCASConfiguration` (SPEC_FULL.md §3a).

use serde::{Deserialize, Serialize};

/// Fields shared by every concrete instrument variant (spec.md §3's
/// capability set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentCommon {
    pub filter: String,
    pub exposure_time_sec: f64,
    pub exposure_count: u32,
    pub dither_pattern: Option<String>,
    pub guiding: bool,
    pub position_angle_deg: f64,
    pub ra_offset_arcsec: f64,
    pub dec_offset_arcsec: f64,
    pub dither_params: Option<String>,
    pub skip_index: Option<u32>,
    pub stop_index: Option<u32>,
}

impl InstrumentCommon {
    pub fn new(filter: impl Into<String>, exposure_time_sec: f64, exposure_count: u32) -> Self {
        Self {
            filter: filter.into(),
            exposure_time_sec,
            exposure_count,
            dither_pattern: None,
            guiding: false,
            position_angle_deg: 0.0,
            ra_offset_arcsec: 0.0,
            dec_offset_arcsec: 0.0,
            dither_params: None,
            skip_index: None,
            stop_index: None,
        }
    }

    fn on_source_time_sec(&self) -> f64 {
        self.exposure_time_sec * self.exposure_count as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstrumentConfiguration {
    /// Suprime-Cam: filter-change cost 600s (qplan `SPCAMConfiguration`).
    Spcam(InstrumentCommon),
    /// Hyper Suprime-Cam: filter-change cost 2100s, its filter exchanger
    /// being comparatively slow (qplan `HSCConfiguration`).
    Hsc(InstrumentCommon),
    /// Faint Object Camera And Spectrograph: filter-change cost 30s
    /// (qplan `FOCASConfiguration`).
    Focas(InstrumentCommon),
    /// Any instrument not named above, with an explicit filter-change cost
    /// supplied by the caller.
    Generic {
        common: InstrumentCommon,
        filter_change_cost_sec: f64,
        name: String,
    },
}

impl InstrumentConfiguration {
    /// The instrument's name, as it would appear in a schedule's
    /// instrument whitelist (spec.md §4.2.1).
    pub fn name(&self) -> &str {
        match self {
            InstrumentConfiguration::Spcam(_) => "SPCAM",
            InstrumentConfiguration::Hsc(_) => "HSC",
            InstrumentConfiguration::Focas(_) => "FOCAS",
            InstrumentConfiguration::Generic { name, .. } => name,
        }
    }

    pub fn common(&self) -> &InstrumentCommon {
        match self {
            InstrumentConfiguration::Spcam(c)
            | InstrumentConfiguration::Hsc(c)
            | InstrumentConfiguration::Focas(c) => c,
            InstrumentConfiguration::Generic { common, .. } => common,
        }
    }

    /// Whether `candidate_filter` is in the schedule's installed-filter
    /// list (spec.md §4.2.1).
    pub fn filter_installed(&self, installed: &[String]) -> bool {
        installed.iter().any(|f| f == &self.common().filter)
    }

    pub fn filter_change_cost_sec(&self) -> f64 {
        match self {
            InstrumentConfiguration::Spcam(_) => 600.0,
            InstrumentConfiguration::Hsc(_) => 2100.0,
            InstrumentConfiguration::Focas(_) => 30.0,
            InstrumentConfiguration::Generic {
                filter_change_cost_sec,
                ..
            } => *filter_change_cost_sec,
        }
    }

    /// Instrument setup overhead (spec.md §4.3 step 4). Kept minimal and
    /// uniform across instruments, unlike filter-change cost; the source
    /// does not assign per-instrument setup costs distinct from the
    /// scheduler's own "Setup OB" helper.
    pub fn setup_cost_sec(&self) -> f64 {
        0.0
    }

    pub fn teardown_cost_sec(&self) -> f64 {
        0.0
    }

    pub fn on_source_time_sec(&self) -> f64 {
        self.common().on_source_time_sec()
    }

    pub fn total_time_sec(&self) -> f64 {
        self.on_source_time_sec() + self.setup_cost_sec() + self.teardown_cost_sec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_change_costs_match_reference() {
        let c = InstrumentCommon::new("r", 300.0, 3);
        assert_eq!(InstrumentConfiguration::Spcam(c.clone()).filter_change_cost_sec(), 600.0);
        assert_eq!(InstrumentConfiguration::Hsc(c.clone()).filter_change_cost_sec(), 2100.0);
        assert_eq!(InstrumentConfiguration::Focas(c).filter_change_cost_sec(), 30.0);
    }

    #[test]
    fn on_source_time_is_exposure_time_times_count() {
        let c = InstrumentCommon::new("g", 120.0, 5);
        let inst = InstrumentConfiguration::Spcam(c);
        assert_eq!(inst.on_source_time_sec(), 600.0);
    }

    #[test]
    fn filter_installed_checks_exact_name() {
        let c = InstrumentCommon::new("r", 100.0, 1);
        let inst = InstrumentConfiguration::Focas(c);
        assert!(inst.filter_installed(&["g".to_string(), "r".to_string()]));
        assert!(!inst.filter_installed(&["g".to_string()]));
    }

    #[test]
    fn generic_uses_caller_supplied_cost() {
        let inst = InstrumentConfiguration::Generic {
            common: InstrumentCommon::new("i", 60.0, 1),
            filter_change_cost_sec: 45.0,
            name: "GENERIC-IR".to_string(),
        };
        assert_eq!(inst.filter_change_cost_sec(), 45.0);
    }
}
