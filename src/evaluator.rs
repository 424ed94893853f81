//! The Slot Evaluator (spec.md §4.3): scores a single
//! `(previous_slot, candidate_slot, OB)` triple into an accepted candidate
//! or a rejection reason. The 11-step algorithm and the moon-separation
//! override are grounded on
//! `original_source/qplan/qsim.py::check_slot`/`check_moon_cond`.

use chrono::{DateTime, Utc};

use crate::config::PlannerConfig;
use crate::ephemeris::{self, CelestialBody};
use crate::model::{DomeState, Ob, Slot};
use crate::observer::Observer;

/// An accepted candidate: everything the Night-Filling Scheduler needs to
/// split the slot and insert helper + science OBs (spec.md §4.3).
#[derive(Debug, Clone)]
pub struct Candidate {
    pub ob: Ob,
    pub prev_ob: Option<Ob>,
    pub prep_sec: f64,
    pub slew_sec: f64,
    pub slew2_sec: f64,
    pub filterchange: bool,
    pub filterchange_sec: f64,
    pub calibration_sec: f64,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    pub delay_sec: f64,
}

/// The result of evaluating one OB against one slot: either an accepted
/// [`Candidate`] or a rejection with a human-readable reason (spec.md §7:
/// "per-OB feasibility failures are NOT errors").
#[derive(Debug, Clone)]
pub enum SlotOutcome {
    Accepted(Box<Candidate>),
    Rejected { reason: String },
}

impl SlotOutcome {
    fn reject(reason: impl Into<String>) -> Self {
        SlotOutcome::Rejected { reason: reason.into() }
    }
}

fn target_body(ob: &Ob, at: DateTime<Utc>) -> CelestialBody {
    ob.target.body_at(at)
}

/// Evaluate `ob` against `(prev_slot, slot)` (spec.md §4.3 steps 1-11).
/// `allow_delay=false` rejects any candidate with `delay_sec > 0` (the
/// source's `no_delay` flag).
pub fn check_slot(
    config: &PlannerConfig,
    observer: &Observer,
    prev_slot: Option<&Slot>,
    slot: &Slot,
    ob: &Ob,
    check_moon: bool,
    check_env: bool,
    allow_delay: bool,
) -> SlotOutcome {
    // Step 1: size gate.
    let slot_size_sec = slot.size_sec();
    if ob.total_time_sec > slot_size_sec {
        return SlotOutcome::reject(format!(
            "slot duration ({slot_size_sec:.0}s) too short for OB ({:.0}s)",
            ob.total_time_sec
        ));
    }

    // Step 2: time-window gate.
    if let Some(lower) = ob.env_cfg.time_lower {
        if lower > slot.stop {
            return SlotOutcome::reject("slot end time is before OB lower time limit");
        }
    }
    if let Some(upper) = ob.env_cfg.time_upper {
        if upper < slot.start {
            return SlotOutcome::reject("slot start time is after OB upper time limit");
        }
    }

    // Step 3: filter change.
    let (prev_ob, cur_filter) = match prev_slot.and_then(|s| s.ob.as_ref()) {
        Some(prev_ob) => (Some(prev_ob.clone()), Some(prev_ob.inst_cfg.common().filter.clone())),
        None => (None, slot.payload.as_ref().and_then(|p| p.cur_filter.clone())),
    };
    let new_filter = &ob.inst_cfg.common().filter;
    let filterchange = cur_filter.as_deref() != Some(new_filter.as_str());
    let filterchange_sec = if filterchange {
        ob.inst_cfg.filter_change_cost_sec()
    } else {
        0.0
    };

    // Step 4: setup.
    let mut prep_sec = filterchange_sec + ob.inst_cfg.setup_cost_sec();

    // Dome mismatch is checked before the fast path, matching the source's
    // ordering (it rechecks even though the Filter already did once).
    let slot_dome = slot.payload.as_ref().map(|p| p.dome).unwrap_or(DomeState::Open);
    if slot_dome != ob.tel_cfg.dome {
        return SlotOutcome::reject(format!(
            "dome status OB({:?}) != slot({:?})",
            ob.tel_cfg.dome, slot_dome
        ));
    }

    let mut start_time = slot.start + chrono::Duration::milliseconds((prep_sec * 1000.0).round() as i64);

    // Step 5: dome-closed fast path.
    if slot_dome == DomeState::Closed {
        let stop_time = start_time + chrono::Duration::milliseconds((ob.total_time_sec * 1000.0).round() as i64);
        if stop_time > slot.stop {
            return SlotOutcome::reject("not enough time in slot");
        }
        return SlotOutcome::Accepted(Box::new(Candidate {
            ob: ob.clone(),
            prev_ob,
            prep_sec,
            slew_sec: 0.0,
            slew2_sec: 0.0,
            filterchange,
            filterchange_sec,
            calibration_sec: 0.0,
            start_time,
            stop_time,
            delay_sec: 0.0,
        }));
    }

    // Step 6: environment gates.
    if check_env {
        if let Some(payload) = &slot.payload {
            if payload.seeing_arcsec > ob.env_cfg.seeing_ceiling_arcsec {
                return SlotOutcome::reject(format!(
                    "seeing ({:.2} > {:.2}) not acceptable",
                    payload.seeing_arcsec, ob.env_cfg.seeing_ceiling_arcsec
                ));
            }
            if let Some(floor) = ob.env_cfg.transparency_floor {
                if payload.transparency < floor {
                    return SlotOutcome::reject(format!(
                        "transparency ({:.2} < {:.2}) not acceptable",
                        payload.transparency, floor
                    ));
                }
            }
        }
    }

    // Step 7: slew.
    let slew_target = ob.target.calib_companion.as_deref().unwrap_or(&ob.target);
    let (cur_alt_deg, cur_az_deg) = match &prev_ob {
        Some(p) => {
            let c = ephemeris::calc(observer, &target_body(p, start_time), start_time);
            (c.alt_deg, c.az_deg)
        }
        None => match slot.payload.as_ref().and_then(|p| p.cur_az_deg.zip(p.cur_el_deg)) {
            Some((az, el)) => (el, az),
            None => (config.parked_position.el_deg, config.parked_position.az_deg),
        },
    };
    let c1 = ephemeris::calc(observer, &slew_target.body_at(start_time), start_time);
    let slew_sec = slew_time_sec(config, cur_alt_deg, cur_az_deg, c1.alt_deg, c1.az_deg);
    prep_sec += slew_sec;
    start_time += chrono::Duration::milliseconds((slew_sec * 1000.0).round() as i64);

    let min_el = ob.tel_cfg.min_el_deg;
    let max_el = ob.tel_cfg.max_el_deg;

    // Step 8: calibration companion.
    let mut calibration_sec = 0.0;
    let mut slew2_sec = 0.0;
    if let Some(companion) = &ob.target.calib_companion {
        calibration_sec = ob.inst_cfg.common().exposure_time_sec * ob.inst_cfg.common().exposure_count as f64;
        prep_sec += calibration_sec;
        start_time += chrono::Duration::milliseconds((calibration_sec * 1000.0).round() as i64);

        let is_distinct = (companion.ra_deg - ob.target.ra_deg).abs() > 1e-9
            || (companion.dec_deg - ob.target.dec_deg).abs() > 1e-9;
        if is_distinct {
            let obs = ephemeris::observable(
                observer,
                &companion.body_at(start_time),
                start_time,
                slot.stop,
                min_el,
                max_el,
                calibration_sec,
                Some(ob.env_cfg.airmass_ceiling),
            );
            if !obs.ok {
                return SlotOutcome::reject("time or visibility of separate calibration target");
            }
            let c2 = ephemeris::calc(observer, &ob.target.body_at(start_time), start_time);
            slew2_sec = slew_time_sec(config, c1.alt_deg, c1.az_deg, c2.alt_deg, c2.az_deg);
            prep_sec += slew2_sec;
            start_time += chrono::Duration::milliseconds((slew2_sec * 1000.0).round() as i64);
        }
    }

    // Step 9: visibility & delay.
    let obs = ephemeris::observable(
        observer,
        &ob.target.body_at(start_time),
        start_time,
        slot.stop,
        min_el,
        max_el,
        ob.total_time_sec,
        Some(ob.env_cfg.airmass_ceiling),
    );
    if !obs.ok {
        return SlotOutcome::reject("time or visibility of target");
    }
    let mut t_start = obs.visible_start.unwrap();
    let mut t_stop = obs.visible_stop.unwrap();
    if let Some(lower) = ob.env_cfg.time_lower {
        t_start = t_start.max(lower);
    }
    let delay_sec = (t_start - start_time).num_milliseconds().max(0) as f64 / 1000.0;
    if !allow_delay && delay_sec > 0.0 {
        return SlotOutcome::reject(format!("no_delay==true and OB has a delay of {delay_sec:.4} sec"));
    }

    // Step 10: fit check.
    let stop_time = t_start
        + chrono::Duration::milliseconds((ob.total_time_sec * 1000.0).round() as i64)
        + chrono::Duration::milliseconds((config.teardown_sec * 1000.0).round() as i64);
    if let Some(upper) = ob.env_cfg.time_upper {
        t_stop = t_stop.min(upper);
    }
    t_stop = t_stop.min(slot.stop);
    if t_stop < stop_time {
        return SlotOutcome::reject("not enough time in slot after all prep/delay");
    }

    // Step 11: moon check.
    if check_moon {
        if let Err(reason) = check_moon_cond(config, observer, t_start, stop_time, ob) {
            return SlotOutcome::reject(reason);
        }
    }

    SlotOutcome::Accepted(Box::new(Candidate {
        ob: ob.clone(),
        prev_ob,
        prep_sec,
        slew_sec,
        slew2_sec,
        filterchange,
        filterchange_sec,
        calibration_sec,
        start_time: t_start,
        stop_time,
        delay_sec,
    }))
}

/// Slew time as a monotone function of `(|Δaz|, |Δalt|)`, per-axis rate,
/// max of the two axes (spec.md §4.3 step 7, §4a).
fn slew_time_sec(config: &PlannerConfig, cur_alt_deg: f64, cur_az_deg: f64, to_alt_deg: f64, to_az_deg: f64) -> f64 {
    let delta_alt = (to_alt_deg - cur_alt_deg).abs();
    let mut delta_az = (to_az_deg - cur_az_deg).abs();
    if delta_az > 180.0 {
        delta_az = 360.0 - delta_az;
    }
    (delta_alt / config.slew_rates.el_deg_per_sec).max(delta_az / config.slew_rates.az_deg_per_sec)
}

/// Moon darkness/separation check (spec.md §4.3 step 11, §9 Open Question
/// 1: the 30° override cap applies uniformly to any OB with a moon-
/// separation requirement, not only `moon == "dark"` OBs).
fn check_moon_cond(
    config: &PlannerConfig,
    observer: &Observer,
    start_time: DateTime<Utc>,
    stop_time: DateTime<Utc>,
    ob: &Ob,
) -> Result<(), String> {
    let c1 = ephemeris::calc(observer, &ob.target.body_at(start_time), start_time);
    let c2 = ephemeris::calc(observer, &ob.target.body_at(stop_time), stop_time);

    let is_dark_night = c1.moon_illumination <= config.dark_illumination_ceiling;
    let moon_is_down = c1.moon_alt_deg < 0.0 && c2.moon_alt_deg < 0.0;

    if ob.env_cfg.moon == crate::model::MoonPhase::Dark && !(is_dark_night || moon_is_down) {
        return Err(format!(
            "moon illumination={:.3} not acceptable (alt1={:.2} alt2={:.2})",
            c1.moon_illumination, c1.moon_alt_deg, c2.moon_alt_deg
        ));
    }

    let mut desired_moon_sep = ob.env_cfg.moon_sep_deg;
    if moon_is_down && desired_moon_sep > 0.0 {
        desired_moon_sep = desired_moon_sep.min(config.moon_down_separation_cap_deg);
    }

    if desired_moon_sep > 0.0 && (c1.moon_separation_deg < desired_moon_sep || c2.moon_separation_deg < desired_moon_sep) {
        return Err(format!(
            "moon-target separation ({:.2}, {:.2} < {:.2}) not acceptable",
            c1.moon_separation_deg, c2.moon_separation_deg, desired_moon_sep
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::instrument::InstrumentCommon;
    use crate::model::{
        DomeState, EnvironmentConfiguration, InstrumentConfiguration, SchedulePayload, TelescopeConfiguration,
    };
    use crate::observer::subaru;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn meridian_ob(id: &str, observer: &Observer, at: DateTime<Utc>, total_sec: f64) -> Ob {
        let lst_deg = observer.local_sidereal_time_hours(at) * 15.0;
        Ob::new(
            id,
            "prog-1",
            5.0,
            // 10 degrees shy of zenith at transit, so altitude sits
            // comfortably inside [min_el, max_el] rather than riding the
            // el_max=89 boundary exactly.
            crate::model::Target::new("meridian", lst_deg, observer.latitude_deg - 10.0),
            InstrumentConfiguration::Spcam(InstrumentCommon::new("r", 300.0, 6)),
            TelescopeConfiguration::default(),
            EnvironmentConfiguration::default(),
            total_sec,
            total_sec,
        )
    }

    fn open_payload(cur_filter: Option<&str>) -> SchedulePayload {
        SchedulePayload {
            filters: vec!["r".to_string(), "g".to_string()],
            seeing_arcsec: 0.5,
            transparency: 1.0,
            dome: DomeState::Open,
            categories: vec![],
            instruments: vec!["SPCAM".to_string()],
            cur_filter: cur_filter.map(|s| s.to_string()),
            cur_az_deg: Some(0.0),
            cur_el_deg: Some(90.0),
        }
    }

    #[test]
    fn size_gate_rejects_ob_longer_than_slot() {
        let observer = subaru();
        let start = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 19, 0, 0).unwrap();
        let slot = Slot::new(start, start + chrono::Duration::minutes(10), Some(Arc::new(open_payload(Some("r")))));
        let ob = meridian_ob("ob-1", &observer, start, 1800.0);
        let config = PlannerConfig::default();
        let outcome = check_slot(&config, &observer, None, &slot, &ob, true, true, true);
        assert!(matches!(outcome, SlotOutcome::Rejected { .. }));
    }

    #[test]
    fn matching_filter_needs_no_filterchange() {
        let observer = subaru();
        let start = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 19, 0, 0).unwrap();
        let slot = Slot::new(start, start + chrono::Duration::hours(1), Some(Arc::new(open_payload(Some("r")))));
        let ob = meridian_ob("ob-1", &observer, start, 1800.0);
        let config = PlannerConfig::default();
        let outcome = check_slot(&config, &observer, None, &slot, &ob, true, true, true);
        match outcome {
            SlotOutcome::Accepted(c) => assert!(!c.filterchange),
            SlotOutcome::Rejected { reason } => panic!("expected acceptance, got: {reason}"),
        }
    }

    #[test]
    fn mismatched_filter_adds_filterchange_cost() {
        let observer = subaru();
        let start = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 19, 0, 0).unwrap();
        let slot = Slot::new(start, start + chrono::Duration::hours(1), Some(Arc::new(open_payload(Some("g")))));
        let ob = meridian_ob("ob-1", &observer, start, 1800.0);
        let config = PlannerConfig::default();
        let outcome = check_slot(&config, &observer, None, &slot, &ob, true, true, true);
        match outcome {
            SlotOutcome::Accepted(c) => {
                assert!(c.filterchange);
                assert_eq!(c.filterchange_sec, 600.0);
            }
            SlotOutcome::Rejected { reason } => panic!("expected acceptance, got: {reason}"),
        }
    }

    #[test]
    fn dome_closed_fast_path_skips_visibility() {
        let observer = subaru();
        let start = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 19, 0, 0).unwrap();
        let mut payload = open_payload(Some("r"));
        payload.dome = DomeState::Closed;
        let slot = Slot::new(start, start + chrono::Duration::hours(1), Some(Arc::new(payload)));
        let mut ob = meridian_ob("ob-1", &observer, start, 1800.0);
        ob.tel_cfg.dome = DomeState::Closed;
        let config = PlannerConfig::default();
        let outcome = check_slot(&config, &observer, None, &slot, &ob, true, true, true);
        match outcome {
            SlotOutcome::Accepted(c) => {
                assert_eq!(c.slew_sec, 0.0);
                assert_eq!(c.stop_time, c.start_time + chrono::Duration::seconds(1800));
            }
            SlotOutcome::Rejected { reason } => panic!("expected acceptance, got: {reason}"),
        }
    }

    #[test]
    fn no_delay_flag_rejects_an_otherwise_delayed_candidate() {
        let observer = subaru();
        let start = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 19, 0, 0).unwrap();
        // Target rising several hours after start forces a delay.
        let future_lst_deg = observer.local_sidereal_time_hours(start + chrono::Duration::hours(3)) * 15.0;
        let mut ob = meridian_ob("ob-1", &observer, start, 1800.0);
        ob.target.ra_deg = future_lst_deg;
        ob.target.dec_deg = observer.latitude_deg - 10.0;
        let slot = Slot::new(start, start + chrono::Duration::hours(6), Some(Arc::new(open_payload(Some("r")))));
        let config = PlannerConfig::default();
        let outcome = check_slot(&config, &observer, None, &slot, &ob, false, false, false);
        assert!(matches!(outcome, SlotOutcome::Rejected { .. }));
    }
}
