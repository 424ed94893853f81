//! The Feasibility Filter (spec.md §4.2): two stages applied in order,
//! pruning OBs that cannot run in a given schedule before the Slot
//! Evaluator ever sees them. Grounded on
//! `original_source/qplan/qsim.py::check_schedule_invariant_one`/
//! `check_night_visibility_one`.

use chrono::{DateTime, Utc};

use crate::ephemeris;
use crate::model::{DomeState, Ob, Schedule};
use crate::observer::Observer;

/// Outcome of filtering one OB against one Schedule (spec.md §4.2's
/// "for each OB, {ok, reason?, visible_start, visible_stop}").
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub ok: bool,
    pub reason: Option<String>,
    pub visible_start: Option<DateTime<Utc>>,
    pub visible_stop: Option<DateTime<Utc>>,
}

impl FilterOutcome {
    fn ok(visible_start: DateTime<Utc>, visible_stop: DateTime<Utc>) -> Self {
        Self {
            ok: true,
            reason: None,
            visible_start: Some(visible_start),
            visible_stop: Some(visible_stop),
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
            visible_start: None,
            visible_stop: None,
        }
    }
}

/// §4.2.2: night visibility, evaluated once per `(schedule, OB)` after
/// §4.2.1 has already passed.
pub fn check_night_visibility(observer: &Observer, schedule: &Schedule, ob: &Ob) -> FilterOutcome {
    let payload = &schedule.payload;

    if payload.dome != ob.tel_cfg.dome {
        let both_closed = payload.dome == DomeState::Closed && ob.tel_cfg.dome == DomeState::Closed;
        if !both_closed {
            return FilterOutcome::reject(format!(
                "dome status OB({:?}) != schedule({:?})",
                ob.tel_cfg.dome, payload.dome
            ));
        }
        return FilterOutcome::ok(schedule.start, schedule.stop);
    }

    if ob.tel_cfg.dome == DomeState::Closed {
        return FilterOutcome::ok(schedule.start, schedule.stop);
    }

    let min_el = ob.tel_cfg.min_el_deg;
    let max_el = ob.tel_cfg.max_el_deg;

    let obs = ephemeris::observable(
        observer,
        &ob.target.body_at(schedule.start),
        schedule.start,
        schedule.stop,
        min_el,
        max_el,
        ob.total_time_sec,
        Some(ob.env_cfg.airmass_ceiling),
    );
    if !obs.ok {
        return FilterOutcome::reject("time or visibility of target");
    }
    let (mut t_start, t_stop) = (obs.visible_start.unwrap(), obs.visible_stop.unwrap());

    if let Some(companion) = &ob.target.calib_companion {
        let is_distinct =
            (companion.ra_deg - ob.target.ra_deg).abs() > 1e-9 || (companion.dec_deg - ob.target.dec_deg).abs() > 1e-9;
        if is_distinct {
            let obs2 = ephemeris::observable(
                observer,
                &companion.body_at(schedule.start),
                schedule.start,
                schedule.stop,
                min_el,
                max_el,
                ob.total_time_sec,
                Some(ob.env_cfg.airmass_ceiling),
            );
            if !obs2.ok {
                return FilterOutcome::reject("time or visibility of calibration target");
            }
            // Intersection: assume the calibration exposure is taken first.
            t_start = t_start.max(obs2.visible_start.unwrap());
        }
    }

    FilterOutcome::ok(t_start, t_stop)
}

/// Apply both stages to every OB in `obs`, returning `(good, rejections)`
/// where each rejection pairs the OB id with its reason (spec.md §4.5.1:
/// "record reasons for the summary").
pub fn filter_obs<'a>(observer: &Observer, schedule: &Schedule, obs: &'a [Ob]) -> (Vec<&'a Ob>, Vec<(String, String)>) {
    let mut good = Vec::new();
    let mut bad = Vec::new();

    for ob in obs {
        let stage1 = check_schedule_invariants_real(schedule, ob);
        if !stage1.ok {
            bad.push((ob.id.clone(), stage1.reason.unwrap_or_default()));
            continue;
        }
        let stage2 = check_night_visibility(observer, schedule, ob);
        if !stage2.ok {
            bad.push((ob.id.clone(), stage2.reason.unwrap_or_default()));
            continue;
        }
        good.push(ob);
    }

    (good, bad)
}

/// §4.2.1: schedule invariants, evaluated once per `(schedule, OB)`. The
/// category check needs the OB's program category, which the OB carries
/// directly via `category_hint` (set by ingest from the Program table),
/// since an OB stores only its program's id, not its full record
/// (spec.md §3: "OB: ... program reference").
fn check_schedule_invariants_real(schedule: &Schedule, ob: &Ob) -> FilterOutcome {
    check_schedule_invariants_for(schedule, ob, &ob.category_hint)
}

/// §4.2.1 with an explicit category (spec.md: "OB's program.category ∈
/// schedule.categories"). The OB model does not embed its program's
/// category directly (only `program_id`); callers resolve it from the
/// Program table and pass it here, or rely on [`Ob::category_hint`] set by
/// the caller at ingest time.
pub fn check_schedule_invariants_for(schedule: &Schedule, ob: &Ob, category: &str) -> FilterOutcome {
    let payload = &schedule.payload;

    if !payload.instruments.iter().any(|i| i == ob.inst_cfg.name()) {
        return FilterOutcome::reject(format!("instrument '{}' not installed", ob.inst_cfg.name()));
    }

    if !ob.inst_cfg.filter_installed(&payload.filters) {
        return FilterOutcome::reject(format!(
            "filter '{}' not installed [{:?}]",
            ob.inst_cfg.common().filter,
            payload.filters
        ));
    }

    if !payload.categories.iter().any(|c| c == category) {
        return FilterOutcome::reject(format!("slot cannot take category '{category}'"));
    }

    FilterOutcome {
        ok: true,
        reason: None,
        visible_start: None,
        visible_stop: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::instrument::InstrumentCommon;
    use crate::model::{
        EnvironmentConfiguration, InstrumentConfiguration, SchedulePayload, TelescopeConfiguration,
    };
    use crate::observer::subaru;
    use chrono::TimeZone;

    fn schedule(dome: DomeState) -> Schedule {
        let start = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 19, 0, 0).unwrap();
        Schedule::new(
            start,
            start + chrono::Duration::hours(1),
            SchedulePayload {
                filters: vec!["r".to_string()],
                seeing_arcsec: 0.8,
                transparency: 1.0,
                dome,
                categories: vec!["open".to_string()],
                instruments: vec!["SPCAM".to_string()],
                cur_filter: Some("r".to_string()),
                cur_az_deg: Some(0.0),
                cur_el_deg: Some(90.0),
            },
        )
    }

    fn ob(instrument: &str, filter: &str) -> Ob {
        let mut o = Ob::new(
            "ob-1",
            "prog-1",
            5.0,
            crate::model::Target::new("t", 10.0, 20.0),
            match instrument {
                "SPCAM" => InstrumentConfiguration::Spcam(InstrumentCommon::new(filter, 300.0, 1)),
                _ => InstrumentConfiguration::Generic {
                    common: InstrumentCommon::new(filter, 300.0, 1),
                    filter_change_cost_sec: 60.0,
                    name: instrument.to_string(),
                },
            },
            TelescopeConfiguration::default(),
            EnvironmentConfiguration::default(),
            1800.0,
            1800.0,
        );
        o.category_hint = "open".to_string();
        o
    }

    #[test]
    fn wrong_instrument_is_rejected() {
        let s = schedule(DomeState::Open);
        let o = ob("HSC_NOT_INSTALLED", "r");
        let res = check_schedule_invariants_for(&s, &o, "open");
        assert!(!res.ok);
    }

    #[test]
    fn wrong_filter_is_rejected() {
        let s = schedule(DomeState::Open);
        let o = ob("SPCAM", "z");
        let res = check_schedule_invariants_for(&s, &o, "open");
        assert!(!res.ok);
    }

    #[test]
    fn wrong_category_is_rejected() {
        let s = schedule(DomeState::Open);
        let o = ob("SPCAM", "r");
        let res = check_schedule_invariants_for(&s, &o, "closed-only");
        assert!(!res.ok);
    }

    #[test]
    fn both_dome_closed_short_circuits_to_success() {
        let s = schedule(DomeState::Closed);
        let observer = subaru();
        let mut o = ob("SPCAM", "r");
        o.tel_cfg.dome = DomeState::Closed;
        let res = check_night_visibility(&observer, &s, &o);
        assert!(res.ok);
    }

    #[test]
    fn dome_mismatch_is_rejected() {
        let s = schedule(DomeState::Open);
        let observer = subaru();
        let mut o = ob("SPCAM", "r");
        o.tel_cfg.dome = DomeState::Closed;
        let res = check_night_visibility(&observer, &s, &o);
        assert!(!res.ok);
    }
}
