//! The Multi-Night Driver & Reporter (spec.md §4.6): iterates night
//! records, threads an "unscheduled_obs" set through them so an OB
//! scheduled on an earlier night is removed from consideration on later
//! nights, applies executed-OB feedback (spec.md §6), aggregates
//! statistics, and renders a text summary. Grounded on
//! `original_source/qplan/Scheduler.py::schedule_all`/`select_schedule`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::events::{PlannerSink, ProgramOutcome};
use crate::model::{Ob, Program, Schedule, SchedulePayload};
use crate::observer::Observer;
use crate::scheduler::{self, ProgramBook};

/// One input night (spec.md §6's "Schedule table"): a date plus already
/// timezone-resolved UTC start/stop instants and the per-night payload.
/// `skip`/`note` let ingest record a lost night (weather, instrument swap)
/// without the driver treating it as an empty, fully-wasted schedule.
#[derive(Debug, Clone)]
pub struct NightRecord {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub payload: SchedulePayload,
    pub skip: bool,
    pub note: Option<String>,
}

impl NightRecord {
    pub fn new(date: NaiveDate, start: DateTime<Utc>, stop: DateTime<Utc>, payload: SchedulePayload) -> Self {
        Self {
            date,
            start,
            stop,
            payload,
            skip: false,
            note: None,
        }
    }
}

/// One entry of the optional executed-OBs mapping (spec.md §6): keyed by
/// `(proposal_id, obcode)` in the caller-supplied map, carrying the billed
/// on-source time and the initial/final quality assessments.
#[derive(Debug, Clone)]
pub struct ExecutedOb {
    pub acct_time_sec: f64,
    pub iqa: Option<String>,
    pub fqa: Option<String>,
}

impl ExecutedOb {
    /// spec.md §6: "exclude OBs with fqa == 'good' or (fqa blank AND iqa ∈
    /// {'good','marginal'})".
    fn is_done(&self) -> bool {
        let fqa_blank = matches!(self.fqa.as_deref(), None | Some(""));
        self.fqa.as_deref() == Some("good") || (fqa_blank && matches!(self.iqa.as_deref(), Some("good") | Some("marginal")))
    }
}

/// The executed-OBs mapping (spec.md §6), keyed by `(proposal_id, obcode)`.
/// The core functions identically with this map empty (the optional
/// persistence collaborator absent).
pub type ExecutedObs = HashMap<(String, String), ExecutedOb>;

/// A completed or uncompleted program line for the text summary (spec.md
/// §4.6), carrying the residual OB ids [`ProgramOutcome`] doesn't.
#[derive(Debug, Clone)]
pub struct ProgramReportLine {
    pub proposal_id: String,
    pub rank: f64,
    pub obs_scheduled: usize,
    pub obs_total: usize,
    pub residual_ob_ids: Vec<String>,
}

/// The outcome of one multi-night planning run.
#[derive(Debug, Clone)]
pub struct PlanResult {
    pub schedules: Vec<Schedule>,
    /// OBs still eligible (rejected or never reached) once every night has
    /// been filled or the run was cancelled (spec.md §6's "residual set").
    pub residual_obs: Vec<Ob>,
    pub summary: String,
    /// True if the run stopped early on the cancellation flag (spec.md
    /// §5): `schedules`/`residual_obs` describe the partial result.
    pub cancelled: bool,
}

/// Run the multi-night driver over `nights`, planning `obs` against
/// `programs` (spec.md §4.6). `executed` supplies the optional executed-OB
/// feedback (empty if that collaborator is absent). `is_cancelled` is
/// polled between nights and, inside each night, between slot iterations
/// (spec.md §5).
pub fn plan(
    config: &PlannerConfig,
    observer: &Observer,
    nights: &[NightRecord],
    programs: &[Program],
    obs: &[Ob],
    executed: &ExecutedObs,
    sink: &dyn PlannerSink,
    mut is_cancelled: impl FnMut() -> bool,
) -> Result<PlanResult, PlannerError> {
    let wall_start = Instant::now();
    sink.schedule_cleared();

    let mut books = ProgramBook::build_books(programs);

    // Pre-seed each program's scheduled_time with everything already billed
    // by prior executions, so §4.5.g naturally stops selecting its OBs once
    // the real (cross-run) allotment is exhausted (spec.md §4.6).
    let mut already_billed: HashMap<&str, f64> = HashMap::new();
    for ((proposal_id, _obcode), exec) in executed.iter() {
        *already_billed.entry(proposal_id.as_str()).or_insert(0.0) += exec.acct_time_sec;
    }
    for (proposal_id, sec) in already_billed {
        if let Some(book) = books.get_mut(proposal_id) {
            book.preload_scheduled_time(sec);
        }
    }

    // spec.md §4.6: "the driver threads through an 'unscheduled_obs' set so
    // that OBs scheduled on an earlier night are removed from consideration
    // on later nights." Only actually-scheduled OBs are removed here — an
    // OB the night-filling scheduler merely *rejected* this night (wrong
    // slot size, out of its time window, etc.) goes back in unchanged, since
    // a later night's fresh, differently-shaped Schedule may suit it fine.
    let mut unscheduled_obs: Vec<Ob> = obs
        .iter()
        .filter(|ob| {
            !executed
                .get(&(ob.program_id.clone(), ob.id.clone()))
                .map(ExecutedOb::is_done)
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    ProgramBook::stamp_ob_metadata(&mut unscheduled_obs, &books);

    let obs_total_by_program = count_by_program(&unscheduled_obs);

    let mut schedules = Vec::with_capacity(nights.len());
    let mut all_rejections: Vec<(String, String)> = Vec::new();
    let mut filterchange_total: u32 = 0;
    let mut cancelled = false;

    for night in nights {
        if is_cancelled() {
            tracing::info!(date = %night.date, "planning cancelled before night");
            cancelled = true;
            break;
        }

        if night.skip {
            tracing::debug!(date = %night.date, note = ?night.note, "night skipped by ingest");
            continue;
        }

        let mut schedule = Schedule::new(night.start, night.stop, night.payload.clone());

        // fill_night_schedule mutates its `eligible` argument in place,
        // dropping both scheduled AND rejected-this-night OBs (spec.md
        // §4.5.e/g), so it gets a fresh working copy rather than the
        // persistent cross-night set.
        let mut night_eligible = unscheduled_obs.clone();

        let night_result = scheduler::fill_night_schedule(
            config,
            observer,
            &mut schedule,
            &mut night_eligible,
            &mut books,
            sink,
            &mut is_cancelled,
        )
        .map_err(|source| PlannerError::NightAborted { date: night.date, source })?;

        let scheduled_ids: std::collections::HashSet<&str> = schedule
            .slots
            .iter()
            .filter_map(|s| s.ob.as_ref())
            .filter(|ob| !ob.is_derived())
            .map(|ob| ob.id.as_str())
            .collect();
        unscheduled_obs.retain(|ob| !scheduled_ids.contains(ob.id.as_str()));

        all_rejections.extend(night_result.rejections);
        filterchange_total += night_result.filterchange_count;

        sink.schedule_added(&schedule);
        schedules.push(schedule);
    }

    let (completed, uncompleted) = split_program_reports(&books, &obs_total_by_program, &unscheduled_obs);

    let completed_events: Vec<ProgramOutcome> = completed
        .iter()
        .map(|line| program_outcome(&books, line))
        .collect();
    let uncompleted_events: Vec<ProgramOutcome> = uncompleted
        .iter()
        .map(|line| program_outcome(&books, line))
        .collect();
    sink.run_completed(&completed_events, &uncompleted_events, &schedules);

    let wall_elapsed = wall_start.elapsed();
    let summary = render_summary(
        &schedules,
        &all_rejections,
        &completed,
        &uncompleted,
        filterchange_total,
        wall_elapsed,
    );

    Ok(PlanResult {
        schedules,
        residual_obs: unscheduled_obs,
        summary,
        cancelled,
    })
}

fn count_by_program(obs: &[Ob]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for ob in obs {
        *counts.entry(ob.program_id.clone()).or_insert(0) += 1;
    }
    counts
}

fn program_outcome(books: &HashMap<String, ProgramBook>, line: &ProgramReportLine) -> ProgramOutcome {
    let book = &books[&line.proposal_id];
    ProgramOutcome {
        program: book.program.clone(),
        obcount: line.obs_total,
        scheduled: line.obs_scheduled,
    }
}

/// Split every program into completed (every OB scheduled, including a
/// program with zero input OBs) and uncompleted (some residual) report
/// lines (spec.md §4.6). Iterates `books` — which `ProgramBook::build_books`
/// populates for every non-skip program in the input, regardless of whether
/// it owns any OBs — rather than `obs_total_by_program`, which only has an
/// entry for programs that actually own OBs; a program with none would
/// otherwise be silently dropped from both lists.
fn split_program_reports(
    books: &HashMap<String, ProgramBook>,
    obs_total_by_program: &HashMap<String, usize>,
    residual: &[Ob],
) -> (Vec<ProgramReportLine>, Vec<ProgramReportLine>) {
    let mut residual_by_program: HashMap<String, Vec<String>> = HashMap::new();
    for ob in residual {
        residual_by_program.entry(ob.program_id.clone()).or_default().push(ob.id.clone());
    }

    let mut completed = Vec::new();
    let mut uncompleted = Vec::new();

    let mut proposal_ids: Vec<&String> = books.keys().collect();
    proposal_ids.sort();

    for proposal_id in proposal_ids {
        let obs_total = obs_total_by_program.get(proposal_id).copied().unwrap_or(0);
        let book = &books[proposal_id];
        let line = ProgramReportLine {
            proposal_id: proposal_id.clone(),
            rank: book.program.rank,
            obs_scheduled: book.obcount,
            obs_total,
            residual_ob_ids: residual_by_program.get(proposal_id).cloned().unwrap_or_default(),
        };
        if line.residual_ob_ids.is_empty() {
            completed.push(line);
        } else {
            uncompleted.push(line);
        }
    }

    (completed, uncompleted)
}

/// Render the text summary described by spec.md §4.6: percentage of OBs
/// scheduled, unschedulable OBs with cause, completed/uncompleted programs,
/// available/scheduled/unscheduled minutes, and total wall time to plan.
fn render_summary(
    schedules: &[Schedule],
    rejections: &[(String, String)],
    completed: &[ProgramReportLine],
    uncompleted: &[ProgramReportLine],
    filterchange_count: u32,
    wall_elapsed: Duration,
) -> String {
    let total_obs: usize = completed.iter().map(|l| l.obs_total).sum::<usize>() + uncompleted.iter().map(|l| l.obs_total).sum::<usize>();
    let total_scheduled: usize = completed.iter().map(|l| l.obs_scheduled).sum::<usize>() + uncompleted.iter().map(|l| l.obs_scheduled).sum::<usize>();
    let pct_scheduled = if total_obs == 0 { 100.0 } else { 100.0 * total_scheduled as f64 / total_obs as f64 };

    let available_min: f64 = schedules.iter().map(|s| s.span_sec()).sum::<f64>() / 60.0;
    let waste_min: f64 = schedules.iter().map(|s| s.waste_sec).sum::<f64>() / 60.0;
    let scheduled_min = (available_min - waste_min).max(0.0);

    // Most recent rejection reason per OB id (an OB may be rejected once
    // per slot it was tried against across the night).
    let mut reason_by_ob: HashMap<&str, &str> = HashMap::new();
    for (ob_id, reason) in rejections {
        reason_by_ob.insert(ob_id.as_str(), reason.as_str());
    }

    let mut out = String::new();
    out.push_str("=== Queue Planning Summary ===\n");
    out.push_str(&format!("OBs scheduled: {total_scheduled}/{total_obs} ({pct_scheduled:.1}%)\n"));
    out.push_str(&format!("Filter changes: {filterchange_count}\n"));
    out.push_str(&format!(
        "Time: available {available_min:.1} min, scheduled {scheduled_min:.1} min, unscheduled {waste_min:.1} min\n"
    ));
    out.push_str(&format!("Planning wall time: {:.3} s\n", wall_elapsed.as_secs_f64()));

    out.push_str("\n-- Unschedulable OBs --\n");
    let mut unschedulable: Vec<&ProgramReportLine> = uncompleted.iter().collect();
    unschedulable.sort_by(|a, b| a.proposal_id.cmp(&b.proposal_id));
    let mut any_unschedulable = false;
    for line in &unschedulable {
        for ob_id in &line.residual_ob_ids {
            any_unschedulable = true;
            let reason = reason_by_ob.get(ob_id.as_str()).copied().unwrap_or("never reached a free slot");
            out.push_str(&format!("  {ob_id} ({}): {reason}\n", line.proposal_id));
        }
    }
    if !any_unschedulable {
        out.push_str("  (none)\n");
    }

    out.push_str("\n-- Completed programs --\n");
    if completed.is_empty() {
        out.push_str("  (none)\n");
    }
    for line in completed {
        out.push_str(&format!(
            "  {} rank={:.1}: {}/{}\n",
            line.proposal_id, line.rank, line.obs_scheduled, line.obs_total
        ));
    }

    out.push_str("\n-- Uncompleted programs --\n");
    if uncompleted.is_empty() {
        out.push_str("  (none)\n");
    }
    for line in &unschedulable {
        out.push_str(&format!(
            "  {} rank={:.1}: {}/{} (residual: {})\n",
            line.proposal_id,
            line.rank,
            line.obs_scheduled,
            line.obs_total,
            line.residual_ob_ids.join(", ")
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::model::instrument::InstrumentCommon;
    use crate::model::{DomeState, EnvironmentConfiguration, InstrumentConfiguration, TelescopeConfiguration};
    use crate::observer::subaru;
    use chrono::TimeZone;

    fn open_payload() -> SchedulePayload {
        SchedulePayload {
            filters: vec!["r".to_string()],
            seeing_arcsec: 0.5,
            transparency: 1.0,
            dome: DomeState::Open,
            categories: vec!["open".to_string()],
            instruments: vec!["SPCAM".to_string()],
            cur_filter: Some("r".to_string()),
            cur_az_deg: Some(0.0),
            cur_el_deg: Some(90.0),
        }
    }

    fn meridian_ob(id: &str, program_id: &str, observer: &Observer, at: DateTime<Utc>, total_sec: f64, acct_sec: f64) -> Ob {
        let lst_deg = observer.local_sidereal_time_hours(at) * 15.0;
        Ob::new(
            id,
            program_id,
            1.0,
            crate::model::Target::new("meridian", lst_deg, observer.latitude_deg - 10.0),
            InstrumentConfiguration::Spcam(InstrumentCommon::new("r", 300.0, (total_sec / 300.0).round() as u32)),
            TelescopeConfiguration::default(),
            EnvironmentConfiguration::default(),
            total_sec,
            acct_sec,
        )
    }

    #[test]
    fn single_night_single_ob_reports_full_completion() {
        let observer = subaru();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 19, 0, 0).unwrap();
        let stop = start + chrono::Duration::hours(1);

        let program = Program::new("p1", 5.0, 3600.0);
        let ob = meridian_ob("ob-1", "p1", &observer, start, 1800.0, 1800.0);
        let night = NightRecord::new(start.date_naive(), start, stop, open_payload());

        let config = PlannerConfig::default();
        let result = plan(&config, &observer, &[night], &[program], &[ob], &ExecutedObs::new(), &NullSink, || false).unwrap();

        assert_eq!(result.schedules.len(), 1);
        assert!(result.residual_obs.is_empty());
        assert!(!result.cancelled);
        assert!(result.summary.contains("1/1 (100.0%)"));
        assert!(result.summary.contains("Completed programs"));
    }

    #[test]
    fn unscheduled_ob_carries_across_to_a_later_night() {
        let observer = subaru();
        let night1_start = Utc.with_ymd_and_hms(2024, 6, 1, 19, 0, 0).unwrap();
        let night1_stop = night1_start + chrono::Duration::minutes(10);
        let night2_start = Utc.with_ymd_and_hms(2024, 6, 2, 19, 0, 0).unwrap();
        let night2_stop = night2_start + chrono::Duration::hours(1);

        let program = Program::new("p1", 5.0, 3600.0);
        // Sized to fit night 2 but not night 1's short span.
        let ob = meridian_ob("ob-1", "p1", &observer, night2_start, 1800.0, 1800.0);

        let nights = vec![
            NightRecord::new(night1_start.date_naive(), night1_start, night1_stop, open_payload()),
            NightRecord::new(night2_start.date_naive(), night2_start, night2_stop, open_payload()),
        ];

        let config = PlannerConfig::default();
        let result = plan(&config, &observer, &nights, &[program], &[ob], &ExecutedObs::new(), &NullSink, || false).unwrap();

        assert_eq!(result.schedules.len(), 2);
        let science_slots: usize = result
            .schedules
            .iter()
            .flat_map(|s| s.slots.iter())
            .filter(|s| s.ob.as_ref().is_some_and(|ob| !ob.is_derived()))
            .count();
        assert_eq!(science_slots, 1, "the OB should be scheduled exactly once, on night 2");
    }

    #[test]
    fn executed_ob_feedback_excludes_done_obs_and_preloads_budget() {
        let observer = subaru();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 19, 0, 0).unwrap();
        let stop = start + chrono::Duration::hours(1);

        let program = Program::new("p1", 5.0, 1800.0);
        let done_ob = meridian_ob("ob-done", "p1", &observer, start, 900.0, 900.0);
        let new_ob = meridian_ob("ob-new", "p1", &observer, start, 900.0, 900.0);

        let mut executed = ExecutedObs::new();
        executed.insert(
            ("p1".to_string(), "ob-done".to_string()),
            ExecutedOb {
                acct_time_sec: 900.0,
                iqa: Some("good".to_string()),
                fqa: None,
            },
        );

        let night = NightRecord::new(start.date_naive(), start, stop, open_payload());
        let config = PlannerConfig::default();
        let result = plan(
            &config,
            &observer,
            &[night],
            &[program],
            &[done_ob, new_ob],
            &executed,
            &NullSink,
            || false,
        )
        .unwrap();

        // The already-executed OB was never offered to the scheduler.
        let scheduled_ids: Vec<&str> = result
            .schedules
            .iter()
            .flat_map(|s| s.slots.iter())
            .filter_map(|s| s.ob.as_ref())
            .filter(|ob| !ob.is_derived())
            .map(|ob| ob.id.as_str())
            .collect();
        assert_eq!(scheduled_ids, vec!["ob-new"]);
        assert!(result.summary.contains("1/1"));
    }

    #[test]
    fn cancellation_before_any_night_returns_a_cancelled_partial_result() {
        let observer = subaru();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 19, 0, 0).unwrap();
        let stop = start + chrono::Duration::hours(1);
        let program = Program::new("p1", 5.0, 3600.0);
        let ob = meridian_ob("ob-1", "p1", &observer, start, 1800.0, 1800.0);
        let night = NightRecord::new(start.date_naive(), start, stop, open_payload());

        let config = PlannerConfig::default();
        let result = plan(&config, &observer, &[night], &[program], &[ob], &ExecutedObs::new(), &NullSink, || true).unwrap();

        assert!(result.cancelled);
        assert!(result.schedules.is_empty());
        assert_eq!(result.residual_obs.len(), 1);
    }

    #[test]
    fn skipped_night_contributes_no_schedule() {
        let observer = subaru();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 19, 0, 0).unwrap();
        let stop = start + chrono::Duration::hours(1);
        let mut night = NightRecord::new(start.date_naive(), start, stop, open_payload());
        night.skip = true;
        night.note = Some("weather loss".to_string());

        let program = Program::new("p1", 5.0, 3600.0);
        let ob = meridian_ob("ob-1", "p1", &observer, start, 1800.0, 1800.0);

        let config = PlannerConfig::default();
        let result = plan(&config, &observer, &[night], &[program], &[ob], &ExecutedObs::new(), &NullSink, || false).unwrap();

        assert!(result.schedules.is_empty());
        assert_eq!(result.residual_obs.len(), 1);
    }

    #[test]
    fn program_with_no_obs_still_appears_as_completed() {
        let observer = subaru();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 19, 0, 0).unwrap();
        let stop = start + chrono::Duration::hours(1);

        let busy_program = Program::new("p1", 5.0, 3600.0);
        let idle_program = Program::new("p2", 3.0, 3600.0);
        let ob = meridian_ob("ob-1", "p1", &observer, start, 1800.0, 1800.0);
        let night = NightRecord::new(start.date_naive(), start, stop, open_payload());

        let config = PlannerConfig::default();
        let result = plan(
            &config,
            &observer,
            &[night],
            &[busy_program, idle_program],
            &[ob],
            &ExecutedObs::new(),
            &NullSink,
            || false,
        )
        .unwrap();

        assert!(result.summary.contains("p1 rank=5.0: 1/1"));
        assert!(result.summary.contains("p2 rank=3.0: 0/0"), "program with no OBs should still be reported:\n{}", result.summary);
    }
}
