//! The Night-Filling Scheduler (spec.md §4.5): the deterministic greedy
//! loop that consumes a Schedule's free slots, invokes the evaluator,
//! inserts derived helper OBs, and enforces per-program time budgets.
//! Grounded on `original_source/qplan/Scheduler.py::fill_night_schedule`.

use std::collections::{HashMap, HashSet};

use crate::config::PlannerConfig;
use crate::cost;
use crate::error::SchedulerError;
use crate::evaluator::{self, Candidate, SlotOutcome};
use crate::events::{PlannerSink, SlotAssigned};
use crate::filter;
use crate::model::{DerivedKind, Ob, Program, Schedule, Slot};
use crate::observer::Observer;

/// Per-program bookkeeping (spec.md §4.5): `scheduled_time` accrues only
/// from non-derived (science) OBs billed to the program.
#[derive(Debug, Clone)]
pub struct ProgramBook {
    pub program: Program,
    pub scheduled_time_sec: f64,
    pub obcount: usize,
}

impl ProgramBook {
    pub fn new(program: Program) -> Self {
        Self {
            program,
            scheduled_time_sec: 0.0,
            obcount: 0,
        }
    }

    /// Pre-load `scheduled_time` with already-billed acct_times from prior
    /// executions (spec.md §4.6 "executed-OB feedback"), so the §4.5.g
    /// budget check naturally stops selecting a program's OBs once its
    /// real allotment (net of past nights) is exhausted.
    pub fn preload_scheduled_time(&mut self, already_billed_sec: f64) {
        self.scheduled_time_sec += already_billed_sec;
    }

    fn would_exceed(&self, acct_time_sec: f64) -> bool {
        self.scheduled_time_sec + acct_time_sec > self.program.total_time_sec
    }

    fn debit(&mut self, acct_time_sec: f64) {
        self.scheduled_time_sec += acct_time_sec;
        self.obcount += 1;
    }

    /// Build one book per program, keyed by `proposal_id` (spec.md §4.6:
    /// "a per-program bookkeeping record").
    pub fn build_books(programs: &[Program]) -> HashMap<String, ProgramBook> {
        programs
            .iter()
            .filter(|p| !p.skip)
            .map(|p| (p.proposal_id.clone(), ProgramBook::new(p.clone())))
            .collect()
    }

    /// Stamp each OB's `category_hint`/`program_rank` from its owning
    /// Program (spec.md §3: an OB carries a program *reference*, not the
    /// full record; the Feasibility Filter's category check and the Cost
    /// Function's rank term both need the resolved value per-OB).
    pub fn stamp_ob_metadata(obs: &mut [Ob], books: &HashMap<String, ProgramBook>) {
        for ob in obs.iter_mut() {
            if let Some(book) = books.get(&ob.program_id) {
                ob.category_hint = book.program.category.clone();
                ob.program_rank = Some(book.program.rank);
            }
        }
    }
}

/// Outcome of filling one night's Schedule (spec.md §4.5, §7: "every
/// rejection of an OB is explained ... with the OB id and a human-readable
/// reason").
#[derive(Debug, Clone, Default)]
pub struct NightResult {
    pub rejections: Vec<(String, String)>,
    pub filterchange_count: u32,
}

/// Split `slot` at its own start into a `length_sec`-long piece and
/// whatever remains, collapsing a `None` remainder into a zero-length slot
/// at the same instant so callers can keep chaining splits uniformly
/// (spec.md §4.5.i's "split successively").
fn split_off(slot: &Slot, length_sec: f64) -> Result<(Slot, Slot), SchedulerError> {
    let result = slot.split(slot.start, length_sec)?;
    let rest = result
        .after
        .unwrap_or_else(|| Slot::new(result.middle.stop, result.middle.stop, slot.payload.clone()));
    Ok((result.middle, rest))
}

/// Fill one night's `schedule` from `eligible` (mutated in place: OBs that
/// get scheduled or permanently rejected are removed), debiting each
/// selected science OB's `acct_time` from its program's book (spec.md
/// §4.5's full algorithm). `is_cancelled` is polled once per slot
/// iteration (spec.md §5: "the driver MUST check a cancellation flag ...
/// between slot iterations within a night").
#[allow(clippy::too_many_arguments)]
pub fn fill_night_schedule(
    config: &PlannerConfig,
    observer: &Observer,
    schedule: &mut Schedule,
    eligible: &mut Vec<Ob>,
    books: &mut HashMap<String, ProgramBook>,
    sink: &dyn PlannerSink,
    mut is_cancelled: impl FnMut() -> bool,
) -> Result<NightResult, SchedulerError> {
    let mut result = NightResult::default();
    let mut seq: u64 = 0;

    // Step 1: schedule invariants + night visibility (spec.md §4.2).
    let (good, bad) = filter::filter_obs(observer, schedule, eligible);
    let good_ids: HashSet<String> = good.iter().map(|ob| ob.id.clone()).collect();
    result.rejections.extend(bad);
    eligible.retain(|ob| good_ids.contains(&ob.id));

    loop {
        if is_cancelled() {
            tracing::debug!("scheduling cancelled mid-night");
            break;
        }

        let free = match schedule.next_free_slot() {
            Some(slot) => slot,
            None => {
                tracing::debug!("no more empty slots");
                break;
            }
        };

        if eligible.is_empty() {
            tracing::debug!("no more unassigned OBs");
            schedule.insert_slot(free)?;
            break;
        }

        let prev = schedule.slots.last().cloned();

        tracing::debug!(slot_start = %free.start, slot_stop = %free.stop, "considering slot");

        let mut good: Vec<Candidate> = Vec::new();
        let mut bad_ids: Vec<String> = Vec::new();
        for ob in eligible.iter() {
            match evaluator::check_slot(config, observer, prev.as_ref(), &free, ob, true, true, true) {
                SlotOutcome::Accepted(candidate) => good.push(*candidate),
                SlotOutcome::Rejected { reason } => {
                    tracing::warn!(ob_id = %ob.id, %reason, "OB rejected for slot");
                    bad_ids.push(ob.id.clone());
                    result.rejections.push((ob.id.clone(), reason));
                }
            }
        }
        eligible.retain(|ob| !bad_ids.contains(&ob.id));

        cost::sort_candidates(config, &mut good);

        let mut chosen: Option<Candidate> = None;
        let mut over_budget_ids: Vec<String> = Vec::new();
        for candidate in good {
            let book = books
                .get(&candidate.ob.program_id)
                .expect("every eligible OB's program must have a book");
            if book.would_exceed(candidate.ob.acct_time_sec) {
                tracing::debug!(ob_id = %candidate.ob.id, "rejected: would exceed program allotted time");
                result
                    .rejections
                    .push((candidate.ob.id.clone(), "would exceed program allotted time".to_string()));
                over_budget_ids.push(candidate.ob.id.clone());
                continue;
            }
            chosen = Some(candidate);
            break;
        }
        eligible.retain(|ob| !over_budget_ids.contains(&ob.id));

        let candidate = match chosen {
            Some(c) => c,
            None => {
                tracing::debug!("can't find any OB to fit slot");
                schedule.insert_slot(free)?;
                continue;
            }
        };

        let book = books
            .get_mut(&candidate.ob.program_id)
            .expect("every eligible OB's program must have a book");
        book.debit(candidate.ob.acct_time_sec);

        let mut remaining = free;

        // Setup helper: always inserted (spec.md §4.5.i).
        seq += 1;
        let (mut piece, rest) = split_off(&remaining, config.setup_sec)?;
        piece.ob = Some(Ob::derived(DerivedKind::Setup, &candidate.ob, config.setup_sec, None, seq));
        sink.slot_assigned(&SlotAssigned {
            schedule_start: schedule.start,
            ob: piece.ob.as_ref().unwrap(),
        });
        schedule.insert_slot(piece)?;
        remaining = rest;

        if candidate.filterchange {
            seq += 1;
            let (mut piece, rest) = split_off(&remaining, candidate.filterchange_sec)?;
            piece.ob = Some(Ob::derived(
                DerivedKind::FilterChange,
                &candidate.ob,
                candidate.filterchange_sec,
                None,
                seq,
            ));
            sink.slot_assigned(&SlotAssigned {
                schedule_start: schedule.start,
                ob: piece.ob.as_ref().unwrap(),
            });
            schedule.insert_slot(piece)?;
            remaining = rest;
            result.filterchange_count += 1;
        }

        if candidate.delay_sec > 0.0 {
            seq += 1;
            let (mut piece, rest) = split_off(&remaining, candidate.delay_sec)?;
            piece.ob = Some(Ob::derived(DerivedKind::Delay, &candidate.ob, candidate.delay_sec, None, seq));
            sink.slot_assigned(&SlotAssigned {
                schedule_start: schedule.start,
                ob: piece.ob.as_ref().unwrap(),
            });
            schedule.insert_slot(piece)?;
            remaining = rest;
        }

        if let Some(companion) = candidate.ob.target.calib_companion.clone() {
            let duration = candidate.calibration_sec + candidate.slew_sec;
            seq += 1;
            let (mut piece, rest) = split_off(&remaining, duration)?;
            piece.ob = Some(Ob::derived(
                DerivedKind::Calibration,
                &candidate.ob,
                duration,
                Some(*companion),
                seq,
            ));
            sink.slot_assigned(&SlotAssigned {
                schedule_start: schedule.start,
                ob: piece.ob.as_ref().unwrap(),
            });
            schedule.insert_slot(piece)?;
            remaining = rest;
        }

        let (mut science, _rest) = split_off(&remaining, candidate.ob.total_time_sec)?;
        science.ob = Some(candidate.ob.clone());
        sink.slot_assigned(&SlotAssigned {
            schedule_start: schedule.start,
            ob: science.ob.as_ref().unwrap(),
        });
        schedule.insert_slot(science)?;

        let scheduled_id = candidate.ob.id.clone();
        eligible.retain(|ob| ob.id != scheduled_id);
    }

    Ok(result)
}
