//! The Cost Function and Comparator (spec.md §4.4): reduces a
//! [`Candidate`](crate::evaluator::Candidate) to a single normalized score
//! and totally orders candidates by it. Grounded on
//! `original_source/qplan/Scheduler.py::cmp_res`.

use std::cmp::Ordering;

use crate::config::PlannerConfig;
use crate::evaluator::Candidate;

/// A candidate's score, plus the normalized penalty terms that produced it
/// (kept for diagnostics/tests — spec.md §4.4 doesn't require exposing
/// these, but the source's `cmp_res` computes them as named locals).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub value: f64,
    pub p_slew: f64,
    pub p_delay: f64,
    pub p_filter: f64,
    pub p_rank: f64,
}

/// Weighted combination of normalized penalties, each clipped to `[0, 1]`
/// (spec.md §4.4). Lower is better.
pub fn score(config: &PlannerConfig, candidate: &Candidate) -> Score {
    let limits = &config.cost_limits;
    let weights = &config.weights;

    let p_slew = (candidate.slew_sec.min(limits.max_slew_sec)) / limits.max_slew_sec;
    let p_delay = (candidate.delay_sec.min(limits.max_delay_sec)) / limits.max_delay_sec;
    let p_filter = (candidate.filterchange_sec.min(limits.max_filterchange_sec)) / limits.max_filterchange_sec;
    let p_rank = 1.0 - (candidate.ob.priority_rank().min(limits.max_rank)) / limits.max_rank;

    let value = weights.w_slew * p_slew + weights.w_delay * p_delay + weights.w_filterchange * p_filter + weights.w_rank * p_rank;

    Score {
        value,
        p_slew,
        p_delay,
        p_filter,
        p_rank,
    }
}

/// Total ordering over two candidates (spec.md §4.4):
///
/// 1. Primary key is `score`, ascending (lower is better).
/// 2. If both candidates' OBs share a program, each score is incremented
///    by `w_priority * priority` before comparison (so lower-priority
///    numbers win a same-program tie on the global terms).
/// 3. Ties are broken deterministically by `(program_id, ob_id)` (spec.md
///    §9) rather than by discovery order, to stay reproducible across
///    floating-point rounding differences.
pub fn compare(config: &PlannerConfig, a: &Candidate, b: &Candidate) -> Ordering {
    let mut ta = score(config, a).value;
    let mut tb = score(config, b).value;

    if a.ob.program_id == b.ob.program_id {
        ta += config.weights.w_priority * a.ob.priority;
        tb += config.weights.w_priority * b.ob.priority;
    }

    match ta.partial_cmp(&tb).unwrap_or(Ordering::Equal) {
        Ordering::Equal => (a.ob.program_id.as_str(), a.ob.id.as_str()).cmp(&(b.ob.program_id.as_str(), b.ob.id.as_str())),
        other => other,
    }
}

/// Sort `candidates` ascending by [`compare`] (spec.md §4.5.f: "Sort good
/// by the comparator").
pub fn sort_candidates(config: &PlannerConfig, candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| compare(config, a, b));
}

impl crate::model::Ob {
    /// The program rank this OB inherits, used by the cost function's
    /// `p_rank` term. Exposed as a method (rather than a bare field lookup
    /// on `Candidate`) because the rank lives on `Program`, not `Ob`; the
    /// scheduler stamps it onto the OB's `priority` companion field when it
    /// builds the eligible set — see [`crate::scheduler::ProgramBook`].
    pub fn priority_rank(&self) -> f64 {
        self.program_rank.unwrap_or(0.0)
    }
}
