//! Error categories for the planner core (spec.md §7).
//!
//! `Infeasible` and `EphemerisFailure` are deliberately NOT represented
//! here: per-OB rejections are structured data (see
//! [`crate::evaluator::SlotOutcome::Rejected`]), not errors, and never
//! propagate as `Err`. Only programmer errors (`SlotSplit`, `CacheMiss`)
//! and true engine failures reach these types.

use thiserror::Error;

/// Errors raised by the ephemeris engine (spec.md §4.1, §7's `CacheMiss`).
#[derive(Debug, Error)]
pub enum EphemerisError {
    /// A point query asked for precision tighter than the configured cache
    /// grid and no exact sample exists. The caller must populate first or
    /// widen its tolerance.
    #[error("cache miss for target {target} at {instant}: no sample within {tolerance_min} min")]
    CacheMiss {
        target: String,
        instant: chrono::DateTime<chrono::Utc>,
        tolerance_min: f64,
    },

    /// Root-finding for a rise/set event did not converge within the
    /// configured horizon. Callers treat this as "never rises"/"never sets"
    /// per spec.md §4.1, not as a fatal error; the core itself maps this
    /// into an `Infeasible` rejection rather than propagating it.
    #[error("{body} never {direction} above {horizon_deg}° from {instant}")]
    NeverCrosses {
        body: String,
        direction: &'static str,
        horizon_deg: f64,
        instant: chrono::DateTime<chrono::Utc>,
    },
}

/// Errors raised by [`crate::model::slot::Slot::split`] and
/// [`crate::model::schedule::Schedule::insert_slot`] (spec.md §7's
/// `SlotSplit`).
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("split start {start} precedes slot start {slot_start} by more than the {tolerance_sec}s tolerance")]
    SplitBeforeStart {
        start: chrono::DateTime<chrono::Utc>,
        slot_start: chrono::DateTime<chrono::Utc>,
        tolerance_sec: f64,
    },

    #[error("split end {end} exceeds slot stop {slot_stop}")]
    SplitExceedsStop {
        end: chrono::DateTime<chrono::Utc>,
        slot_stop: chrono::DateTime<chrono::Utc>,
    },

    #[error("slot {start}..{stop} does not overlap schedule span {span_start}..{span_stop}")]
    OutOfSpan {
        start: chrono::DateTime<chrono::Utc>,
        stop: chrono::DateTime<chrono::Utc>,
        span_start: chrono::DateTime<chrono::Utc>,
        span_stop: chrono::DateTime<chrono::Utc>,
    },
}

/// Errors that can abort a single night's scheduling step (spec.md §7:
/// "Only programmer errors ... propagate out of the scheduler loop; the
/// driver catches them, records the night as partially scheduled").
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Ephemeris(#[from] EphemerisError),
}

/// Top-level error returned by [`crate::driver`] entry points.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("night {date} aborted: {source}")]
    NightAborted {
        date: chrono::NaiveDate,
        #[source]
        source: SchedulerError,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
