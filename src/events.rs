//! The callback sink (spec.md §6, §9): an explicit event bus replacing the
//! source's callback-list-on-a-mutable-model pattern
//! (`original_source/qplan/Scheduler.py`'s `Callback.Callbacks` mixin and
//! its `schedule-cleared`/`schedule-added`/`schedule-completed`/
//! `schedule-selected` events).
//!
//! Grounded on the teacher's swappable-collaborator trait-object pattern
//! (`db/repository`'s `Box<dyn Repository>`): the scheduler and driver take
//! a `&dyn PlannerSink`, defaulting to [`NullSink`] so "the core must run
//! without any sink connected" (spec.md §9) holds without a special case.

use crate::model::{Ob, Program, Schedule};

/// A single OB-to-slot decision, emitted as the night-filling scheduler
/// inserts each slot (science or derived).
#[derive(Debug, Clone)]
pub struct SlotAssigned<'a> {
    pub schedule_start: chrono::DateTime<chrono::Utc>,
    pub ob: &'a Ob,
}

/// Per-program outcome summary, used by [`PlannerSink::run_completed`]
/// (spec.md §4.6's completed/uncompleted program lists).
#[derive(Debug, Clone)]
pub struct ProgramOutcome {
    pub program: Program,
    pub obcount: usize,
    pub scheduled: usize,
}

/// Typed events the scheduler/driver emit through a single sink supplied by
/// the embedder (spec.md §9's "explicit event bus"). Every method has a
/// no-op default so implementers only override what they care about.
pub trait PlannerSink {
    /// Before a new planning run begins.
    fn schedule_cleared(&self) {}

    /// After each night's Schedule is complete.
    fn schedule_added(&self, _schedule: &Schedule) {}

    /// A single OB (science or derived) was assigned to a slot.
    fn slot_assigned(&self, _event: &SlotAssigned<'_>) {}

    /// At the end of the run: completed and uncompleted programs, plus
    /// every night's Schedule.
    fn run_completed(&self, _completed: &[ProgramOutcome], _uncompleted: &[ProgramOutcome], _schedules: &[Schedule]) {}

    /// User-driven, informational: a schedule was selected for viewing.
    fn schedule_selected(&self, _schedule: &Schedule) {}
}

/// The sink used when no embedder is connected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PlannerSink for NullSink {}
