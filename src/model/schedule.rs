//! Schedule (spec.md §3): one night's plan — a fixed span, a payload of
//! per-night conditions, and an ordered list of Slots. Grounded on
//! `original_source/qplan/entity.py::Schedule`'s `insert_slot`/
//! `next_free_slot`/waste accounting.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DomeState, Slot};
use crate::error::ScheduleError;

/// Per-night environmental/instrument snapshot, shared by reference across
/// every Slot in a Schedule (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulePayload {
    pub filters: Vec<String>,
    pub seeing_arcsec: f64,
    pub transparency: f64,
    pub dome: DomeState,
    pub categories: Vec<String>,
    pub instruments: Vec<String>,
    /// Filter installed on the instrument at the start of the night, used
    /// by the slot evaluator when there is no previous OB (spec.md §4.3
    /// step 3).
    pub cur_filter: Option<String>,
    pub cur_az_deg: Option<f64>,
    pub cur_el_deg: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Schedule {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub payload: Arc<SchedulePayload>,
    pub slots: Vec<Slot>,
    /// Seconds of unassigned time, initialized to the span length and
    /// decremented on every insertion (spec.md §3).
    pub waste_sec: f64,
}

impl Schedule {
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>, payload: SchedulePayload) -> Self {
        let waste_sec = (stop - start).num_milliseconds() as f64 / 1000.0;
        Self {
            start,
            stop,
            payload: Arc::new(payload),
            slots: Vec::new(),
            waste_sec,
        }
    }

    pub fn span_sec(&self) -> f64 {
        (self.stop - self.start).num_milliseconds() as f64 / 1000.0
    }

    /// Insert a slot at the end of the ordered slot list. The slot must
    /// start no earlier than the previously-inserted slot's stop time and
    /// must lie within the schedule's span (spec.md §3 invariants).
    pub fn insert_slot(&mut self, slot: Slot) -> Result<(), ScheduleError> {
        if slot.start < self.start || slot.stop > self.stop {
            return Err(ScheduleError::OutOfSpan {
                start: slot.start,
                stop: slot.stop,
                span_start: self.start,
                span_stop: self.stop,
            });
        }
        if let Some(last) = self.slots.last() {
            if slot.start < last.stop {
                return Err(ScheduleError::OutOfSpan {
                    start: slot.start,
                    stop: slot.stop,
                    span_start: last.stop,
                    span_stop: self.stop,
                });
            }
        }
        self.waste_sec -= slot.size_sec();
        self.slots.push(slot);
        Ok(())
    }

    /// A synthetic Slot covering `[last_inserted.stop, stop]`, or `None`
    /// if that interval is `<= 0` (spec.md §3).
    pub fn next_free_slot(&self) -> Option<Slot> {
        let last_stop = self.slots.last().map(|s| s.stop).unwrap_or(self.start);
        if last_stop >= self.stop {
            return None;
        }
        Some(Slot::new(last_stop, self.stop, Some(self.payload.clone())))
    }
}
