//! Slot (spec.md §3): a bounded clock interval within a Schedule holding
//! at most one OB. `split` is grounded on
//! `original_source/qplan/entity.py::Slot.split`'s tolerance-clamp
//! algorithm.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Ob, SchedulePayload};
use crate::error::ScheduleError;

/// Start-time tolerance for [`Slot::split`] (spec.md §3, §8's boundary
/// behavior: "5 s before the slot start succeeds; 6 s before is an error").
pub const SPLIT_START_TOLERANCE_SEC: f64 = 5.0;
/// Pieces of a split shorter than this are dropped rather than inserted as
/// zero-length slots (spec.md §3).
pub const MIN_PIECE_SEC: f64 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    #[serde(skip)]
    pub payload: Option<Arc<SchedulePayload>>,
    pub ob: Option<Ob>,
}

/// The result of splitting a Slot into up to three pieces (spec.md §3).
pub struct SplitResult {
    pub before: Option<Slot>,
    pub middle: Slot,
    pub after: Option<Slot>,
}

impl Slot {
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>, payload: Option<Arc<SchedulePayload>>) -> Self {
        Self {
            start,
            stop,
            payload,
            ob: None,
        }
    }

    pub fn size_sec(&self) -> f64 {
        (self.stop - self.start).num_milliseconds() as f64 / 1000.0
    }

    /// Split this slot at `t` into `before = [start, t]`,
    /// `middle = [t, t + length_sec]`, `after = [t + length_sec, stop]`.
    /// `t` may precede `start` by up to [`SPLIT_START_TOLERANCE_SEC`]
    /// (clamped to `start`); pieces shorter than [`MIN_PIECE_SEC`] are
    /// dropped.
    pub fn split(&self, t: DateTime<Utc>, length_sec: f64) -> Result<SplitResult, ScheduleError> {
        let lead_sec = (self.start - t).num_milliseconds() as f64 / 1000.0;
        if lead_sec > SPLIT_START_TOLERANCE_SEC {
            return Err(ScheduleError::SplitBeforeStart {
                start: t,
                slot_start: self.start,
                tolerance_sec: SPLIT_START_TOLERANCE_SEC,
            });
        }
        let actual_t = if t < self.start { self.start } else { t };
        let middle_stop = actual_t + chrono::Duration::milliseconds((length_sec * 1000.0).round() as i64);
        if middle_stop > self.stop {
            return Err(ScheduleError::SplitExceedsStop {
                end: middle_stop,
                slot_stop: self.stop,
            });
        }

        let before = {
            let size = (actual_t - self.start).num_milliseconds() as f64 / 1000.0;
            if size >= MIN_PIECE_SEC {
                Some(Slot::new(self.start, actual_t, self.payload.clone()))
            } else {
                None
            }
        };

        let middle = Slot::new(actual_t, middle_stop, self.payload.clone());

        let after = {
            let size = (self.stop - middle_stop).num_milliseconds() as f64 / 1000.0;
            if size >= MIN_PIECE_SEC {
                Some(Slot::new(middle_stop, self.stop, self.payload.clone()))
            } else {
                None
            }
        };

        Ok(SplitResult { before, middle, after })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn slot(start_min: i64, stop_min: i64) -> Slot {
        let base = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 19, 0, 0).unwrap();
        Slot::new(base + chrono::Duration::minutes(start_min), base + chrono::Duration::minutes(stop_min), None)
    }

    #[test]
    fn split_pieces_union_to_the_original_span() {
        let s = slot(0, 60);
        let t = s.start + chrono::Duration::minutes(10);
        let result = s.split(t, 600.0).unwrap();
        assert_eq!(result.before.unwrap().start, s.start);
        assert_eq!(result.middle.start, t);
        assert_eq!(result.middle.stop, t + chrono::Duration::minutes(10));
        assert_eq!(result.after.unwrap().stop, s.stop);
    }

    #[test]
    fn split_drops_sub_second_pieces() {
        let s = slot(0, 60);
        // Start the middle exactly at slot.start: no "before" piece.
        let result = s.split(s.start, 600.0).unwrap();
        assert!(result.before.is_none());
    }

    #[test]
    fn split_five_seconds_early_is_clamped_not_rejected() {
        let s = slot(0, 60);
        let t = s.start - chrono::Duration::seconds(5);
        let result = s.split(t, 60.0).unwrap();
        assert_eq!(result.middle.start, s.start);
    }

    #[test]
    fn split_six_seconds_early_is_an_error() {
        let s = slot(0, 60);
        let t = s.start - chrono::Duration::seconds(6);
        let err = s.split(t, 60.0).unwrap_err();
        assert!(matches!(err, ScheduleError::SplitBeforeStart { .. }));
    }

    #[test]
    fn split_exceeding_stop_is_an_error() {
        let s = slot(0, 60);
        let err = s.split(s.start, 3601.0).unwrap_err();
        assert!(matches!(err, ScheduleError::SplitExceedsStop { .. }));
    }

    #[test]
    fn slot_length_matching_duration_is_exactly_splittable() {
        let s = slot(0, 30);
        let result = s.split(s.start, 1800.0).unwrap();
        assert!(result.after.is_none());
        assert_eq!(result.middle.size_sec(), 1800.0);
    }
}
