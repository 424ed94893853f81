//! Program (spec.md §3): a proposal's static, externally-assigned
//! attributes. Keyed by `proposal_id`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub proposal_id: String,
    /// Real-valued rank in `[0, max_rank]`; lower is scheduled preferentially
    /// (spec.md §4.4's `p_rank` penalty).
    pub rank: f64,
    /// Categorical grade assigned by the time-allocation committee.
    pub grade: String,
    /// Total allotted on-source time, seconds.
    pub total_time_sec: f64,
    pub category: String,
    pub instruments: Vec<String>,
    pub skip: bool,
}

impl Program {
    pub fn new(proposal_id: impl Into<String>, rank: f64, total_time_sec: f64) -> Self {
        Self {
            proposal_id: proposal_id.into(),
            rank,
            grade: String::new(),
            total_time_sec,
            category: String::new(),
            instruments: Vec::new(),
            skip: false,
        }
    }
}
