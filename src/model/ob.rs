//! Observing Block (spec.md §3) and `DerivedKind` (spec.md §9): the
//! tagged variant replacing the source's floating helper-comment
//! convention for scheduler-generated helper OBs.
//!
//! Derived-OB construction is grounded on the call sites in
//! `original_source/qplan/Scheduler.py::fill_night_schedule`
//! (`qsim.setup_ob`, `filterchange_ob`, `delay_ob`, `calibration_ob`,
//! `longslew_ob`); those five helper functions themselves are not present
//! in the retrieved source, so their bodies here are original, grounded on
//! the call-site signatures and the comment-prefix invariant in spec.md §3
//! (see SPEC_FULL.md §4b).

use serde::{Deserialize, Serialize};

use super::{EnvironmentConfiguration, InstrumentConfiguration, TelescopeConfiguration};
use crate::model::Target;

/// The five comment-prefix tokens spec.md §3 requires every derived OB's
/// comment to begin with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DerivedKind {
    Setup,
    LongSlew,
    FilterChange,
    Delay,
    Calibration,
}

impl DerivedKind {
    pub fn comment_prefix(&self) -> &'static str {
        match self {
            DerivedKind::Setup => "Setup OB",
            DerivedKind::LongSlew => "Long slew",
            DerivedKind::FilterChange => "Filter change",
            DerivedKind::Delay => "Delay for",
            DerivedKind::Calibration => "SDSS calibration",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ob {
    pub id: String,
    pub program_id: String,
    pub priority: f64,
    pub target: Target,
    pub inst_cfg: InstrumentConfiguration,
    pub tel_cfg: TelescopeConfiguration,
    pub env_cfg: EnvironmentConfiguration,
    /// Total duration including overheads, seconds.
    pub total_time_sec: f64,
    /// On-source time billed to the program, seconds.
    pub acct_time_sec: f64,
    pub derived: Option<DerivedKind>,
    pub comment: String,
    /// The owning program's category, denormalized onto the OB by ingest
    /// (the OB only references its program by id) so the Feasibility
    /// Filter's §4.2.1 category check doesn't need a program lookup table
    /// threaded through every call site.
    pub category_hint: String,
    /// The owning program's rank, denormalized onto the OB for the same
    /// reason as `category_hint`: the Cost Function's `p_rank` term
    /// (spec.md §4.4) needs it per-candidate, and threading the full
    /// Program table through the evaluator/cost seam would leak an
    /// ingest-layer concern into the scoring algorithm. `None` until the
    /// scheduler's `ProgramBook` stamps it in (see
    /// [`crate::scheduler::ProgramBook::stamp_ranks`]).
    pub program_rank: Option<f64>,
}

impl Ob {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        program_id: impl Into<String>,
        priority: f64,
        target: Target,
        inst_cfg: InstrumentConfiguration,
        tel_cfg: TelescopeConfiguration,
        env_cfg: EnvironmentConfiguration,
        total_time_sec: f64,
        acct_time_sec: f64,
    ) -> Self {
        let ob = Self {
            id: id.into(),
            program_id: program_id.into(),
            priority,
            target,
            inst_cfg,
            tel_cfg,
            env_cfg,
            total_time_sec,
            acct_time_sec,
            derived: None,
            comment: String::new(),
            category_hint: String::new(),
            program_rank: None,
        };
        debug_assert!(ob.total_time_sec >= ob.acct_time_sec);
        debug_assert!(ob.acct_time_sec >= 0.0);
        ob
    }

    pub fn is_derived(&self) -> bool {
        self.derived.is_some()
    }

    /// Construct a scheduler-generated helper OB following spec.md §3's
    /// invariant (comment begins with the kind's token) and §4.5's rule
    /// that derived OBs never count toward the program's scheduled_time.
    /// `target` overrides the helper's pointing (used by the calibration
    /// and long-slew helpers); when `None`, the science OB's own target is
    /// reused.
    pub fn derived(
        kind: DerivedKind,
        based_on: &Ob,
        duration_sec: f64,
        target: Option<Target>,
        seq: u64,
    ) -> Ob {
        Ob {
            id: format!("{}__{:?}__{}", based_on.id, kind, seq),
            program_id: based_on.program_id.clone(),
            priority: based_on.priority,
            target: target.unwrap_or_else(|| based_on.target.clone()),
            inst_cfg: based_on.inst_cfg.clone(),
            tel_cfg: based_on.tel_cfg.clone(),
            env_cfg: based_on.env_cfg.clone(),
            total_time_sec: duration_sec,
            acct_time_sec: 0.0,
            derived: Some(kind),
            comment: format!("{} ({:.0}s) for {}", kind.comment_prefix(), duration_sec, based_on.id),
            category_hint: based_on.category_hint.clone(),
            program_rank: based_on.program_rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::instrument::InstrumentCommon;

    fn sample_ob() -> Ob {
        Ob::new(
            "ob-1",
            "prog-1",
            5.0,
            Target::new("target", 100.0, 20.0),
            InstrumentConfiguration::Spcam(InstrumentCommon::new("r", 300.0, 6)),
            TelescopeConfiguration::default(),
            EnvironmentConfiguration::default(),
            1800.0,
            1800.0,
        )
    }

    #[test]
    fn science_ob_is_not_derived() {
        assert!(!sample_ob().is_derived());
    }

    #[test]
    fn derived_obs_carry_zero_acct_time_and_valid_comment_prefix() {
        let science = sample_ob();
        for kind in [
            DerivedKind::Setup,
            DerivedKind::LongSlew,
            DerivedKind::FilterChange,
            DerivedKind::Delay,
            DerivedKind::Calibration,
        ] {
            let helper = Ob::derived(kind, &science, 60.0, None, 0);
            assert_eq!(helper.acct_time_sec, 0.0);
            assert!(helper.is_derived());
            assert!(
                helper.comment.starts_with(kind.comment_prefix()),
                "comment {:?} did not start with {:?}",
                helper.comment,
                kind.comment_prefix()
            );
        }
    }

    #[test]
    fn derived_ob_inherits_program_for_budget_exemption() {
        let science = sample_ob();
        let helper = Ob::derived(DerivedKind::Setup, &science, 1.0, None, 0);
        assert_eq!(helper.program_id, science.program_id);
    }
}
