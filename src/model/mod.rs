//! The entity model (spec.md §3): value objects shared across the filter,
//! evaluator, scheduler, and driver. Nothing in this module mutates a
//! Program's static attributes — the per-program `scheduled_time`
//! accumulator lives in [`crate::scheduler::ProgramBook`], owned by the
//! scheduler, not here.

pub mod environment;
pub mod instrument;
pub mod ob;
pub mod program;
pub mod schedule;
pub mod slot;
pub mod target;
pub mod telescope;

pub use environment::{EnvironmentConfiguration, MoonPhase};
pub use instrument::InstrumentConfiguration;
pub use ob::{DerivedKind, Ob};
pub use program::Program;
pub use schedule::{Schedule, SchedulePayload};
pub use slot::Slot;
pub use target::Target;
pub use telescope::{DomeState, TelescopeConfiguration};
