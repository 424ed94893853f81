//! # obsqueue-core
//!
//! Core ephemeris, feasibility, and scheduling engine for a ground-based
//! telescope queue-observation planner.
//!
//! Given a set of observing blocks (OBs) belonging to accepted programs, a
//! per-night schedule of available time with environmental/instrument
//! state, and a set of scoring weights, this crate produces, for each
//! night, an ordered sequence of time slots assigning OBs (and auxiliary
//! operations such as setup, slew, filter change, and calibration) to clock
//! time, while minimizing an aggregate cost function.
//!
//! ## Architecture
//!
//! - [`ephemeris`]: target position, visibility windows, airmass, moon
//!   geometry, and a bucketed cache supporting bulk population.
//! - [`model`]: value types — Program, Target, Telescope/Instrument/
//!   Environment configuration, Observing Block, Slot, Schedule.
//! - [`filter`]: per-OB feasibility gating (schedule invariants, night
//!   visibility).
//! - [`evaluator`]: scores a single (previous slot, candidate slot, OB)
//!   triple into an accepted candidate or a rejection reason.
//! - [`cost`]: the weighted cost function and total-order comparator.
//! - [`scheduler`]: the greedy night-filling loop.
//! - [`driver`]: the multi-night driver and text reporter.
//! - [`events`]: the callback sink the scheduler emits typed events through.
//! - [`config`]: the configuration record (weights, rates, cache grid).
//!
//! This crate does not parse input files, does not drive a GUI, does not
//! generate telescope control command files, and does not persist executed
//! observations — those are external collaborators (see `spec.md` §6).

#![allow(clippy::result_large_err)]

pub mod config;
pub mod cost;
pub mod driver;
pub mod ephemeris;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod filter;
pub mod model;
pub mod observer;
pub mod scheduler;
pub mod time;

pub use config::PlannerConfig;
pub use error::{EphemerisError, PlannerError, ScheduleError, SchedulerError};
