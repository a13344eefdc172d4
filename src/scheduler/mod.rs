//! Timetable generation and quality metrics.
//!
//! # Algorithm
//!
//! `TimetableGenerator` uses a deterministic greedy heuristic: subjects are
//! placed into slots in a fixed Monday-first order, spread one period per
//! day where possible, and given to the first candidate teacher who is
//! free. It does not search for an optimal timetable; it produces a stable,
//! explainable baseline and reports what it could not place.
//!
//! # KPI
//!
//! `TimetableKpi` summarizes coverage, teacher load, and daily spread.

mod generator;
mod kpi;

pub use generator::{GenerationRequest, GenerationResult, TimetableGenerator, UnsatisfiedRequirement};
pub use kpi::TimetableKpi;
