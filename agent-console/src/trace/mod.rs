//! Trace classification and grouping
//!
//! Turns the raw, phase-bucketed trace fragments of one invocation into the
//! numbered, step-grouped view of the orchestration console.

pub mod classify;
pub mod group;

pub use classify::{info_sub_types, InfoSubType, StepKey};
pub use group::{group_trace, SectionLayout, TraceLayout};
