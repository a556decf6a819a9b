//! Timetable generation: occupancy, candidate enumeration, scoring,
//! placement and bounded repair, driven by [`TimetableGenerator`].

mod candidates;
mod core;
mod occupancy;
mod placement;
mod repair;
mod scoring;
mod state;

pub use candidates::{Candidate, CandidateGenerator};
pub use core::{CancellationToken, SchedulerError, TimetableGenerator};
pub use occupancy::{
    Namespace, NamespaceTable, Occupancy, OccupancyKey, Overlap, Reservation, SharedStaffOccupancy,
    StaffLedger,
};
pub use placement::{Pass, Placement, PlacementEngine};
pub use repair::{RepairRecord, RepairStrategy};
pub use scoring::{score, ScoreMode, ScoredCandidate, ScoringContext};
pub use state::{Commitment, ComponentState, RunState};
