//! Timetable generation engine.
//!
//! Places every lecture, tutorial and lab of every subject into a weekly
//! timetable without double-booking staff, batches or rooms, and reports
//! whatever cannot be placed as a classified conflict.

// Allow clippy warning triggered by PyO3 macro expansion
#![cfg_attr(feature = "python", allow(clippy::useless_conversion))]

pub mod availability;
mod config;
pub mod interval;
pub mod logging;
mod models;
pub mod scheduler;
pub mod sorting;
pub mod validation;

#[cfg(feature = "python")]
mod python;

pub use config::GenerationOptions;
pub use models::{
    Applicability, AssignmentRole, AvailabilityWindow, Batch, ComponentKind, ComponentRef,
    ComponentRequirement, Conflict, ConflictKind, DayType, GenerationResult, GenerationSummary,
    PreferredRange, RoomResource, ScheduledSlot, Snapshot, StaffAssignment, StopReason, Subject,
    TimeWindow,
};
pub use scheduler::{
    CancellationToken, RepairRecord, RepairStrategy, SchedulerError, SharedStaffOccupancy,
    TimetableGenerator,
};
pub use validation::InputError;

/// Generate a timetable for `snapshot`.
///
/// A non-empty conflict list in the result is a normal outcome; `Err` means
/// the input or configuration was unusable, or the run hit an internal defect.
pub fn generate(
    snapshot: &Snapshot,
    options: GenerationOptions,
) -> Result<GenerationResult, SchedulerError> {
    TimetableGenerator::new(snapshot, options).generate()
}

/// Check proposed slots (for example manual edits) against the snapshot.
pub fn validate(snapshot: &Snapshot, proposed: &[ScheduledSlot]) -> Vec<Conflict> {
    validation::validate_slots(snapshot, proposed)
}

/// JSON in, JSON out variant of [`generate`].
pub fn generate_json(
    snapshot_json: &str,
    options: GenerationOptions,
) -> Result<String, SchedulerError> {
    let snapshot = Snapshot::from_json(snapshot_json)?;
    let result = generate(&snapshot, options)?;
    Ok(serde_json::to_string(&result)?)
}

/// JSON in, JSON out variant of [`validate`].
pub fn validate_json(snapshot_json: &str, slots_json: &str) -> Result<String, SchedulerError> {
    let snapshot = Snapshot::from_json(snapshot_json)?;
    let proposed: Vec<ScheduledSlot> = serde_json::from_str(slots_json)?;
    Ok(serde_json::to_string(&validate(&snapshot, &proposed))?)
}
