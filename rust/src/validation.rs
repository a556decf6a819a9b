//! Input validation before generation, and re-checking of proposed slots.

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::availability::AvailabilityIndex;
use crate::interval::{Interval, MINUTES_PER_DAY};
use crate::models::{
    ComponentKind, ComponentRef, Conflict, ConflictKind, DayType, ScheduledSlot, Snapshot,
};
use crate::scheduler::{Occupancy, OccupancyKey, Overlap, Reservation};

/// One malformed item in a snapshot. Generation refuses to start if any exist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },
    #[error("batch {batch_id} has an empty or inverted {day_type} window")]
    InvalidBatchWindow { batch_id: String, day_type: DayType },
    #[error("subject {subject_id} references unknown batch {batch_id}")]
    UnknownBatch { subject_id: String, batch_id: String },
    #[error(
        "subject {subject_id} {component} has invalid duration {minutes} (must be 1..={max})",
        max = MINUTES_PER_DAY
    )]
    InvalidDuration {
        subject_id: String,
        component: ComponentKind,
        minutes: i32,
    },
    #[error("subject {subject_id} lists {component} more than once")]
    DuplicateComponent {
        subject_id: String,
        component: ComponentKind,
    },
    #[error("availability for {staff_id} on {day} ends at or before it starts")]
    InvalidAvailabilityWindow { staff_id: String, day: chrono::Weekday },
    #[error("subject {subject_id} in batch {batch_id} has no active primary staff")]
    NoEligibleStaff { subject_id: String, batch_id: String },
    #[error("existing slot {component} is invalid: {reason}")]
    InvalidExistingSlot { component: ComponentRef, reason: String },
    #[error("existing slot {component} overlaps another existing slot: {source}")]
    OverlappingExistingSlots { component: ComponentRef, source: Overlap },
}

fn check_unique<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
    errors: &mut Vec<InputError>,
) {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    for id in ids {
        if !seen.insert(id) {
            errors.push(InputError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
}

/// Collect every malformed item in `snapshot`.
pub fn validate_input(snapshot: &Snapshot) -> Result<(), Vec<InputError>> {
    let mut errors = Vec::new();

    check_unique("batch", snapshot.batches.iter().map(|b| b.id.as_str()), &mut errors);
    check_unique("subject", snapshot.subjects.iter().map(|s| s.id.as_str()), &mut errors);
    check_unique("room", snapshot.rooms.iter().map(|r| r.id.as_str()), &mut errors);

    for batch in &snapshot.batches {
        for day_type in [DayType::Weekday, DayType::Weekend] {
            if batch.window(day_type).interval().is_none() {
                errors.push(InputError::InvalidBatchWindow {
                    batch_id: batch.id.clone(),
                    day_type,
                });
            }
        }
    }

    let covered: FxHashSet<ComponentRef> = snapshot
        .existing_slots
        .iter()
        .map(ScheduledSlot::component_ref)
        .collect();

    for subject in &snapshot.subjects {
        if snapshot.batch(&subject.batch_id).is_none() {
            errors.push(InputError::UnknownBatch {
                subject_id: subject.id.clone(),
                batch_id: subject.batch_id.clone(),
            });
        }

        let mut kinds: FxHashSet<ComponentKind> = FxHashSet::default();
        let mut needs_staff = false;
        for req in &subject.components {
            if !(1..=MINUTES_PER_DAY as i32).contains(&req.duration_minutes) {
                errors.push(InputError::InvalidDuration {
                    subject_id: subject.id.clone(),
                    component: req.kind,
                    minutes: req.duration_minutes,
                });
            }
            if !kinds.insert(req.kind) {
                errors.push(InputError::DuplicateComponent {
                    subject_id: subject.id.clone(),
                    component: req.kind,
                });
            }
            let reference = ComponentRef {
                batch_id: subject.batch_id.clone(),
                subject_id: subject.id.clone(),
                component: req.kind,
            };
            needs_staff |= !covered.contains(&reference);
        }

        if needs_staff && snapshot.eligible_staff(&subject.id, &subject.batch_id).is_empty() {
            errors.push(InputError::NoEligibleStaff {
                subject_id: subject.id.clone(),
                batch_id: subject.batch_id.clone(),
            });
        }
    }

    for window in &snapshot.availability {
        if Interval::from_times(window.start, window.end).is_none() {
            errors.push(InputError::InvalidAvailabilityWindow {
                staff_id: window.staff_id.clone(),
                day: window.day,
            });
        }
    }

    let mut occupancy = Occupancy::new();
    for slot in &snapshot.existing_slots {
        let component = slot.component_ref();
        if snapshot.batch(&slot.batch_id).is_none() {
            errors.push(InputError::InvalidExistingSlot {
                component,
                reason: format!("unknown batch {}", slot.batch_id),
            });
            continue;
        }
        let Some(interval) = slot.interval() else {
            errors.push(InputError::InvalidExistingSlot {
                component,
                reason: "ends at or before it starts".to_string(),
            });
            continue;
        };
        if let Err(source) = occupancy.reserve_all(&reservation_of(slot), slot.day, interval) {
            errors.push(InputError::OverlappingExistingSlots { component, source });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn reservation_of(slot: &ScheduledSlot) -> Reservation<'_> {
    Reservation {
        staff: &slot.staff_id,
        batch: &slot.batch_id,
        room: slot.room_id.as_deref(),
    }
}

/// Re-check proposed slots (typically manual edits) against the same rules
/// generation enforces. Existing slots for components not being replaced
/// count as occupied time.
pub fn validate_slots(snapshot: &Snapshot, proposed: &[ScheduledSlot]) -> Vec<Conflict> {
    let index = AvailabilityIndex::build(&snapshot.availability, &snapshot.preferences);
    let replaced: FxHashSet<ComponentRef> =
        proposed.iter().map(ScheduledSlot::component_ref).collect();

    let mut occupancy = Occupancy::new();
    for slot in &snapshot.existing_slots {
        if replaced.contains(&slot.component_ref()) {
            continue;
        }
        let Some(interval) = slot.interval() else {
            continue;
        };
        // Overlapping existing slots are an input problem. The first one
        // keeps the time and a later clashing one reserves nothing.
        occupancy
            .reserve_all(&reservation_of(slot), slot.day, interval)
            .ok();
    }

    let mut conflicts = Vec::new();
    let mut seen: FxHashSet<ComponentRef> = FxHashSet::default();

    for slot in proposed {
        let reference = slot.component_ref();
        let mut report = |kind: ConflictKind, message: String| {
            conflicts.push(Conflict::new(&reference, kind, message));
        };

        let batch = snapshot.batch(&slot.batch_id);
        let requirement = snapshot
            .subject(&slot.subject_id)
            .filter(|s| s.batch_id == slot.batch_id)
            .and_then(|s| s.requirement(slot.component));
        let (Some(batch), Some(requirement)) = (batch, requirement) else {
            report(
                ConflictKind::UnknownReference,
                format!("{} does not match any subject component", reference),
            );
            continue;
        };

        if let Some(room_id) = &slot.room_id {
            let problem = match snapshot.room(room_id) {
                None => Some("unknown"),
                Some(room) if !room.active => Some("inactive"),
                Some(_) => None,
            };
            if let Some(problem) = problem {
                report(
                    ConflictKind::UnknownReference,
                    format!("{} uses {} room {}", reference, problem, room_id),
                );
                continue;
            }
        }

        let Some(interval) = slot.interval() else {
            report(
                ConflictKind::OrderingViolated,
                format!("{} ends at {} but starts at {}", reference, slot.end, slot.start),
            );
            continue;
        };

        if !seen.insert(reference.clone()) {
            report(
                ConflictKind::DuplicateComponent,
                format!("{} is scheduled more than once", reference),
            );
        }

        if slot.duration_minutes() != requirement.duration_minutes {
            report(
                ConflictKind::DurationMismatch,
                format!(
                    "{} lasts {} minutes, requires {}",
                    reference,
                    slot.duration_minutes(),
                    requirement.duration_minutes
                ),
            );
        }

        if !snapshot
            .eligible_staff(&slot.subject_id, &slot.batch_id)
            .contains(&slot.staff_id)
        {
            report(
                ConflictKind::IneligibleStaff,
                format!("{} is not an active primary for {}", slot.staff_id, reference),
            );
        }

        match batch.window_for(slot.day) {
            Some(bounds) if bounds.contains(&interval) => {}
            Some(_) => report(
                ConflictKind::OutsideBatchWindow,
                format!("{} falls outside batch {} hours on {}", reference, batch.id, slot.day),
            ),
            None => report(
                ConflictKind::OutsideBatchWindow,
                format!("batch {} does not meet on {}", batch.id, slot.day),
            ),
        }

        if !index
            .staff_windows(&slot.staff_id, slot.day)
            .iter()
            .any(|w| w.contains(&interval))
        {
            report(
                ConflictKind::StaffUnavailable,
                format!(
                    "{} is not available {} {}-{}",
                    slot.staff_id, slot.day, slot.start, slot.end
                ),
            );
        }

        for key in reservation_of(slot).keys() {
            if let Err(overlap) = occupancy.reserve(key, slot.day, interval) {
                let kind = match key {
                    OccupancyKey::Staff(_) => ConflictKind::StaffDoubleBooked,
                    OccupancyKey::Batch(_) => ConflictKind::BatchDoubleBooked,
                    OccupancyKey::Room(_) => ConflictKind::RoomDoubleBooked,
                };
                report(kind, overlap.to_string());
            }
        }
    }

    conflicts
}
