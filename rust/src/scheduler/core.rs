//! Generation controller: validation, seeding, the queue loop and budgets.

use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::availability::AvailabilityIndex;
use crate::config::GenerationOptions;
use crate::models::{
    ComponentRef, Conflict, ConflictKind, GenerationResult, GenerationSummary, ScheduledSlot,
    Snapshot, StopReason,
};
use crate::sorting::{build_queue, Component};
use crate::validation::{validate_input, InputError};
use crate::{log_changes, log_checks};

use super::candidates::CandidateGenerator;
use super::occupancy::{NamespaceTable, Occupancy, Overlap, SharedStaffOccupancy};
use super::placement::{Placement, PlacementEngine};
use super::repair::Repairer;
use super::state::{ComponentState, RunState};

/// Errors that stop a run without producing a timetable.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid input: {}", format_input_errors(.0))]
    InvalidInput(Vec<InputError>),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("JSON error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Rollback failed while restoring {component}: {source}")]
    RollbackFailed { component: ComponentRef, source: Overlap },
    #[error("Existing slots clash with reserved staff time: {0}")]
    ExistingSlotConflict(#[source] Overlap),
}

fn format_input_errors(errors: &[InputError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<Vec<InputError>> for SchedulerError {
    fn from(errors: Vec<InputError>) -> Self {
        SchedulerError::InvalidInput(errors)
    }
}

/// Cooperative cancellation flag, checked between components.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// One generation run over a snapshot.
pub struct TimetableGenerator<'a> {
    snapshot: &'a Snapshot,
    options: GenerationOptions,
    cancellation: Option<CancellationToken>,
    shared_staff: Option<SharedStaffOccupancy>,
}

impl<'a> TimetableGenerator<'a> {
    pub fn new(snapshot: &'a Snapshot, options: GenerationOptions) -> Self {
        Self {
            snapshot,
            options,
            cancellation: None,
            shared_staff: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Book staff against a ledger shared with concurrent runs.
    pub fn with_shared_staff(mut self, shared: SharedStaffOccupancy) -> Self {
        self.shared_staff = Some(shared);
        self
    }

    /// Run generation to completion (or until a budget or cancellation stops it).
    pub fn generate(&self) -> Result<GenerationResult, SchedulerError> {
        self.options.validate()?;
        validate_input(self.snapshot)?;

        let verbosity = self.options.verbosity;
        let snapshot = self.snapshot;

        // Held until the staff namespace is written back.
        let mut ledger = self.shared_staff.as_ref().map(|s| s.lock());

        let covered: FxHashSet<ComponentRef> = snapshot
            .existing_slots
            .iter()
            .map(ScheduledSlot::component_ref)
            .collect();
        let queue = build_queue(snapshot, &covered);
        let total_components: usize = snapshot.subjects.iter().map(|s| s.components.len()).sum();

        let mut state = RunState::new(Occupancy::new(), queue.len());
        for slot in &snapshot.existing_slots {
            let Some(interval) = slot.interval() else {
                continue;
            };
            state
                .seed(slot.clone(), interval)
                .map_err(SchedulerError::ExistingSlotConflict)?;
        }
        // This run's batches are rebuilt from the snapshot, not the ledger.
        let batch_ids: FxHashSet<&str> = snapshot.batches.iter().map(|b| b.id.as_str()).collect();
        if let Some(ledger) = &ledger {
            for table in ledger.tables_except(&batch_ids) {
                state
                    .occupancy
                    .merge_staff(table)
                    .map_err(SchedulerError::ExistingSlotConflict)?;
            }
        }

        log_changes!(
            verbosity,
            "Generating {} components ({} already scheduled)",
            queue.len(),
            total_components - queue.len()
        );

        let index = AvailabilityIndex::build(&snapshot.availability, &snapshot.preferences);
        let generator = CandidateGenerator::new(snapshot, &index, &self.options);
        let engine = PlacementEngine::new(&generator, &self.options);
        let repairer = Repairer::new(&engine, &queue, self.options.retry_budget);

        let started = Instant::now();
        let mut conflicts: Vec<Conflict> = Vec::new();
        let mut repairs = Vec::new();
        let mut cancelled = None;

        for component in &queue {
            if let Some(reason) = self.stop_reason(started, state.attempts) {
                log_changes!(verbosity, "Stopping early: {:?}", reason);
                cancelled = Some(reason);
                break;
            }

            let pass = engine.normal_pass(component);
            if let Placement::Committed(_) = engine.place(component, &mut state, pass) {
                continue;
            }
            if repairer.repair(component, &mut state, &mut repairs)? {
                continue;
            }

            state.set_state(component.rank, ComponentState::CandidatesExhausted);
            let kind = engine.diagnose(component, &state);
            log_changes!(verbosity, "Unresolved {}: {}", component.reference, kind);
            let message = conflict_message(component, kind);
            conflicts.push(Conflict::new(&component.reference, kind, message));
        }

        let unattempted: Vec<ComponentRef> = queue
            .iter()
            .filter(|c| state.state(c.rank) == ComponentState::Pending)
            .map(|c| c.reference.clone())
            .collect();
        let slots = state.generated_slots();
        let summary = GenerationSummary {
            total_components,
            placed: state.count(ComponentState::Committed),
            preexisting: total_components - queue.len(),
            unresolved: state.count(ComponentState::CandidatesExhausted),
            unattempted: unattempted.len(),
            evictions: state.evictions,
        };
        log_checks!(verbosity, "Summary: {:?}", summary);

        if let Some(ledger) = ledger.as_mut() {
            let tables = batch_ids
                .iter()
                .map(|&batch_id| ledger_table(&state, batch_id).map(|table| (batch_id, table)))
                .collect::<Result<Vec<_>, _>>()
                .map_err(SchedulerError::ExistingSlotConflict)?;
            for (batch_id, table) in tables {
                ledger.replace_batch(batch_id, table);
            }
        }

        Ok(GenerationResult {
            slots,
            conflicts,
            unattempted,
            cancelled,
            repairs,
            summary,
        })
    }

    fn stop_reason(&self, started: Instant, attempts: u64) -> Option<StopReason> {
        if self.cancellation.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Some(StopReason::Cancelled);
        }
        if self.options.time_budget().is_some_and(|budget| started.elapsed() >= budget) {
            return Some(StopReason::TimeBudgetExhausted);
        }
        if self.options.max_placement_attempts.is_some_and(|max| attempts >= max) {
            return Some(StopReason::AttemptBudgetExhausted);
        }
        None
    }
}

/// Staff reservations of `batch_id`'s slots, generated or seeded.
fn ledger_table(state: &RunState, batch_id: &str) -> Result<NamespaceTable, Overlap> {
    let mut table = NamespaceTable::default();
    for c in state.commitments.iter().filter(|c| c.slot.batch_id == batch_id) {
        table.insert(&c.slot.staff_id, c.day(), c.interval)?;
    }
    Ok(table)
}

fn conflict_message(component: &Component, kind: ConflictKind) -> String {
    let staff = component.staff.join(", ");
    match kind {
        ConflictKind::StaffExhausted => format!(
            "no free {}-minute window for {} among staff [{}]",
            component.duration, component.reference, staff
        ),
        ConflictKind::BatchWindowExhausted => format!(
            "batch {} has no free {}-minute window that staff [{}] can teach",
            component.batch_id(),
            component.duration,
            staff
        ),
        ConflictKind::RoomExhausted => format!(
            "staff and batch are free but no room is available for {}",
            component.reference
        ),
        other => format!("{} could not be placed: {}", component.reference, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::{to_minute, Interval};
    use crate::models::{
        Applicability, AssignmentRole, AvailabilityWindow, Batch, ComponentKind,
        ComponentRequirement, RoomResource, StaffAssignment, Subject, TimeWindow,
    };
    use crate::scheduler::OccupancyKey;
    use crate::validation::validate_slots;
    use chrono::{NaiveTime, Weekday};
    use std::time::Duration;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn batch(id: &str) -> Batch {
        Batch::new(
            id,
            TimeWindow::new(t(8, 30), t(17, 30)),
            TimeWindow::new(t(8, 30), t(20, 30)),
        )
    }

    fn subject(
        id: &str,
        batch_id: &str,
        credits: i32,
        components: &[(ComponentKind, i32)],
    ) -> Subject {
        Subject {
            id: id.into(),
            code: id.into(),
            batch_id: batch_id.into(),
            credits,
            components: components
                .iter()
                .map(|(k, d)| ComponentRequirement::new(*k, *d))
                .collect(),
        }
    }

    fn primary(staff: &str, subject_id: &str, batch_id: &str) -> StaffAssignment {
        StaffAssignment {
            staff_id: staff.into(),
            subject_id: subject_id.into(),
            batch_id: batch_id.into(),
            role: AssignmentRole::Primary,
            active: true,
        }
    }

    fn avail(staff: &str, day: Weekday, start: NaiveTime, end: NaiveTime) -> AvailabilityWindow {
        AvailabilityWindow {
            staff_id: staff.into(),
            day,
            start,
            end,
            applicability: Applicability::Both,
            available: true,
        }
    }

    fn cs101() -> Snapshot {
        Snapshot {
            batches: vec![batch("Y1S1")],
            subjects: vec![subject(
                "CS101",
                "Y1S1",
                3,
                &[(ComponentKind::Lecture, 60), (ComponentKind::Tutorial, 60)],
            )],
            assignments: vec![primary("smith", "CS101", "Y1S1")],
            availability: vec![avail("smith", Weekday::Mon, t(9, 0), t(12, 0))],
            ..Default::default()
        }
    }

    fn assert_no_double_booking(slots: &[ScheduledSlot]) {
        let mut occ = Occupancy::new();
        for s in slots {
            let interval = s.interval().unwrap();
            occ.reserve(OccupancyKey::Staff(&s.staff_id), s.day, interval).unwrap();
            occ.reserve(OccupancyKey::Batch(&s.batch_id), s.day, interval).unwrap();
            if let Some(room) = &s.room_id {
                occ.reserve(OccupancyKey::Room(room), s.day, interval).unwrap();
            }
        }
    }

    fn assert_conserved(result: &GenerationResult) {
        let s = &result.summary;
        assert_eq!(
            s.placed + s.preexisting + s.unresolved + s.unattempted,
            s.total_components
        );
    }

    #[test]
    fn test_cs101_lecture_then_tutorial() {
        let snap = cs101();
        let result = TimetableGenerator::new(&snap, GenerationOptions::default())
            .generate()
            .unwrap();

        assert!(result.is_complete());
        assert_eq!(result.slots.len(), 2);
        let lecture = &result.slots[0];
        assert_eq!(lecture.component, ComponentKind::Lecture);
        assert_eq!((lecture.day, lecture.start, lecture.end), (Weekday::Mon, t(9, 0), t(10, 0)));
        let tutorial = &result.slots[1];
        assert_eq!(tutorial.component, ComponentKind::Tutorial);
        assert_eq!((tutorial.start, tutorial.end), (t(10, 0), t(11, 0)));
        assert_eq!(lecture.staff_id, "smith");
        assert!(lecture.room_id.is_none());
        assert_eq!(result.summary.placed, 2);
        assert!(validate_slots(&snap, &result.slots).is_empty());
    }

    #[test]
    fn test_competing_lectures_one_staff_slot() {
        let mut snap = cs101();
        snap.subjects = vec![
            subject("CS101", "Y1S1", 3, &[(ComponentKind::Lecture, 60)]),
            subject("MA101", "Y1S1", 3, &[(ComponentKind::Lecture, 60)]),
        ];
        snap.assignments.push(primary("smith", "MA101", "Y1S1"));
        snap.availability = vec![avail("smith", Weekday::Mon, t(9, 0), t(10, 0))];

        let result = TimetableGenerator::new(&snap, GenerationOptions::default())
            .generate()
            .unwrap();

        assert_eq!(result.slots.len(), 1);
        assert_eq!(result.slots[0].subject_id, "CS101");
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].subject_id, "MA101");
        assert_eq!(result.conflicts[0].kind, ConflictKind::StaffExhausted);
        assert!(!result.is_complete());
        assert_conserved(&result);
    }

    #[test]
    fn test_existing_slot_is_never_double_booked() {
        let mut snap = cs101();
        snap.subjects.push(subject("MA101", "Y1S1", 4, &[(ComponentKind::Lecture, 60)]));
        snap.assignments.push(primary("smith", "MA101", "Y1S1"));
        // MA101 was placed by an earlier run at 09:00.
        snap.existing_slots.push(ScheduledSlot {
            batch_id: "Y1S1".into(),
            subject_id: "MA101".into(),
            component: ComponentKind::Lecture,
            staff_id: "smith".into(),
            room_id: None,
            day: Weekday::Mon,
            start: t(9, 0),
            end: t(10, 0),
        });

        let result = TimetableGenerator::new(&snap, GenerationOptions::default())
            .generate()
            .unwrap();

        assert!(result.is_complete());
        assert_eq!(result.summary.preexisting, 1);
        assert_eq!(result.slots.len(), 2);
        assert!(result.slots.iter().all(|s| s.subject_id == "CS101"));
        assert!(result.slots.iter().all(|s| s.start >= t(10, 0)));
        let mut all = result.slots.clone();
        all.extend(snap.existing_slots.iter().cloned());
        assert_no_double_booking(&all);
        assert_conserved(&result);
    }

    #[test]
    fn test_identical_input_identical_output() {
        let mut snap = cs101();
        snap.batches.push(batch("Y2S1"));
        snap.subjects.push(subject(
            "PH201",
            "Y2S1",
            4,
            &[(ComponentKind::Lecture, 90), (ComponentKind::Lab, 120)],
        ));
        snap.assignments.push(primary("jones", "PH201", "Y2S1"));
        snap.assignments.push(primary("smith", "PH201", "Y2S1"));
        snap.availability.push(avail("jones", Weekday::Tue, t(8, 30), t(17, 0)));
        snap.rooms = vec![RoomResource::new("R2"), RoomResource::new("R1")];

        let a = TimetableGenerator::new(&snap, GenerationOptions::default()).generate().unwrap();
        let b = TimetableGenerator::new(&snap, GenerationOptions::default()).generate().unwrap();
        assert_eq!(a.slots, b.slots);
        assert_eq!(a.conflicts, b.conflicts);
        assert_eq!(a.summary, b.summary);
    }

    #[test]
    fn test_slots_respect_windows_and_never_overlap() {
        let mut snap = Snapshot {
            batches: vec![batch("Y1S1"), batch("Y2S1")],
            rooms: vec![RoomResource::new("R1")],
            ..Default::default()
        };
        for (i, (subject_id, batch_id)) in [
            ("CS101", "Y1S1"),
            ("MA101", "Y1S1"),
            ("CS201", "Y2S1"),
            ("MA201", "Y2S1"),
        ]
        .iter()
        .enumerate()
        {
            snap.subjects.push(subject(
                subject_id,
                batch_id,
                3 + i as i32 % 2,
                &[
                    (ComponentKind::Lecture, 60),
                    (ComponentKind::Tutorial, 60),
                    (ComponentKind::Lab, 120),
                ],
            ));
            let staff = if i % 2 == 0 { "smith" } else { "jones" };
            snap.assignments.push(primary(staff, subject_id, batch_id));
        }
        for day in [Weekday::Mon, Weekday::Tue, Weekday::Wed] {
            snap.availability.push(avail("smith", day, t(8, 0), t(18, 0)));
            snap.availability.push(avail("jones", day, t(10, 0), t(16, 0)));
        }

        let options = GenerationOptions::default().with_require_room(true);
        let result = TimetableGenerator::new(&snap, options)
            .generate()
            .unwrap();

        assert_no_double_booking(&result.slots);
        assert_conserved(&result);
        for slot in &result.slots {
            let bounds = snap.batch(&slot.batch_id).unwrap().window_for(slot.day).unwrap();
            assert!(bounds.contains(&slot.interval().unwrap()));
            assert!(slot.room_id.is_some());
        }
        assert!(validate_slots(&snap, &result.slots).is_empty());
    }

    #[test]
    fn test_require_room_reports_room_exhausted() {
        let mut snap = cs101();
        snap.rooms = vec![RoomResource::new("R1")];
        snap.batches.push(batch("Y2S1"));
        snap.subjects = vec![
            subject("CS101", "Y1S1", 3, &[(ComponentKind::Lecture, 60)]),
            subject("CS102", "Y2S1", 3, &[(ComponentKind::Lecture, 60)]),
        ];
        snap.assignments = vec![
            primary("smith", "CS101", "Y1S1"),
            primary("jones", "CS102", "Y2S1"),
        ];
        snap.availability = vec![
            avail("smith", Weekday::Mon, t(9, 0), t(10, 0)),
            avail("jones", Weekday::Mon, t(9, 0), t(10, 0)),
        ];

        let options = GenerationOptions::default().with_require_room(true);
        let result = TimetableGenerator::new(&snap, options)
            .generate()
            .unwrap();
        assert_eq!(result.slots.len(), 1);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].subject_id, "CS102");
        assert_eq!(result.conflicts[0].kind, ConflictKind::RoomExhausted);

        // Without the requirement the second lecture runs roomless.
        let result = TimetableGenerator::new(&snap, GenerationOptions::default())
            .generate()
            .unwrap();
        assert!(result.is_complete());
        assert_eq!(result.slots.iter().filter(|s| s.room_id.is_none()).count(), 1);
    }

    #[test]
    fn test_batch_window_exhausted_when_availability_is_after_hours() {
        let mut snap = cs101();
        snap.availability = vec![avail("smith", Weekday::Mon, t(18, 0), t(20, 0))];
        let result = TimetableGenerator::new(&snap, GenerationOptions::default())
            .generate()
            .unwrap();
        assert!(result.slots.is_empty());
        assert_eq!(result.conflicts.len(), 2);
        assert!(result
            .conflicts
            .iter()
            .all(|c| c.kind == ConflictKind::BatchWindowExhausted));
    }

    #[test]
    fn test_eviction_unblocks_later_component() {
        // PH101 (heavier, smith) grabs 09:00; MA101 (jones) only has 09:00.
        let snap = Snapshot {
            batches: vec![batch("Y1S1")],
            subjects: vec![
                subject("PH101", "Y1S1", 4, &[(ComponentKind::Lecture, 60)]),
                subject("MA101", "Y1S1", 3, &[(ComponentKind::Lecture, 60)]),
            ],
            assignments: vec![primary("smith", "PH101", "Y1S1"), primary("jones", "MA101", "Y1S1")],
            availability: vec![
                avail("smith", Weekday::Mon, t(9, 0), t(11, 0)),
                avail("jones", Weekday::Mon, t(9, 0), t(10, 0)),
            ],
            ..Default::default()
        };
        let result = TimetableGenerator::new(&snap, GenerationOptions::default())
            .generate()
            .unwrap();

        assert!(result.is_complete());
        assert_eq!(result.summary.evictions, 1);
        let ph = result.slots.iter().find(|s| s.subject_id == "PH101").unwrap();
        let ma = result.slots.iter().find(|s| s.subject_id == "MA101").unwrap();
        assert_eq!(ph.start, t(10, 0));
        assert_eq!(ma.start, t(9, 0));
        assert!(result.repairs.iter().any(|r| r.succeeded));

        // With no retries the conflict stands.
        let options = GenerationOptions::default().with_retry_budget(0);
        let result = TimetableGenerator::new(&snap, options)
            .generate()
            .unwrap();
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.summary.evictions, 0);
    }

    #[test]
    fn test_cancellation_leaves_rest_unattempted() {
        let snap = cs101();
        let token = CancellationToken::new();
        token.cancel();
        let result = TimetableGenerator::new(&snap, GenerationOptions::default())
            .with_cancellation(token)
            .generate()
            .unwrap();
        assert_eq!(result.cancelled, Some(StopReason::Cancelled));
        assert!(result.slots.is_empty());
        assert_eq!(result.unattempted.len(), 2);
        assert_conserved(&result);
    }

    #[test]
    fn test_attempt_budget_stops_between_components() {
        let snap = cs101();
        let options = GenerationOptions::default().with_max_placement_attempts(1);
        let result = TimetableGenerator::new(&snap, options)
            .generate()
            .unwrap();
        assert_eq!(result.cancelled, Some(StopReason::AttemptBudgetExhausted));
        assert_eq!(result.slots.len(), 1);
        assert_eq!(result.unattempted.len(), 1);
        assert_conserved(&result);

        let options = GenerationOptions::default().with_time_budget(Duration::ZERO);
        let result = TimetableGenerator::new(&snap, options)
            .generate()
            .unwrap();
        assert_eq!(result.cancelled, Some(StopReason::TimeBudgetExhausted));
    }

    #[test]
    fn test_invalid_input_is_fatal() {
        let mut snap = cs101();
        snap.assignments.clear();
        let err = TimetableGenerator::new(&snap, GenerationOptions::default())
            .generate()
            .unwrap_err();
        match err {
            SchedulerError::InvalidInput(errors) => {
                assert!(matches!(errors[0], InputError::NoEligibleStaff { .. }))
            }
            other => panic!("unexpected error: {}", other),
        }

        let options = GenerationOptions::default().with_step_minutes(0);
        let err = TimetableGenerator::new(&cs101(), options)
            .generate()
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfig(_)));
    }

    #[test]
    fn test_shared_staff_across_concurrent_runs() {
        let shared = SharedStaffOccupancy::new();
        let make = |batch_id: &str, subject_id: &str| Snapshot {
            batches: vec![batch(batch_id)],
            subjects: vec![subject(subject_id, batch_id, 3, &[(ComponentKind::Lecture, 60)])],
            assignments: vec![primary("smith", subject_id, batch_id)],
            availability: vec![avail("smith", Weekday::Mon, t(9, 0), t(11, 0))],
            ..Default::default()
        };
        let first = make("Y1S1", "CS101");
        let second = make("Y2S1", "CS201");

        let (a, b) = std::thread::scope(|scope| {
            let ha = scope.spawn(|| {
                TimetableGenerator::new(&first, GenerationOptions::default())
                    .with_shared_staff(shared.clone())
                    .generate()
            });
            let hb = scope.spawn(|| {
                TimetableGenerator::new(&second, GenerationOptions::default())
                    .with_shared_staff(shared.clone())
                    .generate()
            });
            (ha.join().unwrap().unwrap(), hb.join().unwrap().unwrap())
        });

        assert!(a.is_complete() && b.is_complete());
        let mut all = a.slots.clone();
        all.extend(b.slots.iter().cloned());
        assert_no_double_booking(&all);
        assert_eq!(shared.reservation_count(), 2);
        let starts: FxHashSet<u16> = all.iter().map(|s| to_minute(s.start)).collect();
        assert_eq!(starts.len(), 2);
        assert!(!shared.is_free("smith", Weekday::Mon, Interval::new(540, 660)));
    }

    #[test]
    fn test_shared_ledger_counts_reseeded_slot_once() {
        let shared = SharedStaffOccupancy::new();
        let mut snap = cs101();
        snap.subjects = vec![subject("CS101", "Y1S1", 3, &[(ComponentKind::Lecture, 60)])];

        let first = TimetableGenerator::new(&snap, GenerationOptions::default())
            .with_shared_staff(shared.clone())
            .generate()
            .unwrap();
        assert_eq!(shared.reservation_count(), 1);

        // Regenerate with the earlier slot fed back as existing.
        snap.existing_slots = first.slots.clone();
        let second = TimetableGenerator::new(&snap, GenerationOptions::default())
            .with_shared_staff(shared.clone())
            .generate()
            .unwrap();
        assert!(second.slots.is_empty());
        assert_eq!(second.summary.preexisting, 1);
        assert_eq!(shared.reservation_count(), 1);
    }

    #[test]
    fn test_regenerating_a_batch_replaces_its_ledger_entries() {
        let shared = SharedStaffOccupancy::new();
        let mut snap = cs101();
        snap.subjects = vec![subject("CS101", "Y1S1", 3, &[(ComponentKind::Lecture, 60)])];
        snap.availability = vec![avail("smith", Weekday::Mon, t(9, 0), t(10, 0))];

        // The earlier timetable is discarded: nothing comes back as existing.
        for _ in 0..2 {
            let result = TimetableGenerator::new(&snap, GenerationOptions::default())
                .with_shared_staff(shared.clone())
                .generate()
                .unwrap();
            assert!(result.is_complete());
            assert_eq!(result.slots.len(), 1);
            assert_eq!(shared.reservation_count(), 1);
        }

        // Another batch sharing smith still sees the booking.
        let mut other = snap.clone();
        other.batches = vec![batch("Y2S1")];
        other.subjects = vec![subject("CS201", "Y2S1", 3, &[(ComponentKind::Lecture, 60)])];
        other.assignments = vec![primary("smith", "CS201", "Y2S1")];
        let blocked = TimetableGenerator::new(&other, GenerationOptions::default())
            .with_shared_staff(shared.clone())
            .generate()
            .unwrap();
        assert_eq!(blocked.summary.unresolved, 1);
        assert_eq!(blocked.conflicts[0].kind, ConflictKind::StaffExhausted);
        assert_eq!(shared.reservation_count(), 1);

        assert_eq!(shared.release_batch("Y1S1"), 1);
        let freed = TimetableGenerator::new(&other, GenerationOptions::default())
            .with_shared_staff(shared.clone())
            .generate()
            .unwrap();
        assert!(freed.is_complete());
        assert_eq!(shared.reservation_count(), 1);
    }
}
