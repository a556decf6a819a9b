//! Core data types for timetable generation.
//!
//! Everything here is supplied by the host as an immutable [`Snapshot`] or
//! produced by a run as a [`GenerationResult`]. Times are `NaiveTime` at this
//! boundary; the engine works in [`Minute`]s internally.

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::interval::{to_minute, Interval, Minute};
use crate::scheduler::RepairRecord;

/// Days in canonical iteration order (weekdays before the weekend).
pub const CANONICAL_DAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Position of a day in canonical order (Monday = 0).
#[inline]
pub fn day_index(day: Weekday) -> usize {
    day.num_days_from_monday() as usize
}

/// Whether a day falls in the working week or on the weekend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn of(day: Weekday) -> Self {
        match day {
            Weekday::Sat | Weekday::Sun => DayType::Weekend,
            _ => DayType::Weekday,
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayType::Weekday => write!(f, "weekday"),
            DayType::Weekend => write!(f, "weekend"),
        }
    }
}

/// A start/end time pair as supplied by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// The window as an interval, or `None` when `start >= end`.
    pub fn interval(&self) -> Option<Interval> {
        Interval::from_times(self.start, self.end)
    }
}

fn all_days() -> Vec<Weekday> {
    CANONICAL_DAYS.to_vec()
}

/// A cohort of students sharing one timetable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    #[serde(default)]
    pub academic_period: String,
    pub weekday_window: TimeWindow,
    pub weekend_window: TimeWindow,
    /// Days on which the batch may be taught.
    #[serde(default = "all_days")]
    pub active_days: Vec<Weekday>,
}

impl Batch {
    pub fn new(
        id: impl Into<String>,
        weekday_window: TimeWindow,
        weekend_window: TimeWindow,
    ) -> Self {
        Self {
            id: id.into(),
            academic_period: String::new(),
            weekday_window,
            weekend_window,
            active_days: all_days(),
        }
    }

    pub fn window(&self, day_type: DayType) -> &TimeWindow {
        match day_type {
            DayType::Weekday => &self.weekday_window,
            DayType::Weekend => &self.weekend_window,
        }
    }

    /// Teaching bounds for `day`, or `None` if the batch is not taught that day.
    pub fn window_for(&self, day: Weekday) -> Option<Interval> {
        if !self.active_days.contains(&day) {
            return None;
        }
        self.window(DayType::of(day)).interval()
    }
}

/// One schedulable part of a subject.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Lecture,
    Tutorial,
    Lab,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Lecture => write!(f, "lecture"),
            ComponentKind::Tutorial => write!(f, "tutorial"),
            ComponentKind::Lab => write!(f, "lab"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRequirement {
    pub kind: ComponentKind,
    pub duration_minutes: i32,
}

impl ComponentRequirement {
    pub fn new(kind: ComponentKind, duration_minutes: i32) -> Self {
        Self {
            kind,
            duration_minutes,
        }
    }
}

fn default_credits() -> i32 {
    3
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub code: String,
    pub batch_id: String,
    /// Credit weight; heavier subjects get first pick of slots.
    #[serde(default = "default_credits")]
    pub credits: i32,
    pub components: Vec<ComponentRequirement>,
}

impl Subject {
    pub fn requirement(&self, kind: ComponentKind) -> Option<&ComponentRequirement> {
        self.components.iter().find(|c| c.kind == kind)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentRole {
    #[default]
    Primary,
    Secondary,
    Assistant,
}

fn default_true() -> bool {
    true
}

/// Links a staff member to a subject within a batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaffAssignment {
    pub staff_id: String,
    pub subject_id: String,
    pub batch_id: String,
    #[serde(default)]
    pub role: AssignmentRole,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl StaffAssignment {
    /// Only active primary assignments may be scheduled.
    pub fn is_schedulable(&self) -> bool {
        self.active && self.role == AssignmentRole::Primary
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Applicability {
    Weekday,
    Weekend,
    #[default]
    Both,
}

impl Applicability {
    pub fn applies_to(&self, day: Weekday) -> bool {
        match self {
            Applicability::Both => true,
            Applicability::Weekday => DayType::of(day) == DayType::Weekday,
            Applicability::Weekend => DayType::of(day) == DayType::Weekend,
        }
    }
}

/// A declared free (or, with `available = false`, blocked) window for a staff member.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub staff_id: String,
    pub day: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
    #[serde(default)]
    pub applicability: Applicability,
    #[serde(default = "default_true")]
    pub available: bool,
}

/// A staff member's preferred teaching range on a day.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreferredRange {
    pub staff_id: String,
    pub day: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomResource {
    pub id: String,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl RoomResource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capacity: None,
            active: true,
        }
    }
}

/// Identifies one component of one subject in one batch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentRef {
    pub batch_id: String,
    pub subject_id: String,
    pub component: ComponentKind,
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.subject_id, self.component, self.batch_id)
    }
}

/// A committed assignment of one component to a staff member, room, day and time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledSlot {
    pub batch_id: String,
    pub subject_id: String,
    pub component: ComponentKind,
    pub staff_id: String,
    #[serde(default)]
    pub room_id: Option<String>,
    pub day: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ScheduledSlot {
    pub fn interval(&self) -> Option<Interval> {
        Interval::from_times(self.start, self.end)
    }

    pub fn duration_minutes(&self) -> i32 {
        to_minute(self.end) as i32 - to_minute(self.start) as i32
    }

    pub fn component_ref(&self) -> ComponentRef {
        ComponentRef {
            batch_id: self.batch_id.clone(),
            subject_id: self.subject_id.clone(),
            component: self.component,
        }
    }

    /// Ordering used for returned timetables.
    pub(crate) fn sort_key(&self) -> (usize, Minute, &str, &str, ComponentKind) {
        (
            day_index(self.day),
            to_minute(self.start),
            self.batch_id.as_str(),
            self.subject_id.as_str(),
            self.component,
        )
    }
}

/// Classification of an unplaced component or an invalid proposed slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// No eligible staff member has a usable free window.
    StaffExhausted,
    /// The batch's teaching window (or its existing occupancy) leaves no room.
    BatchWindowExhausted,
    /// Staff and batch are free but every room is taken.
    RoomExhausted,
    /// A slot ends at or before its start.
    OrderingViolated,
    StaffDoubleBooked,
    BatchDoubleBooked,
    RoomDoubleBooked,
    OutsideBatchWindow,
    StaffUnavailable,
    DurationMismatch,
    IneligibleStaff,
    UnknownReference,
    DuplicateComponent,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictKind::StaffExhausted => "staff-exhausted",
            ConflictKind::BatchWindowExhausted => "batch-window-exhausted",
            ConflictKind::RoomExhausted => "room-exhausted",
            ConflictKind::OrderingViolated => "ordering-violated",
            ConflictKind::StaffDoubleBooked => "staff-double-booked",
            ConflictKind::BatchDoubleBooked => "batch-double-booked",
            ConflictKind::RoomDoubleBooked => "room-double-booked",
            ConflictKind::OutsideBatchWindow => "outside-batch-window",
            ConflictKind::StaffUnavailable => "staff-unavailable",
            ConflictKind::DurationMismatch => "duration-mismatch",
            ConflictKind::IneligibleStaff => "ineligible-staff",
            ConflictKind::UnknownReference => "unknown-reference",
            ConflictKind::DuplicateComponent => "duplicate-component",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub batch_id: String,
    pub subject_id: String,
    pub component: ComponentKind,
    pub kind: ConflictKind,
    pub message: String,
}

impl Conflict {
    pub fn new(component: &ComponentRef, kind: ConflictKind, message: impl Into<String>) -> Self {
        Self {
            batch_id: component.batch_id.clone(),
            subject_id: component.subject_id.clone(),
            component: component.component,
            kind,
            message: message.into(),
        }
    }
}

/// Everything a generation run reads. Never mutated by the engine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub batches: Vec<Batch>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub assignments: Vec<StaffAssignment>,
    #[serde(default)]
    pub availability: Vec<AvailabilityWindow>,
    #[serde(default)]
    pub preferences: Vec<PreferredRange>,
    #[serde(default)]
    pub rooms: Vec<RoomResource>,
    /// Slots committed by earlier runs, treated as fixed occupancy.
    #[serde(default)]
    pub existing_slots: Vec<ScheduledSlot>,
}

impl Snapshot {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn batch(&self, id: &str) -> Option<&Batch> {
        self.batches.iter().find(|b| b.id == id)
    }

    pub fn subject(&self, id: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == id)
    }

    pub fn room(&self, id: &str) -> Option<&RoomResource> {
        self.rooms.iter().find(|r| r.id == id)
    }

    /// Staff ids eligible to teach `subject_id` in `batch_id`, ascending.
    pub fn eligible_staff(&self, subject_id: &str, batch_id: &str) -> Vec<String> {
        let mut staff: Vec<String> = self
            .assignments
            .iter()
            .filter(|a| a.subject_id == subject_id && a.batch_id == batch_id && a.is_schedulable())
            .map(|a| a.staff_id.clone())
            .collect();
        staff.sort();
        staff.dedup();
        staff
    }
}

/// Why a run stopped before draining its queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Cancelled,
    TimeBudgetExhausted,
    AttemptBudgetExhausted,
}

/// Placed vs. unresolved counts for display to an administrator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub total_components: usize,
    pub placed: usize,
    /// Components already covered by `Snapshot::existing_slots`.
    pub preexisting: usize,
    pub unresolved: usize,
    pub unattempted: usize,
    pub evictions: usize,
}

/// Output of one generation run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenerationResult {
    pub slots: Vec<ScheduledSlot>,
    pub conflicts: Vec<Conflict>,
    /// Components never reached because the run stopped early.
    pub unattempted: Vec<ComponentRef>,
    pub cancelled: Option<StopReason>,
    pub repairs: Vec<RepairRecord>,
    pub summary: GenerationSummary,
}

impl GenerationResult {
    pub fn is_complete(&self) -> bool {
        self.conflicts.is_empty() && self.unattempted.is_empty() && self.cancelled.is_none()
    }
}
