//! Candidate slot enumeration.
//!
//! Candidates come out in canonical order: day (Monday first), then staff id,
//! then availability window, then start time. Only intervals free for the
//! staff member and the batch (and the chosen room) are emitted.

use chrono::Weekday;
use rustc_hash::FxHashMap;

use crate::availability::AvailabilityIndex;
use crate::config::GenerationOptions;
use crate::interval::{Interval, Minute};
use crate::models::{Batch, ConflictKind, RoomResource, Snapshot, CANONICAL_DAYS};
use crate::sorting::Component;

use super::occupancy::{Occupancy, OccupancyKey};

/// An unconfirmed, valid placement for a component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub day: Weekday,
    pub interval: Interval,
    pub staff_id: String,
    pub room_id: Option<String>,
}

/// Start times within `window` stepping by `step`, each fitting `duration`.
fn start_times(
    window: Interval,
    duration: Minute,
    step: Minute,
) -> impl Iterator<Item = Interval> {
    (window.start..window.end)
        .step_by(step.max(1) as usize)
        .map_while(move |s| Interval::starting_at(s, duration).filter(|iv| iv.end <= window.end))
}

/// Enumerates candidates against a snapshot's batches, availability and rooms.
pub struct CandidateGenerator<'a> {
    batches: FxHashMap<&'a str, &'a Batch>,
    index: &'a AvailabilityIndex,
    /// Assignable rooms, ascending id.
    rooms: Vec<&'a RoomResource>,
    require_room: bool,
}

impl<'a> CandidateGenerator<'a> {
    pub fn new(
        snapshot: &'a Snapshot,
        index: &'a AvailabilityIndex,
        options: &GenerationOptions,
    ) -> Self {
        let batches = snapshot.batches.iter().map(|b| (b.id.as_str(), b)).collect();
        let mut rooms: Vec<&RoomResource> = snapshot
            .rooms
            .iter()
            .filter(|r| r.active)
            .filter(|r| match (options.min_room_capacity, r.capacity) {
                (Some(min), Some(cap)) => cap >= min,
                _ => true,
            })
            .collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));

        Self {
            batches,
            index,
            rooms,
            require_room: options.require_room,
        }
    }

    pub fn batch(&self, id: &str) -> Option<&'a Batch> {
        self.batches.get(id).copied()
    }

    pub fn index(&self) -> &'a AvailabilityIndex {
        self.index
    }

    /// Lazily enumerate candidates for `component`. Restartable: every call
    /// starts again from the first day.
    pub fn candidates(
        &'a self,
        component: &'a Component,
        step: Minute,
        occupancy: &'a Occupancy,
    ) -> impl Iterator<Item = Candidate> + 'a {
        let duration = component.duration;
        self.batch(component.batch_id())
            .into_iter()
            .flat_map(move |batch| {
                CANONICAL_DAYS
                    .iter()
                    .filter_map(move |&day| batch.window_for(day).map(|bounds| (day, bounds)))
            })
            .flat_map(move |(day, bounds)| {
                component.staff.iter().flat_map(move |staff| {
                    self.index
                        .schedulable_windows(staff, day, &bounds)
                        .into_iter()
                        .flat_map(move |window| start_times(window, duration, step))
                        .map(move |interval| (day, staff.as_str(), interval))
                })
            })
            .filter_map(move |(day, staff, interval)| {
                self.admit(component, day, staff, interval, occupancy)
            })
    }

    fn admit(
        &self,
        component: &Component,
        day: Weekday,
        staff: &str,
        interval: Interval,
        occupancy: &Occupancy,
    ) -> Option<Candidate> {
        if !occupancy.is_free(OccupancyKey::Staff(staff), day, interval)
            || !occupancy.is_free(OccupancyKey::Batch(component.batch_id()), day, interval)
        {
            return None;
        }
        let room_id = self.free_room(day, interval, occupancy);
        if room_id.is_none() && self.require_room {
            return None;
        }
        Some(Candidate {
            day,
            interval,
            staff_id: staff.to_string(),
            room_id,
        })
    }

    /// Lowest-id assignable room free over `interval`.
    pub fn free_room(
        &self,
        day: Weekday,
        interval: Interval,
        occupancy: &Occupancy,
    ) -> Option<String> {
        self.rooms
            .iter()
            .find(|r| occupancy.is_free(OccupancyKey::Room(&r.id), day, interval))
            .map(|r| r.id.clone())
    }

    /// Whether `interval` on `day` lies in a window the component could use.
    pub fn usable_window_overlaps(
        &self,
        component: &Component,
        day: Weekday,
        interval: &Interval,
    ) -> bool {
        let Some(bounds) = self
            .batch(component.batch_id())
            .and_then(|b| b.window_for(day))
        else {
            return false;
        };
        component.staff.iter().any(|staff| {
            self.index
                .schedulable_windows(staff, day, &bounds)
                .iter()
                .any(|w| w.duration() >= component.duration && w.overlaps(interval))
        })
    }

    /// Explain why no candidate exists for `component`.
    ///
    /// Windows too short for the duration, or clipped away by the batch's
    /// bounds, point at the schedule structure; otherwise whichever namespace
    /// blocks the start times that remain decides the classification.
    pub fn diagnose(
        &self,
        component: &Component,
        step: Minute,
        occupancy: &Occupancy,
    ) -> ConflictKind {
        let duration = component.duration;
        let batch_id = component.batch_id();
        let batch = self.batch(batch_id);

        let staff_alone_fits = component.staff.iter().any(|staff| {
            CANONICAL_DAYS.iter().any(|&day| {
                self.index
                    .staff_windows(staff, day)
                    .iter()
                    .any(|w| w.duration() >= duration)
            })
        });

        let mut structural = false;
        let mut staff_and_batch_free = false;
        let mut staff_free_batch_busy = false;

        for &day in CANONICAL_DAYS.iter() {
            let Some(bounds) = batch.and_then(|b| b.window_for(day)) else {
                continue;
            };
            for staff in &component.staff {
                for window in self.index.schedulable_windows(staff, day, &bounds) {
                    for interval in start_times(window, duration, step) {
                        structural = true;
                        if !occupancy.is_free(OccupancyKey::Staff(staff), day, interval) {
                            continue;
                        }
                        if occupancy.is_free(OccupancyKey::Batch(batch_id), day, interval) {
                            staff_and_batch_free = true;
                        } else {
                            staff_free_batch_busy = true;
                        }
                    }
                }
            }
        }

        if !structural {
            if staff_alone_fits {
                ConflictKind::BatchWindowExhausted
            } else {
                ConflictKind::StaffExhausted
            }
        } else if staff_and_batch_free {
            ConflictKind::RoomExhausted
        } else if staff_free_batch_busy {
            ConflictKind::BatchWindowExhausted
        } else {
            ConflictKind::StaffExhausted
        }
    }
}
