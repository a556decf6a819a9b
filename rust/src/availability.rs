//! Per-staff, per-day index of declared availability.
//!
//! Available windows are unioned, blocked windows (`available = false`) are
//! subtracted, and the result is clipped to a batch's teaching bounds on
//! demand.

use chrono::Weekday;
use rustc_hash::FxHashMap;

use crate::interval::{clip_to, merge_overlapping, subtract_intervals, Interval, Minute};
use crate::models::{day_index, AvailabilityWindow, PreferredRange};

type Week = [Vec<Interval>; 7];

#[derive(Clone, Debug, Default)]
pub struct AvailabilityIndex {
    /// staff_id -> day -> sorted, disjoint available intervals
    windows: FxHashMap<String, Week>,
    /// staff_id -> day -> sorted, disjoint preferred intervals
    preferred: FxHashMap<String, Week>,
}

impl AvailabilityIndex {
    pub fn build(availability: &[AvailabilityWindow], preferences: &[PreferredRange]) -> Self {
        let mut open: FxHashMap<String, Week> = FxHashMap::default();
        let mut blocked: FxHashMap<String, Week> = FxHashMap::default();

        for record in availability {
            if !record.applicability.applies_to(record.day) {
                continue;
            }
            let Some(interval) = Interval::from_times(record.start, record.end) else {
                continue;
            };
            let target = if record.available {
                &mut open
            } else {
                &mut blocked
            };
            target.entry(record.staff_id.clone()).or_default()[day_index(record.day)]
                .push(interval);
        }

        let mut windows: FxHashMap<String, Week> = FxHashMap::default();
        for (staff_id, mut week) in open {
            let blocked_week = blocked.remove(&staff_id).unwrap_or_default();
            for (day, spans) in week.iter_mut().enumerate() {
                spans.sort();
                let mut merged = merge_overlapping(spans);
                let mut blocks = blocked_week[day].clone();
                if !blocks.is_empty() {
                    blocks.sort();
                    merged = subtract_intervals(&merged, &merge_overlapping(&blocks));
                }
                *spans = merged;
            }
            windows.insert(staff_id, week);
        }

        let mut preferred: FxHashMap<String, Week> = FxHashMap::default();
        for pref in preferences {
            if let Some(interval) = Interval::from_times(pref.start, pref.end) {
                preferred.entry(pref.staff_id.clone()).or_default()[day_index(pref.day)]
                    .push(interval);
            }
        }
        for week in preferred.values_mut() {
            for spans in week.iter_mut() {
                spans.sort();
                *spans = merge_overlapping(spans);
            }
        }

        Self { windows, preferred }
    }

    /// Declared availability for `staff_id` on `day`, unclipped.
    pub fn staff_windows(&self, staff_id: &str, day: Weekday) -> &[Interval] {
        self.windows
            .get(staff_id)
            .map(|week| week[day_index(day)].as_slice())
            .unwrap_or(&[])
    }

    /// Availability intersected with the batch's teaching bounds for the day.
    pub fn schedulable_windows(
        &self,
        staff_id: &str,
        day: Weekday,
        bounds: &Interval,
    ) -> Vec<Interval> {
        clip_to(self.staff_windows(staff_id, day), bounds)
    }

    /// Whether `start` falls inside one of the staff member's preferred ranges.
    pub fn is_preferred(&self, staff_id: &str, day: Weekday, start: Minute) -> bool {
        self.preferred
            .get(staff_id)
            .map(|week| {
                week[day_index(day)]
                    .iter()
                    .any(|p| p.start <= start && start < p.end)
            })
            .unwrap_or(false)
    }
}
