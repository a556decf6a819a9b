//! Half-open minute intervals within a single day.
//!
//! All overlap checks in the engine go through [`Interval::overlaps`], so
//! back-to-back slots (`[9:00, 10:00)` and `[10:00, 11:00)`) never conflict.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Minutes since midnight.
pub type Minute = u16;

/// Minutes in a day; upper bound for any interval end.
pub const MINUTES_PER_DAY: Minute = 24 * 60;

/// Convert a time of day to minutes since midnight (seconds are truncated).
pub fn to_minute(t: NaiveTime) -> Minute {
    (t.num_seconds_from_midnight() / 60) as Minute
}

/// Convert minutes since midnight back to a time of day.
///
/// `MINUTES_PER_DAY` has no `NaiveTime` representation and maps to 23:59.
pub fn from_minute(m: Minute) -> NaiveTime {
    let m = m.min(MINUTES_PER_DAY - 1) as u32;
    NaiveTime::from_hms_opt(m / 60, m % 60, 0).unwrap_or(NaiveTime::MIN)
}

/// A half-open interval `[start, end)` in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Interval {
    pub start: Minute,
    pub end: Minute,
}

impl Interval {
    pub fn new(start: Minute, end: Minute) -> Self {
        debug_assert!(start < end, "Interval start must be before end");
        Self { start, end }
    }

    /// Build an interval from two times of day, or `None` if it would be empty.
    pub fn from_times(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        let (s, e) = (to_minute(start), to_minute(end));
        (s < e).then(|| Self { start: s, end: e })
    }

    /// Interval starting at `start` lasting `duration` minutes, if it fits in the day.
    pub fn starting_at(start: Minute, duration: Minute) -> Option<Self> {
        let end = start.checked_add(duration)?;
        (duration > 0 && end <= MINUTES_PER_DAY).then(|| Self { start, end })
    }

    pub fn duration(&self) -> Minute {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then(|| Interval { start, end })
    }

    pub fn start_time(&self) -> NaiveTime {
        from_minute(self.start)
    }

    pub fn end_time(&self) -> NaiveTime {
        from_minute(self.end)
    }
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Interval]) -> Vec<Interval> {
    let mut merged: Vec<Interval> = Vec::new();
    for &iv in sorted {
        if let Some(last) = merged.last_mut() {
            if iv.start <= last.end {
                last.end = last.end.max(iv.end);
                continue;
            }
        }
        merged.push(iv);
    }
    merged
}

/// Remove every interval in `to_remove` from `base`. Both inputs must be sorted.
pub fn subtract_intervals(base: &[Interval], to_remove: &[Interval]) -> Vec<Interval> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Interval::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Interval::new(current_start, current_end));
        }
    }

    result
}

/// Clip every interval in `spans` to `bounds`, dropping the empty ones.
pub fn clip_to(spans: &[Interval], bounds: &Interval) -> Vec<Interval> {
    spans.iter().filter_map(|s| s.intersect(bounds)).collect()
}
