//! Fixed additive scoring for candidate slots.

use std::cmp::Ordering;

use crate::availability::AvailabilityIndex;
use crate::interval::Minute;
use crate::models::{day_index, ComponentKind};
use crate::sorting::Component;

use super::candidates::Candidate;
use super::occupancy::{Occupancy, OccupancyKey};
use super::state::Commitment;

pub const MORNING_LECTURE_BONUS: i32 = 10;
pub const CONTIGUOUS_BONUS: i32 = 15;
pub const GAP_PENALTY: i32 = -5;
pub const PREFERRED_START_BONUS: i32 = 20;

/// Lectures starting before this minute of the day earn the morning bonus.
const NOON: Minute = 12 * 60;

/// Which terms apply. The relaxed repair pass ignores compactness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreMode {
    Normal,
    Relaxed,
}

/// Read-only view of the run used while scoring.
pub struct ScoringContext<'a> {
    pub commitments: &'a [Commitment],
    pub occupancy: &'a Occupancy,
    pub index: &'a AvailabilityIndex,
    pub max_gap: Minute,
}

impl ScoringContext<'_> {
    /// A committed slot of the same subject and staff member ends where the
    /// candidate starts, or starts where it ends.
    fn is_contiguous(&self, component: &Component, candidate: &Candidate) -> bool {
        self.commitments.iter().any(|c| {
            c.slot.day == candidate.day
                && c.slot.staff_id == candidate.staff_id
                && c.slot.subject_id == component.subject_id()
                && c.slot.batch_id == component.batch_id()
                && (c.interval.end == candidate.interval.start
                    || c.interval.start == candidate.interval.end)
        })
    }

    /// The candidate leaves the staff member a short idle gap next to a
    /// neighbouring reservation that day.
    fn leaves_gap(&self, candidate: &Candidate) -> bool {
        let busy = self
            .occupancy
            .reservations(OccupancyKey::Staff(&candidate.staff_id), candidate.day);
        let start = candidate.interval.start;
        let end = candidate.interval.end;

        let before = busy.iter().filter(|r| r.end <= start).map(|r| start - r.end).min();
        let after = busy.iter().filter(|r| r.start >= end).map(|r| r.start - end).min();

        [before, after]
            .into_iter()
            .flatten()
            .any(|gap| gap > 0 && gap < self.max_gap)
    }
}

/// Score a candidate. Higher is better; no term disqualifies.
pub fn score(
    component: &Component,
    candidate: &Candidate,
    ctx: &ScoringContext<'_>,
    mode: ScoreMode,
) -> i32 {
    let mut total = 0;

    if component.kind() == ComponentKind::Lecture && candidate.interval.start < NOON {
        total += MORNING_LECTURE_BONUS;
    }

    if mode == ScoreMode::Normal {
        if ctx.is_contiguous(component, candidate) {
            total += CONTIGUOUS_BONUS;
        }
        if ctx.leaves_gap(candidate) {
            total += GAP_PENALTY;
        }
    }

    if ctx
        .index
        .is_preferred(&candidate.staff_id, candidate.day, candidate.interval.start)
    {
        total += PREFERRED_START_BONUS;
    }

    total
}

/// A candidate with its score, ordered best first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoredCandidate {
    pub score: i32,
    pub candidate: Candidate,
}

impl Ord for ScoredCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| day_index(self.candidate.day).cmp(&day_index(other.candidate.day)))
            .then_with(|| self.candidate.interval.start.cmp(&other.candidate.interval.start))
            .then_with(|| self.candidate.staff_id.cmp(&other.candidate.staff_id))
            .then_with(|| self.candidate.room_id.cmp(&other.candidate.room_id))
    }
}

impl PartialOrd for ScoredCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Score and sort candidates best first.
pub fn rank_candidates(
    component: &Component,
    candidates: impl IntoIterator<Item = Candidate>,
    ctx: &ScoringContext<'_>,
    mode: ScoreMode,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|candidate| ScoredCandidate {
            score: score(component, &candidate, ctx, mode),
            candidate,
        })
        .collect();
    scored.sort();
    scored
}
