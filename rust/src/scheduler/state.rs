//! Mutable state of one generation run.

use chrono::Weekday;

use crate::interval::Interval;
use crate::models::ScheduledSlot;
use crate::sorting::Component;

use super::candidates::Candidate;
use super::occupancy::{Occupancy, Overlap, Reservation};

/// Per-component placement state.
///
/// Every queued component starts `Pending`. A pass moves it to `Committed`
/// or `CandidatesExhausted`; eviction sends a committed one back to `Pending`
/// until it is placed again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ComponentState {
    #[default]
    Pending,
    Committed,
    CandidatesExhausted,
}

/// A slot held in the run's timetable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commitment {
    pub slot: ScheduledSlot,
    pub interval: Interval,
    /// Queue rank of the component; `None` for slots supplied by the caller,
    /// which are never evicted or returned.
    pub rank: Option<usize>,
}

impl Commitment {
    pub fn reservation(&self) -> Reservation<'_> {
        Reservation {
            staff: &self.slot.staff_id,
            batch: &self.slot.batch_id,
            room: self.slot.room_id.as_deref(),
        }
    }

    pub fn day(&self) -> Weekday {
        self.slot.day
    }
}

/// Occupancy plus the timetable built so far.
///
/// All changes to occupancy go through [`RunState::commit`],
/// [`RunState::uncommit`] and [`RunState::restore`], which keep the two in step
/// and keep the component states current.
#[derive(Clone, Debug, Default)]
pub struct RunState {
    pub occupancy: Occupancy,
    pub commitments: Vec<Commitment>,
    /// Indexed by queue rank
    states: Vec<ComponentState>,
    /// Placement passes run so far
    pub attempts: u64,
    pub evictions: usize,
}

impl RunState {
    pub fn new(occupancy: Occupancy, components: usize) -> Self {
        Self {
            occupancy,
            states: vec![ComponentState::Pending; components],
            ..Self::default()
        }
    }

    pub fn state(&self, rank: usize) -> ComponentState {
        self.states.get(rank).copied().unwrap_or_default()
    }

    pub fn set_state(&mut self, rank: usize, state: ComponentState) {
        if rank >= self.states.len() {
            self.states.resize(rank + 1, ComponentState::Pending);
        }
        self.states[rank] = state;
    }

    /// Number of queued components currently in `state`.
    pub fn count(&self, state: ComponentState) -> usize {
        self.states.iter().filter(|s| **s == state).count()
    }

    /// Reserve and record a candidate for `component`.
    pub fn commit(&mut self, component: &Component, candidate: &Candidate) -> Result<(), Overlap> {
        let slot = ScheduledSlot {
            batch_id: component.batch_id().to_string(),
            subject_id: component.subject_id().to_string(),
            component: component.kind(),
            staff_id: candidate.staff_id.clone(),
            room_id: candidate.room_id.clone(),
            day: candidate.day,
            start: candidate.interval.start_time(),
            end: candidate.interval.end_time(),
        };
        self.restore(Commitment {
            slot,
            interval: candidate.interval,
            rank: Some(component.rank),
        })
    }

    /// Record a caller-supplied slot as fixed occupancy.
    pub fn seed(&mut self, slot: ScheduledSlot, interval: Interval) -> Result<(), Overlap> {
        self.restore(Commitment {
            slot,
            interval,
            rank: None,
        })
    }

    /// Re-reserve a commitment exactly as it was.
    pub fn restore(&mut self, commitment: Commitment) -> Result<(), Overlap> {
        self.occupancy
            .reserve_all(&commitment.reservation(), commitment.day(), commitment.interval)?;
        if let Some(rank) = commitment.rank {
            self.set_state(rank, ComponentState::Committed);
        }
        self.commitments.push(commitment);
        Ok(())
    }

    /// Release the slot committed for queue rank `rank`, if any.
    pub fn uncommit(&mut self, rank: usize) -> Option<Commitment> {
        let pos = self.commitments.iter().position(|c| c.rank == Some(rank))?;
        let commitment = self.commitments.remove(pos);
        self.occupancy
            .release_all(&commitment.reservation(), commitment.day(), commitment.interval);
        self.set_state(rank, ComponentState::Pending);
        Some(commitment)
    }

    pub fn commitment(&self, rank: usize) -> Option<&Commitment> {
        self.commitments.iter().find(|c| c.rank == Some(rank))
    }

    /// Slots produced by this run, in output order.
    pub fn generated_slots(&self) -> Vec<ScheduledSlot> {
        let mut slots: Vec<ScheduledSlot> = self
            .commitments
            .iter()
            .filter(|c| c.rank.is_some())
            .map(|c| c.slot.clone())
            .collect();
        slots.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComponentKind, ComponentRef};
    use crate::scheduler::OccupancyKey;

    fn component(rank: usize) -> Component {
        Component {
            rank,
            reference: ComponentRef {
                batch_id: "Y1S1".into(),
                subject_id: format!("S{}", rank),
                component: ComponentKind::Lecture,
            },
            duration: 60,
            staff: vec!["smith".into()],
        }
    }

    fn candidate(start: u16) -> Candidate {
        Candidate {
            day: Weekday::Mon,
            interval: Interval::new(start, start + 60),
            staff_id: "smith".into(),
            room_id: Some("R1".into()),
        }
    }

    #[test]
    fn commit_and_uncommit_keep_occupancy_in_step() {
        let mut state = RunState::new(Occupancy::new(), 1);
        assert_eq!(state.state(0), ComponentState::Pending);
        state.commit(&component(0), &candidate(540)).unwrap();
        assert_eq!(state.state(0), ComponentState::Committed);
        assert_eq!(state.occupancy.reservation_count(), 3);
        assert!(!state
            .occupancy
            .is_free(OccupancyKey::Room("R1"), Weekday::Mon, Interval::new(540, 600)));

        let removed = state.uncommit(0).unwrap();
        assert_eq!(removed.slot.subject_id, "S0");
        assert_eq!(state.occupancy.reservation_count(), 0);
        assert_eq!(state.state(0), ComponentState::Pending);
        assert!(state.uncommit(0).is_none());

        state.restore(removed).unwrap();
        assert_eq!(state.occupancy.reservation_count(), 3);
        assert!(state.commitment(0).is_some());
        assert_eq!(state.count(ComponentState::Committed), 1);
    }

    #[test]
    fn overlapping_commit_leaves_state_unchanged() {
        let mut state = RunState::default();
        state.commit(&component(0), &candidate(540)).unwrap();
        assert!(state.commit(&component(1), &candidate(570)).is_err());
        assert_eq!(state.state(1), ComponentState::Pending);
        assert_eq!(state.commitments.len(), 1);
        assert_eq!(state.occupancy.reservation_count(), 3);
    }

    #[test]
    fn seeded_slots_are_not_returned() {
        let mut state = RunState::default();
        let seeded = ScheduledSlot {
            batch_id: "Y2S1".into(),
            subject_id: "OLD".into(),
            component: ComponentKind::Lab,
            staff_id: "jones".into(),
            room_id: None,
            day: Weekday::Tue,
            start: Interval::new(600, 720).start_time(),
            end: Interval::new(600, 720).end_time(),
        };
        state.seed(seeded, Interval::new(600, 720)).unwrap();
        assert_eq!(state.count(ComponentState::Committed), 0);
        state.commit(&component(0), &candidate(540)).unwrap();
        let slots = state.generated_slots();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].subject_id, "S0");
    }
}
