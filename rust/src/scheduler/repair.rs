//! Bounded repair for components with no free candidate.
//!
//! A blocked component first gets one relaxed pass. After that, up to
//! `retry_budget` single evictions are tried: one committed slot is released,
//! the blocked component is placed, and the evicted one is placed again from
//! scratch. Any failure puts every reservation back exactly as it was.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::models::{ComponentRef, ScheduledSlot};
use crate::sorting::Component;
use crate::{log_changes, log_checks};

use super::core::SchedulerError;
use super::placement::{Placement, PlacementEngine};
use super::state::{Commitment, RunState};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStrategy {
    /// Finer step, compactness terms dropped
    Relaxed,
    /// Release one committed slot and re-place both
    Eviction,
}

/// Record of one repair attempt for explainability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairRecord {
    /// Component that could not be placed
    pub blocked: ComponentRef,
    pub strategy: RepairStrategy,
    /// Slot released for the attempt, as it stood before eviction
    pub evicted: Option<ScheduledSlot>,
    /// Where the evicted component ended up, if the attempt succeeded
    pub relocated: Option<ScheduledSlot>,
    pub succeeded: bool,
}

impl RepairRecord {
    fn relaxed(blocked: &Component, succeeded: bool) -> Self {
        Self {
            blocked: blocked.reference.clone(),
            strategy: RepairStrategy::Relaxed,
            evicted: None,
            relocated: None,
            succeeded,
        }
    }

    fn eviction(
        blocked: &Component,
        evicted: &Commitment,
        relocated: Option<ScheduledSlot>,
    ) -> Self {
        Self {
            blocked: blocked.reference.clone(),
            strategy: RepairStrategy::Eviction,
            evicted: Some(evicted.slot.clone()),
            succeeded: relocated.is_some(),
            relocated,
        }
    }
}

/// Drives repair for one blocked component against the run state.
pub struct Repairer<'e, 'a> {
    engine: &'e PlacementEngine<'a>,
    /// Full queue, indexed by rank
    queue: &'e [Component],
    retry_budget: u32,
}

impl<'e, 'a> Repairer<'e, 'a> {
    pub fn new(engine: &'e PlacementEngine<'a>, queue: &'e [Component], retry_budget: u32) -> Self {
        Self {
            engine,
            queue,
            retry_budget,
        }
    }

    /// Try to get `blocked` committed. Returns whether it was.
    ///
    /// On `Ok(false)` the state holds exactly the reservations it held on entry.
    pub fn repair(
        &self,
        blocked: &Component,
        state: &mut RunState,
        records: &mut Vec<RepairRecord>,
    ) -> Result<bool, SchedulerError> {
        let verbosity = self.engine.verbosity();

        let relaxed = self
            .engine
            .place(blocked, state, self.engine.relaxed_pass())
            .is_committed();
        records.push(RepairRecord::relaxed(blocked, relaxed));
        if relaxed {
            log_changes!(verbosity, "Placed {} with relaxed pass", blocked.reference);
            return Ok(true);
        }

        let mut tried: FxHashSet<usize> = FxHashSet::default();
        for attempt in 0..self.retry_budget {
            let Some(victim_rank) = self.select_victim(blocked, state, &tried) else {
                log_checks!(verbosity, "{}: no evictable slot left", blocked.reference);
                break;
            };
            tried.insert(victim_rank);
            let Some(victim) = self.queue.get(victim_rank) else {
                continue;
            };
            let Some(released) = state.uncommit(victim_rank) else {
                continue;
            };

            log_checks!(
                verbosity,
                "{}: attempt {} evicts {} from {} {}",
                blocked.reference,
                attempt + 1,
                victim.reference,
                released.day(),
                released.slot.start
            );

            if !self.engine.place_with_fallback(blocked, state).is_committed() {
                Self::rollback(state, released.clone(), victim)?;
                records.push(RepairRecord::eviction(blocked, &released, None));
                continue;
            }

            if self.engine.place_with_fallback(victim, state).is_committed() {
                let relocated = state.commitment(victim_rank).map(|c| c.slot.clone());
                state.evictions += 1;
                log_changes!(
                    verbosity,
                    "Evicted {} to place {}",
                    victim.reference,
                    blocked.reference
                );
                records.push(RepairRecord::eviction(blocked, &released, relocated));
                return Ok(true);
            }

            state.uncommit(blocked.rank);
            Self::rollback(state, released.clone(), victim)?;
            records.push(RepairRecord::eviction(blocked, &released, None));
        }

        Ok(false)
    }

    /// Re-reserve an evicted slot. Failure means the state is corrupt.
    fn rollback(
        state: &mut RunState,
        released: Commitment,
        victim: &Component,
    ) -> Result<(), SchedulerError> {
        state
            .restore(released)
            .map_err(|source| SchedulerError::RollbackFailed {
                component: victim.reference.clone(),
                source,
            })
    }

    /// Latest-queued committed slot that competes with `blocked` for a staff
    /// member or its batch inside a window `blocked` could use.
    fn select_victim(
        &self,
        blocked: &Component,
        state: &RunState,
        tried: &FxHashSet<usize>,
    ) -> Option<usize> {
        let generator = self.engine.generator();
        state
            .commitments
            .iter()
            .filter_map(|c| c.rank.map(|rank| (rank, c)))
            .filter(|(rank, _)| *rank != blocked.rank && !tried.contains(rank))
            .filter(|(_, c)| {
                c.slot.batch_id == blocked.batch_id() || blocked.staff.contains(&c.slot.staff_id)
            })
            .filter(|(_, c)| generator.usable_window_overlaps(blocked, c.day(), &c.interval))
            .map(|(rank, _)| rank)
            .max()
    }
}
