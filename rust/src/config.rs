//! Configuration types for timetable generation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::interval::{Minute, MINUTES_PER_DAY};
use crate::scheduler::SchedulerError;

/// Tunables for one generation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    /// Eviction attempts per blocked component before giving up
    pub retry_budget: u32,
    /// Idle gaps strictly shorter than this (and longer than zero) are penalized
    pub max_gap_minutes: Minute,
    /// Candidate start-time step; `None` steps by the component duration
    pub step_minutes: Option<Minute>,
    /// Finer step used by the relaxed repair pass
    pub relaxed_step_minutes: Minute,
    /// Whether every slot must be given a room
    pub require_room: bool,
    /// Rooms with a known capacity below this are never assigned
    pub min_room_capacity: Option<u32>,
    /// Wall-clock budget for the whole run, checked between components
    pub time_budget_ms: Option<u64>,
    /// Cap on placement passes (normal, relaxed and repair) per run
    pub max_placement_attempts: Option<u64>,
    /// Logging verbosity (0 = silent, 3 = debug)
    pub verbosity: u8,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            retry_budget: 3,
            max_gap_minutes: 60,
            step_minutes: None,
            relaxed_step_minutes: 15,
            require_room: false,
            min_room_capacity: None,
            time_budget_ms: None,
            max_placement_attempts: None,
            verbosity: 0,
        }
    }
}

impl GenerationOptions {
    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    pub fn with_max_gap_minutes(mut self, minutes: Minute) -> Self {
        self.max_gap_minutes = minutes;
        self
    }

    pub fn with_step_minutes(mut self, minutes: Minute) -> Self {
        self.step_minutes = Some(minutes);
        self
    }

    pub fn with_require_room(mut self, require_room: bool) -> Self {
        self.require_room = require_room;
        self
    }

    pub fn with_min_room_capacity(mut self, capacity: u32) -> Self {
        self.min_room_capacity = Some(capacity);
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget_ms = Some(budget.as_millis() as u64);
        self
    }

    pub fn with_max_placement_attempts(mut self, attempts: u64) -> Self {
        self.max_placement_attempts = Some(attempts);
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }

    /// Reject settings that would stall candidate enumeration.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.step_minutes == Some(0) {
            return Err(SchedulerError::InvalidConfig(
                "step_minutes must be positive".to_string(),
            ));
        }
        if self.relaxed_step_minutes == 0 {
            return Err(SchedulerError::InvalidConfig(
                "relaxed_step_minutes must be positive".to_string(),
            ));
        }
        if self.max_gap_minutes > MINUTES_PER_DAY {
            return Err(SchedulerError::InvalidConfig(format!(
                "max_gap_minutes must not exceed {}",
                MINUTES_PER_DAY
            )));
        }
        Ok(())
    }
}
