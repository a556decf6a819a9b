//! One placement pass: enumerate, score, rank, commit the first that fits.

use crate::config::GenerationOptions;
use crate::interval::Minute;
use crate::models::ConflictKind;
use crate::sorting::Component;
use crate::{log_changes, log_checks, log_debug};

use super::candidates::{Candidate, CandidateGenerator};
use super::scoring::{rank_candidates, ScoreMode, ScoringContext};
use super::state::{ComponentState, RunState};

/// Step size and scoring mode for one pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pass {
    pub step: Minute,
    pub mode: ScoreMode,
}

/// Outcome of a placement pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Placement {
    Committed(Candidate),
    CandidatesExhausted,
}

impl Placement {
    pub fn is_committed(&self) -> bool {
        matches!(self, Placement::Committed(_))
    }
}

pub struct PlacementEngine<'a> {
    generator: &'a CandidateGenerator<'a>,
    step: Option<Minute>,
    relaxed_step: Minute,
    max_gap: Minute,
    verbosity: u8,
}

impl<'a> PlacementEngine<'a> {
    pub fn new(generator: &'a CandidateGenerator<'a>, options: &GenerationOptions) -> Self {
        Self {
            generator,
            step: options.step_minutes,
            relaxed_step: options.relaxed_step_minutes,
            max_gap: options.max_gap_minutes,
            verbosity: options.verbosity,
        }
    }

    pub fn generator(&self) -> &'a CandidateGenerator<'a> {
        self.generator
    }

    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    /// Configured step, or the component's own duration.
    pub fn normal_pass(&self, component: &Component) -> Pass {
        Pass {
            step: self.step.unwrap_or(component.duration),
            mode: ScoreMode::Normal,
        }
    }

    pub fn relaxed_pass(&self) -> Pass {
        Pass {
            step: self.relaxed_step,
            mode: ScoreMode::Relaxed,
        }
    }

    /// Normal pass, then relaxed if that found nothing.
    pub fn place_with_fallback(&self, component: &Component, state: &mut RunState) -> Placement {
        match self.place(component, state, self.normal_pass(component)) {
            Placement::CandidatesExhausted => self.place(component, state, self.relaxed_pass()),
            committed => committed,
        }
    }

    /// Try to commit `component` using `pass`. The component's state ends up
    /// `Committed` or `CandidatesExhausted`.
    pub fn place(&self, component: &Component, state: &mut RunState, pass: Pass) -> Placement {
        state.attempts += 1;

        let candidates: Vec<Candidate> = self
            .generator
            .candidates(component, pass.step, &state.occupancy)
            .collect();
        let ranked = {
            let ctx = ScoringContext {
                commitments: &state.commitments,
                occupancy: &state.occupancy,
                index: self.generator.index(),
                max_gap: self.max_gap,
            };
            rank_candidates(component, candidates, &ctx, pass.mode)
        };

        log_checks!(
            self.verbosity,
            "{}: {} candidates (step {}, {:?})",
            component.reference,
            ranked.len(),
            pass.step,
            pass.mode
        );

        for scored in ranked {
            log_debug!(
                self.verbosity,
                "  {} {}-{} {} score {}",
                scored.candidate.day,
                scored.candidate.interval.start_time(),
                scored.candidate.interval.end_time(),
                scored.candidate.staff_id,
                scored.score
            );
            match state.commit(component, &scored.candidate) {
                Ok(()) => {
                    log_changes!(
                        self.verbosity,
                        "Committed {} on {} {}-{} with {}",
                        component.reference,
                        scored.candidate.day,
                        scored.candidate.interval.start_time(),
                        scored.candidate.interval.end_time(),
                        scored.candidate.staff_id
                    );
                    return Placement::Committed(scored.candidate);
                }
                Err(overlap) => {
                    log_checks!(self.verbosity, "  rejected: {}", overlap);
                }
            }
        }

        state.set_state(component.rank, ComponentState::CandidatesExhausted);
        Placement::CandidatesExhausted
    }

    /// Classify why `component` cannot be placed, at the finest step in use.
    pub fn diagnose(&self, component: &Component, state: &RunState) -> ConflictKind {
        let step = self.normal_pass(component).step.min(self.relaxed_step);
        self.generator.diagnose(component, step, &state.occupancy)
    }
}
