//! Component queue ordering for the generator.
//!
//! Subjects are taken heaviest first (credits descending, then code), and
//! within a subject lecture, tutorial and lab are attempted in that order.
//! Position in the resulting queue is a component's priority: rank 0 is the
//! most important, and repair evicts the highest rank first.

use rustc_hash::FxHashSet;
use std::cmp::Ordering;

use crate::interval::Minute;
use crate::models::{ComponentKind, ComponentRef, Snapshot, Subject};

/// A component waiting to be placed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Component {
    /// Position in the queue (0 = highest priority).
    pub rank: usize,
    pub reference: ComponentRef,
    pub duration: Minute,
    /// Eligible staff ids, ascending.
    pub staff: Vec<String>,
}

impl Component {
    pub fn batch_id(&self) -> &str {
        &self.reference.batch_id
    }

    pub fn subject_id(&self) -> &str {
        &self.reference.subject_id
    }

    pub fn kind(&self) -> ComponentKind {
        self.reference.component
    }
}

/// Sort key for queue ordering (lower = placed earlier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey<'a> {
    pub credits: i32,
    pub code: &'a str,
    pub kind: ComponentKind,
    pub subject_id: &'a str,
}

impl<'a> SortKey<'a> {
    pub fn new(subject: &'a Subject, kind: ComponentKind) -> Self {
        Self {
            credits: subject.credits,
            code: &subject.code,
            kind,
            subject_id: &subject.id,
        }
    }
}

impl Ord for SortKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .credits
            .cmp(&self.credits)
            .then_with(|| self.code.cmp(other.code))
            .then_with(|| self.subject_id.cmp(other.subject_id))
            .then_with(|| self.kind.cmp(&other.kind))
    }
}

impl PartialOrd for SortKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Build the placement queue for every subject in the snapshot.
///
/// Components in `covered` (already placed by an earlier run) are left out.
/// Assumes the snapshot passed input validation, so durations are in range.
pub fn build_queue(snapshot: &Snapshot, covered: &FxHashSet<ComponentRef>) -> Vec<Component> {
    let mut keyed: Vec<(SortKey<'_>, Component)> = Vec::new();

    for subject in &snapshot.subjects {
        let staff = snapshot.eligible_staff(&subject.id, &subject.batch_id);
        for requirement in &subject.components {
            let reference = ComponentRef {
                batch_id: subject.batch_id.clone(),
                subject_id: subject.id.clone(),
                component: requirement.kind,
            };
            if covered.contains(&reference) {
                continue;
            }
            keyed.push((
                SortKey::new(subject, requirement.kind),
                Component {
                    rank: 0,
                    reference,
                    duration: requirement.duration_minutes.clamp(0, Minute::MAX as i32) as Minute,
                    staff: staff.clone(),
                },
            ));
        }
    }

    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed
        .into_iter()
        .enumerate()
        .map(|(rank, (_, mut component))| {
            component.rank = rank;
            component
        })
        .collect()
}
