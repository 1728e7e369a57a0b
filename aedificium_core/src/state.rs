use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::matrix::BeliefMatrix;
use crate::plan::{Door, Label, Plan, RoomId, START_ROOM};

/// One resolved door traversal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub from: RoomId,
    pub door: Door,
    pub to: RoomId,
}

/// Room reached after integrating a plan, with the belief at that point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub current_room: RoomId,
    pub entropy: f64,
    pub matrix: BeliefMatrix,
}

/// A submitted plan, the labels it returned and the outcome of integrating it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoggedOutcome {
    pub round: usize,
    pub plan: Plan,
    pub labels: Vec<Label>,
    pub outcome: Outcome,
}

/// Append-only outcome log.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeLog {
    entries: Vec<LoggedOutcome>,
}

impl OutcomeLog {
    #[inline]
    pub fn push(&mut self, entry: LoggedOutcome) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LoggedOutcome] {
        &self.entries
    }

    pub fn last(&self) -> Option<&LoggedOutcome> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-session exploration state.
///
/// Every field is allocated fresh by [`ExplorationState::new`]; two sessions
/// never share a step history or an outcome log. The belief matrix is private
/// and only grows through [`ExplorationState::widen`] and
/// [`ExplorationState::merge_evidence`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExplorationState {
    pub current_room: RoomId,
    pub steps: Vec<Step>,
    pub outcomes: OutcomeLog,
    belief: BeliefMatrix,
}

impl Default for ExplorationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ExplorationState {
    pub fn new() -> Self {
        Self {
            current_room: START_ROOM,
            steps: Vec::new(),
            outcomes: OutcomeLog::default(),
            belief: BeliefMatrix::empty(),
        }
    }

    #[inline]
    pub fn belief(&self) -> &BeliefMatrix {
        &self.belief
    }

    /// Grow the belief to cover `rooms` known rooms. The empty sentinel stays
    /// the sentinel until real evidence is merged in.
    pub fn widen(&mut self, rooms: usize) {
        if rooms > self.belief.size() && !self.belief.is_empty() {
            self.belief = self.belief.widen(rooms);
        }
    }

    #[inline]
    pub fn merge_evidence(&mut self, evidence: &BeliefMatrix) {
        self.belief = self.belief.merge(evidence);
    }

    #[inline]
    pub fn record_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn door_tally(&self) -> DoorTally {
        DoorTally::from_steps(&self.steps)
    }

    /// Valid belief with entropy under `threshold`.
    pub fn is_converged(&self, threshold: f64) -> bool {
        self.belief.is_valid() && self.belief.entropy() < threshold
    }
}

/// How often each `(room, door)` was seen leading to each room.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DoorTally {
    counts: BTreeMap<(RoomId, Door), BTreeMap<RoomId, usize>>,
}

impl DoorTally {
    pub fn from_steps(steps: &[Step]) -> Self {
        let mut tally = Self::default();
        for s in steps {
            tally.record(*s);
        }
        tally
    }

    pub fn record(&mut self, step: Step) {
        *self
            .counts
            .entry((step.from, step.door))
            .or_default()
            .entry(step.to)
            .or_insert(0) += 1;
    }

    #[inline]
    pub fn is_known(&self, room: RoomId, door: Door) -> bool {
        self.counts.contains_key(&(room, door))
    }

    /// Most observed target behind a door; ties go to the lowest room id.
    pub fn best_target(&self, room: RoomId, door: Door) -> Option<(RoomId, usize)> {
        let targets = self.counts.get(&(room, door))?;
        let mut best: Option<(RoomId, usize)> = None;
        for (&to, &n) in targets {
            if best.map_or(true, |(_, b)| n > b) {
                best = Some((to, n));
            }
        }
        best
    }

    /// Total traversals recorded through a door.
    pub fn observations(&self, room: RoomId, door: Door) -> usize {
        self.counts
            .get(&(room, door))
            .map_or(0, |t| t.values().sum())
    }

    /// Known doors and their best targets, ordered by `(room, door)`.
    pub fn known_doors(&self) -> Vec<Step> {
        self.counts
            .keys()
            .filter_map(|&(from, door)| {
                self.best_target(from, door)
                    .map(|(to, _)| Step { from, door, to })
            })
            .collect()
    }
}
