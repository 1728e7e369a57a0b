//! Turns returned label sequences into room identities and evidence.
//!
//! Rooms are only told apart by their labels, so identity is inferred: the
//! walk follows doors already resolved when their labels agree, otherwise it
//! reuses a known room with the right label whose recorded door labels do not
//! contradict the next observation. Only a contradiction discovers a new room,
//! and the belief matrix is widened before the evidence is merged.

use aedificium_core::{
    BeliefMatrix, Door, DoorTally, ExplorationState, ExplorerError, Label, LoggedOutcome, Outcome,
    Plan, Result, RoomId, Step, DOORS, LABEL_COUNT, START_ROOM,
};

/// Summary of one integrated plan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Integrated {
    /// Doors walked (can be shorter than the plan when the budget ran out).
    pub steps: usize,
    pub final_room: RoomId,
    pub new_rooms: usize,
    /// Doors whose label disagreed with an earlier visit of the same room.
    pub contradictions: usize,
}

#[derive(Clone, Debug, Default)]
pub struct RoomTracker {
    labels: Vec<Label>,
    /// Label last seen behind each door, per room.
    door_labels: Vec<[Option<Label>; DOORS]>,
}

/// Check a raw result against its plan: one label per room visited, start
/// included, each a valid label.
pub fn decode_labels(plan: &Plan, raw: &[i64]) -> Result<Vec<Label>> {
    let expected = plan.len() + 1;
    if raw.len() != expected {
        return Err(ExplorerError::MalformedResult {
            plan: plan.to_wire(),
            expected,
            got: raw.len(),
        });
    }
    raw.iter()
        .map(|&l| {
            if (0..i64::from(LABEL_COUNT)).contains(&l) {
                Ok(l as Label)
            } else {
                Err(ExplorerError::UnknownLabel {
                    plan: plan.to_wire(),
                    label: l,
                })
            }
        })
        .collect()
}

impl RoomTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn room_count(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn door_label(&self, room: RoomId, door: Door) -> Option<Label> {
        self.door_labels
            .get(room)
            .and_then(|doors| doors.get(door as usize).copied().flatten())
    }

    fn add_room(&mut self, label: Label) -> RoomId {
        self.labels.push(label);
        self.door_labels.push([None; DOORS]);
        self.labels.len() - 1
    }

    fn compatible(&self, room: RoomId, ahead: Option<(Door, Label)>) -> bool {
        match ahead {
            Some((door, label)) => self.door_label(room, door).map_or(true, |l| l == label),
            None => true,
        }
    }

    fn resolve(
        &self,
        belief: &BeliefMatrix,
        tally: &DoorTally,
        from: RoomId,
        door: Door,
        seen: Label,
        ahead: Option<(Door, Label)>,
    ) -> Option<RoomId> {
        if let Some((to, _)) = tally.best_target(from, door) {
            if self.labels[to] == seen && self.compatible(to, ahead) {
                return Some(to);
            }
        }
        let mut best: Option<(RoomId, f64)> = None;
        for (room, &label) in self.labels.iter().enumerate() {
            if label != seen || !self.compatible(room, ahead) {
                continue;
            }
            let score = belief.get(from, room);
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((room, score));
            }
        }
        best.map(|(room, _)| room)
    }

    /// Integrate one plan's result into `state`.
    ///
    /// At most `limit` doors are walked. A malformed result fails before
    /// anything is touched, so a rejected outcome never raises confidence.
    pub fn integrate(
        &mut self,
        state: &mut ExplorationState,
        round: usize,
        plan: &Plan,
        raw: &[i64],
        limit: usize,
    ) -> Result<Integrated> {
        let labels = decode_labels(plan, raw)?;
        if let Some(&start) = self.labels.first() {
            if labels[0] != start {
                return Err(ExplorerError::StartMismatch {
                    plan: plan.to_wire(),
                    expected: start,
                    got: labels[0],
                });
            }
        } else {
            self.add_room(labels[0]);
        }

        let doors = plan.doors();
        let walk = doors.len().min(limit);
        let mut tally = state.door_tally();
        let mut summary = Integrated::default();
        let mut edges = Vec::with_capacity(walk);
        let mut room = START_ROOM;

        for t in 0..walk {
            let door = doors[t];
            let seen = labels[t + 1];
            let ahead = doors.get(t + 1).map(|&d| (d, labels[t + 2]));

            let known = self.door_labels[room][door as usize];
            match known {
                None => self.door_labels[room][door as usize] = Some(seen),
                Some(prev) if prev != seen => summary.contradictions += 1,
                Some(_) => {}
            }

            let target = match self.resolve(state.belief(), &tally, room, door, seen, ahead) {
                Some(to) => to,
                None => {
                    summary.new_rooms += 1;
                    self.add_room(seen)
                }
            };

            let step = Step {
                from: room,
                door,
                to: target,
            };
            tally.record(step);
            state.record_step(step);
            edges.push((room, target, 1.0));
            room = target;
        }

        let rooms = self.room_count();
        state.widen(rooms);
        state.merge_evidence(&BeliefMatrix::observations(rooms, edges));
        state.current_room = room;
        state.outcomes.push(LoggedOutcome {
            round,
            plan: plan.clone(),
            labels,
            outcome: Outcome {
                current_room: room,
                entropy: state.belief().entropy(),
                matrix: state.belief().clone(),
            },
        });

        summary.steps = walk;
        summary.final_room = room;
        if summary.contradictions > 0 {
            log::debug!(
                "plan {plan}: {} door label contradiction(s)",
                summary.contradictions
            );
        }
        Ok(summary)
    }
}
