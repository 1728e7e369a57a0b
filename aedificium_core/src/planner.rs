//! Exploration planner: decides which door sequences to submit next.

use std::collections::BTreeMap;

use rand::Rng;

use crate::cfg::PlannerCfg;
use crate::matrix::{BeliefMatrix, FLOOR};
use crate::plan::{check_budget, Door, Plan, RoomId, DOORS, START_ROOM};
use crate::search::{search, SearchCfg, SearchDomain};
use crate::state::{DoorTally, ExplorationState};

/// Simulated exploration state used inside the tree search.
#[derive(Clone, Debug)]
pub struct SimState {
    belief: BeliefMatrix,
    entropy: f64,
    room: RoomId,
    depth: usize,
    /// Doors this line traversed that the step history has never seen.
    novel: usize,
    /// Outcomes already imagined for unseen doors on this line.
    imagined: BTreeMap<(RoomId, Door), RoomId>,
}

impl SimState {
    fn new(belief: BeliefMatrix, room: RoomId) -> Self {
        let entropy = belief.entropy();
        Self {
            belief,
            entropy,
            room,
            depth: 0,
            novel: 0,
            imagined: BTreeMap::new(),
        }
    }

    pub fn room(&self) -> RoomId {
        self.room
    }

    pub fn entropy(&self) -> f64 {
        self.entropy
    }
}

/// The labyrinth as a search domain.
///
/// Known doors (from the step history) are followed deterministically and
/// reinforce what is already believed with a weight that shrinks as the door
/// is seen more often. Unseen doors lead to a room sampled from the belief row
/// of the current room and carry a full unit of evidence.
pub struct LabyrinthDomain<'a> {
    tally: &'a DoorTally,
    novelty_bonus: f64,
    max_depth: usize,
}

impl<'a> LabyrinthDomain<'a> {
    pub fn new(tally: &'a DoorTally, novelty_bonus: f64, max_depth: usize) -> Self {
        Self {
            tally,
            novelty_bonus,
            max_depth,
        }
    }

    fn sample_room<R: Rng + ?Sized>(belief: &BeliefMatrix, room: RoomId, rng: &mut R) -> RoomId {
        let n = belief.size();
        let row = belief.row(room);
        let total: f64 = row.iter().filter(|&&v| v > FLOOR).sum();
        if total <= FLOOR {
            return rng.gen_range(0..n);
        }
        let mut pick = rng.gen::<f64>() * total;
        for (j, &v) in row.iter().enumerate() {
            if v <= FLOOR {
                continue;
            }
            if pick < v {
                return j;
            }
            pick -= v;
        }
        row.iter().rposition(|&v| v > FLOOR).unwrap_or(room)
    }
}

impl SearchDomain for LabyrinthDomain<'_> {
    type State = SimState;
    type Action = Door;

    fn enumerate_actions(&self, _state: &SimState) -> Vec<Door> {
        (0..DOORS as Door).collect()
    }

    fn apply_action<R: Rng + ?Sized>(&self, state: &SimState, door: Door, rng: &mut R) -> SimState {
        let mut next = state.clone();
        let key = (state.room, door);

        let (target, weight) = if let Some((to, _)) = self.tally.best_target(state.room, door) {
            let seen = self.tally.observations(state.room, door);
            (to, 1.0 / (1.0 + seen as f64))
        } else if let Some(&to) = state.imagined.get(&key) {
            (to, 0.5)
        } else {
            let to = Self::sample_room(&state.belief, state.room, rng);
            next.imagined.insert(key, to);
            next.novel += 1;
            (to, 1.0)
        };

        let size = state.belief.size();
        next.belief = state
            .belief
            .merge(&BeliefMatrix::observation(size, state.room, target, weight));
        next.entropy = next.belief.entropy();
        next.room = target;
        next.depth += 1;
        next
    }

    fn is_terminal(&self, state: &SimState) -> bool {
        state.depth >= self.max_depth
    }

    fn reward(&self, root: &SimState, leaf: &SimState) -> f64 {
        (root.entropy - leaf.entropy) + self.novelty_bonus * leaf.novel as f64
    }
}

/// Proposes the next batch of plans from the current exploration state.
#[derive(Clone, Debug, Default)]
pub struct Planner {
    cfg: PlannerCfg,
}

impl Planner {
    pub fn new(cfg: PlannerCfg) -> Self {
        Self { cfg }
    }

    pub fn cfg(&self) -> &PlannerCfg {
        &self.cfg
    }

    /// Plans for the next round.
    ///
    /// Every query walks from the start room, so the search is rooted there
    /// regardless of where the last walk ended. Returns an empty list once the
    /// belief has converged or no budget is left. With no evidence at all, the
    /// six single-door plans come first. Lines shorter than `plan_len` are
    /// padded (see [`pad_line`]). The total door count never exceeds
    /// `remaining_budget` and no plan exceeds `max_plan_len`.
    pub fn propose(&self, state: &ExplorationState, remaining_budget: usize) -> Vec<Plan> {
        if remaining_budget == 0 || self.cfg.max_plan_len == 0 {
            return Vec::new();
        }
        let belief = state.belief();
        if belief.is_empty() {
            return (0..DOORS as Door)
                .take(remaining_budget)
                .map(Plan::single)
                .collect();
        }
        if state.is_converged(self.cfg.entropy_threshold) {
            log::debug!(
                "belief converged at {:.4} bits, nothing to plan",
                belief.entropy()
            );
            return Vec::new();
        }

        let cap = self
            .cfg
            .plan_len
            .min(self.cfg.max_plan_len)
            .min(remaining_budget)
            .max(1);
        let tally = state.door_tally();
        let domain = LabyrinthDomain::new(&tally, self.cfg.novelty_bonus, cap);
        let root = SimState::new(belief.clone(), START_ROOM.min(belief.size() - 1));
        let search_cfg = SearchCfg {
            simulations: self.cfg.simulations,
            workers: self.cfg.workers,
            exploration_constant: self.cfg.exploration_constant,
            rollout_depth: self.cfg.rollout_depth,
            max_depth: cap,
            // Vary the stream per round while staying reproducible.
            seed: self.cfg.seed.wrapping_add(state.steps.len() as u64),
        };
        let outcome = search(&domain, &root, &search_cfg);

        let mut plans: Vec<Plan> = Vec::new();
        let mut used = 0usize;
        for ranked in outcome.ranked.iter().take(self.cfg.plans_per_round.max(1)) {
            let room_left = remaining_budget - used;
            if room_left == 0 {
                break;
            }
            let mut doors = ranked.line.clone();
            pad_line(&mut doors, &tally, cap);
            doors.truncate(cap.min(room_left));
            let Ok(plan) = Plan::new(doors) else { continue };
            if plan.is_empty() || plans.contains(&plan) {
                continue;
            }
            used += plan.len();
            plans.push(plan);
        }

        log::debug!(
            "planned {} plan(s), {} doors, from {} simulations over {} nodes",
            plans.len(),
            used,
            outcome.simulations,
            outcome.nodes
        );
        debug_assert!(check_budget(&plans, remaining_budget, self.cfg.max_plan_len).is_ok());
        plans
    }
}

/// Extend a search line to `len` doors.
///
/// The line is replayed from the start room through known doors. While the
/// room is known, the lowest door it has never traversed is appended (door 0
/// when all are known). Once the walk enters an unseen door the room is
/// unknown and the next door in cyclic order follows.
pub fn pad_line(doors: &mut Vec<Door>, tally: &DoorTally, len: usize) {
    let mut room = Some(START_ROOM);
    for &d in doors.iter() {
        room = room.and_then(|r| tally.best_target(r, d)).map(|(to, _)| to);
    }
    while doors.len() < len {
        let door = match room {
            Some(r) => (0..DOORS as Door).find(|&d| !tally.is_known(r, d)).unwrap_or(0),
            None => doors.last().map_or(0, |&d| (d + 1) % DOORS as Door),
        };
        room = room.and_then(|r| tally.best_target(r, door)).map(|(to, _)| to);
        doors.push(door);
    }
}
