//! Belief plus door observations to a discrete map.

use aedificium_core::{Door, ExplorationState, RoomId, DOORS, START_ROOM};

use crate::query::{Connection, MapDescription, RoomDoor};
use crate::tracker::RoomTracker;

#[derive(Clone, Copy, Debug)]
struct DoorGuess {
    at: RoomDoor,
    target: RoomId,
    /// Observed doors rank above belief guesses: `1 + share` of the winning
    /// target versus a belief probability in [0, 1].
    confidence: f64,
}

#[inline]
fn slot(room: RoomId, door: usize) -> usize {
    room * DOORS + door
}

/// Build the final map.
///
/// Every door gets its most likely target room: the most observed one, or
/// the belief's argmax for doors never walked. Endpoints are then paired
/// greedily by confidence, preferring a reciprocal door of the target room.
/// Every door appears in exactly one connection; a door left without a
/// partner becomes a self-loop.
pub fn build_map(tracker: &RoomTracker, state: &ExplorationState) -> MapDescription {
    let rooms = tracker.labels().to_vec();
    let n = rooms.len();
    if n == 0 {
        return MapDescription::default();
    }
    let belief = state.belief();
    let tally = state.door_tally();

    let mut guesses = Vec::with_capacity(n * DOORS);
    for room in 0..n {
        for door in 0..DOORS as Door {
            let (target, confidence) = match tally.best_target(room, door) {
                Some((to, seen)) => {
                    let total = tally.observations(room, door).max(1);
                    (to, 1.0 + seen as f64 / total as f64)
                }
                None => {
                    let to = belief
                        .argmax_in_row(room)
                        .filter(|&to| to < n)
                        .unwrap_or(room);
                    (to, belief.get(room, to))
                }
            };
            guesses.push(DoorGuess {
                at: RoomDoor { room, door },
                target,
                confidence,
            });
        }
    }

    let mut order: Vec<usize> = (0..guesses.len()).collect();
    order.sort_by(|&a, &b| {
        guesses[b]
            .confidence
            .total_cmp(&guesses[a].confidence)
            .then(a.cmp(&b))
    });

    let mut paired = vec![false; guesses.len()];
    let mut connections = Vec::with_capacity(guesses.len() / 2 + 1);
    for i in order {
        if paired[i] {
            continue;
        }
        paired[i] = true;
        let here = guesses[i];
        let partner = reciprocal(&guesses, &paired, here.at.room, here.target)
            .or_else(|| first_free(&paired, here.target))
            .or_else(|| first_free(&paired, here.at.room));
        let to = match partner {
            Some(j) => {
                paired[j] = true;
                guesses[j].at
            }
            None => here.at,
        };
        connections.push(Connection { from: here.at, to });
    }

    log::debug!(
        "finalized {} rooms into {} connections",
        n,
        connections.len()
    );
    MapDescription {
        rooms,
        starting_room: START_ROOM,
        connections,
    }
}

/// Free door of `target` whose own guess points back at `from`; best
/// confidence first, then lowest door.
fn reciprocal(guesses: &[DoorGuess], paired: &[bool], from: RoomId, target: RoomId) -> Option<usize> {
    (0..DOORS)
        .map(|d| slot(target, d))
        .filter(|&j| !paired[j] && guesses[j].target == from)
        .max_by(|&a, &b| {
            guesses[a]
                .confidence
                .total_cmp(&guesses[b].confidence)
                .then(b.cmp(&a))
        })
}

fn first_free(paired: &[bool], room: RoomId) -> Option<usize> {
    (0..DOORS).map(|d| slot(room, d)).find(|&j| !paired[j])
}
