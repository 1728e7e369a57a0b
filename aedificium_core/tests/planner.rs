use aedificium_core::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

fn quick_cfg() -> PlannerCfg {
    PlannerCfg {
        simulations: 40,
        workers: 2,
        ..PlannerCfg::default()
    }
}

/// Two rooms with a few doors already resolved.
fn explored_state() -> ExplorationState {
    let mut state = ExplorationState::new();
    let steps = [
        Step { from: 0, door: 0, to: 1 },
        Step { from: 0, door: 1, to: 1 },
        Step { from: 0, door: 3, to: 0 },
    ];
    let evidence = BeliefMatrix::observations(2, steps.iter().map(|s| (s.from, s.to, 1.0)));
    state.widen(2);
    state.merge_evidence(&evidence);
    for s in steps {
        state.record_step(s);
    }
    state
}

#[test]
fn empty_belief_gets_one_plan_per_door() {
    let planner = Planner::new(quick_cfg());
    let state = ExplorationState::new();
    let plans = planner.propose(&state, 6);
    assert_eq!(plans.len(), 6);
    for (door, plan) in plans.iter().enumerate() {
        assert_eq!(plan.doors(), &[door as u8]);
    }
}

#[test]
fn baseline_respects_a_small_budget() {
    let planner = Planner::new(quick_cfg());
    let plans = planner.propose(&ExplorationState::new(), 4);
    assert_eq!(plans.len(), 4);
    assert_eq!(total_doors(&plans), 4);
}

#[test]
fn no_budget_no_plans() {
    let planner = Planner::new(quick_cfg());
    assert!(planner.propose(&ExplorationState::new(), 0).is_empty());
    assert!(planner.propose(&explored_state(), 0).is_empty());
}

#[test]
fn converged_belief_stops_exploration() {
    let planner = Planner::new(quick_cfg());
    let mut state = ExplorationState::new();
    let pairing = BeliefMatrix::from_rows(vec![vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
    state.merge_evidence(&pairing);
    assert!(state.is_converged(planner.cfg().entropy_threshold));
    assert!(planner.propose(&state, 50).is_empty());
}

#[test]
fn refinement_round_produces_bounded_plans() {
    let cfg = PlannerCfg {
        plan_len: 4,
        plans_per_round: 3,
        entropy_threshold: 0.0,
        ..quick_cfg()
    };
    let planner = Planner::new(cfg);
    let plans = planner.propose(&explored_state(), 100);
    assert!(!plans.is_empty());
    assert!(plans.len() <= 3);
    for p in &plans {
        assert!(!p.is_empty());
        assert!(p.len() <= 4);
        assert!(p.doors().iter().all(|&d| (d as usize) < DOORS));
    }
    // Distinct plans only.
    for (i, a) in plans.iter().enumerate() {
        assert!(plans.iter().skip(i + 1).all(|b| a != b));
    }
}

#[test]
fn same_state_same_plans() {
    let cfg = PlannerCfg {
        entropy_threshold: 0.0,
        ..quick_cfg()
    };
    let planner = Planner::new(cfg);
    let state = explored_state();
    assert_eq!(planner.propose(&state, 30), planner.propose(&state, 30));
}

#[test]
fn fresh_sessions_do_not_share_history() {
    let mut a = ExplorationState::new();
    a.record_step(Step { from: 0, door: 2, to: 0 });
    let b = ExplorationState::new();
    assert!(b.steps.is_empty());
    assert!(b.outcomes.is_empty());
    assert!(b.belief().is_empty());
}

#[test]
fn never_exceeds_the_remaining_budget() {
    let mut rng = ChaCha20Rng::seed_from_u64(2024);
    for round in 0..40 {
        let rooms = rng.gen_range(1..5);
        let mut state = ExplorationState::new();
        let mut edges = Vec::new();
        for _ in 0..rng.gen_range(1..12) {
            let step = Step {
                from: rng.gen_range(0..rooms),
                door: rng.gen_range(0..DOORS as u8),
                to: rng.gen_range(0..rooms),
            };
            edges.push((step.from, step.to, 1.0));
            state.record_step(step);
        }
        if rng.gen_bool(0.8) {
            state.merge_evidence(&BeliefMatrix::observations(rooms, edges));
        }
        state.current_room = rng.gen_range(0..rooms);

        let max_plan_len = rng.gen_range(1..20);
        let cfg = PlannerCfg {
            simulations: rng.gen_range(1..30),
            workers: rng.gen_range(1..3),
            plan_len: rng.gen_range(1..25),
            max_plan_len,
            plans_per_round: rng.gen_range(1..5),
            entropy_threshold: 0.0,
            seed: round,
            ..PlannerCfg::default()
        };
        let planner = Planner::new(cfg);
        let budget = rng.gen_range(0..40);
        let plans = planner.propose(&state, budget);
        assert!(
            check_budget(&plans, budget, max_plan_len).is_ok(),
            "round {round}: {} doors for budget {budget}",
            total_doors(&plans)
        );
    }
}

#[test]
fn plan_wire_format_round_trips_through_digits() {
    let plan = Plan::new(vec![0, 1, 5, 3]).unwrap();
    assert_eq!(plan.to_wire(), "0153");
    assert_eq!("0153".parse::<Plan>().unwrap(), plan);
    assert_eq!(Plan::parse(""), Ok(Plan::default()));
    assert_eq!(
        Plan::parse("016"),
        Err(ExplorerError::InvalidDoor("6".to_string()))
    );
    assert!(Plan::parse("0a").is_err());
    assert!(Plan::new(vec![7]).is_err());
    assert_eq!(Plan::single(8).doors(), &[2]);
}

#[test]
fn budget_check_flags_overruns() {
    let plans = vec![Plan::parse("012").unwrap(), Plan::parse("34").unwrap()];
    assert_eq!(total_doors(&plans), 5);
    assert!(check_budget(&plans, 5, 3).is_ok());
    assert_eq!(
        check_budget(&plans, 4, 3),
        Err(ExplorerError::BudgetExceeded {
            requested: 5,
            remaining: 4
        })
    );
    assert_eq!(
        check_budget(&plans, 10, 2),
        Err(ExplorerError::PlanTooLong { len: 3, cap: 2 })
    );
}

#[test]
fn door_tally_picks_the_most_seen_target() {
    let steps = [
        Step { from: 0, door: 1, to: 2 },
        Step { from: 0, door: 1, to: 1 },
        Step { from: 0, door: 1, to: 2 },
        Step { from: 1, door: 0, to: 0 },
    ];
    let tally = DoorTally::from_steps(&steps);
    assert_eq!(tally.best_target(0, 1), Some((2, 2)));
    assert_eq!(tally.observations(0, 1), 3);
    assert!(tally.is_known(1, 0));
    assert!(!tally.is_known(1, 1));
    assert_eq!(tally.known_doors().len(), 2);
}

#[test]
fn exploration_state_serializes_for_snapshots() {
    let state = explored_state();
    let json = serde_json::to_string(&state).unwrap();
    let back: ExplorationState = serde_json::from_str(&json).unwrap();
    assert_eq!(back.steps, state.steps);
    assert_eq!(back.belief().size(), 2);
}

#[test]
fn search_is_rooted_at_the_start_room() {
    let mut steps: Vec<Step> = [0u8, 1, 2, 4, 5]
        .iter()
        .map(|&door| Step { from: 0, door, to: 1 })
        .collect();
    steps.extend((0..DOORS as u8).map(|door| Step { from: 1, door, to: 0 }));
    let mut state = ExplorationState::new();
    state.merge_evidence(&BeliefMatrix::observations(
        2,
        steps.iter().map(|s| (s.from, s.to, 1.0)),
    ));
    for s in steps {
        state.record_step(s);
    }
    // The last walk ended in room 1, where every door is already known.
    state.current_room = 1;

    let cfg = PlannerCfg {
        simulations: 60,
        workers: 1,
        plan_len: 1,
        plans_per_round: 1,
        novelty_bonus: 10.0,
        entropy_threshold: 0.0,
        ..PlannerCfg::default()
    };
    let plans = Planner::new(cfg).propose(&state, 10);
    // Door 3 is the only door of room 0 never walked.
    assert_eq!(plans, vec![Plan::single(3)]);
}

#[test]
fn short_search_lines_are_padded_to_plan_len() {
    let cfg = PlannerCfg {
        simulations: 6,
        workers: 1,
        plan_len: 4,
        plans_per_round: 2,
        entropy_threshold: 0.0,
        ..PlannerCfg::default()
    };
    let plans = Planner::new(cfg).propose(&explored_state(), 100);
    assert_eq!(plans.len(), 2);
    assert!(plans.iter().all(|p| p.len() == 4));
    assert_ne!(plans[0], plans[1]);
}

#[test]
fn padding_prefers_unwalked_doors_of_the_known_room() {
    let tally = explored_state().door_tally();

    let mut line = vec![3];
    pad_line(&mut line, &tally, 4);
    // Door 3 loops back to room 0; door 2 is its lowest unwalked door, after
    // which the room is unknown and doors follow in cyclic order.
    assert_eq!(line, vec![3, 2, 3, 4]);

    let mut line = vec![0];
    pad_line(&mut line, &tally, 3);
    assert_eq!(line, vec![0, 0, 1]);

    let mut long = vec![1, 2, 3];
    pad_line(&mut long, &tally, 2);
    assert_eq!(long, vec![1, 2, 3]);
}
