use serde::{Deserialize, Serialize};

/// Planner tunables.
///
/// Reward shaping (`novelty_bonus`) and the search budget are knobs, not a
/// contract; the defaults are what the coordinator ships with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerCfg {
    /// Tree-search simulations per worker and round.
    pub simulations: u32,
    /// Independent root-parallel trees.
    pub workers: usize,
    /// UCB exploration constant.
    pub exploration_constant: f64,
    /// Random doors appended after expansion before scoring.
    pub rollout_depth: usize,
    /// Doors per proposed plan, before the budget cut.
    pub plan_len: usize,
    /// Per-query cap imposed by the oracle.
    pub max_plan_len: usize,
    pub plans_per_round: usize,
    /// Reward per door the step history has never traversed.
    pub novelty_bonus: f64,
    /// Entropy (bits) under which a valid belief counts as converged.
    pub entropy_threshold: f64,
    pub seed: u64,
}

impl Default for PlannerCfg {
    fn default() -> Self {
        Self {
            simulations: 400,
            workers: 4,
            exploration_constant: std::f64::consts::SQRT_2,
            rollout_depth: 2,
            plan_len: 6,
            max_plan_len: 18,
            plans_per_round: 2,
            novelty_bonus: 0.5,
            entropy_threshold: 1.0,
            seed: 0x5eed,
        }
    }
}
