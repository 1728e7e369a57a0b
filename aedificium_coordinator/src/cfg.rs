use serde::{Deserialize, Serialize};

use aedificium_core::PlannerCfg;

/// Session-level knobs. Ceilings and retry policy are supplied by the caller;
/// the coordinator only enforces them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorCfg {
    /// Problem selected on the remote service before exploring.
    pub problem: String,
    /// Total doors the session may traverse across all plans.
    pub door_budget: usize,
    /// Stop once the service reports this many queries.
    pub max_query_count: Option<u64>,
    pub max_rounds: usize,
    pub max_wall_clock_ms: Option<u64>,
    /// Extra attempts after a failed transport call.
    pub max_retries: u32,
    /// Linear backoff step between attempts.
    pub retry_backoff_ms: u64,
    pub submit_guess: bool,
    pub planner: PlannerCfg,
}

impl Default for CoordinatorCfg {
    fn default() -> Self {
        Self {
            problem: "probatio".to_string(),
            door_budget: 108,
            max_query_count: None,
            max_rounds: 64,
            max_wall_clock_ms: None,
            max_retries: 3,
            retry_backoff_ms: 250,
            submit_guess: true,
            planner: PlannerCfg::default(),
        }
    }
}
