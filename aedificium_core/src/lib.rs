pub mod error;
pub mod plan;

pub mod matrix;
pub mod state;
pub mod cfg;

pub mod search;
pub mod planner;

pub use error::{ExplorerError, Result};
pub use plan::{check_budget, total_doors, Door, Label, Plan, RoomId, DOORS, LABEL_COUNT, START_ROOM};

pub use matrix::{BeliefMatrix, ENTROPY_EPS, FLOOR};
pub use state::{DoorTally, ExplorationState, LoggedOutcome, Outcome, OutcomeLog, Step};
pub use cfg::PlannerCfg;

pub use search::{search, RankedLine, SearchCfg, SearchDomain, SearchOutcome};
pub use planner::{pad_line, LabyrinthDomain, Planner, SimState};
