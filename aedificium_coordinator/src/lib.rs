//! aedificium_coordinator
//!
//! Outside-world facing orchestration layer for `aedificium_core`.
//!
//! Responsibilities:
//! - own the per-session `ExplorationState` and belief
//! - talk to the remote oracle through the `QueryService` trait
//! - resolve returned labels into rooms and evidence
//! - decide when to stop and submit a map
//!
//! Non-goals:
//! - no transport (products implement `QueryService`)
//! - no async
//! - no planning policy (lives in core)

pub mod cfg;
pub mod coordinator;
pub mod finalize;
pub mod query;
pub mod sink;
pub mod tracker;

pub use cfg::CoordinatorCfg;

pub use coordinator::{
    Coordinator,
    Phase,
    SessionReport,
};

pub use finalize::build_map;

pub use query::{
    Connection,
    ExploreResponse,
    MapDescription,
    QueryService,
    RoomDoor,
    TransportError,
};

pub use sink::{JsonLinesSink, RoundRecord, RoundSink};

pub use tracker::{decode_labels, Integrated, RoomTracker};
