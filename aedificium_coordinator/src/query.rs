//! Boundary to the remote query service.
//!
//! The coordinator never does IO itself. Products implement [`QueryService`]
//! over whatever transport they use; the models below mirror the service's
//! JSON field names so an HTTP client can serialize them directly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use aedificium_core::{Door, Label, RoomId};

/// A failed or timed-out call to the remote service. Always retryable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transport error: {message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Per-plan label sequences plus the service's cumulative query count.
///
/// Labels stay wide integers here; range checks happen during integration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExploreResponse {
    pub results: Vec<Vec<i64>>,
    #[serde(rename = "queryCount")]
    pub query_count: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoomDoor {
    pub room: RoomId,
    pub door: Door,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: RoomDoor,
    pub to: RoomDoor,
}

/// The final structural guess.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDescription {
    pub rooms: Vec<Label>,
    #[serde(rename = "startingRoom")]
    pub starting_room: RoomId,
    pub connections: Vec<Connection>,
}

/// The remote oracle. Calls block until the service answers or fails.
pub trait QueryService {
    /// Select the problem to explore; returns the confirmed problem name.
    fn select_problem(&mut self, name: &str) -> Result<String, TransportError>;

    /// Run plans (digit strings) from the start room.
    fn explore(&mut self, plans: &[String]) -> Result<ExploreResponse, TransportError>;

    /// Submit the map; `true` when it matches the hidden labyrinth.
    fn guess(&mut self, map: &MapDescription) -> Result<bool, TransportError>;
}

impl<Q: QueryService + ?Sized> QueryService for &mut Q {
    fn select_problem(&mut self, name: &str) -> Result<String, TransportError> {
        (**self).select_problem(name)
    }

    fn explore(&mut self, plans: &[String]) -> Result<ExploreResponse, TransportError> {
        (**self).explore(plans)
    }

    fn guess(&mut self, map: &MapDescription) -> Result<bool, TransportError> {
        (**self).guess(map)
    }
}
