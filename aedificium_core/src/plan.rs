//! Rooms, doors and door-sequence plans.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ExplorerError, Result};

/// Every room has exactly this many doors.
pub const DOORS: usize = 6;

/// Room labels are two-bit values.
pub const LABEL_COUNT: u8 = 4;

/// Plans always begin in the room the oracle starts every query from.
pub const START_ROOM: RoomId = 0;

pub type RoomId = usize;
pub type Door = u8;
pub type Label = u8;

/// Ordered door indices submitted as one exploration query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Plan {
    doors: Vec<Door>,
}

impl Plan {
    pub fn new(doors: Vec<Door>) -> Result<Self> {
        if let Some(bad) = doors.iter().find(|&&d| d as usize >= DOORS) {
            return Err(ExplorerError::InvalidDoor(bad.to_string()));
        }
        Ok(Self { doors })
    }

    /// One-door plan. Out-of-range doors wrap, so this never fails.
    pub fn single(door: Door) -> Self {
        Self {
            doors: vec![door % DOORS as Door],
        }
    }

    #[inline]
    pub fn doors(&self) -> &[Door] {
        &self.doors
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.doors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.doors.is_empty()
    }

    /// Digit-string form used on the wire, e.g. `"0153"`.
    pub fn to_wire(&self) -> String {
        self.to_string()
    }

    pub fn parse(s: &str) -> Result<Self> {
        let mut doors = Vec::with_capacity(s.len());
        for ch in s.trim().chars() {
            match ch.to_digit(10) {
                Some(d) if (d as usize) < DOORS => doors.push(d as Door),
                _ => return Err(ExplorerError::InvalidDoor(ch.to_string())),
            }
        }
        Ok(Self { doors })
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.doors {
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

impl FromStr for Plan {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self> {
        Plan::parse(s)
    }
}

/// Total doors traversed by a batch of plans.
pub fn total_doors(plans: &[Plan]) -> usize {
    plans.iter().map(Plan::len).sum()
}

/// Precondition check for a batch about to be submitted.
///
/// The planner never emits a batch that fails this; the coordinator runs it
/// anyway before handing plans to the transport.
pub fn check_budget(plans: &[Plan], remaining: usize, max_plan_len: usize) -> Result<()> {
    if let Some(p) = plans.iter().find(|p| p.len() > max_plan_len) {
        return Err(ExplorerError::PlanTooLong {
            len: p.len(),
            cap: max_plan_len,
        });
    }
    let requested = total_doors(plans);
    if requested > remaining {
        return Err(ExplorerError::BudgetExceeded {
            requested,
            remaining,
        });
    }
    Ok(())
}
