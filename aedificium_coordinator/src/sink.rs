//! Optional round records for debugging and visualization.
//!
//! Sinks are fire-and-forget: a failing sink never affects the session.

use std::io::Write;

use serde::{Deserialize, Serialize};

use aedificium_core::{Label, Step};

/// What one integrated round added to the partial graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: usize,
    pub plans: Vec<String>,
    /// Labels of every room known so far.
    pub rooms: Vec<Label>,
    /// Known doors with their most observed targets.
    pub edges: Vec<Step>,
    pub entropy: f64,
}

pub trait RoundSink {
    fn record(&mut self, record: &RoundRecord);
}

/// Writes one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RoundSink for JsonLinesSink<W> {
    fn record(&mut self, record: &RoundRecord) {
        let written = serde_json::to_writer(&mut self.out, record)
            .map_err(std::io::Error::from)
            .and_then(|_| self.out.write_all(b"\n"))
            .and_then(|_| self.out.flush());
        if let Err(e) = written {
            log::warn!("round sink: dropping record for round {}: {e}", record.round);
        }
    }
}
