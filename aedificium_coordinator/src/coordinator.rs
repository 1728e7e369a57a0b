//! Session state machine.
//!
//! One coordinator drives one exploration session against a [`QueryService`]:
//! it selects the problem, alternates planning and integration rounds until
//! the belief converges or a ceiling is hit, then turns the belief into a map
//! and submits it. It is the only owner of the authoritative belief.
//!
//! No async. Each [`Coordinator::step`] performs one transition; the only
//! blocking calls are the service calls and the retry backoff.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use aedificium_core::{check_budget, total_doors, ExplorationState, Plan, Planner};

use crate::cfg::CoordinatorCfg;
use crate::finalize::build_map;
use crate::query::{ExploreResponse, MapDescription, QueryService, TransportError};
use crate::sink::{RoundRecord, RoundSink};
use crate::tracker::RoomTracker;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Initializing,
    Planning,
    AwaitingResults,
    Integrating,
    Converged,
    Finalizing,
    Done,
    Aborted,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Initializing => "initializing",
            Phase::Planning => "planning",
            Phase::AwaitingResults => "awaiting_results",
            Phase::Integrating => "integrating",
            Phase::Converged => "converged",
            Phase::Finalizing => "finalizing",
            Phase::Done => "done",
            Phase::Aborted => "aborted",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Aborted)
    }
}

/// Outcome of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub phase: Phase,
    pub map: Option<MapDescription>,
    /// The service's verdict on the submitted map, if one was submitted.
    pub correct: Option<bool>,
    pub rounds: usize,
    pub doors_traversed: usize,
    pub query_count: u64,
    pub rooms: usize,
    pub entropy: f64,
    pub abort_reason: Option<String>,
}

/// Call `op` until it succeeds or `max_retries` extra attempts are spent,
/// sleeping `backoff_ms * attempt` between attempts.
fn with_retries<T>(
    what: &str,
    max_retries: u32,
    backoff_ms: u64,
    mut op: impl FnMut() -> Result<T, TransportError>,
) -> Result<T, TransportError> {
    let mut attempt = 0u32;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_retries => {
                attempt += 1;
                log::warn!("{what} failed (attempt {attempt}/{}): {e}", max_retries + 1);
                if backoff_ms > 0 {
                    thread::sleep(Duration::from_millis(backoff_ms.saturating_mul(u64::from(attempt))));
                }
            }
            Err(e) => return Err(e),
        }
    }
}

pub struct Coordinator<Q: QueryService> {
    cfg: CoordinatorCfg,
    service: Q,
    planner: Planner,
    state: ExplorationState,
    tracker: RoomTracker,
    phase: Phase,
    history: Vec<Phase>,
    pending: Vec<Plan>,
    response: Option<ExploreResponse>,
    round: usize,
    doors_traversed: usize,
    query_count: u64,
    converged: bool,
    started: Option<Instant>,
    cancel: Arc<AtomicBool>,
    map: Option<MapDescription>,
    correct: Option<bool>,
    abort_reason: Option<String>,
    sink: Option<Box<dyn RoundSink>>,
}

impl<Q: QueryService> Coordinator<Q> {
    /// Fresh session. Nothing is sent until the first [`Self::step`].
    pub fn new(cfg: CoordinatorCfg, service: Q) -> Self {
        let planner = Planner::new(cfg.planner.clone());
        Self {
            cfg,
            service,
            planner,
            state: ExplorationState::new(),
            tracker: RoomTracker::new(),
            phase: Phase::Initializing,
            history: vec![Phase::Initializing],
            pending: Vec::new(),
            response: None,
            round: 0,
            doors_traversed: 0,
            query_count: 0,
            converged: false,
            started: None,
            cancel: Arc::new(AtomicBool::new(false)),
            map: None,
            correct: None,
            abort_reason: None,
            sink: None,
        }
    }

    /// Attach a round sink. Sink failures never affect the session.
    pub fn with_sink(mut self, sink: impl RoundSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Setting the flag aborts the session at the next planning boundary and
    /// discards any result still in flight.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase entered so far, in order.
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn state(&self) -> &ExplorationState {
        &self.state
    }

    pub fn tracker(&self) -> &RoomTracker {
        &self.tracker
    }

    pub fn service(&self) -> &Q {
        &self.service
    }

    pub fn map(&self) -> Option<&MapDescription> {
        self.map.as_ref()
    }

    #[inline]
    pub fn remaining_budget(&self) -> usize {
        self.cfg.door_budget.saturating_sub(self.doors_traversed)
    }

    /// Drive the session to `Done` or `Aborted`.
    ///
    /// An aborted session still gets a map: built from whatever was learned
    /// and submitted once, without retries.
    pub fn run(&mut self) -> SessionReport {
        while !self.phase.is_terminal() {
            self.step();
        }
        if self.phase == Phase::Aborted && self.map.is_none() {
            self.best_effort_finalize();
        }
        let report = self.report();
        log::info!(
            "session {}: {} rounds, {} doors, {} rooms, entropy {:.4}, correct {:?}",
            report.phase.name(),
            report.rounds,
            report.doors_traversed,
            report.rooms,
            report.entropy,
            report.correct
        );
        report
    }

    /// Perform one transition and return the phase entered.
    pub fn step(&mut self) -> Phase {
        let next = match self.phase {
            Phase::Initializing => self.initialize(),
            Phase::Planning => self.plan_round(),
            Phase::AwaitingResults => self.await_results(),
            Phase::Integrating => self.integrate(),
            Phase::Converged => Phase::Finalizing,
            Phase::Finalizing => self.finalize(),
            Phase::Done | Phase::Aborted => return self.phase,
        };
        self.transition(next);
        self.phase
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            phase: self.phase,
            map: self.map.clone(),
            correct: self.correct,
            rounds: self.round,
            doors_traversed: self.doors_traversed,
            query_count: self.query_count,
            rooms: self.tracker.room_count(),
            entropy: self.state.belief().entropy(),
            abort_reason: self.abort_reason.clone(),
        }
    }

    fn transition(&mut self, next: Phase) {
        if next != self.phase {
            log::info!("{} -> {}", self.phase.name(), next.name());
        }
        self.phase = next;
        self.history.push(next);
    }

    fn abort(&mut self, reason: impl Into<String>) -> Phase {
        let reason = reason.into();
        log::warn!("aborting session: {reason}");
        self.abort_reason = Some(reason);
        Phase::Aborted
    }

    fn converge(&mut self) -> Phase {
        if self.converged {
            return Phase::Finalizing;
        }
        self.converged = true;
        Phase::Converged
    }

    #[inline]
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn wall_clock_exceeded(&self) -> bool {
        match (self.cfg.max_wall_clock_ms, self.started) {
            (Some(ms), Some(t)) => t.elapsed() >= Duration::from_millis(ms),
            _ => false,
        }
    }

    fn initialize(&mut self) -> Phase {
        self.started = Some(Instant::now());
        let (retries, backoff) = (self.cfg.max_retries, self.cfg.retry_backoff_ms);
        let problem = self.cfg.problem.clone();
        let service = &mut self.service;
        match with_retries("select_problem", retries, backoff, || service.select_problem(&problem)) {
            Ok(confirmed) => {
                log::info!("exploring problem {confirmed:?}");
                Phase::Planning
            }
            Err(e) => self.abort(format!("could not select problem {problem:?}: {e}")),
        }
    }

    fn plan_round(&mut self) -> Phase {
        if self.cancelled() {
            return self.abort("cancelled");
        }
        if self.round >= self.cfg.max_rounds {
            log::info!("round ceiling {} reached", self.cfg.max_rounds);
            return self.converge();
        }
        if self.wall_clock_exceeded() {
            log::info!("wall-clock ceiling reached after {} rounds", self.round);
            return self.converge();
        }
        let remaining = self.remaining_budget();
        if remaining == 0 {
            return self.converge();
        }

        let plans = self.planner.propose(&self.state, remaining);
        if plans.is_empty() {
            return self.converge();
        }
        if let Err(e) = check_budget(&plans, remaining, self.planner.cfg().max_plan_len) {
            return self.abort(e.to_string());
        }
        log::debug!(
            "round {}: {}",
            self.round + 1,
            plans.iter().map(Plan::to_wire).collect::<Vec<_>>().join(",")
        );
        self.pending = plans;
        Phase::AwaitingResults
    }

    fn await_results(&mut self) -> Phase {
        let wire: Vec<String> = self.pending.iter().map(Plan::to_wire).collect();
        let (retries, backoff) = (self.cfg.max_retries, self.cfg.retry_backoff_ms);
        let service = &mut self.service;
        match with_retries("explore", retries, backoff, || service.explore(&wire)) {
            Ok(_) if self.cancelled() => {
                log::warn!("discarding explore result that arrived after cancellation");
                self.pending.clear();
                self.abort("cancelled while awaiting results")
            }
            Ok(response) => {
                self.response = Some(response);
                Phase::Integrating
            }
            Err(e) => {
                self.pending.clear();
                self.abort(format!("explore failed after {} attempt(s): {e}", retries + 1))
            }
        }
    }

    fn integrate(&mut self) -> Phase {
        let plans = std::mem::take(&mut self.pending);
        let Some(response) = self.response.take() else {
            return Phase::Planning;
        };
        self.round += 1;
        self.query_count = response.query_count;
        if response.results.len() != plans.len() {
            log::warn!(
                "round {}: {} plans but {} results",
                self.round,
                plans.len(),
                response.results.len()
            );
        }

        // The oracle walks every submitted door, whether or not its result
        // turns out usable.
        self.doors_traversed += total_doors(&plans);
        for (plan, raw) in plans.iter().zip(&response.results) {
            if let Err(e) = self
                .tracker
                .integrate(&mut self.state, self.round, plan, raw, plan.len())
            {
                log::warn!("discarding result for plan {plan}: {e}");
            }
        }
        self.emit_round(&plans);

        log::debug!(
            "round {}: {} rooms, {} doors traversed, entropy {:.4}",
            self.round,
            self.tracker.room_count(),
            self.doors_traversed,
            self.state.belief().entropy()
        );

        if self.remaining_budget() == 0 {
            log::info!("door budget {} reached", self.cfg.door_budget);
            return Phase::Finalizing;
        }
        if let Some(max) = self.cfg.max_query_count {
            if self.query_count >= max {
                log::info!("query ceiling {max} reached");
                return Phase::Finalizing;
            }
        }
        if self.state.is_converged(self.planner.cfg().entropy_threshold) {
            return self.converge();
        }
        Phase::Planning
    }

    fn emit_round(&mut self, plans: &[Plan]) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        sink.record(&RoundRecord {
            round: self.round,
            plans: plans.iter().map(Plan::to_wire).collect(),
            rooms: self.tracker.labels().to_vec(),
            edges: self.state.door_tally().known_doors(),
            entropy: self.state.belief().entropy(),
        });
    }

    fn finalize(&mut self) -> Phase {
        let map = build_map(&self.tracker, &self.state);
        self.map = Some(map.clone());
        if !self.cfg.submit_guess {
            return Phase::Done;
        }
        let (retries, backoff) = (self.cfg.max_retries, self.cfg.retry_backoff_ms);
        let service = &mut self.service;
        match with_retries("guess", retries, backoff, || service.guess(&map)) {
            Ok(correct) => {
                log::info!("map with {} rooms submitted, correct: {correct}", map.rooms.len());
                self.correct = Some(correct);
                Phase::Done
            }
            Err(e) => self.abort(format!("guess failed: {e}")),
        }
    }

    fn best_effort_finalize(&mut self) {
        let map = build_map(&self.tracker, &self.state);
        if self.cfg.submit_guess && !map.rooms.is_empty() {
            match self.service.guess(&map) {
                Ok(correct) => self.correct = Some(correct),
                Err(e) => log::warn!("best-effort guess failed: {e}"),
            }
        }
        self.map = Some(map);
    }
}
