//! Orchestrator: drives the root node through repeated full cycles.
//!
//! One tick is one full cycle of the root node. A root tick is one full
//! cycle in every node of the tree only when every parent drives its
//! children with [`FanOut::FullCycle`] and has an Iteration phase. With the
//! default [`FanOut::Step`] a child moves one phase per parent cycle.
//! [`Orchestrator::new`] warns about each parent that breaks the cascade,
//! and [`Orchestrator::cascades_full_cycles`] reports it.
//!
//! After each tick the orchestrator promotes the registry's pending
//! entries, so values published during tick `t` are read by peers during
//! tick `t + 1`.
//!
//! [`FanOut::FullCycle`]: crate::node::FanOut::FullCycle
//! [`FanOut::Step`]: crate::node::FanOut::Step
//!
//! [`Orchestrator::run_simulation`] wraps the tick in a control loop:
//!
//! - **Bounded runs**: stop after `max_ticks` or `max_real_time_seconds`
//! - **Pause/resume** and **cooperative stop**, observed between ticks only
//! - **Pacing**: after a tick, sleep for whatever is left of the per-tick
//!   budget. A tick that overruns its budget is counted and logged but
//!   never caught up, so simulated time may fall behind wall-clock time.

use std::sync::Arc;
use std::time::Duration;

use mict_types::RunId;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clock::{ClockError, SimulationClock};
use crate::node::Node;
use crate::operator::{Operator, SimulationEndReason};
use crate::registry::Registry;

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The simulation clock failed to advance.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// Summary of a single root tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickSummary {
    /// The tick number that just completed (1-based).
    pub tick: u64,
    /// Simulated seconds elapsed after this tick.
    pub simulated_seconds: f64,
    /// Phase failures recorded anywhere in the tree during this tick.
    pub faults: u64,
    /// Phase failures recorded since the tree was built.
    pub total_faults: u64,
    /// Registry entries promoted at the end of this tick.
    pub published: usize,
    /// Wall-clock time spent computing the tick.
    pub compute_time: Duration,
}

/// Result of a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// Identifier of the run, as it appears in log lines.
    pub run_id: RunId,
    /// The reason the run ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed by this run.
    pub total_ticks: u64,
    /// Simulated seconds on the clock when the run ended.
    pub simulated_seconds: f64,
    /// Ticks whose compute time exceeded the pacing budget.
    pub overruns: u64,
}

/// Callback invoked after each tick completes.
///
/// This is the seam for consumers of state snapshots such as visualizers
/// or persistence layers. The root is offered read-only.
pub trait TickCallback {
    /// Called after a tick completes.
    fn on_tick(&mut self, summary: &TickSummary, root: &Node);
}

/// A no-op tick callback.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _root: &Node) {}
}

/// Drives the root of a node tree.
#[derive(Debug)]
pub struct Orchestrator {
    run_id: RunId,
    root: Node,
    registry: Registry,
    clock: SimulationClock,
    operator: Arc<Operator>,
}

impl Orchestrator {
    /// Wire an orchestrator around an already-built tree.
    ///
    /// `registry` must be the handle the tree's nodes were built with (or
    /// a fresh one if no node uses a registry); the orchestrator promotes
    /// its pending entries after every tick.
    ///
    /// A tick reaches every node as a full cycle only if every parent in
    /// the tree uses [`FanOut::FullCycle`](crate::node::FanOut::FullCycle)
    /// and has an Iteration phase. Each parent that does not is logged at
    /// warn level; the tree is still accepted.
    pub fn new(
        root: Node,
        registry: Registry,
        clock: SimulationClock,
        operator: Arc<Operator>,
    ) -> Self {
        for parent in root.partial_fan_out_parents() {
            warn!(
                root = %root.id(),
                parent = %parent,
                "Parent does not run a full child cycle per tick; its subtree lags the root"
            );
        }
        Self {
            run_id: RunId::new(),
            root,
            registry,
            clock,
            operator,
        }
    }

    /// Run one tick: a full cycle of the root, then promote the registry.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Clock`] if the tick counter would overflow.
    /// Phase failures are never errors here; they are counted in the summary.
    pub fn run_simulation_step(&mut self) -> Result<TickSummary, RunnerError> {
        let started = Instant::now();
        let faults_before = self.root.total_faults();

        let _ = self.root.run_full_cycle();
        let published = self.registry.end_tick();
        let tick = self.clock.advance()?;

        let total_faults = self.root.total_faults();
        let summary = TickSummary {
            tick,
            simulated_seconds: self.clock.simulated_seconds(),
            faults: total_faults.saturating_sub(faults_before),
            total_faults,
            published,
            compute_time: started.elapsed(),
        };

        debug!(
            run_id = %self.run_id,
            tick,
            simulated_seconds = summary.simulated_seconds,
            faults = summary.faults,
            published,
            compute_us = u64::try_from(summary.compute_time.as_micros()).unwrap_or(u64::MAX),
            "Tick completed"
        );
        Ok(summary)
    }

    /// Run exactly `ticks` ticks without pacing or operator checks.
    ///
    /// Returns the last summary, or `None` if `ticks` is zero.
    pub fn run_ticks(&mut self, ticks: u64) -> Result<Option<TickSummary>, RunnerError> {
        let mut last = None;
        for _ in 0..ticks {
            last = Some(self.run_simulation_step()?);
        }
        Ok(last)
    }

    /// Run the paced tick loop until a termination condition is met.
    ///
    /// Stop, pause, and the real-time limit are checked before each tick;
    /// the tick limit after each tick. A tick in progress always finishes.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] if a tick fails unrecoverably.
    pub async fn run_simulation(
        &mut self,
        callback: &mut dyn TickCallback,
    ) -> Result<SimulationResult, RunnerError> {
        let mut last_summary: Option<TickSummary> = None;
        let mut total_ticks: u64 = 0;
        let mut overruns: u64 = 0;

        info!(
            run_id = %self.run_id,
            root = %self.root.id(),
            descendants = self.root.descendant_count(),
            max_ticks = self.operator.max_ticks(),
            max_real_time_seconds = self.operator.max_real_time_seconds(),
            started_at = %self.operator.started_at(),
            step_budget_us = u64::try_from(self.operator.step_budget().as_micros()).unwrap_or(u64::MAX),
            "Simulation starting"
        );

        loop {
            // --- Check pause ---
            if self.operator.is_paused() {
                info!(run_id = %self.run_id, "Simulation paused, waiting for resume...");
                self.operator.wait_if_paused().await;
                info!(run_id = %self.run_id, "Simulation resumed");
            }

            // --- Check stop request (before tick) ---
            if self.operator.is_stop_requested() {
                info!(run_id = %self.run_id, "Stop requested");
                return Ok(self
                    .finish(SimulationEndReason::OperatorStop, last_summary, total_ticks, overruns)
                    .await);
            }

            // --- Check time limit (before tick) ---
            if self.operator.time_limit_reached() {
                info!(
                    run_id = %self.run_id,
                    max_seconds = self.operator.max_real_time_seconds(),
                    elapsed = self.operator.elapsed_seconds(),
                    "Real-time limit reached"
                );
                return Ok(self
                    .finish(SimulationEndReason::MaxRealTimeReached, last_summary, total_ticks, overruns)
                    .await);
            }

            // --- Execute tick ---
            let summary = self.run_simulation_step()?;
            total_ticks = total_ticks.saturating_add(1);

            // --- Notify callback ---
            callback.on_tick(&summary, &self.root);

            // --- Check tick limit (after tick) ---
            if self.operator.tick_limit_reached(summary.tick) {
                info!(
                    run_id = %self.run_id,
                    tick = summary.tick,
                    max_ticks = self.operator.max_ticks(),
                    "Tick limit reached"
                );
                return Ok(self
                    .finish(SimulationEndReason::MaxTicksReached, Some(summary), total_ticks, overruns)
                    .await);
            }

            // --- Sleep off the rest of the budget; never catch up ---
            let budget = self.operator.step_budget();
            if !budget.is_zero() {
                match budget.checked_sub(summary.compute_time) {
                    Some(remaining) => tokio::time::sleep(remaining).await,
                    None => {
                        overruns = overruns.saturating_add(1);
                        debug!(
                            run_id = %self.run_id,
                            tick = summary.tick,
                            overrun_us = u64::try_from(
                                summary.compute_time.saturating_sub(budget).as_micros()
                            )
                            .unwrap_or(u64::MAX),
                            "Tick overran its budget"
                        );
                    }
                }
            }

            last_summary = Some(summary);
        }
    }

    async fn finish(
        &self,
        end_reason: SimulationEndReason,
        final_summary: Option<TickSummary>,
        total_ticks: u64,
        overruns: u64,
    ) -> SimulationResult {
        self.operator.set_end_reason(end_reason).await;
        SimulationResult {
            run_id: self.run_id,
            end_reason,
            final_summary,
            total_ticks,
            simulated_seconds: self.clock.simulated_seconds(),
            overruns,
        }
    }

    /// Whether one tick is one full cycle of every node in the tree.
    pub fn cascades_full_cycles(&self) -> bool {
        self.root.partial_fan_out_parents().is_empty()
    }

    /// Request a cooperative stop; the loop exits after the current tick.
    pub fn stop(&self) {
        self.operator.request_stop();
    }

    /// This run's identifier.
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// The root node, read-only.
    pub const fn root(&self) -> &Node {
        &self.root
    }

    /// The registry promoted after each tick.
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The simulation clock.
    pub const fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    /// Shared operator controls, e.g. for a signal handler.
    pub const fn operator(&self) -> &Arc<Operator> {
        &self.operator
    }
}

/// Log the end of a run.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        run_id = %result.run_id,
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        simulated_seconds = result.simulated_seconds,
        overruns = result.overruns,
        "Simulation ended"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = summary.tick,
            total_faults = summary.total_faults,
            "Final tick summary"
        );
    } else {
        warn!("Simulation ended with no ticks executed");
    }
}
