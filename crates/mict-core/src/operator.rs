//! Operator control state for a running simulation.
//!
//! The orchestrator checks this state once per completed tick: a stop or
//! pause request never interrupts a tick in progress. Control fields are
//! atomics so that the state can be shared (`Arc<Operator>`) with a signal
//! handler or another task without locking on the tick loop's hot path.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::config::SimulationBoundsConfig;

/// Reason why a simulation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationEndReason {
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
    /// Reached the configured `max_real_time_seconds` limit.
    MaxRealTimeReached,
    /// A stop was requested.
    OperatorStop,
}

/// Shared run control state.
#[derive(Debug)]
pub struct Operator {
    /// Whether the run is currently paused.
    paused: AtomicBool,

    /// Notification used to wake the tick loop when resumed.
    resume_notify: Notify,

    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Wall-clock budget per tick in microseconds (0 = unpaced).
    step_budget_us: AtomicU64,

    /// Wall-clock time when the operator was created, for reporting.
    started_at: DateTime<Utc>,

    /// Monotonic start used for the real-time limit. Follows tokio's clock,
    /// so a paused test runtime can advance it.
    started: Instant,

    /// Maximum number of ticks (0 = unlimited).
    max_ticks: u64,

    /// Maximum wall-clock seconds (0 = unlimited).
    max_real_time_seconds: u64,

    /// Reason the run ended, if it has.
    end_reason: Mutex<Option<SimulationEndReason>>,
}

impl Operator {
    /// Create operator state with an explicit per-tick budget.
    pub fn new(step_budget: Duration, bounds: &SimulationBoundsConfig) -> Self {
        Self {
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            stop_requested: AtomicBool::new(false),
            step_budget_us: AtomicU64::new(duration_to_us(step_budget)),
            started_at: Utc::now(),
            started: Instant::now(),
            max_ticks: bounds.max_ticks,
            max_real_time_seconds: bounds.max_real_time_seconds,
            end_reason: Mutex::new(None),
        }
    }

    /// Create operator state from config: the budget is one tick's share of
    /// a second at `steps_per_second`, or zero when pacing is disabled.
    pub fn from_config(bounds: &SimulationBoundsConfig) -> Self {
        let budget = if bounds.pace {
            budget_for_rate(bounds.steps_per_second)
        } else {
            Duration::ZERO
        };
        Self::new(budget, bounds)
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Check whether the run is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause the run. The tick loop sleeps after the current tick until resumed.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume the run and wake the tick loop.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Wait until the run is no longer paused, or a stop is requested.
    pub async fn wait_if_paused(&self) {
        while self.is_paused() && !self.is_stop_requested() {
            self.resume_notify.notified().await;
        }
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a cooperative stop. Takes effect at the next tick boundary.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Check whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Record the reason the run ended.
    pub async fn set_end_reason(&self, reason: SimulationEndReason) {
        let mut guard = self.end_reason.lock().await;
        *guard = Some(reason);
    }

    /// Get the reason the run ended, if it has.
    pub async fn end_reason(&self) -> Option<SimulationEndReason> {
        *self.end_reason.lock().await
    }

    // -----------------------------------------------------------------------
    // Pacing
    // -----------------------------------------------------------------------

    /// Current wall-clock budget per tick. Zero means unpaced.
    pub fn step_budget(&self) -> Duration {
        Duration::from_micros(self.step_budget_us.load(Ordering::Acquire))
    }

    /// Replace the per-tick budget. Returns the previous budget.
    pub fn set_step_budget(&self, budget: Duration) -> Duration {
        let prev = self
            .step_budget_us
            .swap(duration_to_us(budget), Ordering::AcqRel);
        Duration::from_micros(prev)
    }

    /// Retarget pacing to `steps_per_second`.
    ///
    /// Returns the previous budget, or `None` if the rate was rejected
    /// (not finite or not positive).
    pub fn set_steps_per_second(&self, steps_per_second: f64) -> Option<Duration> {
        if !steps_per_second.is_finite() || steps_per_second <= 0.0 {
            return None;
        }
        Some(self.set_step_budget(budget_for_rate(steps_per_second)))
    }

    // -----------------------------------------------------------------------
    // Boundaries
    // -----------------------------------------------------------------------

    /// Returns `true` if `max_ticks > 0` and `current_tick >= max_ticks`.
    pub const fn tick_limit_reached(&self, current_tick: u64) -> bool {
        self.max_ticks > 0 && current_tick >= self.max_ticks
    }

    /// Returns `true` if `max_real_time_seconds > 0` and at least that many
    /// seconds have elapsed since the operator was created.
    pub fn time_limit_reached(&self) -> bool {
        if self.max_real_time_seconds == 0 {
            return false;
        }
        self.elapsed() >= Duration::from_secs(self.max_real_time_seconds)
    }

    /// Return the wall-clock start time.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time elapsed since the operator was created, on tokio's clock.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whole seconds elapsed since the operator was created.
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed().as_secs()
    }

    /// Get the configured max ticks.
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Get the configured max real-time seconds.
    pub const fn max_real_time_seconds(&self) -> u64 {
        self.max_real_time_seconds
    }
}

fn duration_to_us(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

fn budget_for_rate(steps_per_second: f64) -> Duration {
    Duration::try_from_secs_f64(steps_per_second.recip()).unwrap_or(Duration::ZERO)
}
