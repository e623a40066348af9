//! Simulated-time clock for the orchestrator.
//!
//! The tick counter is the single source of truth; simulated time is always
//! derived as `tick * seconds_per_step` rather than accumulated, so it does
//! not drift with floating-point rounding over long runs.
//!
//! Simulated time is independent of wall-clock time. When ticks take longer
//! to compute than their pacing budget, simulated time falls behind the wall
//! clock and is never caught up.

use crate::config::SimulationBoundsConfig;

/// Errors that can occur during clock operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// Invalid step rate (zero, negative, or not finite).
    #[error("invalid clock configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Tick counter plus the amount of simulated time each tick represents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationClock {
    /// Completed ticks.
    tick: u64,

    /// Simulated seconds represented by one tick.
    seconds_per_step: f64,
}

impl SimulationClock {
    /// Create a clock at tick 0 running at `steps_per_second`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] unless `steps_per_second` is a
    /// finite, strictly positive number.
    pub fn new(steps_per_second: f64) -> Result<Self, ClockError> {
        if !steps_per_second.is_finite() || steps_per_second <= 0.0 {
            return Err(ClockError::InvalidConfig {
                reason: format!("steps_per_second must be finite and positive, got {steps_per_second}"),
            });
        }
        Ok(Self {
            tick: 0,
            seconds_per_step: steps_per_second.recip(),
        })
    }

    /// Create a clock from the simulation bounds section of the config.
    pub fn from_config(bounds: &SimulationBoundsConfig) -> Result<Self, ClockError> {
        Self::new(bounds.steps_per_second)
    }

    /// Advance the clock by one tick. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the tick counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(self.tick)
    }

    /// Return the number of completed ticks.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds represented by one tick.
    pub const fn seconds_per_step(&self) -> f64 {
        self.seconds_per_step
    }

    /// Simulated seconds elapsed: completed ticks times seconds per step.
    #[allow(clippy::cast_precision_loss)] // exact below 2^53 ticks
    pub fn simulated_seconds(&self) -> f64 {
        self.tick as f64 * self.seconds_per_step
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let clock = SimulationClock::new(100.0).unwrap();
        assert_eq!(clock.tick(), 0);
        assert_eq!(clock.simulated_seconds(), 0.0);
    }

    #[test]
    fn simulated_time_is_ticks_times_step() {
        let mut clock = SimulationClock::new(4.0).unwrap();
        for _ in 0..10 {
            let _ = clock.advance().unwrap();
        }
        assert_eq!(clock.tick(), 10);
        assert_eq!(clock.seconds_per_step(), 0.25);
        assert_eq!(clock.simulated_seconds(), 2.5);
    }

    #[test]
    fn rejects_bad_rates() {
        assert!(SimulationClock::new(0.0).is_err());
        assert!(SimulationClock::new(-1.0).is_err());
        assert!(SimulationClock::new(f64::NAN).is_err());
        assert!(SimulationClock::new(f64::INFINITY).is_err());
    }

    #[test]
    fn from_config_uses_steps_per_second() {
        let bounds = SimulationBoundsConfig::default();
        let clock = SimulationClock::from_config(&bounds).unwrap();
        assert_eq!(clock.seconds_per_step(), 0.01);
    }
}
