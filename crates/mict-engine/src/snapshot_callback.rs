//! Tick callback that logs organism snapshots.
//!
//! Every `interval` ticks the callback logs the root's committed state as a
//! JSON string at debug level, plus a one-line summary at info level. This
//! is the seam a visualizer or persistence layer would replace.

use mict_core::node::Node;
use mict_core::runner::{TickCallback, TickSummary};
use tracing::{debug, info, warn};

/// Callback that logs a snapshot of the root every `interval` ticks.
pub struct SnapshotLogCallback {
    interval: u64,
    logged: u64,
}

impl SnapshotLogCallback {
    /// Create a callback that logs every `interval` ticks (0 = never).
    pub const fn new(interval: u64) -> Self {
        Self {
            interval,
            logged: 0,
        }
    }

    /// Number of snapshots logged so far.
    pub const fn logged(&self) -> u64 {
        self.logged
    }

    const fn is_due(&self, tick: u64) -> bool {
        matches!(tick.checked_rem(self.interval), Some(0))
    }
}

impl TickCallback for SnapshotLogCallback {
    fn on_tick(&mut self, summary: &TickSummary, root: &Node) {
        if !self.is_due(summary.tick) {
            return;
        }
        self.logged = self.logged.saturating_add(1);

        info!(
            tick = summary.tick,
            simulated_seconds = summary.simulated_seconds,
            total_faults = summary.total_faults,
            root = %root.id(),
            "Snapshot"
        );

        match serde_json::to_string(root.state()) {
            Ok(json) => debug!(tick = summary.tick, entity = %root.id(), state = %json, "Root state"),
            Err(e) => warn!(tick = summary.tick, error = %e, "failed to serialize root state"),
        }
        for child in root.children() {
            match serde_json::to_string(child.state()) {
                Ok(json) => debug!(tick = summary.tick, entity = %child.id(), state = %json, "System state"),
                Err(e) => warn!(tick = summary.tick, entity = %child.id(), error = %e, "failed to serialize state"),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use mict_types::{Level, State};

    use super::*;

    fn summary(tick: u64) -> TickSummary {
        TickSummary {
            tick,
            simulated_seconds: 0.0,
            faults: 0,
            total_faults: 0,
            published: 0,
            compute_time: Duration::ZERO,
        }
    }

    #[test]
    fn logs_on_interval_only() {
        let root = Node::builder("worm1", "organism", Level::Organism, State::new())
            .build()
            .unwrap();
        let mut cb = SnapshotLogCallback::new(10);
        for tick in 1..=35 {
            cb.on_tick(&summary(tick), &root);
        }
        assert_eq!(cb.logged(), 3);
    }

    #[test]
    fn zero_interval_never_logs() {
        let root = Node::builder("worm1", "organism", Level::Organism, State::new())
            .build()
            .unwrap();
        let mut cb = SnapshotLogCallback::new(0);
        for tick in 1..=10 {
            cb.on_tick(&summary(tick), &root);
        }
        assert_eq!(cb.logged(), 0);
    }
}
