//! Enumeration types for the cycle engine.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// One named step of an entity's cycle.
///
/// Phases are bound to their functions once, at construction time. A
/// sequencer may be configured with any non-empty ordered subset of these;
/// every entity in the shipped hierarchy uses [`Phase::CANONICAL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Gather inputs from children, neighbours, and the environment.
    Mapping,
    /// Simulate this level's own dynamics, then drive every child one phase.
    Iteration,
    /// Evaluate the post-iteration state against thresholds.
    Checking,
    /// Produce outputs and adapt.
    Transformation,
}

impl Phase {
    /// The canonical four-phase cycle, in execution order.
    pub const CANONICAL: [Self; 4] = [
        Self::Mapping,
        Self::Iteration,
        Self::Checking,
        Self::Transformation,
    ];

    /// Human-readable name of the phase.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mapping => "Mapping",
            Self::Iteration => "Iteration",
            Self::Checking => "Checking",
            Self::Transformation => "Transformation",
        }
    }
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Containment levels
// ---------------------------------------------------------------------------

/// Containment level of an entity in the biological hierarchy.
///
/// Levels nest strictly: cells inside components, components inside
/// systems, systems inside the organism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    /// A single cell (neuron, muscle cell).
    Cell,
    /// A group of cells (neural circuit, muscle group).
    Component,
    /// A group of components (nervous system, muscular system).
    System,
    /// The whole organism.
    Organism,
}

impl Level {
    /// State key under which an entity at this level records its own id.
    pub const fn id_key(self) -> &'static str {
        match self {
            Self::Cell => "cell_id",
            Self::Component => "component_id",
            Self::System => "system_id",
            Self::Organism => "organism_id",
        }
    }
}

impl core::fmt::Display for Level {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Cell => "cell",
            Self::Component => "component",
            Self::System => "system",
            Self::Organism => "organism",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order() {
        assert_eq!(
            Phase::CANONICAL,
            [
                Phase::Mapping,
                Phase::Iteration,
                Phase::Checking,
                Phase::Transformation
            ]
        );
    }

    #[test]
    fn phase_display_matches_name() {
        for phase in Phase::CANONICAL {
            assert_eq!(phase.to_string(), phase.name());
        }
    }

    #[test]
    fn level_id_keys() {
        assert_eq!(Level::Cell.id_key(), "cell_id");
        assert_eq!(Level::Organism.id_key(), "organism_id");
    }
}
