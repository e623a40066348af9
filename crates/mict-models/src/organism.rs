//! Assembles the demo organism from configuration.
//!
//! ```text
//! organism (worm1)
//! ├── nervous_system
//! │   └── neural_circuit: N1 -> N2 -> ... -> Nn   (chain, N1 driven by base current)
//! └── muscular_system
//!     └── muscle_group: M1 ... Mm                  (all driven by Nn)
//! ```
//!
//! Every aggregating node fans out with [`FanOut::FullCycle`], so one root
//! tick is one full cycle of every cell. Synaptic weights are drawn from a
//! seeded [`StdRng`], which makes the whole tree reproducible from its
//! configuration.

use mict_core::config::OrganismConfig;
use mict_core::node::{FanOut, Node};
use mict_core::registry::Registry;
use mict_types::{EntityId, Level, Phase, State};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::aggregate::{
    MEAN_ACTIVITY, grade_activity, organism_checking, organism_initial_state,
    organism_locomotion, organism_mapping, summarize_children,
};
use crate::error::ModelError;
use crate::muscle::{CONTRACTION_LEVEL, MuscleDrive, muscle};
use crate::neuron::{NeuronParams, OUTPUT_SIGNAL, Synapse, neuron};

/// Entity kind of the root.
pub const ORGANISM_KIND: &str = "organism";
/// Entity kind (and id) of the nervous system.
pub const NERVOUS_SYSTEM_KIND: &str = "nervous_system";
/// Entity kind (and id) of the muscular system.
pub const MUSCULAR_SYSTEM_KIND: &str = "muscular_system";
/// Entity kind (and id) of the neural circuit.
pub const NEURAL_CIRCUIT_KIND: &str = "neural_circuit";
/// Entity kind (and id) of the muscle group.
pub const MUSCLE_GROUP_KIND: &str = "muscle_group";

/// Identities and parameters of every cell in the organism.
#[derive(Debug, Clone, PartialEq)]
pub struct OrganismLayout {
    /// The root's identity.
    pub organism_id: EntityId,
    /// Neurons in chain order.
    pub neurons: Vec<(EntityId, NeuronParams)>,
    /// Muscle cells in stepping order.
    pub muscles: Vec<(EntityId, MuscleDrive)>,
}

impl OrganismLayout {
    /// Derive the layout from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidLayout`] if there are no neurons or the
    /// weight range is empty or not finite.
    pub fn from_config(config: &OrganismConfig) -> Result<Self, ModelError> {
        if config.neurons == 0 {
            return Err(ModelError::InvalidLayout {
                reason: "at least one neuron is required".to_owned(),
            });
        }
        let (min, max) = (config.min_weight, config.max_weight);
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(ModelError::InvalidLayout {
                reason: format!("synaptic weight range [{min}, {max}] is empty or not finite"),
            });
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut neurons: Vec<(EntityId, NeuronParams)> = Vec::new();
        for n in 1..=config.neurons {
            let id = EntityId::new(format!("N{n}"));
            let params = match neurons.last() {
                None => NeuronParams {
                    base_current: config.base_current,
                    synapses: Vec::new(),
                },
                Some((prev, _)) => NeuronParams {
                    base_current: 0.0,
                    synapses: vec![Synapse {
                        source: prev.clone(),
                        weight: rng.random_range(min..=max),
                    }],
                },
            };
            neurons.push((id, params));
        }

        let motor = neurons
            .last()
            .map(|(id, _)| id.clone())
            .ok_or_else(|| ModelError::InvalidLayout {
                reason: "no motor neuron".to_owned(),
            })?;
        let muscles = (1..=config.muscles)
            .map(|m| {
                (
                    EntityId::new(format!("M{m}")),
                    MuscleDrive::Neuron(motor.clone()),
                )
            })
            .collect();

        Ok(Self {
            organism_id: EntityId::new(config.id.clone()),
            neurons,
            muscles,
        })
    }

    /// Weights of every synapse, in chain order.
    pub fn synapse_weights(&self) -> Vec<f64> {
        self.neurons
            .iter()
            .flat_map(|(_, params)| params.synapses.iter().map(|s| s.weight))
            .collect()
    }
}

/// Build the organism tree for `layout`, wiring every cell to `registry`.
///
/// # Errors
///
/// Returns [`ModelError::Node`] if a node fails to build, e.g. when the
/// organism id collides with a cell id.
pub fn build_organism(layout: &OrganismLayout, registry: &Registry) -> Result<Node, ModelError> {
    let neurons = layout
        .neurons
        .iter()
        .map(|(id, params)| neuron(id.clone(), params.clone(), registry))
        .collect::<Result<Vec<_>, _>>()?;
    let muscles = layout
        .muscles
        .iter()
        .map(|(id, drive)| muscle(id.clone(), drive.clone(), registry))
        .collect::<Result<Vec<_>, _>>()?;

    let circuit = aggregate(NEURAL_CIRCUIT_KIND, Level::Component, OUTPUT_SIGNAL, neurons)?;
    let group = aggregate(MUSCLE_GROUP_KIND, Level::Component, CONTRACTION_LEVEL, muscles)?;
    let nervous = aggregate(NERVOUS_SYSTEM_KIND, Level::System, MEAN_ACTIVITY, vec![circuit])?;
    let muscular = aggregate(MUSCULAR_SYSTEM_KIND, Level::System, MEAN_ACTIVITY, vec![group])?;

    let organism = Node::builder(
        layout.organism_id.clone(),
        ORGANISM_KIND,
        Level::Organism,
        organism_initial_state(),
    )
    .fan_out(FanOut::FullCycle)
    .phase(Phase::Mapping, organism_mapping)
    .phase(Phase::Iteration, organism_locomotion(MUSCULAR_SYSTEM_KIND))
    .phase(Phase::Checking, organism_checking)
    .child(nervous)
    .child(muscular)
    .build()?;

    info!(
        organism = %organism.id(),
        neurons = layout.neurons.len(),
        muscles = layout.muscles.len(),
        nodes = organism.descendant_count().saturating_add(1),
        "Organism built"
    );
    Ok(organism)
}

fn aggregate(
    kind: &'static str,
    level: Level,
    signal: &'static str,
    children: Vec<Node>,
) -> Result<Node, ModelError> {
    Ok(Node::builder(kind, kind, level, State::new())
        .fan_out(FanOut::FullCycle)
        .phase(Phase::Mapping, summarize_children(signal))
        .phase(Phase::Checking, grade_activity)
        .children(children)
        .build()?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_a_chain() {
        let layout = OrganismLayout::from_config(&OrganismConfig::default()).unwrap();
        assert_eq!(layout.organism_id.as_str(), "worm1");
        assert_eq!(layout.neurons.len(), 4);
        assert_eq!(layout.muscles.len(), 2);

        let (first_id, first) = layout.neurons.first().unwrap();
        assert_eq!(first_id.as_str(), "N1");
        assert!(first.synapses.is_empty());
        assert!((first.base_current - 1.6).abs() < f64::EPSILON);

        for pair in layout.neurons.windows(2) {
            if let [(prev, _), (_, next)] = pair {
                assert_eq!(next.synapses.len(), 1);
                assert_eq!(&next.synapses.first().unwrap().source, prev);
            }
        }
        for (_, drive) in &layout.muscles {
            assert_eq!(drive, &MuscleDrive::Neuron(EntityId::from("N4")));
        }
    }

    #[test]
    fn weights_are_seeded_and_in_range() {
        let config = OrganismConfig::default();
        let a = OrganismLayout::from_config(&config).unwrap().synapse_weights();
        let b = OrganismLayout::from_config(&config).unwrap().synapse_weights();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert!(a.iter().all(|w| (1.0..=2.0).contains(w)));

        let other = OrganismConfig {
            seed: 7,
            ..OrganismConfig::default()
        };
        let c = OrganismLayout::from_config(&other).unwrap().synapse_weights();
        assert_ne!(a, c);
    }

    #[test]
    fn rejects_empty_circuit() {
        let config = OrganismConfig {
            neurons: 0,
            ..OrganismConfig::default()
        };
        assert!(matches!(
            OrganismLayout::from_config(&config),
            Err(ModelError::InvalidLayout { .. })
        ));
    }

    #[test]
    fn builds_full_tree() {
        let registry = Registry::new();
        let layout = OrganismLayout::from_config(&OrganismConfig::default()).unwrap();
        let organism = build_organism(&layout, &registry).unwrap();

        // 2 systems + 2 components + 4 neurons + 2 muscles
        assert_eq!(organism.descendant_count(), 10);
        assert_eq!(organism.state().str("organism_id").unwrap(), "worm1");
        let m2 = organism.find(&EntityId::from("M2")).unwrap();
        assert_eq!(m2.level(), Level::Cell);
        assert_eq!(m2.state().str("cell_id").unwrap(), "M2");
    }

    #[test]
    fn organism_id_must_not_collide() {
        let registry = Registry::new();
        let config = OrganismConfig {
            id: "N1".to_owned(),
            ..OrganismConfig::default()
        };
        let layout = OrganismLayout::from_config(&config).unwrap();
        assert!(matches!(
            build_organism(&layout, &registry),
            Err(ModelError::Node { .. })
        ));
    }
}
