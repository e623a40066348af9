//! End-to-end runs of the demo organism under the orchestrator.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::sync::Arc;
use std::time::Duration;

use mict_core::clock::SimulationClock;
use mict_core::config::{OrganismConfig, SimulationBoundsConfig};
use mict_core::operator::Operator;
use mict_core::registry::Registry;
use mict_core::runner::Orchestrator;
use mict_models::aggregate::{HUNGER, MEAN_ACTIVITY, POSITION_X};
use mict_models::muscle::CONTRACTION_LEVEL;
use mict_models::neuron::{INPUT_CURRENT, MEMBRANE_POTENTIAL, SPIKE_COUNT, V_REST};
use mict_models::{OrganismLayout, build_organism};
use mict_types::{EntityId, State};

fn orchestrator(config: &OrganismConfig) -> Orchestrator {
    let registry = Registry::new();
    let layout = OrganismLayout::from_config(config).unwrap();
    let root = build_organism(&layout, &registry).unwrap();
    let bounds = SimulationBoundsConfig::default();
    Orchestrator::new(
        root,
        registry,
        SimulationClock::from_config(&bounds).unwrap(),
        Arc::new(Operator::new(Duration::ZERO, &bounds)),
    )
}

fn cell_state(orch: &Orchestrator, id: &str) -> State {
    orch.root().find(&EntityId::from(id)).unwrap().snapshot()
}

#[test]
fn every_cell_completes_one_cycle_per_tick() {
    let mut orch = orchestrator(&OrganismConfig::default());
    assert!(orch.cascades_full_cycles());
    let _ = orch.run_ticks(25).unwrap();

    for id in ["N1", "N2", "N3", "N4", "M1", "M2", "neural_circuit", "muscular_system"] {
        let node = orch.root().find(&EntityId::from(id)).unwrap();
        assert_eq!(node.cycles_completed(), 25, "{id}");
        assert_eq!(node.phase_index(), 0, "{id}");
    }
    assert_eq!(orch.root().total_faults(), 0);
}

#[test]
fn driven_neuron_spikes_and_drives_its_successor() {
    let mut orch = orchestrator(&OrganismConfig::default());
    let summary = orch.run_ticks(400).unwrap().unwrap();

    assert_eq!(summary.tick, 400);
    assert_eq!(summary.total_faults, 0);
    assert!(cell_state(&orch, "N1").i64(SPIKE_COUNT).unwrap() >= 1);

    // N2 has no base current; anything above rest came through the synapse.
    let n2 = cell_state(&orch, "N2");
    assert!(n2.f64(MEMBRANE_POTENTIAL).unwrap() > V_REST);
    assert_eq!(n2.i64(SPIKE_COUNT).unwrap(), 0);
}

#[test]
fn spike_reaches_successor_one_tick_later() {
    let mut orch = orchestrator(&OrganismConfig::default());

    let mut spike_tick = None;
    for tick in 1..=400_u64 {
        let _ = orch.run_simulation_step().unwrap();
        if cell_state(&orch, "N1").i64("output_signal").unwrap() == 1 {
            spike_tick = Some(tick);
            assert_eq!(cell_state(&orch, "N2").f64(INPUT_CURRENT).unwrap(), 0.0);
            break;
        }
    }
    assert!(spike_tick.is_some());

    let _ = orch.run_simulation_step().unwrap();
    assert!(cell_state(&orch, "N2").f64(INPUT_CURRENT).unwrap() >= 1.0);
}

#[test]
fn single_neuron_drives_muscles_and_organism() {
    let config = OrganismConfig {
        neurons: 1,
        ..OrganismConfig::default()
    };
    let mut orch = orchestrator(&config);

    let mut peak_contraction: f64 = 0.0;
    for _ in 0..600 {
        let _ = orch.run_simulation_step().unwrap();
        let level = cell_state(&orch, "M1").f64(CONTRACTION_LEVEL).unwrap();
        peak_contraction = peak_contraction.max(level);
    }

    // N1 is the motor neuron here, so its spikes reach the muscles.
    assert!(peak_contraction > 0.0);
    let organism = orch.root().snapshot();
    assert!(organism.f64(HUNGER).unwrap() > 0.5);
    assert!(organism.f64(POSITION_X).unwrap() > 0.0);
    assert!(cell_state(&orch, "neural_circuit").get(MEAN_ACTIVITY).is_some());
}

#[test]
fn same_config_gives_identical_trajectories() {
    fn run(config: &OrganismConfig) -> Vec<String> {
        let mut orch = orchestrator(config);
        (0..300)
            .map(|_| {
                let _ = orch.run_simulation_step().unwrap();
                let mut states = vec![orch.root().snapshot()];
                for id in ["N1", "N2", "N3", "N4", "M1", "M2"] {
                    states.push(cell_state(&orch, id));
                }
                serde_json::to_string(&states).unwrap()
            })
            .collect()
    }

    let config = OrganismConfig::default();
    assert_eq!(run(&config), run(&config));
}
