//! Integration tests for lateral coupling through the registry, driven by
//! the orchestrator.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::sync::Arc;
use std::time::Duration;

use mict_core::clock::SimulationClock;
use mict_core::config::SimulationBoundsConfig;
use mict_core::node::{FanOut, Node};
use mict_core::operator::Operator;
use mict_core::registry::Registry;
use mict_core::runner::Orchestrator;
use mict_types::{EntityId, Level, Phase, State};

fn publisher(registry: &Registry) -> Node {
    Node::builder("A", "publisher", Level::Cell, State::new().with("value", 0))
        .registry(registry.clone())
        .publish_on_transformation()
        .phase(Phase::Iteration, |state, _ctx| {
            let value = state.i64("value")?;
            Ok(state.with("value", value.saturating_add(1)))
        })
        .build()
        .unwrap()
}

fn subscriber(registry: &Registry) -> Node {
    Node::builder("B", "subscriber", Level::Cell, State::new())
        .registry(registry.clone())
        .phase(Phase::Mapping, |mut state, ctx| {
            match ctx.read(&EntityId::from("A")) {
                Some(peer) => {
                    let _ = state.set("seen", peer.i64("value")?);
                }
                None => {
                    let _ = state.remove("seen");
                }
            }
            Ok(state)
        })
        .build()
        .unwrap()
}

fn orchestrator(children: Vec<Node>, registry: Registry) -> Orchestrator {
    let root = Node::builder("root", "organism", Level::Organism, State::new())
        .fan_out(FanOut::FullCycle)
        .children(children)
        .build()
        .unwrap();
    let bounds = SimulationBoundsConfig::default();
    Orchestrator::new(
        root,
        registry,
        SimulationClock::from_config(&bounds).unwrap(),
        Arc::new(Operator::new(Duration::ZERO, &bounds)),
    )
}

fn seen_by_b(orch: &Orchestrator) -> Option<i64> {
    orch.root()
        .find(&EntityId::from("B"))
        .unwrap()
        .state()
        .i64("seen")
        .ok()
}

#[test]
fn published_value_is_read_one_tick_later() {
    let registry = Registry::new();
    let mut orch = orchestrator(vec![publisher(&registry), subscriber(&registry)], registry);

    let summary = orch.run_simulation_step().unwrap();
    assert_eq!(summary.published, 1);
    // A published 1 during tick 1; B's Mapping of tick 1 saw nothing.
    assert_eq!(seen_by_b(&orch), None);

    for tick in 2..=10 {
        let _ = orch.run_simulation_step().unwrap();
        assert_eq!(seen_by_b(&orch), Some(tick - 1));
    }
}

#[test]
fn latency_does_not_depend_on_sibling_order() {
    let registry = Registry::new();
    let mut orch = orchestrator(vec![subscriber(&registry), publisher(&registry)], registry);

    let _ = orch.run_simulation_step().unwrap();
    assert_eq!(seen_by_b(&orch), None);
    let _ = orch.run_simulation_step().unwrap();
    assert_eq!(seen_by_b(&orch), Some(1));
}

#[test]
fn registry_entries_survive_until_overwritten() {
    let registry = Registry::new();
    let mut orch = orchestrator(vec![publisher(&registry)], registry.clone());

    let _ = orch.run_ticks(3).unwrap();
    assert_eq!(registry.read_f64(&EntityId::from("A"), "value"), Some(3.0));

    registry.clear();
    assert!(registry.is_empty());
    let _ = orch.run_simulation_step().unwrap();
    assert_eq!(registry.read_f64(&EntityId::from("A"), "value"), Some(4.0));
}

#[tokio::test(start_paused = true)]
async fn bounded_run_keeps_coupling_intact() {
    let registry = Registry::new();
    let root = Node::builder("root", "organism", Level::Organism, State::new())
        .fan_out(FanOut::FullCycle)
        .child(publisher(&registry))
        .child(subscriber(&registry))
        .build()
        .unwrap();
    let bounds = SimulationBoundsConfig {
        max_ticks: 25,
        ..SimulationBoundsConfig::default()
    };
    let mut orch = Orchestrator::new(
        root,
        registry,
        SimulationClock::from_config(&bounds).unwrap(),
        Arc::new(Operator::from_config(&bounds)),
    );

    let result = orch
        .run_simulation(&mut mict_core::runner::NoOpCallback)
        .await
        .unwrap();

    assert_eq!(result.total_ticks, 25);
    assert_eq!(seen_by_b(&orch), Some(24));
    assert_eq!(result.overruns, 0);
}
