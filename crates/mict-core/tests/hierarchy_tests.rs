//! Integration tests for hierarchical composition: fan-out order, fault
//! containment across levels, and reproducibility of whole-tree runs.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::cell::RefCell;
use std::rc::Rc;

use mict_core::node::{FanOut, Node};
use mict_core::registry::Registry;
use mict_core::sequencer::PhaseError;
use mict_types::{EntityId, Level, Phase, State};

type Trace = Rc<RefCell<Vec<String>>>;

fn traced_cell(id: &str, trace: &Trace) -> Node {
    let trace = Rc::clone(trace);
    Node::builder(id, "neuron", Level::Cell, State::new().with("x", 0))
        .phase(Phase::Iteration, move |state, ctx| {
            trace.borrow_mut().push(ctx.entity().to_string());
            let x = state.i64("x")?;
            Ok(state.with("x", x.saturating_add(1)))
        })
        .build()
        .unwrap()
}

#[test]
fn organism_tick_reaches_every_cell_in_supplied_order() {
    let trace: Trace = Rc::default();

    let circuit = Node::builder("circuit", "neural_circuit", Level::Component, State::new())
        .fan_out(FanOut::FullCycle)
        .children(["N1", "N2", "N3"].map(|id| traced_cell(id, &trace)))
        .build()
        .unwrap();
    let muscles = Node::builder("group", "muscle_group", Level::Component, State::new())
        .fan_out(FanOut::FullCycle)
        .children(["M1", "M2"].map(|id| traced_cell(id, &trace)))
        .build()
        .unwrap();
    let nervous = Node::builder("nervous", "nervous_system", Level::System, State::new())
        .fan_out(FanOut::FullCycle)
        .child(circuit)
        .build()
        .unwrap();
    let muscular = Node::builder("muscular", "muscular_system", Level::System, State::new())
        .fan_out(FanOut::FullCycle)
        .child(muscles)
        .build()
        .unwrap();
    let mut organism = Node::builder("worm1", "organism", Level::Organism, State::new())
        .fan_out(FanOut::FullCycle)
        .child(nervous)
        .child(muscular)
        .build()
        .unwrap();

    for _ in 0..3 {
        let _ = organism.run_full_cycle();
    }

    let expected: Vec<String> = ["N1", "N2", "N3", "M1", "M2"]
        .repeat(3)
        .into_iter()
        .map(str::to_owned)
        .collect();
    assert_eq!(*trace.borrow(), expected);
    for id in ["N1", "N2", "N3", "M1", "M2"] {
        let cell = organism.find(&EntityId::from(id)).unwrap();
        assert_eq!(cell.state().i64("x").unwrap(), 3);
        assert_eq!(cell.cycles_completed(), 3);
    }
    assert_eq!(organism.descendant_count(), 9);
}

#[test]
fn fault_in_one_cell_leaves_siblings_and_parents_running() {
    let trace: Trace = Rc::default();
    let broken = Node::builder("broken", "neuron", Level::Cell, State::new().with("v", -70.0))
        .phase(Phase::Iteration, |_state, _ctx| {
            Err(PhaseError::InvalidValue {
                key: "v".to_owned(),
                reason: "diverged".to_owned(),
            })
        })
        .on_error(|_, _, _| {})
        .build()
        .unwrap();

    let mut circuit = Node::builder("circuit", "neural_circuit", Level::Component, State::new())
        .fan_out(FanOut::FullCycle)
        .child(traced_cell("a", &trace))
        .child(broken)
        .child(traced_cell("b", &trace))
        .phase(Phase::Mapping, |state, ctx| {
            let sum: i64 = ctx.child_states().map(|s| s.i64_or("x", 0)).sum();
            Ok(state.with("x_sum", sum))
        })
        .build()
        .unwrap();

    for _ in 0..10 {
        let _ = circuit.run_full_cycle();
    }

    let broken = circuit.find(&EntityId::from("broken")).unwrap();
    assert_eq!(broken.state().f64("v").unwrap(), -70.0);
    assert_eq!(broken.faults().for_phase(Phase::Iteration), 10);
    assert_eq!(broken.cycles_completed(), 10);
    assert_eq!(trace.borrow().len(), 20);
    assert_eq!(circuit.faults().total(), 0);
    assert_eq!(circuit.total_faults(), 10);
    // Mapping of cycle 10 saw the children after 9 cycles each.
    assert_eq!(circuit.state().i64("x_sum").unwrap(), 18);
}

fn coupled_pair(registry: &Registry) -> Node {
    let source = Node::builder("source", "oscillator", Level::Cell, State::new().with("x", 1.0))
        .registry(registry.clone())
        .publish_on_transformation()
        .phase(Phase::Iteration, |state, _ctx| {
            let x = state.f64("x")?;
            Ok(state.with("x", (x * 3.7).rem_euclid(1.0) + 0.1))
        })
        .build()
        .unwrap();
    let sink = Node::builder("sink", "integrator", Level::Cell, State::new().with("acc", 0.0))
        .registry(registry.clone())
        .phase(Phase::Mapping, |state, ctx| {
            let input = ctx
                .read(&EntityId::from("source"))
                .map_or(0.0, |s| s.f64_or("x", 0.0));
            Ok(state.with("input", input))
        })
        .phase(Phase::Iteration, |state, _ctx| {
            let acc = state.f64("acc")? + state.f64_or("input", 0.0);
            Ok(state.with("acc", acc))
        })
        .build()
        .unwrap();
    Node::builder("pair", "circuit", Level::Component, State::new())
        .fan_out(FanOut::FullCycle)
        .child(sink)
        .child(source)
        .build()
        .unwrap()
}

fn trajectory(ticks: usize) -> Vec<String> {
    let registry = Registry::new();
    let mut root = coupled_pair(&registry);
    let mut out = Vec::with_capacity(ticks);
    for _ in 0..ticks {
        let _ = root.run_full_cycle();
        let _ = registry.end_tick();
        let states: Vec<&State> = root.child_states();
        out.push(serde_json::to_string(&states).unwrap());
    }
    out
}

#[test]
fn identical_runs_produce_identical_trajectories() {
    let first = trajectory(200);
    let second = trajectory(200);
    assert_eq!(first, second);
    assert_ne!(first.first(), first.last());
}
