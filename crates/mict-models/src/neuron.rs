//! Leaky integrate-and-fire neuron.
//!
//! | Phase          | Effect                                                    |
//! |----------------|-----------------------------------------------------------|
//! | Mapping        | input current = base current + sum of weighted spikes     |
//! | Iteration      | one forward-Euler step of the membrane equation           |
//! | Checking       | `fired_this_step` when the potential crosses threshold    |
//! | Transformation | reset on fire, set `output_signal`, publish to registry   |
//!
//! Presynaptic spikes are read from the registry, so a spike emitted during
//! tick `t` drives its targets during tick `t + 1`.

use mict_core::node::{Node, NodeError};
use mict_core::registry::Registry;
use mict_core::sequencer::{PhaseContext, PhaseError};
use mict_types::{EntityId, Level, Phase, State};
use serde_json::Value;

/// Resting membrane potential (mV).
pub const V_REST: f64 = -70.0;
/// Firing threshold (mV).
pub const V_THRESHOLD: f64 = -55.0;
/// Potential after a spike (mV).
pub const V_RESET: f64 = -75.0;
/// Membrane time constant (ms).
pub const TAU_M: f64 = 10.0;
/// Membrane resistance (MΩ).
pub const R_M: f64 = 10.0;
/// Integration step (ms).
pub const DT: f64 = 0.1;

/// Entity kind tag for neurons.
pub const NEURON_KIND: &str = "neuron";

/// State key: membrane potential.
pub const MEMBRANE_POTENTIAL: &str = "membrane_potential";
/// State key: constant external input current.
pub const BASE_CURRENT: &str = "base_current";
/// State key: total input current gathered during Mapping.
pub const INPUT_CURRENT: &str = "input_current";
/// State key: presynaptic signals read during the last Mapping. Rebuilt
/// from scratch each Mapping; earlier entries never carry over.
pub const RECEIVED_SIGNALS: &str = "received_signals";
/// State key: threshold crossing seen by Checking.
pub const FIRED_THIS_STEP: &str = "fired_this_step";
/// State key: 1 if the neuron spiked this cycle, else 0.
pub const OUTPUT_SIGNAL: &str = "output_signal";
/// State key: spikes emitted since the neuron was built.
pub const SPIKE_COUNT: &str = "spike_count";

/// A weighted connection from a presynaptic neuron.
#[derive(Debug, Clone, PartialEq)]
pub struct Synapse {
    /// The presynaptic neuron.
    pub source: EntityId,
    /// Current injected per unit of presynaptic output.
    pub weight: f64,
}

/// Construction parameters for one neuron.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeuronParams {
    /// Constant external input current.
    pub base_current: f64,
    /// Incoming connections.
    pub synapses: Vec<Synapse>,
}

/// Initial state of a neuron at rest.
pub fn initial_state(base_current: f64) -> State {
    State::new()
        .with(MEMBRANE_POTENTIAL, V_REST)
        .with(BASE_CURRENT, base_current)
        .with(INPUT_CURRENT, 0.0)
        .with(FIRED_THIS_STEP, false)
        .with(OUTPUT_SIGNAL, 0)
        .with(SPIKE_COUNT, 0)
}

/// One forward-Euler step of `tau * dv/dt = -(v - v_rest) + R * I`.
pub fn membrane_step(v: f64, input_current: f64) -> f64 {
    v + (-(v - V_REST) + R_M * input_current) / TAU_M * DT
}

/// Build a neuron node wired to `registry`.
///
/// The neuron publishes its state after every Transformation, and its
/// Mapping reads each synapse's source from the registry.
pub fn neuron(
    id: impl Into<EntityId>,
    params: NeuronParams,
    registry: &Registry,
) -> Result<Node, NodeError> {
    Node::builder(id, NEURON_KIND, Level::Cell, initial_state(params.base_current))
        .registry(registry.clone())
        .publish_on_transformation()
        .phase(Phase::Mapping, mapping(params.synapses))
        .phase(Phase::Iteration, iteration)
        .phase(Phase::Checking, checking)
        .phase(Phase::Transformation, transformation)
        .build()
}

fn mapping(
    synapses: Vec<Synapse>,
) -> impl FnMut(State, &PhaseContext<'_>) -> Result<State, PhaseError> {
    move |state, ctx| {
        let mut current = state.f64_or(BASE_CURRENT, 0.0);
        let mut received = serde_json::Map::new();
        for synapse in &synapses {
            let signal = ctx
                .read(&synapse.source)
                .map_or(0.0, |peer| peer.f64_or(OUTPUT_SIGNAL, 0.0));
            current += synapse.weight * signal;
            let _ = received.insert(synapse.source.to_string(), Value::from(signal));
        }
        Ok(state
            .with(INPUT_CURRENT, current)
            .with(RECEIVED_SIGNALS, Value::Object(received)))
    }
}

fn iteration(state: State, _ctx: &PhaseContext<'_>) -> Result<State, PhaseError> {
    let v = state.f64(MEMBRANE_POTENTIAL)?;
    let input = state.f64(INPUT_CURRENT)?;
    let next = membrane_step(v, input);
    if !next.is_finite() {
        return Err(PhaseError::InvalidValue {
            key: MEMBRANE_POTENTIAL.to_owned(),
            reason: format!("diverged to {next}"),
        });
    }
    Ok(state
        .with(MEMBRANE_POTENTIAL, next)
        .with(FIRED_THIS_STEP, false))
}

fn checking(state: State, _ctx: &PhaseContext<'_>) -> Result<State, PhaseError> {
    let fired = state.f64(MEMBRANE_POTENTIAL)? >= V_THRESHOLD;
    Ok(state.with(FIRED_THIS_STEP, fired))
}

fn transformation(state: State, _ctx: &PhaseContext<'_>) -> Result<State, PhaseError> {
    if state.bool_or(FIRED_THIS_STEP, false) {
        let spikes = state.i64_or(SPIKE_COUNT, 0).saturating_add(1);
        Ok(state
            .with(MEMBRANE_POTENTIAL, V_RESET)
            .with(OUTPUT_SIGNAL, 1)
            .with(FIRED_THIS_STEP, false)
            .with(SPIKE_COUNT, spikes))
    } else {
        Ok(state.with(OUTPUT_SIGNAL, 0))
    }
}
