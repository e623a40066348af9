//! Muscle cell: contracts while driven, relaxes otherwise.
//!
//! The drive comes either from a fixed square wave (50 cycles on, 50 off)
//! or from a motor neuron's `output_signal` read through the registry.
//! Contraction is clamped to `[0, MAX_CONTRACTION]`.

use mict_core::node::{Node, NodeError};
use mict_core::registry::Registry;
use mict_core::sequencer::{PhaseContext, PhaseError};
use mict_types::{EntityId, Level, Phase, State};

use crate::neuron::OUTPUT_SIGNAL;

/// Upper bound of the contraction level.
pub const MAX_CONTRACTION: f64 = 1.0;
/// Contraction rate while driven (per ms).
pub const CONTRACTION_RATE: f64 = 0.1;
/// Relaxation rate while undriven (per ms).
pub const RELAXATION_RATE: f64 = 0.05;
/// Integration step (ms).
pub const DT: f64 = 0.1;
/// Half-period of the built-in square-wave drive, in cycles.
pub const DRIVE_HALF_PERIOD: i64 = 50;

/// Entity kind tag for muscle cells.
pub const MUSCLE_KIND: &str = "muscle";

/// State key: contraction level in `[0, MAX_CONTRACTION]`.
pub const CONTRACTION_LEVEL: &str = "contraction_level";
/// State key: drive seen by the last Mapping (0 or 1).
pub const INPUT_SIGNAL: &str = "input_signal";
/// State key: Mapping phases run so far.
pub const STEP_COUNT: &str = "step_count";
/// State key: whether the cell is at full contraction.
pub const FULLY_CONTRACTED: &str = "fully_contracted";

/// Where a muscle cell's drive comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuscleDrive {
    /// Built-in square wave: on for 50 cycles, off for 50.
    Alternating,
    /// The `output_signal` of a motor neuron, read from the registry.
    Neuron(EntityId),
}

/// Initial state of a relaxed muscle cell.
pub fn initial_state() -> State {
    State::new()
        .with(CONTRACTION_LEVEL, 0.0)
        .with(INPUT_SIGNAL, 0)
        .with(STEP_COUNT, 0)
        .with(FULLY_CONTRACTED, false)
}

/// Contraction after one step with or without drive, clamped.
pub fn contraction_step(level: f64, driven: bool) -> f64 {
    let next = if driven {
        level + CONTRACTION_RATE * DT
    } else {
        level - RELAXATION_RATE * DT
    };
    next.clamp(0.0, MAX_CONTRACTION)
}

/// Square-wave drive for the given step count.
pub const fn alternating_drive(step_count: i64) -> bool {
    step_count.div_euclid(DRIVE_HALF_PERIOD).rem_euclid(2) == 0
}

/// Build a muscle cell node.
///
/// The cell publishes its state after every Transformation so that
/// aggregating levels and peers can read it.
pub fn muscle(
    id: impl Into<EntityId>,
    drive: MuscleDrive,
    registry: &Registry,
) -> Result<Node, NodeError> {
    Node::builder(id, MUSCLE_KIND, Level::Cell, initial_state())
        .registry(registry.clone())
        .publish_on_transformation()
        .phase(Phase::Mapping, mapping(drive))
        .phase(Phase::Iteration, iteration)
        .phase(Phase::Checking, checking)
        .build()
}

fn mapping(drive: MuscleDrive) -> impl FnMut(State, &PhaseContext<'_>) -> Result<State, PhaseError> {
    move |state, ctx| {
        let step_count = state.i64_or(STEP_COUNT, 0);
        let driven = match &drive {
            MuscleDrive::Alternating => alternating_drive(step_count),
            MuscleDrive::Neuron(source) => ctx
                .read(source)
                .is_some_and(|peer| peer.f64_or(OUTPUT_SIGNAL, 0.0) > 0.0),
        };
        Ok(state
            .with(INPUT_SIGNAL, i64::from(driven))
            .with(STEP_COUNT, step_count.saturating_add(1)))
    }
}

fn iteration(state: State, _ctx: &PhaseContext<'_>) -> Result<State, PhaseError> {
    let level = state.f64(CONTRACTION_LEVEL)?;
    let driven = state.i64(INPUT_SIGNAL)? > 0;
    Ok(state.with(CONTRACTION_LEVEL, contraction_step(level, driven)))
}

fn checking(state: State, _ctx: &PhaseContext<'_>) -> Result<State, PhaseError> {
    let full = state.f64(CONTRACTION_LEVEL)? >= MAX_CONTRACTION;
    Ok(state.with(FULLY_CONTRACTED, full))
}
