//! Phase functions for aggregating levels: component, system, organism.
//!
//! Components and systems summarize their children during Mapping and
//! grade the summary during Checking. The organism turns its systems'
//! activity into locomotion and tracks a slowly rising hunger drive.
//!
//! Every aggregate reads children's last committed state, so a parent's
//! Mapping sees what its children produced in the previous parent cycle.

use mict_core::sequencer::{PhaseContext, PhaseError};
use mict_types::State;

/// State key: mean of the children's activity signal.
pub const MEAN_ACTIVITY: &str = "mean_activity";
/// State key: children whose activity signal is positive.
pub const ACTIVE_CHILDREN: &str = "active_children";
/// State key: number of children summarized.
pub const CHILD_COUNT: &str = "child_count";
/// State key: share of active children, recorded by Checking.
pub const PERFORMANCE_METRIC: &str = "performance_metric";

/// Organism state key: x position.
pub const POSITION_X: &str = "position_x";
/// Organism state key: y position.
pub const POSITION_Y: &str = "position_y";
/// Organism state key: x velocity.
pub const VELOCITY_X: &str = "velocity_x";
/// Organism state key: y velocity.
pub const VELOCITY_Y: &str = "velocity_y";
/// Organism state key: hunger drive in `[0, 1]`.
pub const HUNGER: &str = "hunger";
/// Organism state key: whether hunger crossed [`HUNGER_THRESHOLD`].
pub const HUNGRY: &str = "hungry";

/// Organism speed at full muscular activity (units per ms).
pub const MAX_SPEED: f64 = 0.5;
/// Hunger gained per ms.
pub const HUNGER_RATE: f64 = 0.0005;
/// Hunger level at which the organism counts as hungry.
pub const HUNGER_THRESHOLD: f64 = 0.8;
/// Organism integration step (ms).
pub const DT: f64 = 0.1;

/// Mapping for a component or system: summarize the children's `signal`.
///
/// Writes [`MEAN_ACTIVITY`], [`ACTIVE_CHILDREN`] and [`CHILD_COUNT`].
/// Children missing the key count as inactive.
pub fn summarize_children(
    signal: &'static str,
) -> impl FnMut(State, &PhaseContext<'_>) -> Result<State, PhaseError> {
    move |state, ctx| {
        let (count, active, sum) = ctx.child_states().fold(
            (0_usize, 0_usize, 0.0_f64),
            |(count, active, sum), child| {
                let value = child.f64_or(signal, 0.0);
                (
                    count.saturating_add(1),
                    if value > 0.0 { active.saturating_add(1) } else { active },
                    sum + value,
                )
            },
        );
        Ok(state
            .with(MEAN_ACTIVITY, mean(sum, count))
            .with(ACTIVE_CHILDREN, active)
            .with(CHILD_COUNT, count))
    }
}

/// Checking for a component or system: record the share of active children.
pub fn grade_activity(state: State, _ctx: &PhaseContext<'_>) -> Result<State, PhaseError> {
    let active = state.f64_or(ACTIVE_CHILDREN, 0.0);
    let count = state.f64_or(CHILD_COUNT, 0.0);
    let metric = if count > 0.0 { active / count } else { 0.0 };
    Ok(state.with(PERFORMANCE_METRIC, metric))
}

/// Initial organism state: at the origin, at rest, half hungry.
pub fn organism_initial_state() -> State {
    State::new()
        .with(POSITION_X, 0.0)
        .with(POSITION_Y, 0.0)
        .with(VELOCITY_X, 0.0)
        .with(VELOCITY_Y, 0.0)
        .with(HUNGER, 0.5)
        .with(HUNGRY, false)
}

/// Organism state key under which a system's mean activity is recorded.
pub fn activity_key(system_kind: &str) -> String {
    format!("{system_kind}_activity")
}

/// Organism Mapping: record each system's mean activity under
/// `<kind>_activity`.
pub fn organism_mapping(mut state: State, ctx: &PhaseContext<'_>) -> Result<State, PhaseError> {
    for child in ctx.children() {
        let _ = state.set(
            activity_key(child.kind.as_str()),
            child.state.f64_or(MEAN_ACTIVITY, 0.0),
        );
    }
    Ok(state)
}

/// Organism Iteration: muscular activity sets forward speed; position
/// integrates velocity; hunger rises.
pub fn organism_locomotion(
    muscular_kind: &'static str,
) -> impl FnMut(State, &PhaseContext<'_>) -> Result<State, PhaseError> {
    let key = activity_key(muscular_kind);
    move |state, _ctx| {
        let activity = state.f64_or(&key, 0.0).clamp(0.0, 1.0);
        let vx = activity * MAX_SPEED;
        let vy = state.f64_or(VELOCITY_Y, 0.0);
        let x = state.f64(POSITION_X)? + vx * DT;
        let y = state.f64(POSITION_Y)? + vy * DT;
        let hunger = (state.f64(HUNGER)? + HUNGER_RATE * DT).clamp(0.0, 1.0);
        Ok(state
            .with(VELOCITY_X, vx)
            .with(POSITION_X, x)
            .with(POSITION_Y, y)
            .with(HUNGER, hunger))
    }
}

/// Organism Checking: flag hunger above [`HUNGER_THRESHOLD`].
pub fn organism_checking(state: State, _ctx: &PhaseContext<'_>) -> Result<State, PhaseError> {
    let hungry = state.f64(HUNGER)? >= HUNGER_THRESHOLD;
    Ok(state.with(HUNGRY, hungry))
}

#[allow(clippy::cast_precision_loss)] // child counts are small
fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { sum / count as f64 }
}
