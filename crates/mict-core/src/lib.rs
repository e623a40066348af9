//! Cycle engine and hierarchical composition for the MICT simulation.
//!
//! Every simulated entity advances through the same fixed phases
//! (Mapping, Iteration, Checking, Transformation). A parent's Iteration
//! phase drives one phase of each child, so repeated full cycles of the
//! root cascade through the whole containment tree deterministically.
//!
//! # Modules
//!
//! - [`sequencer`] -- [`StageSequencer`]: the one-phase-per-call cycle
//!   engine with commit and error hooks.
//! - [`node`] -- [`Node`]: a sequencer that owns child nodes and fans out
//!   to them during Iteration.
//! - [`registry`] -- [`Registry`]: double-buffered mailbox for lateral
//!   coupling between peers with one-tick latency.
//! - [`clock`] -- Simulated-time clock.
//! - [`operator`] -- Cooperative stop, pause, and pacing controls.
//! - [`runner`] -- [`Orchestrator`]: drives the root through full cycles.
//! - [`config`] -- Configuration loading from YAML into typed structs.
//!
//! [`StageSequencer`]: sequencer::StageSequencer
//! [`Node`]: node::Node
//! [`Registry`]: registry::Registry
//! [`Orchestrator`]: runner::Orchestrator

pub mod clock;
pub mod config;
pub mod node;
pub mod operator;
pub mod registry;
pub mod runner;
pub mod sequencer;
