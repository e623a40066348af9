//! Pluggable biophysical models for the MICT simulation.
//!
//! Nothing in here is part of the cycle engine. Each model is a set of
//! phase functions bound to a [`Node`] at build time, and the demo
//! organism is simply a tree of such nodes.
//!
//! # Modules
//!
//! - [`neuron`] -- Leaky integrate-and-fire neuron with registry-borne
//!   synaptic input.
//! - [`muscle`] -- Muscle cell that contracts under input and relaxes
//!   without it.
//! - [`aggregate`] -- Phase functions for component, system, and organism
//!   levels that summarize their children.
//! - [`organism`] -- Builds the organism → system → component → cell tree
//!   from configuration.
//! - [`error`] -- Error types for model construction.
//!
//! [`Node`]: mict_core::node::Node

pub mod aggregate;
pub mod error;
pub mod muscle;
pub mod neuron;
pub mod organism;

pub use error::ModelError;
pub use organism::{OrganismLayout, build_organism};
