//! Shared type definitions for the MICT hierarchical cycle engine.
//!
//! Every crate in the workspace speaks in terms of these types: entity
//! identities, the fixed phase vocabulary, containment levels, and the
//! key-value [`State`] record that flows through every phase function.
//!
//! # Modules
//!
//! - [`ids`] -- Entity identities and per-run correlation IDs
//! - [`enums`] -- [`Phase`] and [`Level`] enumerations
//! - [`state`] -- The [`State`] record and its typed accessors

pub mod enums;
pub mod ids;
pub mod state;

// Re-export all public types at crate root for convenience.
pub use enums::{Level, Phase};
pub use ids::{EntityId, EntityKind, RunId};
pub use state::{State, StateValueError};
