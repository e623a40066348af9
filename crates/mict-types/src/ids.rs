//! Identifier types for entities in the simulated hierarchy.
//!
//! Entities are named by the integrator (`"N1"`, `"circuit1"`, `"worm1"`),
//! so [`EntityId`] wraps a string rather than a generated UUID. Each
//! orchestrator run gets a [`RunId`] (UUID v7, time-ordered) so log lines
//! from separate runs can be told apart.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_name {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new name from anything string-like.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_name! {
    /// Unique identity of an entity (cell, component, system, organism).
    ///
    /// Identity is the key under which an entity publishes into the
    /// registry, so it must be unique within one simulation.
    EntityId
}

define_name! {
    /// Free-form type tag of an entity, e.g. `neuron` or `muscle_group`.
    EntityKind
}

/// Correlation identifier for a single orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new run identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_displays_raw_name() {
        let id = EntityId::new("N1");
        assert_eq!(id.to_string(), "N1");
        assert_eq!(id.as_str(), "N1");
    }

    #[test]
    fn entity_id_serializes_transparently() {
        let id = EntityId::from("circuit1");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"circuit1\"");
    }

    #[test]
    fn entity_ids_order_lexically() {
        let a = EntityId::from("A");
        let b = EntityId::from("B");
        assert!(a < b);
    }

    #[test]
    fn run_ids_are_unique() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);
        assert_ne!(a.into_inner(), Uuid::nil());
    }
}
