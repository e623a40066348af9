//! The key-value state record carried through every phase function.
//!
//! A [`State`] is owned by exactly one sequencer at a time. Phase functions
//! receive it by value and hand back a replacement; nothing in the engine
//! edits a state in place. Keys are kept ordered so that serialized
//! snapshots are byte-for-byte reproducible across runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error returned when a typed read of a state field fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateValueError {
    /// The key is not present in the record.
    #[error("missing state key `{key}`")]
    Missing {
        /// The key that was looked up.
        key: String,
    },

    /// The key is present but holds a value of another type.
    #[error("state key `{key}` is not a {expected}")]
    WrongType {
        /// The key that was looked up.
        key: String,
        /// The type the caller asked for.
        expected: &'static str,
    },
}

/// Ordered key-value record describing one entity at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(BTreeMap<String, Value>);

impl State {
    /// Create an empty record.
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert, for composing initial states.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a field. Returns the previous value, if any.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Borrow the raw value of a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Whether the record holds the given key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of fields in the record.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Copy every field of `other` into this record, overwriting on conflict.
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Read a numeric field as `f64`.
    pub fn f64(&self, key: &str) -> Result<f64, StateValueError> {
        let value = self.require(key)?;
        value.as_f64().ok_or_else(|| StateValueError::WrongType {
            key: key.to_owned(),
            expected: "number",
        })
    }

    /// Read a numeric field as `f64`, falling back to `default` when the
    /// field is absent or not a number.
    pub fn f64_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    /// Read an integer field as `i64`.
    pub fn i64(&self, key: &str) -> Result<i64, StateValueError> {
        let value = self.require(key)?;
        value.as_i64().ok_or_else(|| StateValueError::WrongType {
            key: key.to_owned(),
            expected: "integer",
        })
    }

    /// Read an integer field as `i64`, falling back to `default`.
    pub fn i64_or(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(Value::as_i64).unwrap_or(default)
    }

    /// Read a boolean field.
    pub fn bool(&self, key: &str) -> Result<bool, StateValueError> {
        let value = self.require(key)?;
        value.as_bool().ok_or_else(|| StateValueError::WrongType {
            key: key.to_owned(),
            expected: "boolean",
        })
    }

    /// Read a boolean field, falling back to `default`.
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Read a string field.
    pub fn str(&self, key: &str) -> Result<&str, StateValueError> {
        let value = self.require(key)?;
        value.as_str().ok_or_else(|| StateValueError::WrongType {
            key: key.to_owned(),
            expected: "string",
        })
    }

    fn require(&self, key: &str) -> Result<&Value, StateValueError> {
        self.0.get(key).ok_or_else(|| StateValueError::Missing {
            key: key.to_owned(),
        })
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for State {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, Value>> for State {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn typed_reads() {
        let state = State::new()
            .with("x", 3)
            .with("v", -70.0)
            .with("fired", true)
            .with("name", "N1");

        assert_eq!(state.i64("x").unwrap(), 3);
        assert_eq!(state.f64("v").unwrap(), -70.0);
        assert!(state.bool("fired").unwrap());
        assert_eq!(state.str("name").unwrap(), "N1");
    }

    #[test]
    fn integers_read_as_floats() {
        let state = State::new().with("x", 5);
        assert_eq!(state.f64("x").unwrap(), 5.0);
    }

    #[test]
    fn missing_and_wrong_type() {
        let state = State::new().with("fired", true);
        assert_eq!(
            state.f64("v"),
            Err(StateValueError::Missing { key: "v".to_owned() })
        );
        assert_eq!(
            state.f64("fired"),
            Err(StateValueError::WrongType {
                key: "fired".to_owned(),
                expected: "number",
            })
        );
    }

    #[test]
    fn defaults_apply_when_absent() {
        let state = State::new();
        assert_eq!(state.f64_or("base_current", 1.0), 1.0);
        assert_eq!(state.i64_or("step_count", 0), 0);
        assert!(!state.bool_or("fired_this_step", false));
    }

    #[test]
    fn merge_overwrites() {
        let mut a = State::new().with("x", 1).with("y", 2);
        let b = State::new().with("y", 20).with("z", 30);
        a.merge(&b);
        assert_eq!(a.i64("x").unwrap(), 1);
        assert_eq!(a.i64("y").unwrap(), 20);
        assert_eq!(a.i64("z").unwrap(), 30);
    }

    #[test]
    fn serialization_is_key_ordered() {
        let state: State = [("b", 2), ("a", 1)].into_iter().collect();
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"a":1,"b":2}"#);
    }
}
