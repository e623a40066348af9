//! State registry: the mailbox used for lateral coupling between peers.
//!
//! Entities publish their latest output during Transformation and read
//! their peers' outputs during Mapping. The registry is double-buffered so
//! that a value published during tick `t` is only visible from tick `t + 1`
//! onwards, regardless of the order in which peers are stepped:
//!
//! - [`publish`](Registry::publish) writes to the pending buffer.
//! - [`read`](Registry::read) only sees the visible buffer.
//! - [`end_tick`](Registry::end_tick), called by the orchestrator after each
//!   root cycle, promotes pending entries into the visible buffer.
//!
//! Visible entries persist until overwritten by a later publish or removed
//! by [`clear`](Registry::clear).
//!
//! # Threading
//!
//! [`Registry`] is a cheap-clone handle to unsynchronized shared state and
//! is deliberately `!Send`: the engine is single-threaded, and every clone
//! lives on the same call stack. Driving nodes from several threads would
//! require replacing the inner cell with a lock or a message channel.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use mict_types::{EntityId, State};
use tracing::trace;

#[derive(Debug, Default)]
struct Mailbox {
    visible: BTreeMap<EntityId, State>,
    pending: BTreeMap<EntityId, State>,
}

/// Shared handle to a double-buffered per-entity mailbox.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Rc<RefCell<Mailbox>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `state` as the latest output of `id`. Readers see it after the
    /// next [`end_tick`](Self::end_tick).
    pub fn publish(&self, id: EntityId, state: State) {
        trace!(entity = %id, "registry publish");
        self.inner.borrow_mut().pending.insert(id, state);
    }

    /// The last visible output of `id`, if any.
    pub fn read(&self, id: &EntityId) -> Option<State> {
        self.inner.borrow().visible.get(id).cloned()
    }

    /// Read one numeric field of a peer's visible output.
    pub fn read_f64(&self, id: &EntityId, key: &str) -> Option<f64> {
        self.inner
            .borrow()
            .visible
            .get(id)
            .and_then(|state| state.get(key))
            .and_then(serde_json::Value::as_f64)
    }

    /// Whether `id` has a visible entry.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.inner.borrow().visible.contains_key(id)
    }

    /// Promote every pending entry into the visible buffer. Returns the
    /// number of entries promoted.
    pub fn end_tick(&self) -> usize {
        let mut mailbox = self.inner.borrow_mut();
        let Mailbox { visible, pending } = &mut *mailbox;
        let promoted = pending.len();
        visible.append(pending);
        promoted
    }

    /// Remove every visible and pending entry.
    pub fn clear(&self) {
        let mut mailbox = self.inner.borrow_mut();
        mailbox.visible.clear();
        mailbox.pending.clear();
    }

    /// Number of visible entries.
    pub fn len(&self) -> usize {
        self.inner.borrow().visible.len()
    }

    /// Whether there are no visible entries.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().visible.is_empty()
    }

    /// Number of entries waiting for the next [`end_tick`](Self::end_tick).
    pub fn pending_len(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    /// Copy of every visible entry, ordered by entity id.
    pub fn snapshot(&self) -> BTreeMap<EntityId, State> {
        self.inner.borrow().visible.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn publish_is_invisible_until_end_tick() {
        let registry = Registry::new();
        let id = EntityId::from("N1");
        registry.publish(id.clone(), State::new().with("output_signal", 1));

        assert!(registry.read(&id).is_none());
        assert_eq!(registry.pending_len(), 1);

        assert_eq!(registry.end_tick(), 1);
        assert_eq!(registry.read_f64(&id, "output_signal"), Some(1.0));
        assert_eq!(registry.pending_len(), 0);
    }

    #[test]
    fn entries_persist_across_ticks() {
        let registry = Registry::new();
        let id = EntityId::from("N1");
        registry.publish(id.clone(), State::new().with("v", 1));
        let _ = registry.end_tick();
        let _ = registry.end_tick();
        assert!(registry.contains(&id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn later_publish_overwrites() {
        let registry = Registry::new();
        let id = EntityId::from("N1");
        registry.publish(id.clone(), State::new().with("v", 1));
        let _ = registry.end_tick();
        registry.publish(id.clone(), State::new().with("v", 2));
        assert_eq!(registry.read(&id).unwrap().i64("v").unwrap(), 1);
        let _ = registry.end_tick();
        assert_eq!(registry.read(&id).unwrap().i64("v").unwrap(), 2);
    }

    #[test]
    fn clones_share_storage() {
        let a = Registry::new();
        let b = a.clone();
        a.publish(EntityId::from("M1"), State::new());
        let _ = b.end_tick();
        assert!(a.contains(&EntityId::from("M1")));
    }

    #[test]
    fn clear_drops_everything() {
        let registry = Registry::new();
        registry.publish(EntityId::from("a"), State::new());
        let _ = registry.end_tick();
        registry.publish(EntityId::from("b"), State::new());
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.pending_len(), 0);
    }
}
