//! Hierarchical node: one sequencer plus the children it drives.
//!
//! Every level of the containment hierarchy (cell, component, system,
//! organism) is a [`Node`]. A node owns its children outright; the tree has
//! no shared or back references. Calling [`step`](Node::step) runs one
//! phase of the node's own sequencer, and when that phase is
//! [`Phase::Iteration`] it then drives every child once, in the order the
//! children were supplied.
//!
//! How much of a child one parent Iteration drives is set by [`FanOut`]:
//!
//! ```text
//! FanOut::Step        parent cycle -> child.step()            (one child phase)
//! FanOut::FullCycle   parent cycle -> child.run_full_cycle()  (one child cycle)
//! ```
//!
//! With `FullCycle` at every level, one full cycle of the root is one full
//! cycle of every node in the tree.
//!
//! A node sees children's states through [`PhaseContext::children`] but
//! never learns whether a child's phase failed. Failures stay inside the
//! child that owns the failing phase function.
//!
//! [`PhaseContext::children`]: crate::sequencer::PhaseContext::children

use std::collections::BTreeSet;

use mict_types::{EntityId, EntityKind, Level, Phase, State};
use tracing::debug;

use crate::registry::Registry;
use crate::sequencer::{
    ChildView, FaultLedger, PhaseContext, PhaseError, PhaseOutcome, SequencerBuilder,
    SequencerError, StageSequencer,
};

/// Errors that can occur while building a node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    /// The node's sequencer configuration is invalid.
    #[error("sequencer error in {id}: {source}")]
    Sequencer {
        /// The node being built.
        id: EntityId,
        /// The underlying sequencer error.
        source: SequencerError,
    },

    /// The same identity appears twice in the subtree.
    #[error("duplicate entity id in hierarchy: {id}")]
    DuplicateEntity {
        /// The repeated identity.
        id: EntityId,
    },
}

/// How a node drives its children during its Iteration phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FanOut {
    /// Call `step()` once on each child: one child phase per parent Iteration.
    #[default]
    Step,
    /// Run one full cycle of each child per parent Iteration.
    FullCycle,
}

/// An entity at any containment level.
pub struct Node {
    id: EntityId,
    kind: EntityKind,
    level: Level,
    sequencer: StageSequencer,
    children: Vec<Self>,
    registry: Option<Registry>,
    publish_on_transformation: bool,
    fan_out: FanOut,
}

impl Node {
    /// Start building a node.
    ///
    /// The node's identity is recorded in its initial state under the
    /// level's id key (`cell_id`, `component_id`, ...). The phase list
    /// defaults to [`Phase::CANONICAL`].
    pub fn builder(
        id: impl Into<EntityId>,
        kind: impl Into<EntityKind>,
        level: Level,
        initial: State,
    ) -> NodeBuilder {
        let id = id.into();
        let initial = initial.with(level.id_key(), id.as_str());
        NodeBuilder {
            sequencer: StageSequencer::builder(id.clone(), Phase::CANONICAL, initial),
            id,
            kind: kind.into(),
            level,
            children: Vec::new(),
            registry: None,
            publish_on_transformation: false,
            fan_out: FanOut::Step,
        }
    }

    /// Advance this node by exactly one phase.
    ///
    /// If the phase that ran was Iteration, every child is then driven once
    /// per the node's [`FanOut`], in order, whatever the outcome of this
    /// node's own phase or of any child's. The returned outcome describes
    /// this node's phase only.
    pub fn step(&mut self) -> PhaseOutcome {
        let outcome = {
            let views: Vec<ChildView<'_>> = self.children.iter().map(Self::view).collect();
            self.sequencer.advance_with(&views, self.registry.as_ref())
        };

        match outcome.phase() {
            Phase::Iteration => {
                for child in &mut self.children {
                    match self.fan_out {
                        FanOut::Step => {
                            let _ = child.step();
                        }
                        FanOut::FullCycle => {
                            let _ = child.run_full_cycle();
                        }
                    }
                }
            }
            Phase::Transformation if self.publish_on_transformation && outcome.is_committed() => {
                if let Some(registry) = &self.registry {
                    registry.publish(self.id.clone(), self.sequencer.state().clone());
                }
            }
            _ => {}
        }

        outcome
    }

    /// Step once per configured phase (one full cycle from the start).
    pub fn run_full_cycle(&mut self) -> Vec<PhaseOutcome> {
        let count = self.sequencer.phase_count();
        (0..count).map(|_| self.step()).collect()
    }

    fn view(&self) -> ChildView<'_> {
        ChildView {
            id: &self.id,
            kind: &self.kind,
            level: self.level,
            state: self.sequencer.state(),
        }
    }

    /// The node's identity.
    pub const fn id(&self) -> &EntityId {
        &self.id
    }

    /// The node's type tag.
    pub const fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// The node's containment level.
    pub const fn level(&self) -> Level {
        self.level
    }

    /// The current committed state, borrowed read-only.
    pub const fn state(&self) -> &State {
        self.sequencer.state()
    }

    /// An owned copy of the current state, independent of later steps.
    pub fn snapshot(&self) -> State {
        self.sequencer.state().clone()
    }

    /// The phase the next `step` will run.
    pub fn current_phase(&self) -> Phase {
        self.sequencer.current_phase()
    }

    /// Index of the phase the next `step` will run.
    pub const fn phase_index(&self) -> usize {
        self.sequencer.phase_index()
    }

    /// Full cycles this node has completed.
    pub const fn cycles_completed(&self) -> u64 {
        self.sequencer.cycles_completed()
    }

    /// Failures recorded by this node's own phase functions.
    pub const fn faults(&self) -> &FaultLedger {
        self.sequencer.faults()
    }

    /// Failures recorded anywhere in this subtree.
    pub fn total_faults(&self) -> u64 {
        self.children
            .iter()
            .fold(self.faults().total(), |acc, child| {
                acc.saturating_add(child.total_faults())
            })
    }

    /// The node's children, in stepping order.
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// The children's current states, in stepping order.
    pub fn child_states(&self) -> Vec<&State> {
        self.children.iter().map(Self::state).collect()
    }

    /// Depth-first search of this subtree for `id`.
    pub fn find(&self, id: &EntityId) -> Option<&Self> {
        if &self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        self.children.iter().fold(0_usize, |acc, child| {
            acc.saturating_add(1).saturating_add(child.descendant_count())
        })
    }

    /// The injected registry, if any.
    pub const fn registry(&self) -> Option<&Registry> {
        self.registry.as_ref()
    }

    /// How this node drives its children.
    pub const fn fan_out(&self) -> FanOut {
        self.fan_out
    }

    /// Parents in this subtree whose cycle does not give each child one full
    /// cycle: nodes with children that use [`FanOut::Step`] or have no
    /// Iteration phase. Empty when one cycle of this node is one cycle of
    /// every node below it.
    pub fn partial_fan_out_parents(&self) -> Vec<&EntityId> {
        let mut out = Vec::new();
        self.collect_partial_fan_out(&mut out);
        out
    }

    fn collect_partial_fan_out<'a>(&'a self, out: &mut Vec<&'a EntityId>) {
        if self.children.is_empty() {
            return;
        }
        let drives_full_cycles = self.fan_out == FanOut::FullCycle
            && self.sequencer.phases().contains(&Phase::Iteration);
        if !drives_full_cycles {
            out.push(&self.id);
        }
        for child in &self.children {
            child.collect_partial_fan_out(out);
        }
    }

    fn collect_ids<'a>(&'a self, out: &mut Vec<&'a EntityId>) {
        out.push(&self.id);
        for child in &self.children {
            child.collect_ids(out);
        }
    }
}

impl core::fmt::Debug for Node {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("level", &self.level)
            .field("sequencer", &self.sequencer)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Node`].
pub struct NodeBuilder {
    id: EntityId,
    kind: EntityKind,
    level: Level,
    sequencer: SequencerBuilder,
    children: Vec<Node>,
    registry: Option<Registry>,
    publish_on_transformation: bool,
    fan_out: FanOut,
}

impl NodeBuilder {
    /// Replace the default canonical phase list.
    #[must_use]
    pub fn phases(mut self, phases: impl Into<Vec<Phase>>) -> Self {
        self.sequencer.set_phases(phases.into());
        self
    }

    /// Bind `func` to `phase`.
    #[must_use]
    pub fn phase<F>(mut self, phase: Phase, func: F) -> Self
    where
        F: FnMut(State, &PhaseContext<'_>) -> Result<State, PhaseError> + 'static,
    {
        self.sequencer = self.sequencer.phase(phase, func);
        self
    }

    /// Append one child. Children are stepped in the order they are added.
    #[must_use]
    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Append several children, keeping their order.
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    /// Give the node's phase functions access to `registry`.
    #[must_use]
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Publish the committed state to the registry after every successful
    /// Transformation. Has no effect without a registry.
    #[must_use]
    pub const fn publish_on_transformation(mut self) -> Self {
        self.publish_on_transformation = true;
        self
    }

    /// Choose how Iteration drives the children. Defaults to [`FanOut::Step`].
    #[must_use]
    pub const fn fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    /// Install a commit hook, e.g. to veto or annotate results.
    #[must_use]
    pub fn on_commit<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut State, State, Phase) + 'static,
    {
        self.sequencer = self.sequencer.on_commit(hook);
        self
    }

    /// Install an error hook in place of the default `warn!` log line.
    #[must_use]
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&PhaseError, Phase, &State) + 'static,
    {
        self.sequencer = self.sequencer.on_error(hook);
        self
    }

    /// Validate and build the node.
    ///
    /// Fails if the sequencer configuration is invalid or if any identity
    /// occurs twice in the resulting subtree.
    pub fn build(self) -> Result<Node, NodeError> {
        let sequencer = self.sequencer.build().map_err(|source| NodeError::Sequencer {
            id: self.id.clone(),
            source,
        })?;

        let node = Node {
            id: self.id,
            kind: self.kind,
            level: self.level,
            sequencer,
            children: self.children,
            registry: self.registry,
            publish_on_transformation: self.publish_on_transformation,
            fan_out: self.fan_out,
        };

        let mut ids = Vec::new();
        node.collect_ids(&mut ids);
        let mut seen = BTreeSet::new();
        for id in ids {
            if !seen.insert(id) {
                return Err(NodeError::DuplicateEntity { id: id.clone() });
            }
        }

        debug!(
            entity = %node.id,
            kind = %node.kind,
            level = %node.level,
            children = node.children.len(),
            fan_out = ?node.fan_out,
            "node built"
        );
        Ok(node)
    }
}
