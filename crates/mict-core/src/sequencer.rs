//! Stage sequencer: the single-entity cycle engine.
//!
//! A [`StageSequencer`] holds an ordered list of [`Phase`]s, the function
//! bound to each, the entity's current [`State`], and two hooks. Each call
//! to [`advance`](StageSequencer::advance) runs exactly one phase:
//!
//! 1. The bound function receives a copy of the current state and returns
//!    either a replacement state or a [`PhaseError`].
//! 2. On success the commit hook decides what becomes the current state.
//!    The default hook simply replaces it; an owner may install a hook that
//!    transforms or rejects the result instead.
//! 3. On failure the error is recorded in the [`FaultLedger`] and handed to
//!    the error hook. It is never returned as an `Err`; the current state
//!    stays at the last committed value.
//! 4. The phase index moves to the next phase, wrapping at the end of the
//!    list, whether or not the phase succeeded.
//!
//! Phase functions are bound once, when the sequencer is built. Phases with
//! no bound function pass the state through unchanged.

use std::collections::{BTreeMap, BTreeSet};

use mict_types::{EntityId, EntityKind, Level, Phase, State, StateValueError};
use tracing::{trace, warn};

use crate::registry::Registry;

/// A phase function: consumes the current state, returns its successor.
pub type PhaseFn = Box<dyn FnMut(State, &PhaseContext<'_>) -> Result<State, PhaseError>>;

/// Hook deciding how a successful phase result becomes the current state.
///
/// Arguments are the current state (to be updated in place), the result of
/// the phase function, and the phase that produced it.
pub type CommitHook = Box<dyn FnMut(&mut State, State, Phase)>;

/// Hook notified of a failed phase with the error, the phase, and the last
/// committed state.
pub type ErrorHook = Box<dyn FnMut(&PhaseError, Phase, &State)>;

/// Errors that can occur while building a sequencer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequencerError {
    /// No phases were configured.
    #[error("a sequencer needs at least one phase")]
    EmptyPhases,

    /// A phase appears more than once in the phase list.
    #[error("phase {phase} is listed more than once")]
    DuplicatePhase {
        /// The repeated phase.
        phase: Phase,
    },

    /// A function was bound to a phase that is not in the phase list.
    #[error("function bound to phase {phase}, which is not in the phase list")]
    UnknownPhase {
        /// The phase the function was bound to.
        phase: Phase,
    },

    /// Two functions were bound to the same phase.
    #[error("phase {phase} already has a bound function")]
    DuplicateBinding {
        /// The phase bound twice.
        phase: Phase,
    },
}

/// Failure signalled by a phase function.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PhaseError {
    /// A state field was missing or had the wrong type.
    #[error("state error: {source}")]
    State {
        /// The underlying state access error.
        #[from]
        source: StateValueError,
    },

    /// A state field held a value outside its valid range.
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue {
        /// The offending key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Any other failure inside the phase function.
    #[error("{message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },
}

impl PhaseError {
    /// Shorthand for [`PhaseError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Read-only view of a child entity, offered to the parent's phase functions.
#[derive(Debug, Clone, Copy)]
pub struct ChildView<'a> {
    /// The child's identity.
    pub id: &'a EntityId,
    /// The child's type tag.
    pub kind: &'a EntityKind,
    /// The child's containment level.
    pub level: Level,
    /// The child's last committed state.
    pub state: &'a State,
}

/// Everything a phase function may look at besides the state it transforms.
#[derive(Debug, Clone, Copy)]
pub struct PhaseContext<'a> {
    entity: &'a EntityId,
    phase: Phase,
    children: &'a [ChildView<'a>],
    registry: Option<&'a Registry>,
}

impl<'a> PhaseContext<'a> {
    /// Identity of the entity whose phase is running.
    pub const fn entity(&self) -> &'a EntityId {
        self.entity
    }

    /// The phase being executed.
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The entity's children, in their fixed order.
    pub const fn children(&self) -> &'a [ChildView<'a>] {
        self.children
    }

    /// The children's last committed states, in order.
    pub fn child_states(&self) -> impl Iterator<Item = &'a State> + 'a {
        self.children.iter().map(|child| child.state)
    }

    /// The injected registry, if the entity was given one.
    pub const fn registry(&self) -> Option<&'a Registry> {
        self.registry
    }

    /// Read a peer's last published state from the registry.
    ///
    /// Returns `None` without a registry or when the peer has not
    /// published anything visible yet.
    pub fn read(&self, id: &EntityId) -> Option<State> {
        self.registry.and_then(|registry| registry.read(id))
    }

    /// Publish `state` under this entity's identity.
    ///
    /// The value becomes visible to readers at the next tick. Returns
    /// `false` if the entity has no registry.
    pub fn publish(&self, state: &State) -> bool {
        self.registry.is_some_and(|registry| {
            registry.publish(self.entity.clone(), state.clone());
            true
        })
    }
}

/// What happened during one call to [`StageSequencer::advance`].
///
/// Informational only: a failed phase has already been contained and
/// reported by the time this is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome {
    /// The phase function succeeded and its result went through the commit hook.
    Committed {
        /// The phase that ran.
        phase: Phase,
    },
    /// The phase function failed; the current state was left untouched.
    Failed {
        /// The phase that ran.
        phase: Phase,
        /// The error it signalled.
        error: PhaseError,
    },
}

impl PhaseOutcome {
    /// The phase that ran.
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Committed { phase } | Self::Failed { phase, .. } => *phase,
        }
    }

    /// Whether the phase committed.
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// A single recorded phase failure.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseFault {
    /// The phase that failed.
    pub phase: Phase,
    /// Number of full cycles completed before the failure.
    pub cycle: u64,
    /// The error the phase function returned.
    pub error: PhaseError,
}

/// Running tally of phase failures for one sequencer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaultLedger {
    total: u64,
    by_phase: BTreeMap<Phase, u64>,
    last: Option<PhaseFault>,
}

impl FaultLedger {
    fn record(&mut self, phase: Phase, cycle: u64, error: PhaseError) {
        self.total = self.total.saturating_add(1);
        let count = self.by_phase.entry(phase).or_insert(0);
        *count = count.saturating_add(1);
        self.last = Some(PhaseFault {
            phase,
            cycle,
            error,
        });
    }

    /// Total number of failed phases.
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Number of failures of one phase.
    pub fn for_phase(&self, phase: Phase) -> u64 {
        self.by_phase.get(&phase).copied().unwrap_or(0)
    }

    /// The most recent failure, if any.
    pub const fn last(&self) -> Option<&PhaseFault> {
        self.last.as_ref()
    }
}

struct PhaseSlot {
    phase: Phase,
    func: Option<PhaseFn>,
}

/// The cycle engine for one entity.
pub struct StageSequencer {
    entity: EntityId,
    slots: Vec<PhaseSlot>,
    index: usize,
    state: State,
    cycles_completed: u64,
    faults: FaultLedger,
    on_commit: CommitHook,
    on_error: ErrorHook,
}

impl StageSequencer {
    /// Start building a sequencer for `entity` over `phases`, beginning at
    /// the first phase with `initial` as the current state.
    pub fn builder(
        entity: impl Into<EntityId>,
        phases: impl Into<Vec<Phase>>,
        initial: State,
    ) -> SequencerBuilder {
        SequencerBuilder {
            entity: entity.into(),
            phases: phases.into(),
            initial,
            bindings: Vec::new(),
            on_commit: None,
            on_error: None,
        }
    }

    /// Run the phase at the current index. See the module docs for the
    /// exact contract.
    pub fn advance(&mut self) -> PhaseOutcome {
        self.advance_with(&[], None)
    }

    /// Run the phase at the current index, exposing `children` and
    /// `registry` to the phase function through its [`PhaseContext`].
    #[allow(clippy::indexing_slicing)] // index < slots.len(), slots non-empty
    pub fn advance_with(
        &mut self,
        children: &[ChildView<'_>],
        registry: Option<&Registry>,
    ) -> PhaseOutcome {
        let slot = &mut self.slots[self.index];
        let phase = slot.phase;

        let result = match slot.func.as_mut() {
            Some(func) => {
                let ctx = PhaseContext {
                    entity: &self.entity,
                    phase,
                    children,
                    registry,
                };
                func(self.state.clone(), &ctx)
            }
            None => Ok(self.state.clone()),
        };

        let outcome = match result {
            Ok(next) => {
                (self.on_commit)(&mut self.state, next, phase);
                trace!(entity = %self.entity, phase = %phase, "phase committed");
                PhaseOutcome::Committed { phase }
            }
            Err(error) => {
                self.faults
                    .record(phase, self.cycles_completed, error.clone());
                (self.on_error)(&error, phase, &self.state);
                PhaseOutcome::Failed { phase, error }
            }
        };

        let next = self.index.saturating_add(1);
        if next >= self.slots.len() {
            self.index = 0;
            self.cycles_completed = self.cycles_completed.saturating_add(1);
        } else {
            self.index = next;
        }

        outcome
    }

    /// Call [`advance`](Self::advance) once per configured phase.
    ///
    /// Starting from index 0 this runs every phase once in declared order.
    /// Started mid-cycle, it still runs each phase exactly once, beginning
    /// with the current one.
    pub fn run_full_cycle(&mut self) -> Vec<PhaseOutcome> {
        (0..self.slots.len()).map(|_| self.advance()).collect()
    }

    /// Identity of the owning entity.
    pub const fn entity(&self) -> &EntityId {
        &self.entity
    }

    /// The configured phases, in order.
    pub fn phases(&self) -> Vec<Phase> {
        self.slots.iter().map(|slot| slot.phase).collect()
    }

    /// Number of configured phases.
    pub fn phase_count(&self) -> usize {
        self.slots.len()
    }

    /// Index of the phase the next `advance` will run.
    pub const fn phase_index(&self) -> usize {
        self.index
    }

    /// The phase the next `advance` will run.
    pub fn current_phase(&self) -> Phase {
        self.slots
            .get(self.index)
            .map_or(Phase::Mapping, |slot| slot.phase)
    }

    /// The current committed state.
    ///
    /// The borrow is read-only; callers wanting to keep a copy across
    /// further advances should clone it.
    pub const fn state(&self) -> &State {
        &self.state
    }

    /// Number of times the phase index has wrapped back to zero.
    pub const fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    /// Failures recorded so far.
    pub const fn faults(&self) -> &FaultLedger {
        &self.faults
    }
}

impl core::fmt::Debug for StageSequencer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StageSequencer")
            .field("entity", &self.entity)
            .field("phases", &self.phases())
            .field("index", &self.index)
            .field("state", &self.state)
            .field("cycles_completed", &self.cycles_completed)
            .field("faults", &self.faults)
            .finish_non_exhaustive()
    }
}

/// Builder for [`StageSequencer`].
pub struct SequencerBuilder {
    entity: EntityId,
    phases: Vec<Phase>,
    initial: State,
    bindings: Vec<(Phase, PhaseFn)>,
    on_commit: Option<CommitHook>,
    on_error: Option<ErrorHook>,
}

impl SequencerBuilder {
    /// Bind `func` to `phase`.
    #[must_use]
    pub fn phase<F>(mut self, phase: Phase, func: F) -> Self
    where
        F: FnMut(State, &PhaseContext<'_>) -> Result<State, PhaseError> + 'static,
    {
        self.bindings.push((phase, Box::new(func)));
        self
    }

    /// Install a commit hook in place of plain replacement.
    #[must_use]
    pub fn on_commit<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut State, State, Phase) + 'static,
    {
        self.on_commit = Some(Box::new(hook));
        self
    }

    /// Install an error hook in place of the default `warn!` log line.
    #[must_use]
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&PhaseError, Phase, &State) + 'static,
    {
        self.on_error = Some(Box::new(hook));
        self
    }

    pub(crate) fn set_phases(&mut self, phases: Vec<Phase>) {
        self.phases = phases;
    }

    /// Validate the configuration and build the sequencer.
    pub fn build(self) -> Result<StageSequencer, SequencerError> {
        if self.phases.is_empty() {
            return Err(SequencerError::EmptyPhases);
        }

        let mut seen = BTreeSet::new();
        for &phase in &self.phases {
            if !seen.insert(phase) {
                return Err(SequencerError::DuplicatePhase { phase });
            }
        }

        let mut slots: Vec<PhaseSlot> = self
            .phases
            .iter()
            .map(|&phase| PhaseSlot { phase, func: None })
            .collect();

        for (phase, func) in self.bindings {
            let slot = slots
                .iter_mut()
                .find(|slot| slot.phase == phase)
                .ok_or(SequencerError::UnknownPhase { phase })?;
            if slot.func.is_some() {
                return Err(SequencerError::DuplicateBinding { phase });
            }
            slot.func = Some(func);
        }

        let on_commit: CommitHook = match self.on_commit {
            Some(hook) => hook,
            None => Box::new(|current: &mut State, next: State, _phase: Phase| *current = next),
        };
        let on_error: ErrorHook = match self.on_error {
            Some(hook) => hook,
            None => {
                let entity = self.entity.clone();
                Box::new(move |error: &PhaseError, phase: Phase, _last_good: &State| {
                    warn!(entity = %entity, phase = %phase, error = %error, "phase execution failed");
                })
            }
        };

        Ok(StageSequencer {
            entity: self.entity,
            slots,
            index: 0,
            state: self.initial,
            cycles_completed: 0,
            faults: FaultLedger::default(),
            on_commit,
            on_error,
        })
    }
}
