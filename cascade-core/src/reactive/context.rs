//! Propagation Context
//!
//! The propagation context is the engine's only shared state. It holds:
//!
//! - the derivation stack: computed cells currently evaluating their
//!   function, so a cell read can register the top one as a dependent;
//! - the reaction stack: reactions currently running their immediate phase,
//!   so a cell read can register the top one as a listener;
//! - the reaction-disable counter used by [`evaluate_without_reactions`];
//! - the layout flag, during which reactive reads are forbidden;
//! - the active write count of each cell, which turns runaway write cycles
//!   into a diagnostic panic instead of a stack overflow.
//!
//! # Implementation
//!
//! The state is thread-local: each thread runs its own engine and no
//! synchronization is needed on the hot path. Every push and every
//! increment is owned by an RAII guard, so the stacks stay balanced even
//! when the wrapped function panics.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;

use crate::graph::{display_name, NodeId};

use super::reaction::ReactiveAction;

/// Default bound on how many writes to one cell may be in flight at once.
pub const DEFAULT_MAX_WRITE_REENTRY: usize = 100;

/// A computed cell as seen by the engine.
pub(crate) trait DerivedNode: Send + Sync {
    fn node_id(&self) -> NodeId;

    fn name(&self) -> Option<&str>;

    /// Recompute and write the result through the equality-guarded path.
    fn derive_value(&self);
}

/// A cell that computed cells can depend on, seen from the dependent side.
pub(crate) trait Upstream: Send + Sync {
    fn node_id(&self) -> NodeId;

    fn remove_dependent(&self, dependent: NodeId);
}

/// Cells read during one evaluation of a computed cell.
pub(crate) type ReadSet = IndexMap<NodeId, Weak<dyn Upstream>>;

struct DerivationFrame {
    node: Arc<dyn DerivedNode>,
    reads: ReadSet,
}

struct EngineState {
    derivations: Vec<DerivationFrame>,
    reactions: Vec<ReactiveAction>,
    reaction_disable_count: usize,
    layout_in_progress: bool,
    active_writes: IndexMap<NodeId, usize>,
    max_write_reentry: usize,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            derivations: Vec::new(),
            reactions: Vec::new(),
            reaction_disable_count: 0,
            layout_in_progress: false,
            active_writes: IndexMap::new(),
            max_write_reentry: DEFAULT_MAX_WRITE_REENTRY,
        }
    }
}

thread_local! {
    static ENGINE: RefCell<EngineState> = RefCell::new(EngineState::default());
}

fn with_engine<R>(f: impl FnOnce(&mut EngineState) -> R) -> R {
    ENGINE.with(|engine| f(&mut engine.borrow_mut()))
}

// ----------------------------------------------------------------------------
// Derivation stack
// ----------------------------------------------------------------------------

/// Guard for one tracked evaluation of a computed cell.
///
/// Dropping the guard without calling [`finish`](Self::finish) pops the
/// frame and discards the reads (the evaluation panicked).
pub(crate) struct DerivationScope {
    node_id: NodeId,
    finished: bool,
}

impl DerivationScope {
    pub(crate) fn enter(node: Arc<dyn DerivedNode>) -> Self {
        let node_id = node.node_id();
        with_engine(|engine| {
            engine.derivations.push(DerivationFrame {
                node,
                reads: ReadSet::new(),
            });
        });

        Self {
            node_id,
            finished: false,
        }
    }

    /// Pop the frame and return the cells read while it was on top.
    pub(crate) fn finish(mut self) -> ReadSet {
        self.finished = true;
        pop_derivation(self.node_id)
    }
}

impl Drop for DerivationScope {
    fn drop(&mut self) {
        if !self.finished {
            pop_derivation(self.node_id);
        }
    }
}

fn pop_derivation(expected: NodeId) -> ReadSet {
    let popped = with_engine(|engine| engine.derivations.pop());
    match popped {
        Some(frame) => {
            debug_assert_eq!(
                frame.node.node_id(),
                expected,
                "derivation stack mismatch"
            );
            frame.reads
        }
        None => ReadSet::new(),
    }
}

/// Record that `upstream` was read by the computed cell on top of the
/// derivation stack, and return that computed cell so the reader can add it
/// to its dependents.
pub(crate) fn record_read(
    upstream_id: NodeId,
    upstream: impl FnOnce() -> Weak<dyn Upstream>,
) -> Option<Arc<dyn DerivedNode>> {
    with_engine(|engine| {
        let frame = engine.derivations.last_mut()?;
        if frame.node.node_id() == upstream_id {
            // A computed cell's own bookkeeping read.
            return None;
        }
        frame.reads.entry(upstream_id).or_insert_with(upstream);
        Some(Arc::clone(&frame.node))
    })
}

#[cfg(test)]
pub(crate) fn derivation_depth() -> usize {
    with_engine(|engine| engine.derivations.len())
}

// ----------------------------------------------------------------------------
// Reaction stack
// ----------------------------------------------------------------------------

/// Guard for the immediate phase of a reaction.
pub(crate) struct ReactionScope {
    reaction: ReactiveAction,
}

impl ReactionScope {
    pub(crate) fn enter(reaction: ReactiveAction) -> Self {
        with_engine(|engine| engine.reactions.push(reaction.clone()));
        Self { reaction }
    }
}

impl Drop for ReactionScope {
    fn drop(&mut self) {
        let popped = with_engine(|engine| engine.reactions.pop());
        if let Some(popped) = popped {
            debug_assert_eq!(
                popped.id(),
                self.reaction.id(),
                "reaction stack mismatch"
            );
        }
    }
}

/// The reaction whose immediate phase is running, unless listener
/// registration is suppressed.
pub(crate) fn current_reaction() -> Option<ReactiveAction> {
    with_engine(|engine| {
        if engine.reaction_disable_count > 0 {
            return None;
        }
        engine.reactions.last().cloned()
    })
}

#[cfg(test)]
pub(crate) fn reaction_depth() -> usize {
    with_engine(|engine| engine.reactions.len())
}

// ----------------------------------------------------------------------------
// Suppression
// ----------------------------------------------------------------------------

struct SuppressReactions;

impl SuppressReactions {
    fn enter() -> Self {
        with_engine(|engine| engine.reaction_disable_count += 1);
        Self
    }
}

impl Drop for SuppressReactions {
    fn drop(&mut self) {
        with_engine(|engine| {
            engine.reaction_disable_count = engine.reaction_disable_count.saturating_sub(1);
        });
    }
}

/// Run `f` with propagation disabled.
///
/// Writes inside `f` store their values but fire no actions, reactions or
/// derivations, and reads register no reaction listeners. Calls nest; the
/// counter is restored even if `f` panics.
pub fn evaluate_without_reactions<R>(f: impl FnOnce() -> R) -> R {
    let _suppress = SuppressReactions::enter();
    f()
}

/// Whether an [`evaluate_without_reactions`] block is active on this thread.
pub fn reactions_disabled() -> bool {
    with_engine(|engine| engine.reaction_disable_count > 0)
}

struct HiddenStacks {
    derivations: Vec<DerivationFrame>,
    reactions: Vec<ReactiveAction>,
}

impl Drop for HiddenStacks {
    fn drop(&mut self) {
        let derivations = std::mem::take(&mut self.derivations);
        let reactions = std::mem::take(&mut self.reactions);
        with_engine(|engine| {
            engine.derivations = derivations;
            engine.reactions = reactions;
        });
    }
}

/// Run `f` with both tracking stacks hidden, so reads inside it register
/// nothing with the computed cell or reaction currently evaluating.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _hidden = with_engine(|engine| HiddenStacks {
        derivations: std::mem::take(&mut engine.derivations),
        reactions: std::mem::take(&mut engine.reactions),
    });
    f()
}

// ----------------------------------------------------------------------------
// Layout pass
// ----------------------------------------------------------------------------

/// Marks a non-reactive layout pass. While one is active, reading a cell
/// outside [`evaluate_without_reactions`] panics.
pub struct LayoutPass {
    previous: bool,
}

impl LayoutPass {
    pub fn begin() -> Self {
        let previous = with_engine(|engine| std::mem::replace(&mut engine.layout_in_progress, true));
        Self { previous }
    }
}

impl Drop for LayoutPass {
    fn drop(&mut self) {
        let previous = self.previous;
        with_engine(|engine| engine.layout_in_progress = previous);
    }
}

pub fn is_layout_in_progress() -> bool {
    with_engine(|engine| engine.layout_in_progress)
}

/// Panic if a reactive read of the given cell is forbidden right now.
pub(crate) fn assert_readable(id: NodeId, name: Option<&str>) {
    let forbidden =
        with_engine(|engine| engine.layout_in_progress && engine.reaction_disable_count == 0);
    if forbidden {
        panic!(
            "cell {} read during a layout pass; wrap the read in evaluate_without_reactions",
            display_name(id, name)
        );
    }
}

// ----------------------------------------------------------------------------
// Write re-entry
// ----------------------------------------------------------------------------

/// Marks one write to a cell as in flight.
///
/// Deep acyclic graphs nest many writes, each to a different cell, and are
/// never limited here. Only a cell whose own write leads back to itself more
/// than the limit allows is reported.
pub(crate) struct WriteReentry {
    id: NodeId,
}

impl WriteReentry {
    pub(crate) fn enter(id: NodeId, name: Option<&str>) -> Self {
        let exceeded = with_engine(|engine| {
            let limit = engine.max_write_reentry;
            let active = engine.active_writes.entry(id).or_insert(0);
            if *active >= limit {
                Some(limit)
            } else {
                *active += 1;
                None
            }
        });

        if let Some(limit) = exceeded {
            panic!(
                "cell {} re-entered its own write more than {limit} times; \
                 the dependency graph contains a write cycle",
                display_name(id, name)
            );
        }

        Self { id }
    }
}

impl Drop for WriteReentry {
    fn drop(&mut self) {
        with_engine(|engine| {
            if let Some(active) = engine.active_writes.get_mut(&self.id) {
                *active = active.saturating_sub(1);
                if *active == 0 {
                    engine.active_writes.swap_remove(&self.id);
                }
            }
        });
    }
}

/// Change how often one cell may re-enter its own write on this thread.
pub fn set_max_write_reentry(limit: usize) {
    with_engine(|engine| engine.max_write_reentry = limit.max(1));
}

pub fn max_write_reentry() -> usize {
    with_engine(|engine| engine.max_write_reentry)
}
