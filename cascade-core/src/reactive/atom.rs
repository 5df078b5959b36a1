//! Cell Implementation
//!
//! An [`Atom`] is the mutable reactive value holder everything else is
//! built on.
//!
//! # How Cells Work
//!
//! 1. `get()` returns the current value. When a reaction's immediate phase
//!    is running, the reaction is registered as a listener; when a computed
//!    cell is evaluating, it is registered as a dependent. Both
//!    registrations are idempotent.
//!
//! 2. `set()` writes, possibly after a debounce window. A write that does
//!    not change the value is a no-op unless `always_fire` is set.
//!
//! 3. A changing write runs, in order: the actions, the reactions' deferred
//!    phases (unless skipped), and the re-derivation of dependent computed
//!    cells. The owning container, if any, is told last.
//!
//! # Locking
//!
//! State sits behind `parking_lot` locks so handles are `Send + Sync`.
//! Subscriber lists are snapshotted and every lock released before a
//! callback runs, which is what makes re-entrant writes from actions safe.

use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::{Arc, Weak};

use futures_util::future::{try_join_all, BoxFuture};
use futures_util::FutureExt;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use crate::config::{Action, CellConfig, CellOptions, ChildChanged, ChildObserver, DebugPrint};
use crate::error::{CascadeError, GateError, Result};
use crate::graph::scheduler::TimerSlot;
use crate::graph::{display_name, NodeId, NodeKind, ReactionId};

use super::context::{self, DerivedNode, Upstream, WriteReentry};
use super::reaction::ReactiveAction;
use super::Reactive;

/// Asynchronous precondition of a gated write.
pub type BeforeAction<T> =
    Arc<dyn Fn(&T) -> BoxFuture<'static, std::result::Result<(), GateError>> + Send + Sync>;

struct AtomState<T> {
    value: T,
    previous: Option<T>,
    initial: T,
    default: Option<T>,
}

pub(crate) struct AtomInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    id: NodeId,
    kind: NodeKind,
    config: CellConfig,
    state: RwLock<AtomState<T>>,
    actions: RwLock<Vec<Action<T>>>,
    reactions: Mutex<IndexMap<ReactionId, ReactiveAction>>,
    derived: Mutex<Vec<Arc<dyn DerivedNode>>>,
    before_actions: Mutex<Vec<BeforeAction<T>>>,
    parent: Option<Arc<dyn ChildObserver>>,
    child_changed: Option<ChildChanged>,
    debug_print: Option<DebugPrint<T>>,
    pending: Mutex<Option<PendingWrite<T>>>,
    timer: TimerSlot,
}

struct PendingWrite<T> {
    value: T,
    skip_reactions: bool,
}

/// Which subscribers a propagation pass reaches.
#[derive(Clone, Copy)]
struct Fanout {
    reactions: bool,
}

/// A mutable reactive cell holding a value of type `T`.
///
/// `T` must be `PartialEq`: change detection compares the new value with
/// the stored one. Collections should be stored behind an `Arc` and
/// replaced, never mutated in place (see the container types).
///
/// # Example
///
/// ```rust,ignore
/// let count = Atom::new(0);
/// count.add_action(|value, _| println!("count is {value}"));
///
/// count.set(5);  // prints "count is 5"
/// count.set(5);  // no change, nothing fires
/// ```
pub struct Atom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<AtomInner<T>>,
}

impl<T> Atom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new cell with the given initial value.
    pub fn new(value: T) -> Self {
        Self::with_options(value, CellOptions::default())
    }

    pub fn with_options(value: T, options: CellOptions<T>) -> Self {
        Self::build(value, options, NodeKind::Source)
    }

    pub(crate) fn build(value: T, options: CellOptions<T>, kind: NodeKind) -> Self {
        let CellOptions {
            config,
            action,
            parent,
            child_changed,
            debug_print,
            default_value,
        } = options;

        let atom = Self {
            inner: Arc::new(AtomInner {
                id: NodeId::new(),
                kind,
                config,
                state: RwLock::new(AtomState {
                    initial: value.clone(),
                    value,
                    previous: None,
                    default: default_value,
                }),
                actions: RwLock::new(action.into_iter().collect()),
                reactions: Mutex::new(IndexMap::new()),
                derived: Mutex::new(Vec::new()),
                before_actions: Mutex::new(Vec::new()),
                parent,
                child_changed,
                debug_print,
                pending: Mutex::new(None),
                timer: TimerSlot::new(),
            }),
        };

        tracing::trace!(cell = atom.inner.id.raw(), name = ?atom.name(), ?kind, "cell created");
        atom
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.config.name.as_deref()
    }

    pub fn kind(&self) -> NodeKind {
        self.inner.kind
    }

    pub fn config(&self) -> &CellConfig {
        &self.inner.config
    }

    fn display_name(&self) -> String {
        display_name(self.inner.id, self.name())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Get the current value, registering the running reaction and the
    /// evaluating computed cell (if any) on this cell.
    ///
    /// # Panics
    ///
    /// Panics when called during a [`LayoutPass`](super::LayoutPass) outside
    /// of `evaluate_without_reactions`.
    pub fn get(&self) -> T {
        self.track();
        self.get_untracked()
    }

    /// Get the current value without registering anything.
    pub fn get_untracked(&self) -> T {
        self.inner.state.read().value.clone()
    }

    /// Listener bookkeeping shared by plain and computed reads.
    pub(crate) fn track(&self) {
        context::assert_readable(self.inner.id, self.name());

        if let Some(reaction) = context::current_reaction() {
            self.add_reaction(reaction);
        }

        if let Some(dependent) = context::record_read(self.inner.id, || self.upstream()) {
            self.inner.add_dependent(dependent);
        }
    }

    fn upstream(&self) -> Weak<dyn Upstream> {
        let strong: Arc<dyn Upstream> = self.inner.clone();
        Arc::downgrade(&strong)
    }

    /// Replace the construction-time value of a computed cell once its
    /// tracked first evaluation has run. Nothing is subscribed yet, so
    /// nothing fires.
    pub(crate) fn reseed(&self, value: T) {
        let mut state = self.inner.state.write();
        state.initial = value.clone();
        state.value = value;
    }

    /// The value before the last write, if there was one.
    pub fn previous(&self) -> Option<T> {
        self.inner.state.read().previous.clone()
    }

    pub fn initial(&self) -> T {
        self.inner.state.read().initial.clone()
    }

    pub fn default_value(&self) -> Option<T> {
        self.inner.state.read().default.clone()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Write a new value, honouring the debounce window.
    pub fn set(&self, value: T) {
        self.schedule_write(value, false);
    }

    /// Write a new value without running the registered reactions.
    pub fn set_without_reactions(&self, value: T) {
        self.schedule_write(value, true);
    }

    /// Set to `f(&current)`.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = {
            let state = self.inner.state.read();
            f(&state.value)
        };
        self.set(next);
    }

    /// Restore the default value, or the initial value if there is none.
    pub fn reset(&self) {
        let target = {
            let state = self.inner.state.read();
            state.default.clone().unwrap_or_else(|| state.initial.clone())
        };
        self.set(target);
    }

    fn schedule_write(&self, value: T, skip_reactions: bool) {
        let Some(window) = self.inner.config.debounce() else {
            self.write_now(value, skip_reactions);
            return;
        };

        let already_pending = {
            let mut pending = self.inner.pending.lock();
            let already = pending.is_some();
            *pending = Some(PendingWrite {
                value,
                skip_reactions,
            });
            already
        };
        if already_pending {
            return;
        }

        tracing::trace!(cell = self.inner.id.raw(), ?window, "debouncing write");
        let this = self.clone();
        if !self.inner.timer.arm(window, move || this.flush_pending()) {
            tracing::warn!(
                cell = %self.display_name(),
                "no async runtime for debounced write; applying it now"
            );
            self.flush_pending();
        }
    }

    fn flush_pending(&self) {
        let pending = self.inner.pending.lock().take();
        if let Some(PendingWrite {
            value,
            skip_reactions,
        }) = pending
        {
            self.write_now(value, skip_reactions);
        }
    }

    /// Whether a debounced write is waiting for its window to close.
    pub fn has_pending_write(&self) -> bool {
        self.inner.pending.lock().is_some()
    }

    /// Write synchronously, bypassing the debounce window.
    pub fn set_now(&self, value: T) {
        self.write_now(value, false);
    }

    /// [`set_now`](Self::set_now) without running the registered reactions.
    pub fn set_now_without_reactions(&self, value: T) {
        self.write_now(value, true);
    }

    fn write_now(&self, value: T, skip_reactions: bool) {
        let current = {
            let mut state = self.inner.state.write();
            if !self.inner.config.always_fire && state.value == value {
                return;
            }
            let current = value.clone();
            state.previous = Some(std::mem::replace(&mut state.value, value));
            current
        };

        if self.propagate(
            &current,
            Fanout {
                reactions: !skip_reactions,
            },
        ) {
            if let Some(parent) = &self.inner.parent {
                parent.child_changed(self.inner.id);
            }
        }
    }

    /// Store `value` without the equality guard and run actions and
    /// derivations even if nothing changed.
    pub fn set_and_fire(&self, value: T) {
        let current = {
            let mut state = self.inner.state.write();
            let current = value.clone();
            state.previous = Some(std::mem::replace(&mut state.value, value));
            current
        };
        self.propagate(&current, Fanout { reactions: false });
    }

    /// Re-run actions and derivations with the current value.
    pub fn fire(&self) {
        let current = self.get_untracked();
        self.propagate(&current, Fanout { reactions: false });
    }

    /// Returns whether propagation ran (it does not while reactions are
    /// disabled).
    fn propagate(&self, current: &T, fanout: Fanout) -> bool {
        if context::reactions_disabled() {
            return false;
        }

        let _reentry = WriteReentry::enter(self.inner.id, self.name());

        if self.inner.config.debug {
            match &self.inner.debug_print {
                Some(print) => tracing::debug!(
                    cell = self.inner.id.raw(),
                    name = ?self.name(),
                    value = %print(current),
                    "cell changed"
                ),
                None => tracing::debug!(cell = self.inner.id.raw(), name = ?self.name(), "cell changed"),
            }
        }

        let actions: SmallVec<[Action<T>; 4]> = self.inner.actions.read().iter().cloned().collect();
        for action in &actions {
            action(current, self);
        }

        if fanout.reactions {
            let reactions: SmallVec<[ReactiveAction; 4]> =
                self.inner.reactions.lock().values().cloned().collect();
            for reaction in &reactions {
                reaction.perform_reaction();
            }
        }

        self.perform_derivations();
        true
    }

    fn perform_derivations(&self) {
        let derived: SmallVec<[Arc<dyn DerivedNode>; 4]> =
            self.inner.derived.lock().iter().cloned().collect();
        for node in &derived {
            node.derive_value();
        }
    }

    // ------------------------------------------------------------------
    // Gated writes
    // ------------------------------------------------------------------

    /// Register an asynchronous precondition for [`set_async`](Self::set_async).
    pub fn add_before_action<F, Fut>(&self, gate: F)
    where
        F: Fn(&T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), GateError>> + Send + 'static,
    {
        let gate: BeforeAction<T> = Arc::new(move |value: &T| gate(value).boxed());
        self.inner.before_actions.lock().push(gate);
    }

    pub fn before_action_count(&self) -> usize {
        self.inner.before_actions.lock().len()
    }

    /// Wait for every before-action to accept `value`, then `set` it.
    ///
    /// If a gate rejects, the value is not written and the rejection is
    /// returned. Overlapping calls on the same cell are not serialized;
    /// callers needing mutual exclusion must gate themselves.
    pub async fn set_async(&self, value: T) -> Result<()> {
        let gates: Vec<BeforeAction<T>> = self.inner.before_actions.lock().clone();

        if let Err(source) = try_join_all(gates.iter().map(|gate| gate(&value))).await {
            tracing::warn!(cell = %self.display_name(), error = %source, "gated write rejected");
            return Err(CascadeError::GateRejected {
                cell: self.display_name(),
                source,
            });
        }

        self.set(value);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Subscribers
    // ------------------------------------------------------------------

    pub fn add_action<F>(&self, action: F)
    where
        F: Fn(&T, &Atom<T>) + Send + Sync + 'static,
    {
        self.inner.actions.write().push(Arc::new(action));
    }

    /// Register an action ahead of every existing one.
    pub fn add_action_first<F>(&self, action: F)
    where
        F: Fn(&T, &Atom<T>) + Send + Sync + 'static,
    {
        self.inner.actions.write().insert(0, Arc::new(action));
    }

    pub fn clear_actions(&self) {
        self.inner.actions.write().clear();
    }

    pub fn action_count(&self) -> usize {
        self.inner.actions.read().len()
    }

    /// Register a reaction explicitly. Reads during
    /// [`ReactiveAction::perform`] do this automatically.
    pub fn add_reaction(&self, reaction: ReactiveAction) {
        let mut reactions = self.inner.reactions.lock();
        if !reactions.contains_key(&reaction.id()) {
            tracing::trace!(
                cell = self.inner.id.raw(),
                reaction = reaction.id().raw(),
                "reaction registered"
            );
            reactions.insert(reaction.id(), reaction);
        }
    }

    pub fn remove_reaction(&self, reaction: &ReactiveAction) -> bool {
        self.inner
            .reactions
            .lock()
            .shift_remove(&reaction.id())
            .is_some()
    }

    pub fn reaction_count(&self) -> usize {
        self.inner.reactions.lock().len()
    }

    pub fn derived_count(&self) -> usize {
        self.inner.derived.lock().len()
    }

    /// Debug names of the dependent computed cells, in derivation order.
    /// Unnamed dependents are skipped.
    pub fn derived_names(&self) -> Vec<String> {
        self.inner
            .derived
            .lock()
            .iter()
            .filter_map(|node| node.name().map(str::to_owned))
            .collect()
    }

    /// Move the dependent computed cell named `name` to the front of the
    /// derivation order. Returns whether one was found.
    pub fn move_derived_atom_first(&self, name: &str) -> bool {
        let mut derived = self.inner.derived.lock();
        let Some(index) = derived.iter().position(|node| node.name() == Some(name)) else {
            return false;
        };
        let node = derived.remove(index);
        derived.insert(0, node);
        true
    }

    /// Drop every subscriber, every before-action and any pending debounced
    /// write. Used when the owner of this cell is discarded.
    pub fn release(&self) {
        self.inner.actions.write().clear();
        self.inner.reactions.lock().clear();
        self.inner.derived.lock().clear();
        self.inner.before_actions.lock().clear();
        self.inner.pending.lock().take();
        self.inner.timer.cancel();
        tracing::trace!(cell = self.inner.id.raw(), "cell released");
    }

    pub fn downgrade(&self) -> WeakAtom<T> {
        WeakAtom {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<T> AtomInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn add_dependent(&self, dependent: Arc<dyn DerivedNode>) {
        let mut derived = self.derived.lock();
        let id = dependent.node_id();
        if !derived.iter().any(|node| node.node_id() == id) {
            tracing::trace!(cell = self.id.raw(), dependent = id.raw(), "dependent registered");
            derived.push(dependent);
        }
    }
}

impl<T> Upstream for AtomInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn remove_dependent(&self, dependent: NodeId) {
        self.derived.lock().retain(|node| node.node_id() != dependent);
    }
}

impl<T> ChildObserver for Atom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn child_changed(&self, child: NodeId) {
        match &self.inner.child_changed {
            Some(callback) => callback(child),
            None => self.fire(),
        }
    }
}

impl<T> Reactive<T> for Atom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn get(&self) -> T {
        Atom::get(self)
    }

    fn get_untracked(&self) -> T {
        Atom::get_untracked(self)
    }

    fn node_id(&self) -> NodeId {
        self.inner.id
    }
}

impl<T> Clone for Atom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Atom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Debug for Atom<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.inner.id)
            .field("name", &self.name())
            .field("value", &self.get_untracked())
            .field("action_count", &self.action_count())
            .field("reaction_count", &self.reaction_count())
            .field("derived_count", &self.derived_count())
            .finish()
    }
}

/// Non-owning handle to an [`Atom`], for subscriber closures that must not
/// keep their target alive.
pub struct WeakAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Weak<AtomInner<T>>,
}

impl<T> WeakAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn upgrade(&self) -> Option<Atom<T>> {
        self.inner.upgrade().map(|inner| Atom { inner })
    }
}

impl<T> Clone for WeakAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::time::Duration;

    fn counter() -> (Arc<AtomicI32>, impl Fn(&i32, &Atom<i32>) + Send + Sync + 'static) {
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        (count, move |_: &i32, _: &Atom<i32>| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn atom_get_and_set() {
        let atom = Atom::new(0);
        assert_eq!(atom.get(), 0);

        atom.set(42);
        assert_eq!(atom.get(), 42);
        assert_eq!(atom.previous(), Some(0));
        assert_eq!(atom.initial(), 0);
    }

    #[test]
    fn equal_write_is_a_no_op() {
        let atom = Atom::new(3);
        let (count, action) = counter();
        atom.add_action(action);

        atom.set(atom.get());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(atom.previous(), None);

        atom.set(4);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn always_fire_honoured_for_equal_values() {
        let atom = Atom::with_options(3, CellOptions::new().always_fire());
        let (count, action) = counter();
        atom.add_action(action);

        atom.set(3);
        atom.set(3);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn actions_receive_value_and_cell() {
        let atom = Atom::with_options(0, CellOptions::new().name("volume"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        atom.add_action(move |value, cell| {
            seen_clone
                .lock()
                .push((*value, cell.name().map(str::to_owned)));
        });

        atom.set(7);
        assert_eq!(*seen.lock(), vec![(7, Some("volume".to_string()))]);
    }

    #[test]
    fn add_action_first_runs_before_existing() {
        let atom = Atom::new(0);
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_clone = order.clone();
        atom.add_action(move |_, _| order_clone.lock().push("second"));
        let order_clone = order.clone();
        atom.add_action_first(move |_, _| order_clone.lock().push("first"));

        atom.set(1);
        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[test]
    fn option_action_is_registered() {
        let (count, action) = counter();
        let atom = Atom::with_options(0, CellOptions::new().action(action));

        assert_eq!(atom.action_count(), 1);
        atom.set(1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        atom.clear_actions();
        atom.set(2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn set_and_fire_skips_equality_guard() {
        let atom = Atom::new(5);
        let (count, action) = counter();
        atom.add_action(action);

        atom.set_and_fire(5);
        atom.fire();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(atom.previous(), Some(5));
    }

    #[test]
    fn reactions_run_after_actions() {
        let atom = Atom::new(0);
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_clone = order.clone();
        let reaction = ReactiveAction::new(move || order_clone.lock().push("reaction"));
        atom.add_reaction(reaction.clone());
        atom.add_reaction(reaction.clone());
        assert_eq!(atom.reaction_count(), 1);

        let order_clone = order.clone();
        atom.add_action(move |_, _| order_clone.lock().push("action"));

        atom.set(1);
        assert_eq!(*order.lock(), vec!["action", "reaction"]);

        atom.set_without_reactions(2);
        assert_eq!(*order.lock(), vec!["action", "reaction", "action"]);

        assert!(atom.remove_reaction(&reaction));
        assert_eq!(atom.reaction_count(), 0);
    }

    #[test]
    fn reads_during_reaction_register_listener() {
        let atom = Atom::new(1);
        let runs = Arc::new(AtomicI32::new(0));

        let atom_clone = atom.clone();
        let runs_clone = runs.clone();
        let reaction = ReactiveAction::new(move || {
            atom_clone.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        reaction.perform();
        reaction.perform();
        assert_eq!(atom.reaction_count(), 1);

        atom.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn untracked_read_registers_nothing() {
        let atom = Atom::new(1);
        let atom_clone = atom.clone();
        let reaction = ReactiveAction::new(move || {
            atom_clone.get_untracked();
        });

        reaction.perform();
        assert_eq!(atom.reaction_count(), 0);
    }

    #[test]
    fn suppressed_writes_store_but_do_not_fire() {
        let atom = Atom::new(0);
        let (count, action) = counter();
        atom.add_action(action);

        context::evaluate_without_reactions(|| {
            atom.set(1);
            atom.set(2);
        });
        assert_eq!(atom.get(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        atom.set(3);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn update_and_reset() {
        let atom = Atom::with_options(10, CellOptions::new().default_value(1));
        atom.update(|v| v + 5);
        assert_eq!(atom.get(), 15);

        atom.reset();
        assert_eq!(atom.get(), 1);

        let plain = Atom::new(10);
        plain.set(3);
        plain.reset();
        assert_eq!(plain.get(), 10);
    }

    #[test]
    fn child_reports_to_parent() {
        let parent = Atom::new(0);
        let (fired, action) = counter();
        parent.add_action(action);

        let child = Atom::with_options(false, CellOptions::new().parent(parent.clone()));
        child.set(true);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // No report when the write does not change anything.
        child.set(true);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn parent_child_changed_callback_overrides_fire() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let reported_clone = reported.clone();
        let parent = Atom::with_options(
            0,
            CellOptions::new().child_changed(move |child| reported_clone.lock().push(child)),
        );
        let (fired, action) = counter();
        parent.add_action(action);

        let child = Atom::with_options(1, CellOptions::new().parent(parent.clone()));
        child.set(2);

        assert_eq!(*reported.lock(), vec![child.id()]);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn release_clears_subscribers() {
        let atom = Atom::new(0);
        let (count, action) = counter();
        atom.add_action(action);
        atom.add_reaction(ReactiveAction::new(|| {}));
        atom.add_before_action(|_| async { Ok(()) });

        atom.release();
        assert_eq!(atom.action_count(), 0);
        assert_eq!(atom.reaction_count(), 0);
        assert_eq!(atom.before_action_count(), 0);

        atom.set(1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clone_shares_state_and_weak_upgrades() {
        let atom1 = Atom::new(0);
        let atom2 = atom1.clone();
        atom1.set(42);
        assert_eq!(atom2.get(), 42);
        assert_eq!(atom1, atom2);

        let weak = atom1.downgrade();
        assert_eq!(weak.upgrade().map(|a| a.get()), Some(42));
        drop(atom1);
        drop(atom2);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn atom_ids_are_unique() {
        let a1 = Atom::new(0);
        let a2 = Atom::new(0);
        assert_ne!(a1.id(), a2.id());
        assert!(a2.id() > a1.id());
    }

    #[test]
    fn debounce_without_runtime_writes_immediately() {
        let atom = Atom::with_options(0, CellOptions::new().debounce(Duration::from_millis(50)));
        atom.set(9);
        assert_eq!(atom.get(), 9);
        assert!(!atom.has_pending_write());
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_collapses_to_last_write() {
        let atom = Atom::with_options(0, CellOptions::new().debounce(Duration::from_millis(50)));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        atom.add_action(move |value, _| seen_clone.lock().push(*value));

        atom.set(1);
        atom.set(2);
        atom.set(3);
        assert!(atom.has_pending_write());
        assert_eq!(atom.get(), 0);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(*seen.lock(), vec![3]);
        assert_eq!(atom.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn release_cancels_pending_debounce() {
        let atom = Atom::with_options(0, CellOptions::new().debounce(Duration::from_millis(50)));
        atom.set(1);
        atom.release();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(atom.get(), 0);
        assert!(!atom.has_pending_write());
    }

    #[tokio::test]
    async fn set_async_without_gates_writes() {
        let atom = Atom::new(0);
        atom.set_async(5).await.expect("no gates");
        assert_eq!(atom.get(), 5);
    }

    #[tokio::test]
    async fn rejected_gate_leaves_value() {
        let atom = Atom::with_options(0, CellOptions::new().name("panel"));
        atom.add_before_action(|_| async { Err::<(), GateError>("cancelled".into()) });

        let err = atom.set_async(1).await.unwrap_err();
        assert!(matches!(err, CascadeError::GateRejected { ref cell, .. } if cell.starts_with("panel")));
        assert_eq!(atom.get(), 0);
    }
}
