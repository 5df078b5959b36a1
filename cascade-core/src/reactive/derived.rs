//! Computed Cell Implementation
//!
//! A [`DerivedAtom`] is a read-only cell whose value is a function of other
//! cells. Its dependencies are discovered by instrumented reads: whatever
//! the function reads while the computed cell is on top of the derivation
//! stack becomes an upstream edge.
//!
//! # How Computed Cells Work
//!
//! 1. At construction the function runs twice: once untracked with
//!    reactions suppressed, to seed the value without side effects, and
//!    once tracked, to discover every operand.
//!
//! 2. When an upstream cell changes, it calls `derive_value()`, which
//!    re-evaluates under tracking and writes the result through the normal
//!    equality-guarded `set`. Only a real change propagates further.
//!
//! 3. `get()` always re-evaluates. Correctness comes from upstream writes
//!    eagerly re-deriving, not from caching at read time.
//!
//! # Dependency Pruning
//!
//! Each tracked evaluation produces a fresh read set. Upstream cells that
//! were read last time but not this time have their forward edge removed,
//! so fan-out is proportional to the current dependency set rather than
//! every cell ever read.

use std::fmt::{self, Debug};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::CellOptions;
use crate::graph::{NodeId, NodeKind};

use super::atom::Atom;
use super::context::{self, DerivationScope, DerivedNode, ReadSet};
use super::reaction::ReactiveAction;
use super::Reactive;

type Compute<T> = Arc<dyn Fn() -> T + Send + Sync>;

struct DerivedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    this: Weak<DerivedInner<T>>,
    atom: Atom<T>,
    compute: Compute<T>,
    referenced: Mutex<ReadSet>,
}

/// A computed cell.
///
/// # Example
///
/// ```rust,ignore
/// let a = cell(1);
/// let b = computed({
///     let a = a.clone();
///     move || a.get() * 2
/// });
///
/// a.set(5);
/// assert_eq!(b.get(), 10);
/// ```
pub struct DerivedAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<DerivedInner<T>>,
}

impl<T> DerivedAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a computed cell and discover its dependencies immediately.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_options(compute, CellOptions::default())
    }

    pub fn with_options<F>(compute: F, options: CellOptions<T>) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let compute: Compute<T> = Arc::new(compute);

        let seed = context::untracked(|| context::evaluate_without_reactions(|| compute()));
        let derived = Self::assemble(seed, compute, options);

        let value = context::untracked(|| derived.inner.evaluate());
        derived.inner.atom.reseed(value);

        derived
    }

    /// Create a computed cell seeded with `initial`.
    ///
    /// The function does not run at construction; dependencies are
    /// discovered on the first `get()`.
    pub fn with_initial<F>(compute: F, initial: T, options: CellOptions<T>) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::assemble(initial, Arc::new(compute), options)
    }

    fn assemble(value: T, compute: Compute<T>, options: CellOptions<T>) -> Self {
        let atom = Atom::build(value, options, NodeKind::Derived);
        Self {
            inner: Arc::new_cyclic(|this| DerivedInner {
                this: this.clone(),
                atom,
                compute,
                referenced: Mutex::new(ReadSet::new()),
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.atom.id()
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.atom.name()
    }

    /// Re-evaluate and return the fresh value, registering the running
    /// reaction and any enclosing computed cell on this cell.
    pub fn get(&self) -> T {
        let value = self.inner.evaluate();
        self.inner.atom.track();
        value
    }

    /// The value written by the last re-derivation, without re-evaluating
    /// or registering anything.
    pub fn get_untracked(&self) -> T {
        self.inner.atom.get_untracked()
    }

    pub fn previous(&self) -> Option<T> {
        self.inner.atom.previous()
    }

    /// Whether this cell has any upstream dependency. A computed cell with
    /// none is never re-derived by propagation.
    pub fn is_reactive(&self) -> bool {
        !self.inner.referenced.lock().is_empty()
    }

    pub fn referenced_count(&self) -> usize {
        self.inner.referenced.lock().len()
    }

    /// Recompute and propagate if the value changed.
    pub fn derive_value(&self) {
        self.inner.derive_value();
    }

    pub fn fire(&self) {
        self.inner.atom.fire();
    }

    pub fn add_action<F>(&self, action: F)
    where
        F: Fn(&T, &Atom<T>) + Send + Sync + 'static,
    {
        self.inner.atom.add_action(action);
    }

    pub fn add_action_first<F>(&self, action: F)
    where
        F: Fn(&T, &Atom<T>) + Send + Sync + 'static,
    {
        self.inner.atom.add_action_first(action);
    }

    pub fn clear_actions(&self) {
        self.inner.atom.clear_actions();
    }

    pub fn add_reaction(&self, reaction: ReactiveAction) {
        self.inner.atom.add_reaction(reaction);
    }

    pub fn derived_count(&self) -> usize {
        self.inner.atom.derived_count()
    }

    pub fn move_derived_atom_first(&self, name: &str) -> bool {
        self.inner.atom.move_derived_atom_first(name)
    }

    /// Drop every subscriber and detach from every upstream cell.
    pub fn release(&self) {
        self.inner.atom.release();
        let referenced = std::mem::take(&mut *self.inner.referenced.lock());
        for upstream in referenced.values().filter_map(Weak::upgrade) {
            upstream.remove_dependent(self.id());
        }
    }
}

impl<T> DerivedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Run the function with this cell on top of the derivation stack and
    /// replace the recorded dependency set.
    fn evaluate(&self) -> T {
        let Some(this) = self.this.upgrade() else {
            return (self.compute)();
        };
        let node: Arc<dyn DerivedNode> = this;

        let scope = DerivationScope::enter(node);
        let value = (self.compute)();
        let reads = scope.finish();

        self.replace_references(reads);
        value
    }

    fn replace_references(&self, reads: ReadSet) {
        let stale: Vec<_> = {
            let mut referenced = self.referenced.lock();
            let stale = referenced
                .iter()
                .filter(|(id, _)| !reads.contains_key(*id))
                .map(|(_, upstream)| upstream.clone())
                .collect();
            *referenced = reads;
            stale
        };

        let id = self.atom.id();
        for upstream in stale.iter().filter_map(Weak::upgrade) {
            tracing::trace!(
                cell = id.raw(),
                upstream = upstream.node_id().raw(),
                "pruned stale dependency"
            );
            upstream.remove_dependent(id);
        }
    }
}

impl<T> DerivedNode for DerivedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn node_id(&self) -> NodeId {
        self.atom.id()
    }

    fn name(&self) -> Option<&str> {
        self.atom.name()
    }

    fn derive_value(&self) {
        let value = self.evaluate();
        self.atom.set(value);
    }
}

impl<T> Reactive<T> for DerivedAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn get(&self) -> T {
        DerivedAtom::get(self)
    }

    fn get_untracked(&self) -> T {
        DerivedAtom::get_untracked(self)
    }

    fn node_id(&self) -> NodeId {
        self.id()
    }
}

impl<T> Clone for DerivedAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for DerivedAtom<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedAtom")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("value", &self.get_untracked())
            .field("referenced_count", &self.referenced_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn derived_tracks_dependency() {
        let a = Atom::new(1);
        let a_clone = a.clone();
        let b = DerivedAtom::new(move || a_clone.get() * 2);

        assert_eq!(b.get(), 2);
        assert!(b.is_reactive());
        assert_eq!(a.derived_count(), 1);

        a.set(5);
        assert_eq!(b.get(), 10);
        assert_eq!(b.get_untracked(), 10);
    }

    #[test]
    fn construction_evaluates_twice() {
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let _derived = DerivedAtom::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn every_read_recomputes() {
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let derived = DerivedAtom::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        derived.get();
        derived.get();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn derived_without_dependencies_is_dead() {
        let derived = DerivedAtom::new(|| 7);
        assert!(!derived.is_reactive());
        assert_eq!(derived.get(), 7);
    }

    #[test]
    fn unchanged_result_does_not_propagate() {
        let a = Atom::new(2);
        let a_clone = a.clone();
        let parity = DerivedAtom::new(move || a_clone.get() % 2);

        let fired = Arc::new(AtomicI32::new(0));
        let fired_clone = fired.clone();
        parity.add_action(move |_, _| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        a.set(4);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        a.set(5);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(parity.get_untracked(), 1);
    }

    #[test]
    fn derived_depends_on_derived() {
        let base = Atom::new(5);
        let base_clone = base.clone();
        let doubled = DerivedAtom::new(move || base_clone.get() * 2);
        let doubled_clone = doubled.clone();
        let plus_ten = DerivedAtom::new(move || doubled_clone.get() + 10);

        assert_eq!(plus_ten.get(), 20);
        assert_eq!(doubled.derived_count(), 1);

        base.set(10);
        assert_eq!(doubled.get_untracked(), 20);
        assert_eq!(plus_ten.get_untracked(), 30);
    }

    #[test]
    fn stale_dependencies_are_pruned() {
        let use_left = Atom::new(true);
        let left = Atom::new(1);
        let right = Atom::new(2);

        let (use_left_c, left_c, right_c) = (use_left.clone(), left.clone(), right.clone());
        let chosen = DerivedAtom::new(move || {
            if use_left_c.get() {
                left_c.get()
            } else {
                right_c.get()
            }
        });

        assert_eq!(left.derived_count(), 1);
        assert_eq!(right.derived_count(), 0);

        use_left.set(false);
        assert_eq!(chosen.get_untracked(), 2);
        assert_eq!(left.derived_count(), 0);
        assert_eq!(right.derived_count(), 1);
        assert_eq!(chosen.referenced_count(), 2);
    }

    #[test]
    fn initial_value_defers_discovery() {
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let a = Atom::new(3);
        let a_clone = a.clone();

        let derived = DerivedAtom::with_initial(
            move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                a_clone.get() + 1
            },
            0,
            CellOptions::new(),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(derived.get_untracked(), 0);
        assert!(!derived.is_reactive());

        assert_eq!(derived.get(), 4);
        assert!(derived.is_reactive());

        a.set(10);
        assert_eq!(derived.get_untracked(), 11);
    }

    #[test]
    fn release_detaches_from_upstream() {
        let a = Atom::new(1);
        let a_clone = a.clone();
        let derived = DerivedAtom::new(move || a_clone.get() + 1);
        assert_eq!(a.derived_count(), 1);

        derived.release();
        assert_eq!(a.derived_count(), 0);
        assert_eq!(derived.referenced_count(), 0);

        a.set(5);
        assert_eq!(derived.get_untracked(), 2);
    }

    #[test]
    fn construction_inside_reaction_does_not_leak_listeners() {
        let a = Atom::new(1);
        let a_clone = a.clone();
        let slot: Arc<Mutex<Option<DerivedAtom<i32>>>> = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();

        let reaction = ReactiveAction::new(move || {
            let a_inner = a_clone.clone();
            *slot_clone.lock() = Some(DerivedAtom::new(move || a_inner.get()));
        });
        reaction.perform();

        assert_eq!(a.reaction_count(), 0);
        assert_eq!(a.derived_count(), 1);
    }

    #[test]
    fn evaluation_panic_leaves_stacks_balanced() {
        let a = Atom::new(0);
        let a_clone = a.clone();
        let derived = DerivedAtom::new(move || {
            let value = a_clone.get();
            if value > 10 {
                panic!("out of range");
            }
            value
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| a.set(11)));
        assert!(result.is_err());
        assert_eq!(context::derivation_depth(), 0);

        a.set(3);
        assert_eq!(derived.get_untracked(), 3);
    }
}
