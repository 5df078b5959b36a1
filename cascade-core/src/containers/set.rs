//! Set Cell
//!
//! [`SetAtom`] stores an insertion-ordered `IndexSet` behind an `Arc`, with
//! the same copy-then-replace discipline as [`super::ArrayAtom`].

use std::hash::Hash;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::config::CellOptions;
use crate::graph::NodeId;
use crate::reactive::{Atom, Reactive};

pub struct SetAtom<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    atom: Atom<Arc<IndexSet<T>>>,
}

impl<T> SetAtom<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    pub fn new<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::with_options(items, CellOptions::default())
    }

    pub fn with_options<I>(items: I, options: CellOptions<Arc<IndexSet<T>>>) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self {
            atom: Atom::with_options(Arc::new(items.into_iter().collect()), options),
        }
    }

    pub fn atom(&self) -> &Atom<Arc<IndexSet<T>>> {
        &self.atom
    }

    pub fn id(&self) -> NodeId {
        self.atom.id()
    }

    pub fn get(&self) -> Arc<IndexSet<T>> {
        self.atom.get()
    }

    pub fn get_untracked(&self) -> Arc<IndexSet<T>> {
        self.atom.get_untracked()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.get().contains(item)
    }

    pub fn len(&self) -> usize {
        self.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.get().is_empty()
    }

    pub fn set<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.atom.set(Arc::new(items.into_iter().collect()));
    }

    /// Returns whether the item was new.
    pub fn insert(&self, item: T) -> bool {
        let current = self.atom.get_untracked();
        if current.contains(&item) {
            return false;
        }
        let mut next = IndexSet::clone(&current);
        next.insert(item);
        self.atom.set(Arc::new(next));
        true
    }

    /// Returns whether the item was present.
    pub fn remove(&self, item: &T) -> bool {
        let current = self.atom.get_untracked();
        if !current.contains(item) {
            return false;
        }
        let mut next = IndexSet::clone(&current);
        next.shift_remove(item);
        self.atom.set(Arc::new(next));
        true
    }

    /// Insert when absent, remove when present. Returns whether the item is
    /// now in the set.
    pub fn toggle(&self, item: T) -> bool {
        if self.remove(&item) {
            false
        } else {
            self.insert(item)
        }
    }

    pub fn clear(&self) {
        self.atom.set(Arc::new(IndexSet::new()));
    }

    pub fn release(&self) {
        self.atom.release();
    }
}

impl<T> Reactive<Arc<IndexSet<T>>> for SetAtom<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn get(&self) -> Arc<IndexSet<T>> {
        SetAtom::get(self)
    }

    fn get_untracked(&self) -> Arc<IndexSet<T>> {
        SetAtom::get_untracked(self)
    }

    fn node_id(&self) -> NodeId {
        self.atom.id()
    }
}

impl<T> Clone for SetAtom<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            atom: self.atom.clone(),
        }
    }
}

impl<T> std::fmt::Debug for SetAtom<T>
where
    T: Clone + Eq + Hash + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetAtom")
            .field("id", &self.atom.id())
            .field("items", &self.get_untracked())
            .finish()
    }
}
