//! Array Cell
//!
//! [`ArrayAtom`] stores an `Arc<Vec<T>>`. Every mutator copies the current
//! vector, edits the copy and `set`s a new `Arc`, so a snapshot returned by
//! an earlier `get()` never changes underneath its holder and the cell's
//! equality check sees a real before/after pair.

use std::cmp::Ordering as CmpOrdering;
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::CellOptions;
use crate::graph::NodeId;
use crate::reactive::{Atom, Reactive};

/// A reactive vector with copy-then-replace mutators.
pub struct ArrayAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    atom: Atom<Arc<Vec<T>>>,
    ascending: Arc<AtomicBool>,
}

impl<T> ArrayAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(items: Vec<T>) -> Self {
        Self::with_options(items, CellOptions::default())
    }

    pub fn with_options(items: Vec<T>, options: CellOptions<Arc<Vec<T>>>) -> Self {
        Self {
            atom: Atom::with_options(Arc::new(items), options),
            ascending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The underlying cell, for subscribing.
    pub fn atom(&self) -> &Atom<Arc<Vec<T>>> {
        &self.atom
    }

    pub fn id(&self) -> NodeId {
        self.atom.id()
    }

    pub fn get(&self) -> Arc<Vec<T>> {
        self.atom.get()
    }

    pub fn get_untracked(&self) -> Arc<Vec<T>> {
        self.atom.get_untracked()
    }

    pub fn len(&self) -> usize {
        self.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.get().is_empty()
    }

    pub fn set(&self, items: Vec<T>) {
        self.atom.set(Arc::new(items));
    }

    /// Copy the current vector, let `edit` change the copy, then write it.
    fn modify<R>(&self, edit: impl FnOnce(&mut Vec<T>) -> R) -> R {
        let mut next = Vec::clone(&self.atom.get_untracked());
        let result = edit(&mut next);
        self.atom.set(Arc::new(next));
        result
    }

    pub fn push(&self, item: T) {
        self.modify(|items| items.push(item));
    }

    pub fn pop(&self) -> Option<T> {
        if self.atom.get_untracked().is_empty() {
            return None;
        }
        self.modify(Vec::pop)
    }

    /// Remove the first element equal to `item`.
    pub fn delete(&self, item: &T) -> bool {
        let Some(index) = self.atom.get_untracked().iter().position(|x| x == item) else {
            return false;
        };
        self.modify(|items| items.remove(index));
        true
    }

    pub fn delete_index(&self, index: usize) -> Option<T> {
        if index >= self.atom.get_untracked().len() {
            return None;
        }
        Some(self.modify(|items| items.remove(index)))
    }

    /// Insert at `index`, clamped to the current length.
    pub fn insert(&self, index: usize, item: T) {
        self.modify(|items| {
            let index = index.min(items.len());
            items.insert(index, item);
        });
    }

    /// Remove `delete_count` elements starting at `start` and insert
    /// `replacement` in their place. Out-of-range bounds are clamped.
    /// Returns the removed elements.
    pub fn splice<I>(&self, start: usize, delete_count: usize, replacement: I) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
    {
        self.modify(|items| {
            let start = start.min(items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            items.splice(start..end, replacement).collect()
        })
    }

    /// Replace the element at `index`, returning the old one.
    pub fn splice_one(&self, index: usize, item: T) -> Option<T> {
        if index >= self.atom.get_untracked().len() {
            return None;
        }
        Some(self.modify(|items| std::mem::replace(&mut items[index], item)))
    }

    /// Replace the first element equal to `old` with `new`.
    pub fn replace(&self, old: &T, new: T) -> bool {
        let Some(index) = self.atom.get_untracked().iter().position(|x| x == old) else {
            return false;
        };
        self.modify(|items| items[index] = new);
        true
    }

    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&T, &T) -> CmpOrdering,
    {
        self.modify(|items| items.sort_by(compare));
    }

    pub fn sort_by_key<K, F>(&self, key: F)
    where
        K: Ord,
        F: FnMut(&T) -> K,
    {
        self.modify(|items| items.sort_by_key(key));
    }

    pub fn reverse(&self) {
        self.modify(|items| items.reverse());
    }

    pub fn clear(&self) {
        self.atom.set(Arc::new(Vec::new()));
    }

    pub fn release(&self) {
        self.atom.release();
    }
}

impl<T> ArrayAtom<T>
where
    T: Clone + PartialEq + Ord + Send + Sync + 'static,
{
    pub fn sort(&self) {
        self.modify(|items| items.sort());
    }

    /// Sort ascending on the first call, then alternate direction.
    pub fn toggle_sort(&self) {
        let ascending = !self.ascending.fetch_xor(true, Ordering::SeqCst);
        self.modify(|items| {
            if ascending {
                items.sort();
            } else {
                items.sort_by(|a, b| b.cmp(a));
            }
        });
    }

    /// Direction of the last `toggle_sort`.
    pub fn is_sorted_ascending(&self) -> bool {
        self.ascending.load(Ordering::SeqCst)
    }
}

impl<T> Reactive<Arc<Vec<T>>> for ArrayAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn get(&self) -> Arc<Vec<T>> {
        ArrayAtom::get(self)
    }

    fn get_untracked(&self) -> Arc<Vec<T>> {
        ArrayAtom::get_untracked(self)
    }

    fn node_id(&self) -> NodeId {
        self.atom.id()
    }
}

impl<T> Clone for ArrayAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            atom: self.atom.clone(),
            ascending: Arc::clone(&self.ascending),
        }
    }
}

impl<T> Debug for ArrayAtom<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayAtom")
            .field("id", &self.atom.id())
            .field("items", &self.get_untracked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    fn watched(items: Vec<i32>) -> (ArrayAtom<i32>, Arc<AtomicI32>) {
        let array = ArrayAtom::new(items);
        let fired = Arc::new(AtomicI32::new(0));
        let fired_clone = fired.clone();
        array.atom().add_action(move |_, _| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        (array, fired)
    }

    #[test]
    fn push_leaves_earlier_snapshot_untouched() {
        let (array, fired) = watched(vec![1, 2]);
        let before = array.get();

        array.push(3);

        assert_eq!(*before, vec![1, 2]);
        assert_eq!(*array.get(), vec![1, 2, 3]);
        assert!(!Arc::ptr_eq(&before, &array.get()));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pop_and_delete() {
        let (array, fired) = watched(vec![1, 2, 3, 2]);

        assert_eq!(array.pop(), Some(2));
        assert!(array.delete(&2));
        assert!(!array.delete(&9));
        assert_eq!(*array.get(), vec![1, 3]);
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        array.clear();
        assert_eq!(array.pop(), None);
        assert!(array.is_empty());
    }

    #[test]
    fn index_operations() {
        let array = ArrayAtom::new(vec!['a', 'b', 'c']);

        assert_eq!(array.delete_index(1), Some('b'));
        assert_eq!(array.delete_index(10), None);

        array.insert(0, 'z');
        array.insert(99, 'y');
        assert_eq!(*array.get(), vec!['z', 'a', 'c', 'y']);

        assert_eq!(array.splice_one(1, 'q'), Some('a'));
        assert_eq!(array.splice_one(9, 'q'), None);
        assert!(array.replace(&'c', 'x'));
        assert_eq!(*array.get(), vec!['z', 'q', 'x', 'y']);
    }

    #[test]
    fn splice_clamps_bounds() {
        let array = ArrayAtom::new(vec![1, 2, 3, 4, 5]);

        let removed = array.splice(1, 2, [20, 30, 40]);
        assert_eq!(removed, vec![2, 3]);
        assert_eq!(*array.get(), vec![1, 20, 30, 40, 4, 5]);

        let removed = array.splice(4, 100, []);
        assert_eq!(removed, vec![4, 5]);
        assert_eq!(array.len(), 4);
    }

    #[test]
    fn sort_of_sorted_array_does_not_fire() {
        let (array, fired) = watched(vec![1, 2, 3]);
        array.sort();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        array.reverse();
        assert_eq!(*array.get(), vec![3, 2, 1]);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn toggle_sort_alternates() {
        let array = ArrayAtom::new(vec![2, 3, 1]);

        array.toggle_sort();
        assert!(array.is_sorted_ascending());
        assert_eq!(*array.get(), vec![1, 2, 3]);

        array.toggle_sort();
        assert!(!array.is_sorted_ascending());
        assert_eq!(*array.get(), vec![3, 2, 1]);

        array.toggle_sort();
        assert_eq!(*array.get(), vec![1, 2, 3]);
    }

    #[test]
    fn sort_by_key_and_comparator() {
        let array = ArrayAtom::new(vec!["ccc", "a", "bb"]);
        array.sort_by_key(|s| s.len());
        assert_eq!(*array.get(), vec!["a", "bb", "ccc"]);

        array.sort_by(|a, b| b.cmp(a));
        assert_eq!(*array.get(), vec!["ccc", "bb", "a"]);
    }
}
