//! Carousel
//!
//! A list of items plus a selected index. The selected item is a computed
//! cell, so anything that reads it follows both the list and the index.

use crate::config::CellOptions;
use crate::graph::NodeId;
use crate::reactive::{Atom, DerivedAtom, Reactive};

use super::ArrayAtom;

pub struct CarouselAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    items: ArrayAtom<T>,
    index: Atom<usize>,
    current: DerivedAtom<Option<T>>,
}

impl<T> CarouselAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(items: Vec<T>) -> Self {
        let items = ArrayAtom::new(items);
        let index = Atom::new(0);

        let current = DerivedAtom::with_options(
            {
                let items = items.clone();
                let index = index.clone();
                move || items.get().get(index.get()).cloned()
            },
            CellOptions::new().name("carousel.current"),
        );

        // Keep the index inside the list when it shrinks.
        let weak_index = index.downgrade();
        items.atom().add_action(move |list, _| {
            let Some(index) = weak_index.upgrade() else {
                return;
            };
            let last = list.len().saturating_sub(1);
            if index.get_untracked() > last {
                index.set(last);
            }
        });

        Self {
            items,
            index,
            current,
        }
    }

    pub fn items(&self) -> &ArrayAtom<T> {
        &self.items
    }

    pub fn index_cell(&self) -> &Atom<usize> {
        &self.index
    }

    pub fn current_cell(&self) -> &DerivedAtom<Option<T>> {
        &self.current
    }

    pub fn id(&self) -> NodeId {
        self.current.id()
    }

    pub fn current(&self) -> Option<T> {
        self.current.get()
    }

    pub fn index(&self) -> usize {
        self.index.get()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Select `index`. Returns false, leaving the selection alone, when it is
    /// out of range.
    pub fn select(&self, index: usize) -> bool {
        if index >= self.items.get_untracked().len() {
            return false;
        }
        self.index.set(index);
        true
    }

    pub fn next(&self) {
        let len = self.items.get_untracked().len();
        if len == 0 {
            return;
        }
        self.index.set((self.index.get_untracked() + 1) % len);
    }

    pub fn previous(&self) {
        let len = self.items.get_untracked().len();
        if len == 0 {
            return;
        }
        let index = self.index.get_untracked().min(len - 1);
        self.index.set((index + len - 1) % len);
    }

    pub fn release(&self) {
        self.current.release();
        self.items.release();
        self.index.release();
    }
}

impl<T> Reactive<Option<T>> for CarouselAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn get(&self) -> Option<T> {
        self.current()
    }

    fn get_untracked(&self) -> Option<T> {
        self.current.get_untracked()
    }

    fn node_id(&self) -> NodeId {
        self.current.id()
    }
}

impl<T> Clone for CarouselAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            index: self.index.clone(),
            current: self.current.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn next_and_previous_wrap() {
        let slides = CarouselAtom::new(vec!["a", "b", "c"]);
        assert_eq!(slides.current(), Some("a"));

        slides.previous();
        assert_eq!(slides.current(), Some("c"));

        slides.next();
        slides.next();
        assert_eq!(slides.index(), 1);
        assert_eq!(slides.current(), Some("b"));
    }

    #[test]
    fn select_rejects_out_of_range() {
        let slides = CarouselAtom::new(vec![10, 20]);
        assert!(slides.select(1));
        assert!(!slides.select(2));
        assert_eq!(slides.current(), Some(20));
    }

    #[test]
    fn empty_carousel_has_no_current() {
        let slides = CarouselAtom::new(Vec::<u8>::new());
        slides.next();
        slides.previous();
        assert_eq!(slides.current(), None);
        assert_eq!(slides.index(), 0);
    }

    #[test]
    fn shrinking_list_clamps_index() {
        let slides = CarouselAtom::new(vec![1, 2, 3, 4]);
        slides.select(3);

        slides.items().splice(2, 2, []);
        assert_eq!(slides.index(), 1);
        assert_eq!(slides.current(), Some(2));
    }

    #[test]
    fn current_cell_notifies_subscribers() {
        let slides = CarouselAtom::new(vec!['x', 'y']);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        slides.current_cell().add_action(move |value, _| {
            seen_clone.lock().push(*value);
        });

        slides.next();
        slides.items().splice_one(1, 'z');

        assert_eq!(*seen.lock(), vec![Some('y'), Some('z')]);
    }
}
