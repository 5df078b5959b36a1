//! Bounded Counter
//!
//! [`CounterAtom`] is an `i64` cell clamped to optional bounds on every
//! write. A bound is either a fixed number or another cell; when a cell
//! bound changes the counter re-clamps itself.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::config::CellOptions;
use crate::graph::NodeId;
use crate::reactive::{Atom, Reactive, WeakAtom};

/// One side of a counter's range.
#[derive(Clone)]
pub enum Limit {
    Fixed(i64),
    Cell(Atom<i64>),
}

impl Limit {
    fn value(&self) -> i64 {
        match self {
            Limit::Fixed(value) => *value,
            Limit::Cell(cell) => cell.get_untracked(),
        }
    }
}

impl From<i64> for Limit {
    fn from(value: i64) -> Self {
        Limit::Fixed(value)
    }
}

impl From<Atom<i64>> for Limit {
    fn from(cell: Atom<i64>) -> Self {
        Limit::Cell(cell)
    }
}

impl From<&Atom<i64>> for Limit {
    fn from(cell: &Atom<i64>) -> Self {
        Limit::Cell(cell.clone())
    }
}

#[derive(Default)]
struct Limits {
    min: Option<Limit>,
    max: Option<Limit>,
}

impl Limits {
    // With crossed bounds the minimum wins.
    fn clamp(&self, value: i64) -> i64 {
        let value = match &self.max {
            Some(max) => value.min(max.value()),
            None => value,
        };
        match &self.min {
            Some(min) => value.max(min.value()),
            None => value,
        }
    }
}

/// A clamped integer cell.
///
/// # Example
///
/// ```rust,ignore
/// let page_count = cell(3);
/// let page = CounterAtom::new(0).with_min(0i64).with_max(&page_count);
///
/// page.add(10);
/// assert_eq!(page.get(), 3);
///
/// page_count.set(1);
/// assert_eq!(page.get(), 1);
/// ```
#[derive(Clone)]
pub struct CounterAtom {
    atom: Atom<i64>,
    limits: Arc<RwLock<Limits>>,
    step: i64,
}

impl CounterAtom {
    pub fn new(value: i64) -> Self {
        Self::with_options(value, CellOptions::default())
    }

    pub fn with_options(value: i64, options: CellOptions<i64>) -> Self {
        Self {
            atom: Atom::with_options(value, options),
            limits: Arc::new(RwLock::new(Limits::default())),
            step: 1,
        }
    }

    pub fn with_min(self, min: impl Into<Limit>) -> Self {
        let min = min.into();
        self.watch(&min);
        self.limits.write().min = Some(min);
        self.clamp_current();
        self
    }

    pub fn with_max(self, max: impl Into<Limit>) -> Self {
        let max = max.into();
        self.watch(&max);
        self.limits.write().max = Some(max);
        self.clamp_current();
        self
    }

    /// Amount used by `increment` and `decrement`.
    pub fn with_step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }

    fn watch(&self, limit: &Limit) {
        let Limit::Cell(bound) = limit else {
            return;
        };
        let counter: WeakAtom<i64> = self.atom.downgrade();
        let limits: Weak<RwLock<Limits>> = Arc::downgrade(&self.limits);
        bound.add_action(move |_, _| {
            let (Some(counter), Some(limits)) = (counter.upgrade(), limits.upgrade()) else {
                return;
            };
            let clamped = limits.read().clamp(counter.get_untracked());
            counter.set(clamped);
        });
    }

    fn clamp_current(&self) {
        let clamped = self.limits.read().clamp(self.atom.get_untracked());
        self.atom.set(clamped);
    }

    pub fn atom(&self) -> &Atom<i64> {
        &self.atom
    }

    pub fn id(&self) -> NodeId {
        self.atom.id()
    }

    pub fn get(&self) -> i64 {
        self.atom.get()
    }

    pub fn get_untracked(&self) -> i64 {
        self.atom.get_untracked()
    }

    pub fn min(&self) -> Option<i64> {
        self.limits.read().min.as_ref().map(Limit::value)
    }

    pub fn max(&self) -> Option<i64> {
        self.limits.read().max.as_ref().map(Limit::value)
    }

    pub fn set(&self, value: i64) {
        let clamped = self.limits.read().clamp(value);
        self.atom.set(clamped);
    }

    pub fn add(&self, delta: i64) {
        self.set(self.atom.get_untracked().saturating_add(delta));
    }

    pub fn increment(&self) {
        self.add(self.step);
    }

    pub fn decrement(&self) {
        self.add(self.step.saturating_neg());
    }

    pub fn release(&self) {
        self.atom.release();
    }
}

impl Reactive<i64> for CounterAtom {
    fn get(&self) -> i64 {
        CounterAtom::get(self)
    }

    fn get_untracked(&self) -> i64 {
        CounterAtom::get_untracked(self)
    }

    fn node_id(&self) -> NodeId {
        self.atom.id()
    }
}

impl std::fmt::Debug for CounterAtom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterAtom")
            .field("id", &self.atom.id())
            .field("value", &self.get_untracked())
            .field("min", &self.min())
            .field("max", &self.max())
            .field("step", &self.step)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_counter_steps() {
        let counter = CounterAtom::new(5).with_step(2);
        counter.increment();
        counter.increment();
        counter.decrement();
        assert_eq!(counter.get(), 7);
        assert_eq!(counter.min(), None);
    }

    #[test]
    fn fixed_bounds_clamp_every_write() {
        let counter = CounterAtom::new(0).with_min(0i64).with_max(3i64);

        counter.decrement();
        assert_eq!(counter.get(), 0);

        counter.add(10);
        assert_eq!(counter.get(), 3);

        counter.set(-7);
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn initial_value_is_clamped() {
        let counter = CounterAtom::new(50).with_max(10i64);
        assert_eq!(counter.get(), 10);
    }

    #[test]
    fn cell_bound_reclamps_on_change() {
        let max = Atom::new(10i64);
        let counter = CounterAtom::new(8).with_min(0i64).with_max(&max);

        max.set(5);
        assert_eq!(counter.get(), 5);
        assert_eq!(counter.max(), Some(5));

        max.set(20);
        counter.add(7);
        assert_eq!(counter.get(), 12);
    }

    #[test]
    fn crossed_bounds_prefer_minimum() {
        let counter = CounterAtom::new(0).with_min(4i64).with_max(2i64);
        counter.set(3);
        assert_eq!(counter.get(), 4);
    }

    #[test]
    fn dropped_counter_detaches_from_bound() {
        let max = Atom::new(10i64);
        let counter = CounterAtom::new(8).with_max(&max);
        drop(counter);

        // The bound's action finds nothing to clamp.
        max.set(1);
        assert_eq!(max.get(), 1);
    }
}
