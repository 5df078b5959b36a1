//! Reactive Primitives
//!
//! This module implements the engine: cells, computed cells, reactions and
//! the propagation context that ties them together.
//!
//! # Concepts
//!
//! ## Cells
//!
//! An [`Atom`] holds a mutable value. Writing a different value runs the
//! cell's actions, then its reactions, then re-derives its dependent
//! computed cells, depth first and synchronously.
//!
//! ## Computed Cells
//!
//! A [`DerivedAtom`] holds the result of a function of other cells. It
//! finds its dependencies by watching which cells the function reads.
//!
//! ## Reactions
//!
//! A [`ReactiveAction`] has an immediate phase that subscribes to whatever
//! it reads, and a deferred phase that runs (optionally debounced) when any
//! of those cells change.
//!
//! # Implementation Notes
//!
//! Dependency discovery uses thread-local stacks (see [`context`]). When a
//! cell is read we look at the top of each stack and register what we find.

mod atom;
pub mod context;
mod derived;
mod reaction;

pub use atom::{Atom, BeforeAction, WeakAtom};
pub use context::{
    evaluate_without_reactions, is_layout_in_progress, reactions_disabled, untracked, LayoutPass,
};
pub use derived::DerivedAtom;
pub use reaction::{ReactionBuilder, ReactiveAction};

use crate::config::CellOptions;
use crate::graph::NodeId;

/// Anything that can be read reactively.
pub trait Reactive<T> {
    /// Read and register the current reaction or computed cell.
    fn get(&self) -> T;

    /// Read without registering anything.
    fn get_untracked(&self) -> T;

    fn node_id(&self) -> NodeId;
}

/// Create a cell.
pub fn cell<T>(value: T) -> Atom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    Atom::new(value)
}

pub fn cell_with<T>(value: T, options: CellOptions<T>) -> Atom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    Atom::with_options(value, options)
}

/// Create a computed cell.
pub fn computed<T, F>(compute: F) -> DerivedAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    DerivedAtom::new(compute)
}

pub fn computed_with<T, F>(compute: F, options: CellOptions<T>) -> DerivedAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    DerivedAtom::with_options(compute, options)
}

/// Share an existing cell. The result is the same cell, not a copy.
pub fn wrap<T>(existing: &Atom<T>) -> Atom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    existing.clone()
}
