//! Cascade Core
//!
//! This crate provides a reactive dataflow engine. It implements:
//!
//! - Cells (`Atom`) and computed cells (`DerivedAtom`) with automatic
//!   dependency discovery
//! - Synchronous actions and two-phase, optionally debounced reactions
//! - Gated asynchronous writes
//! - Structural containers that keep change detection a plain equality
//!   check (arrays, sets, counters, toggles, carousels)
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: cells, computed cells, reactions and the propagation context
//! - `containers`: copy-then-replace wrappers around cells
//! - `graph`: node identities and timer scheduling
//! - `config`: cell options, serializable settings
//! - `error`: the crate error type
//!
//! # Example
//!
//! ```rust,ignore
//! use cascade_core::{cell, computed, ReactiveAction};
//!
//! // Create a cell
//! let count = cell(0);
//!
//! // Create a computed cell
//! let doubled = computed({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! // Create a reaction
//! let log = ReactiveAction::new(move || {
//!     tracing::info!(doubled = doubled.get(), "count changed");
//! });
//! log.perform();
//!
//! // Update the cell; the computed cell re-derives and the reaction runs.
//! count.set(5);
//! ```

pub mod config;
pub mod containers;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::{CellConfig, CellOptions, ChildObserver};
pub use containers::{
    array_cell, array_cell_with, ArrayAtom, CarouselAtom, CounterAtom, Limit, SetAtom, ToggleAtom,
};
pub use error::{CascadeError, Result};
pub use graph::{NodeId, NodeKind, ReactionId};
pub use reactive::{
    cell, cell_with, computed, computed_with, evaluate_without_reactions, untracked, wrap, Atom,
    DerivedAtom, LayoutPass, Reactive, ReactiveAction, WeakAtom,
};
