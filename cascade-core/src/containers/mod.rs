//! Structural Containers
//!
//! Reactive wrappers around collections and small state machines. Each one
//! owns a plain [`Atom`](crate::reactive::Atom) and routes every mutation
//! through `set` with a freshly built value, never editing the stored value
//! in place. That keeps change detection a plain equality check.
//!
//! - [`ArrayAtom`]: a vector with list mutators and sorting.
//! - [`SetAtom`]: an insertion-ordered set.
//! - [`CounterAtom`]: an integer clamped to fixed or reactive bounds.
//! - [`ToggleAtom`]: a boolean with a negated twin.
//! - [`CarouselAtom`]: a list with a wrapping selection.

mod array;
mod carousel;
mod counter;
mod set;
mod toggle;

pub use array::ArrayAtom;
pub use carousel::CarouselAtom;
pub use counter::{CounterAtom, Limit};
pub use set::SetAtom;
pub use toggle::ToggleAtom;

use crate::config::CellOptions;
use std::sync::Arc;

/// Create an array cell.
pub fn array_cell<T>(items: Vec<T>) -> ArrayAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    ArrayAtom::new(items)
}

pub fn array_cell_with<T>(items: Vec<T>, options: CellOptions<Arc<Vec<T>>>) -> ArrayAtom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    ArrayAtom::with_options(items, options)
}
