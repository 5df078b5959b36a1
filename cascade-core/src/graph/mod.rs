//! Dependency Graph
//!
//! The graph is not a central store. Each cell owns its outgoing edges:
//!
//! - an ordered list of dependent computed cells (strong references, so a
//!   computed cell lives as long as something upstream can re-derive it),
//! - an ordered set of reactions keyed by [`ReactionId`].
//!
//! Each computed cell keeps the back-edges (the cells it read on its last
//! evaluation) as weak references keyed by [`NodeId`]. Back-edges are
//! bookkeeping only; they are used to prune stale forward edges and to
//! detach on `release()`.
//!
//! Forward edges keep the graph alive. A computed cell that captures its
//! upstream cell in its closure forms a reference cycle with it; `release()`
//! is the explicit way to break it when the owning consumer is discarded.

mod node;
pub(crate) mod scheduler;

pub use node::{NodeId, NodeKind, ReactionId};
pub(crate) use node::display_name;
