//! Graph Identities
//!
//! Every cell and every reaction carries a process-wide, monotonically
//! increasing identifier. Edges between cells are stored as these ids
//! (plus weak back-references), never as owning pointers in both
//! directions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a cell (plain or computed) in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique identifier for a reaction.
///
/// Reactions are stored in per-cell ordered sets keyed by this id, which is
/// what makes listener registration idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReactionId(u64);

impl ReactionId {
    /// Generate a new unique reaction ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ReactionId {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A writable cell. Only its owner calls `set`.
    Source,

    /// A computed cell. Its value is written exclusively by its own
    /// re-derivation.
    Derived,
}

/// Render a node for diagnostics: the debug name when one was given,
/// otherwise the numeric id.
pub(crate) fn display_name(id: NodeId, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{name} ({id})"),
        None => id.to_string(),
    }
}
