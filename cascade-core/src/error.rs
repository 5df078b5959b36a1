//! Error Types
//!
//! Only recoverable conditions are errors. Misuse of the graph (reading a
//! cell during a layout pass, runaway re-entrant propagation) panics with
//! the offending cell's name instead.

use thiserror::Error;

/// Boxed error returned by a before-action that refuses a gated write.
pub type GateError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the reactive engine.
#[derive(Debug, Error)]
pub enum CascadeError {
    /// A before-action gating `set_async` rejected. The write was not applied.
    #[error("gated write to cell {cell} was rejected")]
    GateRejected {
        /// Display name of the cell whose write was refused.
        cell: String,
        #[source]
        source: GateError,
    },

    /// A cell configuration document could not be parsed.
    #[error("invalid cell configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CascadeError>;
