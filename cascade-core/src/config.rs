//! Cell Configuration
//!
//! Options come in two layers:
//!
//! - [`CellConfig`] is plain data and can be loaded from JSON, so hosts can
//!   keep naming, debouncing and debug flags in their own config files.
//! - [`CellOptions`] wraps a `CellConfig` and adds the hooks that cannot be
//!   serialized: the initial action, the parent container, the
//!   child-changed callback, a value printer for debug logging, and a
//!   default value for `reset()`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::NodeId;
use crate::reactive::Atom;

/// Synchronous subscriber invoked with the new value and the cell itself.
pub type Action<T> = Arc<dyn Fn(&T, &Atom<T>) + Send + Sync>;

/// Renders a value for `debug` logging.
pub type DebugPrint<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Callback a container runs when one of its child cells reports a change.
pub type ChildChanged = Arc<dyn Fn(NodeId) + Send + Sync>;

/// Something that owns child cells and wants to hear when they change.
///
/// Every [`Atom`] is one: a child created with `parent(atom)` notifies the
/// parent after its own propagation finishes.
pub trait ChildObserver: Send + Sync {
    fn child_changed(&self, child: NodeId);
}

/// Serializable cell settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellConfig {
    /// Debug name, used in diagnostics and by `move_derived_atom_first`.
    pub name: Option<String>,

    /// Fire subscribers even when the new value equals the old one.
    pub always_fire: bool,

    /// Log every change at debug level.
    pub debug: bool,

    /// Collapse bursts of `set` calls into one write after this many
    /// milliseconds. Zero or absent means synchronous.
    pub debounce_ms: Option<u64>,
}

impl CellConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The debounce window, if one is configured.
    pub fn debounce(&self) -> Option<Duration> {
        self.debounce_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Full set of options accepted by the cell constructors.
pub struct CellOptions<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) config: CellConfig,
    pub(crate) action: Option<Action<T>>,
    pub(crate) parent: Option<Arc<dyn ChildObserver>>,
    pub(crate) child_changed: Option<ChildChanged>,
    pub(crate) debug_print: Option<DebugPrint<T>>,
    pub(crate) default_value: Option<T>,
}

impl<T> Default for CellOptions<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self {
            config: CellConfig::default(),
            action: None,
            parent: None,
            child_changed: None,
            debug_print: None,
            default_value: None,
        }
    }
}

impl<T> From<CellConfig> for CellOptions<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from(config: CellConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }
}

impl<T> CellOptions<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    pub fn always_fire(mut self) -> Self {
        self.config.always_fire = true;
        self
    }

    pub fn debug(mut self) -> Self {
        self.config.debug = true;
        self
    }

    /// Debounce writes by `window`, rounded up to whole milliseconds so a
    /// non-zero window never collapses into a synchronous write.
    pub fn debounce(mut self, window: Duration) -> Self {
        let ms = window.as_nanos().div_ceil(1_000_000);
        self.config.debounce_ms = Some(u64::try_from(ms).unwrap_or(u64::MAX));
        self
    }

    /// Register an action at construction time.
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&T, &Atom<T>) + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(action));
        self
    }

    /// Report every propagated change to `parent`.
    pub fn parent<P>(mut self, parent: P) -> Self
    where
        P: ChildObserver + 'static,
    {
        self.parent = Some(Arc::new(parent));
        self
    }

    /// Run `callback` when a child of this cell changes, instead of the
    /// default `fire()`.
    pub fn child_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn(NodeId) + Send + Sync + 'static,
    {
        self.child_changed = Some(Arc::new(callback));
        self
    }

    pub fn debug_print<F>(mut self, print: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.debug_print = Some(Arc::new(print));
        self
    }

    /// Value restored by `reset()`. Without one, `reset()` restores the
    /// initial value.
    pub fn default_value(mut self, value: T) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn config(&self) -> &CellConfig {
        &self.config
    }
}
