//! Reaction Implementation
//!
//! A reaction is a two-phase subscriber.
//!
//! # How Reactions Work
//!
//! 1. `perform()` runs the immediate phase (`action`) with the reaction on
//!    top of the reaction stack. Every cell read during that phase registers
//!    the reaction as a listener; the caller never lists dependencies.
//!
//! 2. When one of those cells changes, it calls `perform_reaction()`.
//!
//! 3. The deferred phase (`reaction`, defaulting to `action`) runs either
//!    synchronously or, with a debounce window, once per burst of changes.
//!    The deferred phase does not re-register dependencies.
//!
//! # Use Cases
//!
//! The immediate phase establishes dependencies and applies a value once
//! ("compute the style and apply it now"); the deferred phase re-renders on
//! later changes, possibly batched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::graph::scheduler::TimerSlot;
use crate::graph::ReactionId;

use super::context::ReactionScope;

type Phase = Arc<dyn Fn() + Send + Sync>;

struct ReactionInner {
    id: ReactionId,
    name: Option<String>,
    action: Phase,
    reaction: Phase,
    debounce: Option<Duration>,
    waiting: AtomicBool,
    timer: TimerSlot,
}

/// A two-phase reactive subscriber.
///
/// # Example
///
/// ```rust,ignore
/// let width = cell(80);
///
/// let layout = ReactiveAction::builder({
///     let width = width.clone();
///     move || apply_width(width.get())
/// })
/// .debounce(Duration::from_millis(16))
/// .build();
///
/// layout.perform();  // applies now, subscribes to `width`
/// width.set(120);    // re-applies once, 16ms later
/// ```
#[derive(Clone)]
pub struct ReactiveAction {
    inner: Arc<ReactionInner>,
}

/// Builder for [`ReactiveAction`].
pub struct ReactionBuilder {
    name: Option<String>,
    action: Phase,
    reaction: Option<Phase>,
    debounce: Option<Duration>,
}

impl ReactionBuilder {
    /// Use a different closure for the deferred phase.
    pub fn reaction<F>(mut self, reaction: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.reaction = Some(Arc::new(reaction));
        self
    }

    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = Some(window).filter(|window| !window.is_zero());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn build(self) -> ReactiveAction {
        let reaction = self.reaction.unwrap_or_else(|| Arc::clone(&self.action));
        ReactiveAction {
            inner: Arc::new(ReactionInner {
                id: ReactionId::new(),
                name: self.name,
                action: self.action,
                reaction,
                debounce: self.debounce,
                waiting: AtomicBool::new(false),
                timer: TimerSlot::new(),
            }),
        }
    }
}

impl ReactiveAction {
    /// Create a synchronous reaction whose deferred phase repeats `action`.
    pub fn new<F>(action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::builder(action).build()
    }

    pub fn builder<F>(action: F) -> ReactionBuilder
    where
        F: Fn() + Send + Sync + 'static,
    {
        ReactionBuilder {
            name: None,
            action: Arc::new(action),
            reaction: None,
            debounce: None,
        }
    }

    pub fn id(&self) -> ReactionId {
        self.inner.id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn debounce(&self) -> Option<Duration> {
        self.inner.debounce
    }

    /// Whether a debounced deferred run is pending.
    pub fn is_waiting(&self) -> bool {
        self.inner.waiting.load(Ordering::SeqCst)
    }

    /// Run the immediate phase, registering this reaction on every cell it
    /// reads.
    pub fn perform(&self) {
        let _scope = ReactionScope::enter(self.clone());
        (self.inner.action)();
    }

    /// Called by a cell whose value changed.
    pub fn perform_reaction(&self) {
        let Some(window) = self.inner.debounce else {
            self.perform_reaction_now();
            return;
        };

        if self.inner.waiting.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::trace!(reaction = self.inner.id.raw(), ?window, "deferring reaction");
        let this = self.clone();
        let armed = self
            .inner
            .timer
            .arm(window, move || this.perform_reaction_now());

        if !armed {
            tracing::warn!(
                reaction = self.inner.id.raw(),
                "no async runtime for debounced reaction; running it now"
            );
            self.perform_reaction_now();
        }
    }

    /// Run the deferred phase immediately.
    pub fn perform_reaction_now(&self) {
        self.inner.waiting.store(false, Ordering::SeqCst);
        (self.inner.reaction)();
    }

    /// Drop a pending debounced run. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        self.inner.waiting.store(false, Ordering::SeqCst);
        self.inner.timer.cancel()
    }
}

impl PartialEq for ReactiveAction {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ReactiveAction {}

impl std::fmt::Debug for ReactiveAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveAction")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("debounce", &self.inner.debounce)
            .field("waiting", &self.is_waiting())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
