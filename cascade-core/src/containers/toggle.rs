//! Boolean Toggle
//!
//! [`ToggleAtom`] is a boolean cell paired with a negated twin. Writing
//! either side updates the other. Each side's link to its twin is the first
//! action it runs, so the twin is consistent before any other subscriber
//! sees the change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::CellOptions;
use crate::graph::NodeId;
use crate::reactive::{Atom, Reactive};

/// Set while one side is writing its twin.
struct SettingNegation<'a>(&'a AtomicBool);

impl<'a> SettingNegation<'a> {
    fn enter(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for SettingNegation<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A boolean cell with a negated twin.
#[derive(Clone)]
pub struct ToggleAtom {
    atom: Atom<bool>,
    twin: Atom<bool>,
    setting_negation: Arc<AtomicBool>,
}

impl ToggleAtom {
    pub fn new(value: bool) -> Self {
        Self::with_options(value, CellOptions::default())
    }

    /// The options apply to this side only. A named toggle's twin is named
    /// `"<name>.not"`.
    pub fn with_options(value: bool, options: CellOptions<bool>) -> Self {
        let twin_options = match options.config().name.as_deref() {
            Some(name) => CellOptions::new().name(format!("{name}.not")),
            None => CellOptions::new(),
        };
        let atom = Atom::with_options(value, options);
        let twin = Atom::with_options(!value, twin_options);
        let setting_negation = Arc::new(AtomicBool::new(false));

        link(&atom, &twin, &setting_negation);
        link(&twin, &atom, &setting_negation);

        Self {
            atom,
            twin,
            setting_negation,
        }
    }

    pub fn atom(&self) -> &Atom<bool> {
        &self.atom
    }

    pub fn id(&self) -> NodeId {
        self.atom.id()
    }

    pub fn get(&self) -> bool {
        self.atom.get()
    }

    pub fn get_untracked(&self) -> bool {
        self.atom.get_untracked()
    }

    pub fn set(&self, value: bool) {
        self.atom.set(value);
    }

    pub fn toggle(&self) {
        self.atom.set(!self.atom.get_untracked());
    }

    /// The twin, as a toggle of its own. Its negation is this toggle.
    pub fn negation(&self) -> ToggleAtom {
        Self {
            atom: self.twin.clone(),
            twin: self.atom.clone(),
            setting_negation: Arc::clone(&self.setting_negation),
        }
    }

    pub fn release(&self) {
        self.atom.release();
        self.twin.release();
    }
}

fn link(from: &Atom<bool>, to: &Atom<bool>, setting_negation: &Arc<AtomicBool>) {
    let to = to.downgrade();
    let setting_negation = Arc::clone(setting_negation);
    from.add_action_first(move |value, _| {
        let Some(_guard) = SettingNegation::enter(&setting_negation) else {
            return;
        };
        if let Some(to) = to.upgrade() {
            to.set(!*value);
        }
    });
}

impl Reactive<bool> for ToggleAtom {
    fn get(&self) -> bool {
        ToggleAtom::get(self)
    }

    fn get_untracked(&self) -> bool {
        ToggleAtom::get_untracked(self)
    }

    fn node_id(&self) -> NodeId {
        self.atom.id()
    }
}

impl std::fmt::Debug for ToggleAtom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToggleAtom")
            .field("id", &self.atom.id())
            .field("value", &self.get_untracked())
            .finish()
    }
}
