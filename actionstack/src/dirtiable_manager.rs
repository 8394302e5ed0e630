//! Propagates the position of an action stack to the dirtiables its items
//! affect.
//!
//! Every tracked dirtiable has an *anchor*: the identifier of the topmost
//! done item affecting it, or, when no such item is left in the stack, the
//! most recent item that affected it before being swallowed or cleared. A
//! dirtiable is dirty when its anchor differs from the anchor recorded by the
//! last [`DirtiableManager::notify_save`].

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::action::{ActionItemId, ActionItemRef};
use crate::dirtiable::{Dirtiable, downgrade_dirtiable};
use crate::event::{ActionStackEvent, DiscardKind, Subscription};
use crate::stack::ActionStack;

struct TrackedDirtiable {
    dirtiable: Weak<dyn Dirtiable>,
    saved_anchor: Option<ActionItemId>,
    /// Anchor to fall back to once no done item affects the dirtiable.
    floor: Option<ActionItemId>,
    current: Option<ActionItemId>,
    /// Last dirtiness pushed to the dirtiable, `None` before the first push.
    last_dirty: Option<bool>,
}

impl TrackedDirtiable {
    fn is(&self, dirtiable: &Weak<dyn Dirtiable>) -> bool {
        Weak::ptr_eq(&self.dirtiable, dirtiable)
    }
}

#[derive(Default)]
struct ManagerState {
    tracked: Vec<TrackedDirtiable>,
    /// Done items of the stack as of the last notification.
    done_items: Vec<ActionItemRef>,
}

impl ManagerState {
    fn anchor_of(&self, dirtiable: &Weak<dyn Dirtiable>) -> Option<ActionItemId> {
        self.done_items
            .iter()
            .rev()
            .find(|item| affects(item, dirtiable))
            .map(|item| item.identifier())
    }

    fn entry(&mut self, dirtiable: &Weak<dyn Dirtiable>) -> Option<&mut TrackedDirtiable> {
        self.tracked.iter_mut().find(|entry| entry.is(dirtiable))
    }

    /// Starts tracking `dirtiable` as clean at its current anchor.
    fn track_clean(&mut self, dirtiable: Weak<dyn Dirtiable>) {
        if self.entry(&dirtiable).is_some() {
            return;
        }
        let anchor = self.anchor_of(&dirtiable);
        self.tracked.push(TrackedDirtiable {
            dirtiable,
            saved_anchor: anchor,
            floor: None,
            current: anchor,
            last_dirty: Some(false),
        });
    }

    /// Starts tracking `dirtiable` as saved before any item affected it.
    fn track_discovered(&mut self, dirtiable: Weak<dyn Dirtiable>) {
        if self.entry(&dirtiable).is_some() {
            return;
        }
        self.tracked.push(TrackedDirtiable {
            dirtiable,
            saved_anchor: None,
            floor: None,
            current: None,
            last_dirty: None,
        });
    }

    /// Recomputes every anchor and returns the dirtiables whose state must be
    /// pushed.
    fn refresh(&mut self) -> Vec<(Rc<dyn Dirtiable>, bool)> {
        self.tracked
            .retain(|entry| entry.dirtiable.strong_count() > 0);

        let anchors: Vec<Option<ActionItemId>> = self
            .tracked
            .iter()
            .map(|entry| self.anchor_of(&entry.dirtiable).or(entry.floor))
            .collect();

        let mut updates = Vec::new();
        for (entry, anchor) in self.tracked.iter_mut().zip(anchors) {
            entry.current = anchor;
            let dirty = entry.current != entry.saved_anchor;
            if entry.last_dirty != Some(dirty)
                && let Some(dirtiable) = entry.dirtiable.upgrade()
            {
                entry.last_dirty = Some(dirty);
                updates.push((dirtiable, dirty));
            }
        }
        updates
    }
}

fn affects(item: &ActionItemRef, dirtiable: &Weak<dyn Dirtiable>) -> bool {
    item.dirtiables()
        .iter()
        .any(|candidate| Weak::ptr_eq(candidate, dirtiable))
}

/// Keeps the dirtiness of documents in sync with one action stack.
///
/// The manager subscribes to the stack for its whole lifetime. Dirtiables are
/// discovered from the items added to the stack, or registered explicitly
/// with [`register_dirtiable`](Self::register_dirtiable). After saving, call
/// [`notify_save`](Self::notify_save) to mark the current state as clean.
///
/// # Example
///
/// ```ignore
/// let stack = TransactionalActionStack::new(100);
/// let manager = DirtiableManager::new(&stack);
///
/// stack.add(Rc::new(edit_document));   // document becomes dirty
/// stack.create_save_point(true);
/// manager.notify_save();                // document is clean
/// stack.undo();                         // dirty again
/// ```
pub struct DirtiableManager {
    state: Rc<RefCell<ManagerState>>,
    _subscription: Subscription,
}

impl DirtiableManager {
    /// Binds a manager to `stack`. Dirtiables affected by items already in
    /// the stack are tracked and considered clean.
    pub fn new(stack: &impl AsRef<ActionStack>) -> Self {
        let stack = stack.as_ref();
        let mut state = ManagerState {
            tracked: Vec::new(),
            done_items: stack.done_items(),
        };
        for item in stack.action_items() {
            for dirtiable in item.dirtiables() {
                state.track_clean(dirtiable);
            }
        }

        let state = Rc::new(RefCell::new(state));
        let weak = Rc::downgrade(&state);
        let subscription = stack.subscribe(move |sender, event| {
            if let Some(state) = weak.upgrade() {
                handle_event(&state, sender, event);
            }
        });

        Self {
            state,
            _subscription: subscription,
        }
    }

    /// Starts tracking `dirtiable`, considering its current state clean.
    pub fn register_dirtiable<D: Dirtiable + 'static>(&self, dirtiable: &Rc<D>) {
        self.state
            .borrow_mut()
            .track_clean(downgrade_dirtiable(dirtiable));
    }

    /// Stops tracking `dirtiable`.
    pub fn unregister_dirtiable<D: Dirtiable + 'static>(&self, dirtiable: &Rc<D>) {
        let dirtiable = downgrade_dirtiable(dirtiable);
        self.state
            .borrow_mut()
            .tracked
            .retain(|entry| !entry.is(&dirtiable));
    }

    pub fn is_tracking<D: Dirtiable + 'static>(&self, dirtiable: &Rc<D>) -> bool {
        let dirtiable = downgrade_dirtiable(dirtiable);
        self.state
            .borrow()
            .tracked
            .iter()
            .any(|entry| entry.is(&dirtiable))
    }

    /// Number of live tracked dirtiables.
    pub fn tracked_count(&self) -> usize {
        self.state
            .borrow()
            .tracked
            .iter()
            .filter(|entry| entry.dirtiable.strong_count() > 0)
            .count()
    }

    /// Records the current state as saved and marks every tracked dirtiable
    /// clean.
    pub fn notify_save(&self) {
        let dirtiables: Vec<Rc<dyn Dirtiable>> = {
            let mut state = self.state.borrow_mut();
            state
                .tracked
                .retain(|entry| entry.dirtiable.strong_count() > 0);
            state
                .tracked
                .iter_mut()
                .filter_map(|entry| {
                    entry.saved_anchor = entry.current;
                    entry.last_dirty = Some(false);
                    entry.dirtiable.upgrade()
                })
                .collect()
        };
        log::debug!("Marked {} dirtiable(s) as saved", dirtiables.len());
        for dirtiable in dirtiables {
            dirtiable.update_dirtiness(false);
        }
    }
}

fn handle_event(state: &RefCell<ManagerState>, stack: &ActionStack, event: &ActionStackEvent) {
    let mut registered: Vec<(Rc<dyn Dirtiable>, ActionItemRef)> = Vec::new();
    let mut discarded: Vec<(Rc<dyn Dirtiable>, ActionItemRef)> = Vec::new();

    let updates = {
        let mut state = state.borrow_mut();
        state.done_items = stack.done_items();

        match event {
            ActionStackEvent::ItemsAdded(items) => {
                for item in items {
                    for dirtiable in item.dirtiables() {
                        if let Some(strong) = dirtiable.upgrade() {
                            registered.push((strong, item.clone()));
                        }
                        state.track_discovered(dirtiable);
                    }
                }
            }
            ActionStackEvent::ItemsDiscarded {
                kind: DiscardKind::Swallowed,
                items,
            } => {
                for item in items {
                    for dirtiable in item.dirtiables() {
                        if let Some(strong) = dirtiable.upgrade() {
                            discarded.push((strong, item.clone()));
                        }
                        state.track_discovered(dirtiable.clone());
                        if let Some(entry) = state.entry(&dirtiable) {
                            entry.floor = Some(item.identifier());
                        }
                    }
                }
            }
            ActionStackEvent::ItemsDiscarded {
                kind: DiscardKind::Disbranched,
                items,
            } => {
                for item in items {
                    for dirtiable in item.dirtiables() {
                        if let Some(strong) = dirtiable.upgrade() {
                            discarded.push((strong, item.clone()));
                        }
                    }
                }
            }
            ActionStackEvent::ItemsDiscarded {
                kind: DiscardKind::UndoRedoInProgress,
                ..
            } => {}
            ActionStackEvent::Cleared => {
                for entry in &mut state.tracked {
                    entry.floor = entry.current;
                }
            }
            ActionStackEvent::Undone(_) | ActionStackEvent::Redone(_) => {}
        }

        state.refresh()
    };

    for (dirtiable, item) in registered {
        dirtiable.register_action_item(&item);
    }
    for (dirtiable, item) in discarded {
        dirtiable.discard_action_item(&item);
    }
    for (dirtiable, dirty) in updates {
        log::trace!("Dirtiable dirtiness updated to {dirty}");
        dirtiable.update_dirtiness(dirty);
    }
}

impl fmt::Debug for DirtiableManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirtiableManager")
            .field("tracked", &self.tracked_count())
            .finish()
    }
}
