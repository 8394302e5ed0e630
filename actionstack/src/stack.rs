//! Bounded undo/redo history.
//!
//! [`ActionStack`] keeps the recorded items in a [`VecDeque`] with a cursor:
//! items before the cursor are done, items after it are undone. Adding a new
//! item while some items are undone drops them (*disbranch*), and exceeding
//! the capacity evicts and freezes the oldest items (*swallow*). Both
//! policies are reported through [`ActionStackEvent::ItemsDiscarded`].

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;

use crate::action::ActionItemRef;
use crate::config::{ActionStackConfig, DEFAULT_CAPACITY};
use crate::event::{ActionStackEvent, DiscardKind, EventHandlers, Subscription};
use crate::save_point::SavePoint;

/// Operations shared by [`ActionStack`] and
/// [`TransactionalActionStack`](crate::TransactionalActionStack).
pub trait ActionHistory {
    fn add(&self, item: ActionItemRef);
    fn add_range(&self, items: Vec<ActionItemRef>);
    fn undo(&self) -> bool;
    fn redo(&self) -> bool;
    fn clear(&self);
    fn create_save_point(&self, mark_as_saved: bool) -> SavePoint;
    fn can_undo(&self) -> bool;
    fn can_redo(&self) -> bool;
    fn action_items(&self) -> Vec<ActionItemRef>;
}

/// Raises a re-entrancy flag and restores its previous value on drop, also
/// when the guarded code panics.
pub(crate) struct UndoRedoGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl<'a> UndoRedoGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        let previous = flag.replace(true);
        Self { flag, previous }
    }
}

impl Drop for UndoRedoGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

struct StackState {
    items: VecDeque<ActionItemRef>,
    /// Number of done items.
    cursor: usize,
}

/// A bounded, event-driven history of reversible operations.
///
/// All methods take `&self`; no internal borrow is held while item hooks or
/// event handlers run, so both may call back into the stack. An item hook
/// that adds to the stack during an undo or redo is ignored and reported as
/// a [`DiscardKind::UndoRedoInProgress`] discard.
///
/// # Example
///
/// ```ignore
/// let stack = ActionStack::new(50);
/// let _subscription = stack.subscribe(|_, event| log::info!("{event:?}"));
///
/// stack.add(Rc::new(my_item));
/// assert!(stack.undo());
/// assert!(stack.redo());
/// ```
pub struct ActionStack {
    state: RefCell<StackState>,
    capacity: Option<usize>,
    undo_redo_in_progress: Cell<bool>,
    handlers: EventHandlers<ActionStack, ActionStackEvent>,
}

impl ActionStack {
    /// Creates an empty stack holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self::with_capacity_limit(Some(capacity))
    }

    /// Creates an empty stack without a capacity limit.
    pub fn unbounded() -> Self {
        Self::with_capacity_limit(None)
    }

    /// Creates a stack from configuration.
    pub fn from_config(config: &ActionStackConfig) -> Self {
        Self::with_capacity_limit(config.capacity_limit())
    }

    /// Creates a stack that starts with `items`, all considered done.
    ///
    /// If there are more items than `capacity`, only the most recent ones
    /// are kept and the others are frozen.
    pub fn with_items(
        capacity: Option<usize>,
        items: impl IntoIterator<Item = ActionItemRef>,
    ) -> Self {
        let mut items: VecDeque<ActionItemRef> = items.into_iter().collect();
        if let Some(capacity) = capacity {
            let overflow = items.len().saturating_sub(capacity);
            for item in items.drain(..overflow) {
                item.freeze();
            }
        }
        let cursor = items.len();
        Self {
            state: RefCell::new(StackState { items, cursor }),
            capacity,
            undo_redo_in_progress: Cell::new(false),
            handlers: EventHandlers::new(),
        }
    }

    fn with_capacity_limit(capacity: Option<usize>) -> Self {
        Self::with_items(capacity, Vec::new())
    }

    /// Maximum number of items, or `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().items.is_empty()
    }

    /// All recorded items, oldest first.
    pub fn action_items(&self) -> Vec<ActionItemRef> {
        self.state.borrow().items.iter().cloned().collect()
    }

    /// The done items, oldest first.
    pub fn done_items(&self) -> Vec<ActionItemRef> {
        let state = self.state.borrow();
        state.items.range(..state.cursor).cloned().collect()
    }

    /// The item the next [`undo`](Self::undo) would revert.
    pub fn last_done_item(&self) -> Option<ActionItemRef> {
        let state = self.state.borrow();
        state
            .cursor
            .checked_sub(1)
            .and_then(|index| state.items.get(index))
            .cloned()
    }

    pub fn can_undo(&self) -> bool {
        self.state.borrow().cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        let state = self.state.borrow();
        state.cursor < state.items.len()
    }

    /// Returns `true` while an item is being undone or redone.
    pub fn undo_redo_in_progress(&self) -> bool {
        self.undo_redo_in_progress.get()
    }

    /// Names of the undoable items, most recent first.
    pub fn undo_names(&self) -> Vec<String> {
        let state = self.state.borrow();
        state
            .items
            .range(..state.cursor)
            .rev()
            .map(|item| item.name())
            .collect()
    }

    /// Names of the redoable items, next to redo first.
    pub fn redo_names(&self) -> Vec<String> {
        let state = self.state.borrow();
        state
            .items
            .range(state.cursor..)
            .map(|item| item.name())
            .collect()
    }

    /// Registers a handler for the notifications of this stack.
    pub fn subscribe(
        &self,
        handler: impl Fn(&ActionStack, &ActionStackEvent) + 'static,
    ) -> Subscription {
        self.handlers.subscribe(handler)
    }

    /// Records an already applied item.
    pub fn add(&self, item: ActionItemRef) {
        self.add_range([item]);
    }

    /// Records already applied items as one batch.
    ///
    /// Undone items are disbranched first, then the oldest items are
    /// swallowed until the capacity is respected. When the batch itself is
    /// larger than the capacity, its oldest items are swallowed too.
    /// Notifications are raised once the history is consistent, in the order
    /// disbranched, swallowed, added.
    pub fn add_range(&self, items: impl IntoIterator<Item = ActionItemRef>) {
        let mut items: Vec<ActionItemRef> = items.into_iter().collect();
        if items.is_empty() {
            return;
        }
        if self.undo_redo_in_progress.get() {
            log::debug!(
                "Ignoring {} action item(s) added while an undo/redo is in progress",
                items.len()
            );
            self.raise(ActionStackEvent::ItemsDiscarded {
                kind: DiscardKind::UndoRedoInProgress,
                items,
            });
            return;
        }

        let (disbranched, swallowed) = {
            let mut state = self.state.borrow_mut();
            let cursor = state.cursor;
            let disbranched: Vec<ActionItemRef> = state.items.drain(cursor..).collect();

            let mut swallowed = Vec::new();
            if let Some(capacity) = self.capacity {
                let overflow = (state.items.len() + items.len()).saturating_sub(capacity);
                let from_history = overflow.min(state.items.len());
                swallowed.extend(state.items.drain(..from_history));
                swallowed.extend(items.drain(..overflow - from_history));
            }

            state.items.extend(items.iter().cloned());
            state.cursor = state.items.len();
            (disbranched, swallowed)
        };

        for item in &swallowed {
            item.freeze();
        }

        if !disbranched.is_empty() {
            log::debug!("Disbranched {} undone action item(s)", disbranched.len());
            self.raise(ActionStackEvent::ItemsDiscarded {
                kind: DiscardKind::Disbranched,
                items: disbranched,
            });
        }
        if !swallowed.is_empty() {
            log::debug!(
                "Swallowed {} action item(s) to respect capacity {:?}",
                swallowed.len(),
                self.capacity
            );
            self.raise(ActionStackEvent::ItemsDiscarded {
                kind: DiscardKind::Swallowed,
                items: swallowed,
            });
        }
        if !items.is_empty() {
            log::trace!("Added {} action item(s)", items.len());
            self.raise(ActionStackEvent::ItemsAdded(items));
        }
    }

    /// Undoes the most recent done item.
    ///
    /// Returns `false` when there is nothing to undo, when another undo or
    /// redo is running, or when the item refused to be undone.
    pub fn undo(&self) -> bool {
        self.step(Direction::Undo)
    }

    /// Redoes the most recently undone item.
    ///
    /// Returns `false` when there is nothing to redo, when another undo or
    /// redo is running, or when the item refused to be redone.
    pub fn redo(&self) -> bool {
        self.step(Direction::Redo)
    }

    fn step(&self, direction: Direction) -> bool {
        if self.undo_redo_in_progress.get() {
            log::debug!("Ignoring nested {direction} request");
            return false;
        }

        // The cursor only moves once the hook has returned, so a panicking
        // hook leaves the history untouched.
        let (index, item) = {
            let state = self.state.borrow();
            let index = match direction {
                Direction::Undo if state.cursor > 0 => state.cursor - 1,
                Direction::Redo if state.cursor < state.items.len() => state.cursor,
                _ => return false,
            };
            (index, state.items[index].clone())
        };

        let result = {
            let _guard = self.enter_undo_redo();
            match direction {
                Direction::Undo => item.undo(),
                Direction::Redo => item.redo(),
            }
        };

        let expected_done = matches!(direction, Direction::Redo);
        let refusal = match result {
            Err(err) => Some(err.to_string()),
            Ok(()) if item.is_done() != expected_done => Some("state did not change".into()),
            Ok(()) => None,
        };
        if let Some(reason) = refusal {
            log::warn!("Failed to {direction} '{}': {reason}", item.name());
            return false;
        }

        {
            let mut state = self.state.borrow_mut();
            let cursor = match direction {
                Direction::Undo => index,
                Direction::Redo => index + 1,
            };
            state.cursor = cursor.min(state.items.len());
        }

        log::trace!("{direction} '{}'", item.name());
        let event = match direction {
            Direction::Undo => ActionStackEvent::Undone(vec![item]),
            Direction::Redo => ActionStackEvent::Redone(vec![item]),
        };
        self.raise(event);
        true
    }

    /// Removes every item and resets the cursor. Always notifies, even when
    /// the stack was already empty.
    pub fn clear(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.items.clear();
            state.cursor = 0;
        }
        log::trace!("Cleared action stack");
        self.raise(ActionStackEvent::Cleared);
    }

    /// Creates a save point anchored to the topmost done item.
    ///
    /// When `mark_as_saved` is set, every done item is flagged as saved and
    /// every undone item as not saved. Frozen items are left untouched.
    pub fn create_save_point(&self, mark_as_saved: bool) -> SavePoint {
        let (items, cursor) = {
            let state = self.state.borrow();
            (state.items.iter().cloned().collect::<Vec<_>>(), state.cursor)
        };
        if mark_as_saved {
            for (index, item) in items.iter().enumerate() {
                item.set_saved(index < cursor);
            }
        }
        let top = cursor.checked_sub(1).and_then(|index| items.get(index));
        SavePoint::new(top.map(|item| item.identifier()))
    }

    /// Raises the re-entrancy flag until the guard is dropped.
    pub(crate) fn enter_undo_redo(&self) -> UndoRedoGuard<'_> {
        UndoRedoGuard::enter(&self.undo_redo_in_progress)
    }

    fn raise(&self, event: ActionStackEvent) {
        self.handlers.raise(self, &event);
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Undo,
    Redo,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undo => write!(f, "undo"),
            Self::Redo => write!(f, "redo"),
        }
    }
}

impl Default for ActionStack {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl AsRef<ActionStack> for ActionStack {
    fn as_ref(&self) -> &ActionStack {
        self
    }
}

impl ActionHistory for ActionStack {
    fn add(&self, item: ActionItemRef) {
        ActionStack::add(self, item);
    }

    fn add_range(&self, items: Vec<ActionItemRef>) {
        ActionStack::add_range(self, items);
    }

    fn undo(&self) -> bool {
        ActionStack::undo(self)
    }

    fn redo(&self) -> bool {
        ActionStack::redo(self)
    }

    fn clear(&self) {
        ActionStack::clear(self);
    }

    fn create_save_point(&self, mark_as_saved: bool) -> SavePoint {
        ActionStack::create_save_point(self, mark_as_saved)
    }

    fn can_undo(&self) -> bool {
        ActionStack::can_undo(self)
    }

    fn can_redo(&self) -> bool {
        ActionStack::can_redo(self)
    }

    fn action_items(&self) -> Vec<ActionItemRef> {
        ActionStack::action_items(self)
    }
}

impl fmt::Debug for ActionStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ActionStack")
            .field("len", &state.items.len())
            .field("cursor", &state.cursor)
            .field("capacity", &self.capacity)
            .field("undo_redo_in_progress", &self.undo_redo_in_progress.get())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
