//! Reversible action items.
//!
//! This module defines the core abstractions stored by an
//! [`ActionStack`](crate::ActionStack):
//!
//! - [`ActionItem`]: a reversible operation (Command pattern)
//! - [`ActionItemState`]: the bookkeeping every item carries (identifier, name,
//!   done/frozen/saved flags, dependent dirtiables)
//! - [`AnonymousActionItem`]: an ad hoc item built from two closures
//! - [`ValueChangedActionItem`]: an item recording a single value change
//!
//! Items are handed to a stack already applied, so a freshly constructed item
//! is *done*. The stack only ever calls [`ActionItem::undo`] and
//! [`ActionItem::redo`] afterwards.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use uuid::Uuid;

use crate::dirtiable::Dirtiable;
use crate::error::{ActionStackError, ActionStackResult};

/// Helper trait for downcasting trait objects to concrete types.
///
/// Automatically implemented for all `'static` types. Used to recover the
/// concrete type of an item stored in a stack as `Rc<dyn ActionItem>`.
pub trait AsAny: 'static {
    /// Returns a reference to `self` as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<T: 'static> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared handle to an action item.
///
/// The stack owns its items through these handles; callers may keep clones
/// to inspect an item after handing it over.
pub type ActionItemRef = Rc<dyn ActionItem>;

/// Unique identifier of an action item, assigned at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionItemId(Uuid);

impl ActionItemId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ActionItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bookkeeping shared by every action item.
///
/// Concrete items embed one of these and return it from
/// [`ActionItem::state`]. The flags are only written through the provided
/// methods of [`ActionItem`].
#[derive(Debug)]
pub struct ActionItemState {
    identifier: ActionItemId,
    name: RefCell<String>,
    is_done: Cell<bool>,
    is_frozen: Cell<bool>,
    is_saved: Cell<bool>,
    dirtiables: Vec<Weak<dyn Dirtiable>>,
}

impl ActionItemState {
    /// Creates the state of a done item with no dependent dirtiables.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_dirtiables(name, Vec::new())
    }

    /// Creates the state of a done item that affects the given dirtiables.
    pub fn with_dirtiables(
        name: impl Into<String>,
        dirtiables: impl IntoIterator<Item = Weak<dyn Dirtiable>>,
    ) -> Self {
        Self {
            identifier: ActionItemId::new(),
            name: RefCell::new(name.into()),
            is_done: Cell::new(true),
            is_frozen: Cell::new(false),
            is_saved: Cell::new(false),
            dirtiables: dirtiables.into_iter().collect(),
        }
    }

    pub fn identifier(&self) -> ActionItemId {
        self.identifier
    }

    pub fn dirtiables(&self) -> &[Weak<dyn Dirtiable>] {
        &self.dirtiables
    }
}

/// A reversible operation recorded in an action stack.
///
/// Implementors provide the bookkeeping through [`state`](Self::state) and the
/// two side-effect hooks [`undo_action`](Self::undo_action) and
/// [`redo_action`](Self::redo_action). The provided [`undo`](Self::undo),
/// [`redo`](Self::redo) and [`freeze`](Self::freeze) methods check the
/// item's flags around the hooks and should not be overridden.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug)]
/// struct Rename {
///     state: ActionItemState,
///     node: Rc<Node>,
///     old_name: String,
///     new_name: String,
/// }
///
/// impl ActionItem for Rename {
///     fn state(&self) -> &ActionItemState {
///         &self.state
///     }
///
///     fn undo_action(&self) -> ActionStackResult {
///         self.node.set_name(&self.old_name);
///         Ok(())
///     }
///
///     fn redo_action(&self) -> ActionStackResult {
///         self.node.set_name(&self.new_name);
///         Ok(())
///     }
/// }
/// ```
pub trait ActionItem: fmt::Debug + AsAny {
    /// Returns the bookkeeping state of this item.
    fn state(&self) -> &ActionItemState;

    /// Reverts the side effects of this item.
    fn undo_action(&self) -> ActionStackResult;

    /// Re-applies the side effects of this item.
    fn redo_action(&self) -> ActionStackResult;

    /// Releases resources owned by the item once it can never be replayed.
    fn freeze_members(&self) {}

    /// Returns every item nested in this item, at any depth, in construction
    /// order. A composite is listed before its own children.
    ///
    /// Leaf items contain nothing.
    fn inner_action_items(&self) -> Vec<ActionItemRef> {
        Vec::new()
    }

    /// Returns the dirtiables affected by this item.
    fn dirtiables(&self) -> Vec<Weak<dyn Dirtiable>> {
        self.state().dirtiables().to_vec()
    }

    fn identifier(&self) -> ActionItemId {
        self.state().identifier
    }

    fn name(&self) -> String {
        self.state().name.borrow().clone()
    }

    fn set_name(&self, name: &str) {
        *self.state().name.borrow_mut() = name.to_owned();
    }

    fn is_done(&self) -> bool {
        self.state().is_done.get()
    }

    fn is_frozen(&self) -> bool {
        self.state().is_frozen.get()
    }

    fn is_saved(&self) -> bool {
        self.state().is_saved.get()
    }

    /// Updates the saved flag. Frozen items keep their last value.
    fn set_saved(&self, saved: bool) {
        if !self.is_frozen() {
            self.state().is_saved.set(saved);
        }
    }

    /// Returns `true` if an item with the given identifier is nested in this
    /// item, at any depth.
    fn contains_action(&self, identifier: ActionItemId) -> bool {
        self.inner_action_items()
            .iter()
            .any(|item| item.identifier() == identifier)
    }

    /// Undoes the item.
    ///
    /// Fails with [`ActionStackError::ItemFrozen`] or
    /// [`ActionStackError::ItemNotDone`] when the item cannot be undone. If
    /// the hook fails the item stays done.
    fn undo(&self) -> ActionStackResult {
        if self.is_frozen() {
            return Err(ActionStackError::ItemFrozen(self.name()));
        }
        if !self.is_done() {
            return Err(ActionStackError::ItemNotDone(self.name()));
        }
        self.undo_action()?;
        self.state().is_done.set(false);
        Ok(())
    }

    /// Redoes the item.
    ///
    /// Fails with [`ActionStackError::ItemFrozen`] or
    /// [`ActionStackError::ItemAlreadyDone`] when the item cannot be redone.
    fn redo(&self) -> ActionStackResult {
        if self.is_frozen() {
            return Err(ActionStackError::ItemFrozen(self.name()));
        }
        if self.is_done() {
            return Err(ActionStackError::ItemAlreadyDone(self.name()));
        }
        self.redo_action()?;
        self.state().is_done.set(true);
        Ok(())
    }

    /// Freezes the item permanently. Freezing a frozen item does nothing.
    fn freeze(&self) {
        if self.is_frozen() {
            return;
        }
        self.freeze_members();
        self.state().is_frozen.set(true);
    }
}

impl dyn ActionItem {
    /// Returns the item as `T` if that is its concrete type.
    pub fn downcast_ref<T: ActionItem>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Returns `true` if the concrete type of the item is `T`.
    pub fn is<T: ActionItem>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Puts a taken hook back into its slot when dropped, also on unwind, unless
/// the item was frozen in the meantime.
struct TakenHook<'a, H> {
    state: &'a ActionItemState,
    slot: &'a RefCell<Option<H>>,
    hook: Option<H>,
}

impl<H> Drop for TakenHook<'_, H> {
    fn drop(&mut self) {
        if let Some(hook) = self.hook.take()
            && !self.state.is_frozen.get()
        {
            *self.slot.borrow_mut() = Some(hook);
        }
    }
}

/// Runs a hook stored in `slot` without keeping the slot borrowed, so the hook
/// may reach back into the stack that owns the item.
fn run_taken<H>(state: &ActionItemState, slot: &RefCell<Option<H>>, run: impl FnOnce(&mut H)) {
    let mut taken = TakenHook {
        state,
        slot,
        hook: slot.borrow_mut().take(),
    };
    if let Some(hook) = taken.hook.as_mut() {
        run(hook);
    }
}

type Hook = Box<dyn FnMut()>;

/// An action item built from an undo closure and a redo closure.
///
/// Freezing drops both closures together with everything they captured.
pub struct AnonymousActionItem {
    state: ActionItemState,
    undo: RefCell<Option<Hook>>,
    redo: RefCell<Option<Hook>>,
}

impl AnonymousActionItem {
    pub fn new(
        name: impl Into<String>,
        dirtiables: impl IntoIterator<Item = Weak<dyn Dirtiable>>,
        undo: impl FnMut() + 'static,
        redo: impl FnMut() + 'static,
    ) -> Self {
        Self {
            state: ActionItemState::with_dirtiables(name, dirtiables),
            undo: RefCell::new(Some(Box::new(undo))),
            redo: RefCell::new(Some(Box::new(redo))),
        }
    }
}

impl ActionItem for AnonymousActionItem {
    fn state(&self) -> &ActionItemState {
        &self.state
    }

    fn undo_action(&self) -> ActionStackResult {
        run_taken(&self.state, &self.undo, |undo| undo());
        Ok(())
    }

    fn redo_action(&self) -> ActionStackResult {
        run_taken(&self.state, &self.redo, |redo| redo());
        Ok(())
    }

    fn freeze_members(&self) {
        self.undo.borrow_mut().take();
        self.redo.borrow_mut().take();
    }
}

impl fmt::Debug for AnonymousActionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnonymousActionItem")
            .field("state", &self.state)
            .field("has_hooks", &self.undo.borrow().is_some())
            .finish()
    }
}

struct ValueChange<T> {
    previous: T,
    new: T,
    setter: Box<dyn FnMut(T)>,
}

/// An action item recording the change of one value.
///
/// Undo writes the previous value through the setter, redo writes the new
/// one. Freezing releases both values and the setter.
pub struct ValueChangedActionItem<T> {
    state: ActionItemState,
    change: RefCell<Option<ValueChange<T>>>,
}

impl<T: Clone + 'static> ValueChangedActionItem<T> {
    pub fn new(
        name: impl Into<String>,
        dirtiables: impl IntoIterator<Item = Weak<dyn Dirtiable>>,
        previous: T,
        new: T,
        setter: impl FnMut(T) + 'static,
    ) -> Self {
        Self {
            state: ActionItemState::with_dirtiables(name, dirtiables),
            change: RefCell::new(Some(ValueChange {
                previous,
                new,
                setter: Box::new(setter),
            })),
        }
    }

    /// The value before the change, or `None` once frozen.
    pub fn previous_value(&self) -> Option<T> {
        self.change.borrow().as_ref().map(|c| c.previous.clone())
    }

    /// The value after the change, or `None` once frozen.
    pub fn new_value(&self) -> Option<T> {
        self.change.borrow().as_ref().map(|c| c.new.clone())
    }
}

impl<T: Clone + fmt::Debug + 'static> ActionItem for ValueChangedActionItem<T> {
    fn state(&self) -> &ActionItemState {
        &self.state
    }

    fn undo_action(&self) -> ActionStackResult {
        run_taken(&self.state, &self.change, |change| {
            (change.setter)(change.previous.clone())
        });
        Ok(())
    }

    fn redo_action(&self) -> ActionStackResult {
        run_taken(&self.state, &self.change, |change| {
            (change.setter)(change.new.clone())
        });
        Ok(())
    }

    fn freeze_members(&self) {
        self.change.borrow_mut().take();
    }
}

impl<T: fmt::Debug> fmt::Debug for ValueChangedActionItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let change = self.change.borrow();
        f.debug_struct("ValueChangedActionItem")
            .field("state", &self.state)
            .field("previous", &change.as_ref().map(|c| &c.previous))
            .field("new", &change.as_ref().map(|c| &c.new))
            .finish()
    }
}
