//! Notifications raised by stacks and dirtiables.
//!
//! Handlers are registered on an [`EventHandlers`] list and stay registered
//! for as long as the returned [`Subscription`] is alive. Dispatch works on a
//! snapshot of the list, so a handler may subscribe, unsubscribe or call back
//! into the object that raised the event.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::action::ActionItemRef;

/// Why a batch of action items left (or never entered) a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscardKind {
    /// The oldest items were evicted to respect the capacity.
    Swallowed,
    /// Undone items were dropped because a new item was added.
    Disbranched,
    /// Items were added while an undo or redo was running and were ignored.
    UndoRedoInProgress,
}

/// A notification raised by an [`ActionStack`](crate::ActionStack).
#[derive(Debug, Clone)]
pub enum ActionStackEvent {
    ItemsAdded(Vec<ActionItemRef>),
    Cleared,
    ItemsDiscarded {
        kind: DiscardKind,
        items: Vec<ActionItemRef>,
    },
    Undone(Vec<ActionItemRef>),
    Redone(Vec<ActionItemRef>),
}

impl ActionStackEvent {
    /// The items carried by the notification; empty for [`Cleared`](Self::Cleared).
    pub fn items(&self) -> &[ActionItemRef] {
        match self {
            Self::ItemsAdded(items)
            | Self::Undone(items)
            | Self::Redone(items)
            | Self::ItemsDiscarded { items, .. } => items,
            Self::Cleared => &[],
        }
    }
}

/// How a transaction was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionCompletion {
    /// The transaction committed at least one item.
    Ended,
    /// The buffered items were undone.
    Cancelled,
    /// The buffered items were dropped without being undone, or an ended
    /// transaction had nothing to commit.
    Discarded,
}

/// A notification raised by a
/// [`TransactionalActionStack`](crate::TransactionalActionStack).
#[derive(Debug, Clone)]
pub enum TransactionEvent {
    Started,
    /// `items` are the raw items the transaction buffered, before any
    /// aggregation.
    Completed {
        kind: TransactionCompletion,
        items: Vec<ActionItemRef>,
    },
}

type Handler<S, E> = Rc<dyn Fn(&S, &E)>;

struct HandlerList<S: ?Sized, E> {
    next_id: u64,
    entries: Vec<(u64, Handler<S, E>)>,
}

/// A list of handlers for events of type `E` raised by a sender of type `S`.
pub struct EventHandlers<S: ?Sized, E> {
    list: Rc<RefCell<HandlerList<S, E>>>,
}

impl<S: ?Sized + 'static, E: 'static> EventHandlers<S, E> {
    pub fn new() -> Self {
        Self {
            list: Rc::new(RefCell::new(HandlerList {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Registers a handler. It is removed when the returned subscription is
    /// dropped.
    pub fn subscribe(&self, handler: impl Fn(&S, &E) + 'static) -> Subscription {
        let id = {
            let mut list = self.list.borrow_mut();
            let id = list.next_id;
            list.next_id += 1;
            list.entries.push((id, Rc::new(handler)));
            id
        };
        let list = Rc::downgrade(&self.list);
        Subscription::new(move || {
            if let Some(list) = list.upgrade() {
                list.borrow_mut().entries.retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Calls every handler registered when the dispatch starts.
    pub fn raise(&self, sender: &S, event: &E) {
        let snapshot: Vec<Handler<S, E>> = self
            .list
            .borrow()
            .entries
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in snapshot {
            handler(sender, event);
        }
    }

    pub fn len(&self) -> usize {
        self.list.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: ?Sized + 'static, E: 'static> Default for EventHandlers<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized, E> fmt::Debug for EventHandlers<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("count", &self.list.borrow().entries.len())
            .finish()
    }
}

/// Keeps an event handler registered. Dropping it unsubscribes the handler.
#[must_use = "dropping a Subscription unsubscribes its handler immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Keeps the handler registered for the lifetime of the event source.
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
