//! Nested transactions on top of an [`ActionStack`].
//!
//! While a transaction is open, added items are buffered in the innermost
//! transaction frame instead of being recorded. Closing the frame decides what
//! reaches the history:
//!
//! - [`end_transaction`](TransactionalActionStack::end_transaction) commits
//!   nothing, the single buffered item, or an [`AggregateActionItem`] wrapping
//!   all of them, to the parent frame or to the stack
//! - [`cancel_transaction`](TransactionalActionStack::cancel_transaction)
//!   undoes the buffered items
//! - [`discard_transaction`](TransactionalActionStack::discard_transaction)
//!   forgets them and leaves their effects in place

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::action::ActionItemRef;
use crate::aggregate::AggregateActionItem;
use crate::config::{ActionStackConfig, DEFAULT_CAPACITY};
use crate::error::{ActionStackError, ActionStackResult};
use crate::event::{
    ActionStackEvent, EventHandlers, Subscription, TransactionCompletion, TransactionEvent,
};
use crate::save_point::SavePoint;
use crate::stack::{ActionHistory, ActionStack};

#[derive(Default)]
struct TransactionFrame {
    items: Vec<ActionItemRef>,
}

/// An [`ActionStack`] with nestable transactions.
///
/// # Example
///
/// ```ignore
/// let stack = TransactionalActionStack::new(100);
/// {
///     let _transaction = stack.begin_end_transaction("Move selection");
///     stack.add(Rc::new(move_a));
///     stack.add(Rc::new(move_b));
/// } // commits one aggregate item named "Move selection"
/// assert_eq!(stack.len(), 1);
/// ```
pub struct TransactionalActionStack {
    stack: ActionStack,
    frames: RefCell<Vec<TransactionFrame>>,
    handlers: EventHandlers<TransactionalActionStack, TransactionEvent>,
}

impl TransactionalActionStack {
    pub fn new(capacity: usize) -> Self {
        Self::with_stack(ActionStack::new(capacity))
    }

    pub fn unbounded() -> Self {
        Self::with_stack(ActionStack::unbounded())
    }

    pub fn from_config(config: &ActionStackConfig) -> Self {
        Self::with_stack(ActionStack::from_config(config))
    }

    /// Adds transaction support to an existing stack.
    pub fn with_stack(stack: ActionStack) -> Self {
        Self {
            stack,
            frames: RefCell::new(Vec::new()),
            handlers: EventHandlers::new(),
        }
    }

    /// The wrapped stack.
    pub fn stack(&self) -> &ActionStack {
        &self.stack
    }

    pub fn transaction_in_progress(&self) -> bool {
        !self.frames.borrow().is_empty()
    }

    /// Number of open transactions.
    pub fn transaction_depth(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Registers a handler for the notifications of the wrapped stack.
    pub fn subscribe(
        &self,
        handler: impl Fn(&ActionStack, &ActionStackEvent) + 'static,
    ) -> Subscription {
        self.stack.subscribe(handler)
    }

    /// Registers a handler for transaction notifications.
    pub fn on_transaction(
        &self,
        handler: impl Fn(&TransactionalActionStack, &TransactionEvent) + 'static,
    ) -> Subscription {
        self.handlers.subscribe(handler)
    }

    /// Records an already applied item, or buffers it in the innermost open
    /// transaction.
    pub fn add(&self, item: ActionItemRef) {
        self.add_range([item]);
    }

    /// Records already applied items, or buffers them in the innermost open
    /// transaction.
    ///
    /// Items added while the stack is undoing or redoing are discarded, also
    /// when a transaction is open.
    pub fn add_range(&self, items: impl IntoIterator<Item = ActionItemRef>) {
        let items: Vec<ActionItemRef> = items.into_iter().collect();
        if items.is_empty() {
            return;
        }
        if !self.stack.undo_redo_in_progress()
            && let Some(frame) = self.frames.borrow_mut().last_mut()
        {
            log::trace!("Buffered {} action item(s) in transaction", items.len());
            frame.items.extend(items);
            return;
        }
        self.stack.add_range(items);
    }

    /// Opens a new transaction nested in the current one, if any.
    pub fn begin_transaction(&self) {
        let depth = {
            let mut frames = self.frames.borrow_mut();
            frames.push(TransactionFrame::default());
            frames.len()
        };
        log::trace!("Began transaction (depth {depth})");
        self.raise(TransactionEvent::Started);
    }

    /// The items buffered by the innermost open transaction.
    pub fn current_transactions(&self) -> ActionStackResult<Vec<ActionItemRef>> {
        self.frames
            .borrow()
            .last()
            .map(|frame| frame.items.clone())
            .ok_or(ActionStackError::NoTransactionInProgress)
    }

    /// Closes the innermost transaction and commits its items.
    ///
    /// A single item is committed as-is and renamed to `name` unless `name` is
    /// empty. Several items are wrapped in an [`AggregateActionItem`] named
    /// `name`. Nothing is committed for an empty transaction, which is
    /// reported as [`TransactionCompletion::Discarded`].
    ///
    /// Returns the committed item.
    pub fn end_transaction(
        &self,
        name: &str,
        reverse_order_on_undo: bool,
    ) -> ActionStackResult<Option<ActionItemRef>> {
        let items = self.pop_frame()?;

        let committed: Option<ActionItemRef> = match items.as_slice() {
            [] => None,
            [single] => {
                if !name.is_empty() {
                    single.set_name(name);
                }
                Some(single.clone())
            }
            _ => {
                let aggregate: ActionItemRef = Rc::new(AggregateActionItem::with_order(
                    name,
                    items.iter().cloned(),
                    reverse_order_on_undo,
                )?);
                Some(aggregate)
            }
        };

        let kind = match &committed {
            Some(item) => {
                log::trace!(
                    "Ended transaction '{name}' with {} action item(s)",
                    items.len()
                );
                self.commit(item.clone());
                TransactionCompletion::Ended
            }
            None => {
                log::debug!("Ended transaction '{name}' without action items");
                TransactionCompletion::Discarded
            }
        };

        self.raise(TransactionEvent::Completed { kind, items });
        Ok(committed)
    }

    /// Closes the innermost transaction and undoes its items, most recent
    /// first.
    ///
    /// Every item is undone even if one of them fails; the first failure is
    /// returned after the completion notification.
    pub fn cancel_transaction(&self) -> ActionStackResult {
        let items = self.pop_frame()?;
        log::debug!("Cancelling transaction with {} action item(s)", items.len());

        let mut first_error = None;
        {
            let _guard = self.stack.enter_undo_redo();
            for item in items.iter().rev() {
                if let Err(err) = item.undo() {
                    log::warn!("Failed to undo '{}' while cancelling: {err}", item.name());
                    first_error.get_or_insert(err);
                }
            }
        }

        self.raise(TransactionEvent::Completed {
            kind: TransactionCompletion::Cancelled,
            items,
        });
        first_error.map_or(Ok(()), Err)
    }

    /// Closes the innermost transaction and forgets its items without undoing
    /// them. The items are frozen.
    pub fn discard_transaction(&self) -> ActionStackResult {
        let items = self.pop_frame()?;
        log::debug!("Discarding transaction with {} action item(s)", items.len());
        for item in &items {
            item.freeze();
        }
        self.raise(TransactionEvent::Completed {
            kind: TransactionCompletion::Discarded,
            items,
        });
        Ok(())
    }

    /// Opens a transaction that is ended with `name` when the guard drops.
    pub fn begin_end_transaction(&self, name: impl Into<String>) -> TransactionGuard<'_> {
        self.begin_end_transaction_with_order(name, true)
    }

    /// Opens a transaction that is ended with `name` and the given undo order
    /// when the guard drops.
    pub fn begin_end_transaction_with_order(
        &self,
        name: impl Into<String>,
        reverse_order_on_undo: bool,
    ) -> TransactionGuard<'_> {
        self.begin_guarded(TransactionClose::End {
            name: name.into(),
            reverse_order_on_undo,
        })
    }

    /// Opens a transaction that is cancelled when the guard drops.
    pub fn begin_cancel_transaction(&self) -> TransactionGuard<'_> {
        self.begin_guarded(TransactionClose::Cancel)
    }

    /// Opens a transaction that is discarded when the guard drops.
    pub fn begin_discard_transaction(&self) -> TransactionGuard<'_> {
        self.begin_guarded(TransactionClose::Discard)
    }

    fn begin_guarded(&self, close: TransactionClose) -> TransactionGuard<'_> {
        self.begin_transaction();
        TransactionGuard {
            stack: self,
            close: Some(close),
        }
    }

    fn pop_frame(&self) -> ActionStackResult<Vec<ActionItemRef>> {
        self.frames
            .borrow_mut()
            .pop()
            .map(|frame| frame.items)
            .ok_or(ActionStackError::NoTransactionInProgress)
    }

    fn commit(&self, item: ActionItemRef) {
        if let Some(parent) = self.frames.borrow_mut().last_mut() {
            parent.items.push(item);
            return;
        }
        self.stack.add(item);
    }

    fn raise(&self, event: TransactionEvent) {
        self.handlers.raise(self, &event);
    }

    pub fn undo(&self) -> bool {
        self.stack.undo()
    }

    pub fn redo(&self) -> bool {
        self.stack.redo()
    }

    pub fn clear(&self) {
        self.stack.clear();
    }

    pub fn create_save_point(&self, mark_as_saved: bool) -> SavePoint {
        self.stack.create_save_point(mark_as_saved)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.stack.capacity()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn action_items(&self) -> Vec<ActionItemRef> {
        self.stack.action_items()
    }

    pub fn done_items(&self) -> Vec<ActionItemRef> {
        self.stack.done_items()
    }

    pub fn last_done_item(&self) -> Option<ActionItemRef> {
        self.stack.last_done_item()
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    pub fn undo_redo_in_progress(&self) -> bool {
        self.stack.undo_redo_in_progress()
    }

    pub fn undo_names(&self) -> Vec<String> {
        self.stack.undo_names()
    }

    pub fn redo_names(&self) -> Vec<String> {
        self.stack.redo_names()
    }
}

impl Default for TransactionalActionStack {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl AsRef<ActionStack> for TransactionalActionStack {
    fn as_ref(&self) -> &ActionStack {
        &self.stack
    }
}

impl ActionHistory for TransactionalActionStack {
    fn add(&self, item: ActionItemRef) {
        TransactionalActionStack::add(self, item);
    }

    fn add_range(&self, items: Vec<ActionItemRef>) {
        TransactionalActionStack::add_range(self, items);
    }

    fn undo(&self) -> bool {
        self.stack.undo()
    }

    fn redo(&self) -> bool {
        self.stack.redo()
    }

    fn clear(&self) {
        self.stack.clear();
    }

    fn create_save_point(&self, mark_as_saved: bool) -> SavePoint {
        self.stack.create_save_point(mark_as_saved)
    }

    fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    fn action_items(&self) -> Vec<ActionItemRef> {
        self.stack.action_items()
    }
}

impl fmt::Debug for TransactionalActionStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionalActionStack")
            .field("stack", &self.stack)
            .field("transaction_depth", &self.frames.borrow().len())
            .finish()
    }
}

#[derive(Debug)]
enum TransactionClose {
    End {
        name: String,
        reverse_order_on_undo: bool,
    },
    Cancel,
    Discard,
}

/// Closes the transaction it was created with when dropped.
///
/// Errors raised while closing from `drop` are logged. Call
/// [`close`](Self::close) to observe them instead.
#[must_use = "dropping the guard closes the transaction immediately"]
pub struct TransactionGuard<'a> {
    stack: &'a TransactionalActionStack,
    close: Option<TransactionClose>,
}

impl TransactionGuard<'_> {
    /// Closes the transaction now and returns the outcome.
    pub fn close(mut self) -> ActionStackResult {
        self.run()
    }

    fn run(&mut self) -> ActionStackResult {
        match self.close.take() {
            Some(TransactionClose::End {
                name,
                reverse_order_on_undo,
            }) => self
                .stack
                .end_transaction(&name, reverse_order_on_undo)
                .map(|_| ()),
            Some(TransactionClose::Cancel) => self.stack.cancel_transaction(),
            Some(TransactionClose::Discard) => self.stack.discard_transaction(),
            None => Ok(()),
        }
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.run() {
            log::error!("Failed to close transaction: {err}");
        }
    }
}

impl fmt::Debug for TransactionGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionGuard")
            .field("close", &self.close)
            .finish()
    }
}
