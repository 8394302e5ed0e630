//! Shared helpers for the action stack integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use redlilium_actionstack::{
    ActionItem, ActionItemRef, ActionItemState, ActionStack, ActionStackEvent, ActionStackResult,
    DiscardKind, Subscription, TransactionCompletion, TransactionEvent, TransactionalActionStack,
};

/// Shared log of the hooks run by [`SimpleActionItem`]s.
pub type HookLog = Rc<RefCell<Vec<String>>>;

/// A do-nothing action item that can log its undo and redo hooks.
#[derive(Debug)]
pub struct SimpleActionItem {
    state: ActionItemState,
    log: Option<HookLog>,
}

impl SimpleActionItem {
    pub fn new(name: &str) -> Rc<Self> {
        Rc::new(Self {
            state: ActionItemState::new(name),
            log: None,
        })
    }

    /// An item that records `"undo <name>"` / `"redo <name>"` into `log`.
    pub fn logged(name: &str, log: &HookLog) -> Rc<Self> {
        Rc::new(Self {
            state: ActionItemState::new(name),
            log: Some(log.clone()),
        })
    }

    fn record(&self, hook: &str) {
        if let Some(log) = &self.log {
            log.borrow_mut().push(format!("{hook} {}", self.name()));
        }
    }
}

impl ActionItem for SimpleActionItem {
    fn state(&self) -> &ActionItemState {
        &self.state
    }

    fn undo_action(&self) -> ActionStackResult {
        self.record("undo");
        Ok(())
    }

    fn redo_action(&self) -> ActionStackResult {
        self.record("redo");
        Ok(())
    }
}

pub fn simple(name: &str) -> ActionItemRef {
    SimpleActionItem::new(name)
}

pub fn logged(name: &str, log: &HookLog) -> ActionItemRef {
    SimpleActionItem::logged(name, log)
}

pub fn names(items: &[ActionItemRef]) -> Vec<String> {
    items.iter().map(|item| item.name()).collect()
}

pub fn same(a: &ActionItemRef, b: &ActionItemRef) -> bool {
    a.identifier() == b.identifier()
}

/// Tallies of the notifications raised by an [`ActionStack`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RaiseCount {
    pub added: usize,
    pub cleared: usize,
    pub discarded: usize,
    pub undone: usize,
    pub redone: usize,
}

impl RaiseCount {
    pub fn new(
        added: usize,
        cleared: usize,
        discarded: usize,
        undone: usize,
        redone: usize,
    ) -> Self {
        Self {
            added,
            cleared,
            discarded,
            undone,
            redone,
        }
    }
}

/// Counts the notifications of a stack and keeps the discard batches.
pub struct StackRecorder {
    count: Rc<Cell<RaiseCount>>,
    discards: Rc<RefCell<Vec<(DiscardKind, Vec<ActionItemRef>)>>>,
    _subscription: Subscription,
}

impl StackRecorder {
    pub fn attach(stack: &ActionStack) -> Self {
        let count = Rc::new(Cell::new(RaiseCount::default()));
        let discards = Rc::new(RefCell::new(Vec::new()));
        let (count_sink, discard_sink) = (count.clone(), discards.clone());
        let subscription = stack.subscribe(move |_, event| {
            let mut count = count_sink.get();
            match event {
                ActionStackEvent::ItemsAdded(_) => count.added += 1,
                ActionStackEvent::Cleared => count.cleared += 1,
                ActionStackEvent::ItemsDiscarded { kind, items } => {
                    count.discarded += 1;
                    discard_sink.borrow_mut().push((*kind, items.clone()));
                }
                ActionStackEvent::Undone(_) => count.undone += 1,
                ActionStackEvent::Redone(_) => count.redone += 1,
            }
            count_sink.set(count);
        });
        Self {
            count,
            discards,
            _subscription: subscription,
        }
    }

    pub fn count(&self) -> RaiseCount {
        self.count.get()
    }

    pub fn discards(&self) -> Vec<(DiscardKind, Vec<ActionItemRef>)> {
        self.discards.borrow().clone()
    }

    #[track_caller]
    pub fn check(
        &self,
        added: usize,
        cleared: usize,
        discarded: usize,
        undone: usize,
        redone: usize,
    ) {
        assert_eq!(
            self.count(),
            RaiseCount::new(added, cleared, discarded, undone, redone)
        );
    }
}

/// Tallies of transaction notifications.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransactionCount {
    pub started: usize,
    pub ended: usize,
    pub cancelled: usize,
    pub discarded: usize,
}

/// Counts the transaction notifications of a transactional stack and keeps
/// the raw items of the completed ones.
pub struct TransactionRecorder {
    count: Rc<Cell<TransactionCount>>,
    completed: Rc<RefCell<Vec<Vec<ActionItemRef>>>>,
    _subscription: Subscription,
}

impl TransactionRecorder {
    pub fn attach(stack: &TransactionalActionStack) -> Self {
        let count = Rc::new(Cell::new(TransactionCount::default()));
        let completed = Rc::new(RefCell::new(Vec::new()));
        let (count_sink, completed_sink) = (count.clone(), completed.clone());
        let subscription = stack.on_transaction(move |_, event| {
            let mut count = count_sink.get();
            match event {
                TransactionEvent::Started => count.started += 1,
                TransactionEvent::Completed { kind, items } => {
                    match kind {
                        TransactionCompletion::Ended => count.ended += 1,
                        TransactionCompletion::Cancelled => count.cancelled += 1,
                        TransactionCompletion::Discarded => count.discarded += 1,
                    }
                    completed_sink.borrow_mut().push(items.clone());
                }
            }
            count_sink.set(count);
        });
        Self {
            count,
            completed,
            _subscription: subscription,
        }
    }

    pub fn completed(&self) -> Vec<Vec<ActionItemRef>> {
        self.completed.borrow().clone()
    }

    #[track_caller]
    pub fn check(&self, started: usize, ended: usize, cancelled: usize, discarded: usize) {
        assert_eq!(
            self.count.get(),
            TransactionCount {
                started,
                ended,
                cancelled,
                discarded,
            }
        );
    }
}

/// A transactional stack with both recorders attached.
pub struct TransactionalHarness {
    pub stack: TransactionalActionStack,
    pub events: StackRecorder,
    pub transactions: TransactionRecorder,
}

impl TransactionalHarness {
    pub fn new(capacity: usize) -> Self {
        let stack = TransactionalActionStack::new(capacity);
        let events = StackRecorder::attach(stack.stack());
        let transactions = TransactionRecorder::attach(&stack);
        Self {
            stack,
            events,
            transactions,
        }
    }
}
