//! Composite action items.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::action::{ActionItem, ActionItemRef, ActionItemState};
use crate::dirtiable::Dirtiable;
use crate::error::{ActionStackError, ActionStackResult};

/// An action item made of an ordered, non-empty list of child items.
///
/// Redo replays the children in construction order. Undo replays them in
/// reverse order unless the aggregate was built with
/// `reverse_order_on_undo == false`. Nested aggregates apply their own flag
/// to their own children only.
///
/// If a child fails mid-replay, the children already replayed are rolled
/// back and the aggregate keeps its previous state.
pub struct AggregateActionItem {
    state: ActionItemState,
    action_items: Vec<ActionItemRef>,
    reverse_order_on_undo: bool,
}

impl AggregateActionItem {
    /// Creates an aggregate that undoes its children in reverse order.
    pub fn new(
        name: impl Into<String>,
        action_items: impl IntoIterator<Item = ActionItemRef>,
    ) -> ActionStackResult<Self> {
        Self::with_order(name, action_items, true)
    }

    /// Creates an aggregate with an explicit undo order.
    ///
    /// Fails with [`ActionStackError::EmptyAggregate`] if `action_items` is
    /// empty.
    pub fn with_order(
        name: impl Into<String>,
        action_items: impl IntoIterator<Item = ActionItemRef>,
        reverse_order_on_undo: bool,
    ) -> ActionStackResult<Self> {
        let action_items: Vec<ActionItemRef> = action_items.into_iter().collect();
        if action_items.is_empty() {
            return Err(ActionStackError::EmptyAggregate);
        }
        Ok(Self {
            state: ActionItemState::new(name),
            action_items,
            reverse_order_on_undo,
        })
    }

    /// The direct children, in construction order.
    pub fn action_items(&self) -> &[ActionItemRef] {
        &self.action_items
    }

    pub fn reverse_order_on_undo(&self) -> bool {
        self.reverse_order_on_undo
    }

    /// Undoes or redoes every child in `order`, rolling back on failure.
    fn replay<'a>(
        &'a self,
        order: impl Iterator<Item = &'a ActionItemRef>,
        apply: impl Fn(&dyn ActionItem) -> ActionStackResult,
        revert: impl Fn(&dyn ActionItem) -> ActionStackResult,
    ) -> ActionStackResult {
        let mut replayed: Vec<&ActionItemRef> = Vec::new();
        for item in order {
            if let Err(err) = apply(&**item) {
                for done in replayed.into_iter().rev() {
                    if let Err(rollback) = revert(&**done) {
                        log::error!(
                            "Failed to roll back '{}' in aggregate '{}': {rollback}",
                            done.name(),
                            self.name()
                        );
                    }
                }
                return Err(err);
            }
            replayed.push(item);
        }
        Ok(())
    }
}

impl ActionItem for AggregateActionItem {
    fn state(&self) -> &ActionItemState {
        &self.state
    }

    fn undo_action(&self) -> ActionStackResult {
        let undo = |item: &dyn ActionItem| item.undo();
        let redo = |item: &dyn ActionItem| item.redo();
        if self.reverse_order_on_undo {
            self.replay(self.action_items.iter().rev(), undo, redo)
        } else {
            self.replay(self.action_items.iter(), undo, redo)
        }
    }

    fn redo_action(&self) -> ActionStackResult {
        self.replay(
            self.action_items.iter(),
            |item| item.redo(),
            |item| item.undo(),
        )
    }

    fn freeze_members(&self) {
        for item in &self.action_items {
            item.freeze();
        }
    }

    fn inner_action_items(&self) -> Vec<ActionItemRef> {
        let mut items = Vec::new();
        for item in &self.action_items {
            items.push(item.clone());
            items.extend(item.inner_action_items());
        }
        items
    }

    fn dirtiables(&self) -> Vec<Weak<dyn Dirtiable>> {
        let mut dirtiables: Vec<Weak<dyn Dirtiable>> = self.state.dirtiables().to_vec();
        for item in &self.action_items {
            for dirtiable in item.dirtiables() {
                if !dirtiables.iter().any(|known| Weak::ptr_eq(known, &dirtiable)) {
                    dirtiables.push(dirtiable);
                }
            }
        }
        dirtiables
    }
}

impl fmt::Debug for AggregateActionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateActionItem")
            .field("state", &self.state)
            .field("action_items", &self.action_items)
            .field("reverse_order_on_undo", &self.reverse_order_on_undo)
            .finish()
    }
}

impl From<AggregateActionItem> for ActionItemRef {
    fn from(aggregate: AggregateActionItem) -> Self {
        Rc::new(aggregate)
    }
}
