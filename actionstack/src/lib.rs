//! # RedLilium Action Stack
//!
//! Transactional undo/redo engine for RedLilium editor tooling.
//!
//! - [`ActionItem`]: a reversible operation, with the provided
//!   [`AnonymousActionItem`], [`ValueChangedActionItem`] and
//!   [`AggregateActionItem`] variants
//! - [`ActionStack`]: bounded, event-driven history of action items
//! - [`TransactionalActionStack`]: an action stack with nestable transactions
//! - [`SavePoint`]: a comparable snapshot of a stack position
//! - [`Dirtiable`] / [`DirtiableManager`]: dirtiness propagation to documents
//!
//! Everything is single-threaded: handles are [`Rc`](std::rc::Rc) and state
//! lives in [`Cell`](std::cell::Cell)/[`RefCell`](std::cell::RefCell). Stacks
//! never hold an internal borrow while item hooks or event handlers run, so
//! both may call back into the stack.

mod action;
mod aggregate;
mod config;
mod dirtiable;
mod dirtiable_manager;
mod error;
mod event;
mod save_point;
mod stack;
mod transaction;

pub use action::{
    ActionItem, ActionItemId, ActionItemRef, ActionItemState, AnonymousActionItem, AsAny,
    ValueChangedActionItem,
};
pub use aggregate::AggregateActionItem;
pub use config::{ActionStackConfig, DEFAULT_CAPACITY};
pub use dirtiable::{
    Dirtiable, DirtiableObject, DirtinessHandler, DirtinessUpdate, downgrade_dirtiable,
};
pub use dirtiable_manager::DirtiableManager;
pub use error::{ActionStackError, ActionStackResult};
pub use event::{
    ActionStackEvent, DiscardKind, EventHandlers, Subscription, TransactionCompletion,
    TransactionEvent,
};
pub use save_point::SavePoint;
pub use stack::{ActionHistory, ActionStack};
pub use transaction::{TransactionGuard, TransactionalActionStack};

/// Action stack library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Logs the library version.
pub fn init() {
    log::info!("RedLilium Action Stack v{} initialized", VERSION);
}
