//! # RedLilium Action Stack Demos
//!
//! Scripted editing sessions showcasing the RedLilium action stack.
//!
//! ## Available Demos
//!
//! - `history_demo` - Transactions, undo/redo and dirtiness tracking on a toy document

use redlilium_actionstack::{ActionItemRef, ActionStackEvent};

/// Demos library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Names of `items`, in order.
pub fn item_names(items: &[ActionItemRef]) -> Vec<String> {
    items.iter().map(|item| item.name()).collect()
}

/// One-line summary of a stack notification: a label and the item names.
pub fn describe_event(event: &ActionStackEvent) -> String {
    match event {
        ActionStackEvent::ItemsAdded(items) => format!("Added: {:?}", item_names(items)),
        ActionStackEvent::Cleared => "History cleared".to_string(),
        ActionStackEvent::ItemsDiscarded { kind, items } => {
            format!("Discarded ({kind:?}): {:?}", item_names(items))
        }
        ActionStackEvent::Undone(items) => format!("Undone: {:?}", item_names(items)),
        ActionStackEvent::Redone(items) => format!("Redone: {:?}", item_names(items)),
    }
}
