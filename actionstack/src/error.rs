//! Error type shared by action items, stacks and configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by the action stack.
///
/// Apart from the configuration variants, every variant is a contract
/// violation: the caller used an item or a stack in a state where the
/// operation makes no sense. Steady-state conditions such as "nothing to undo"
/// or capacity eviction are never reported as errors.
#[derive(Error, Debug)]
pub enum ActionStackError {
    #[error("action item '{0}' is frozen and can no longer be undone or redone")]
    ItemFrozen(String),
    #[error("action item '{0}' cannot be undone because it is not done")]
    ItemNotDone(String),
    #[error("action item '{0}' cannot be redone because it is already done")]
    ItemAlreadyDone(String),
    #[error("an aggregate action item requires at least one inner action item")]
    EmptyAggregate,
    #[error("there is no transaction in progress")]
    NoTransactionInProgress,
    #[error("action failed: {0}")]
    ActionFailed(String),
    #[error("failed to read action stack config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse action stack config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Result type for action stack operations.
pub type ActionStackResult<T = ()> = Result<T, ActionStackError>;
