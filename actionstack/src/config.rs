//! Action stack configuration loaded from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ActionStackError, ActionStackResult};

/// Default maximum number of recorded items.
pub const DEFAULT_CAPACITY: usize = 100;

/// Configuration of an [`ActionStack`](crate::ActionStack).
///
/// ```toml
/// capacity = 250
/// unbounded = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionStackConfig {
    /// Maximum number of recorded items. Ignored when `unbounded` is set.
    pub capacity: usize,
    pub unbounded: bool,
}

impl Default for ActionStackConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            unbounded: false,
        }
    }
}

impl ActionStackConfig {
    pub fn from_toml_str(content: &str) -> ActionStackResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Loads a config from a TOML file.
    pub fn load(path: &Path) -> ActionStackResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ActionStackError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// The capacity to enforce, or `None` for an unbounded stack.
    pub fn capacity_limit(&self) -> Option<usize> {
        (!self.unbounded).then_some(self.capacity)
    }
}
