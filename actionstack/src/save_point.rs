//! Comparable snapshots of an action stack position.

use std::fmt;

use crate::action::ActionItemId;

/// A snapshot of the position of an action stack.
///
/// A save point identifies the topmost done item at the time it was created,
/// or [`SavePoint::EMPTY`] when no item was done. Two save points are equal
/// when they identify the same item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SavePoint(Option<ActionItemId>);

impl SavePoint {
    /// The position before any action.
    pub const EMPTY: SavePoint = SavePoint(None);

    pub fn new(identifier: Option<ActionItemId>) -> Self {
        Self(identifier)
    }

    /// Identifier of the topmost done item, or `None` for [`SavePoint::EMPTY`].
    pub fn identifier(&self) -> Option<ActionItemId> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Display for SavePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(identifier) => write!(f, "SavePoint({identifier})"),
            None => write!(f, "SavePoint(empty)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_save_points_are_equal() {
        assert_eq!(SavePoint::EMPTY, SavePoint::default());
        assert_eq!(SavePoint::EMPTY, SavePoint::new(None));
        assert!(SavePoint::EMPTY.is_empty());
    }

    #[test]
    fn equality_follows_identifier() {
        let id = ActionItemId::new();
        assert_eq!(SavePoint::new(Some(id)), SavePoint::new(Some(id)));
        assert_ne!(SavePoint::new(Some(id)), SavePoint::new(Some(ActionItemId::new())));
        assert_ne!(SavePoint::new(Some(id)), SavePoint::EMPTY);
    }

    #[test]
    fn display() {
        assert_eq!(SavePoint::EMPTY.to_string(), "SavePoint(empty)");
    }
}
