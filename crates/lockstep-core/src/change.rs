#![forbid(unsafe_code)]

//! Structural change events.
//!
//! A [`CollectionChange`] describes one of four actions. The payload that
//! accompanies each action is fixed by its constructor:
//!
//! | Action    | `new_item` | `old_item` | `index`            |
//! |-----------|------------|------------|--------------------|
//! | `Add`     | added item | -          | position, if known |
//! | `Remove`  | -          | removed    | former position    |
//! | `Replace` | new item   | old item   | position           |
//! | `Reset`   | -          | -          | -                  |

use std::fmt;

/// The four recognized structural change kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeAction {
    Add,
    Remove,
    Replace,
    Reset,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
            Self::Reset => "reset",
        };
        f.write_str(name)
    }
}

/// A single structural change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionChange<T> {
    action: ChangeAction,
    new_item: Option<T>,
    old_item: Option<T>,
    index: Option<usize>,
}

impl<T> CollectionChange<T> {
    /// An item was added, optionally at a known position.
    #[must_use]
    pub fn added(item: T, index: Option<usize>) -> Self {
        Self {
            action: ChangeAction::Add,
            new_item: Some(item),
            old_item: None,
            index,
        }
    }

    /// An item was removed from `index` (when known).
    #[must_use]
    pub fn removed(item: T, index: Option<usize>) -> Self {
        Self {
            action: ChangeAction::Remove,
            new_item: None,
            old_item: Some(item),
            index,
        }
    }

    /// The item at `index` was replaced.
    #[must_use]
    pub fn replaced(new_item: T, old_item: T, index: usize) -> Self {
        Self {
            action: ChangeAction::Replace,
            new_item: Some(new_item),
            old_item: Some(old_item),
            index: Some(index),
        }
    }

    /// The whole collection changed (cleared).
    #[must_use]
    pub fn reset() -> Self {
        Self {
            action: ChangeAction::Reset,
            new_item: None,
            old_item: None,
            index: None,
        }
    }

    #[must_use]
    pub fn action(&self) -> ChangeAction {
        self.action
    }

    /// Item introduced by an `Add` or `Replace`.
    #[must_use]
    pub fn new_item(&self) -> Option<&T> {
        self.new_item.as_ref()
    }

    /// Item discarded by a `Remove` or `Replace`.
    #[must_use]
    pub fn old_item(&self) -> Option<&T> {
        self.old_item.as_ref()
    }

    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Map the payload items, keeping action and index.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> CollectionChange<U> {
        CollectionChange {
            action: self.action,
            new_item: self.new_item.map(&mut f),
            old_item: self.old_item.map(&mut f),
            index: self.index,
        }
    }
}

/// Aggregate properties an associative container reports after each
/// structural mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyName {
    Count,
    Indexer,
    Keys,
    Values,
}

impl PropertyName {
    /// Every property, in the order they are raised.
    pub const ALL: [PropertyName; 4] = [Self::Count, Self::Indexer, Self::Keys, Self::Values];

    /// Binding name as seen by property observers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "Count",
            Self::Indexer => "Item[]",
            Self::Keys => "Keys",
            Self::Values => "Values",
        }
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
