#![forbid(unsafe_code)]

//! Error type shared by every lockstep container.
//!
//! All failures are synchronous and surface to the immediate caller. Nothing
//! in lockstep retries or recovers from these.

use std::fmt;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, CollectionError>;

/// Errors from collection, map, and group operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    /// A required collection was missing (e.g. a group member whose backing
    /// container was already released).
    NullCollection(&'static str),
    /// A mutation arrived while a notification dispatch was in progress and
    /// more than one listener was attached.
    Reentrancy,
    /// Lookup or removal of a key that is not present.
    KeyNotFound(String),
    /// `add` of a key that is already present.
    DuplicateKey(String),
    /// Group members disagree on an aggregated property; `member` is the
    /// first member that differs from member 0.
    CollectionsOutOfSync { member: usize },
    /// Index-based access beyond bounds.
    IndexOutOfRange { index: usize, len: usize },
    /// The wrapper or group has been torn down.
    Disposed,
    /// The backing container rejects mutation.
    ReadOnly,
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullCollection(name) => write!(f, "{name} has no backing collection"),
            Self::Reentrancy => {
                write!(f, "nested mutation not allowed during active notification dispatch")
            }
            Self::KeyNotFound(key) => write!(f, "key {key} does not exist"),
            Self::DuplicateKey(key) => write!(f, "an item with the key {key} has already been added"),
            Self::CollectionsOutOfSync { member } => {
                write!(f, "collections out of sync: member {member} disagrees with member 0")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
            Self::Disposed => write!(f, "collection has been disposed"),
            Self::ReadOnly => write!(f, "collection is read-only"),
        }
    }
}

impl std::error::Error for CollectionError {}

impl CollectionError {
    /// Whether this error reports member divergence.
    #[must_use]
    pub fn is_out_of_sync(&self) -> bool {
        matches!(self, Self::CollectionsOutOfSync { .. })
    }
}
