#![forbid(unsafe_code)]

//! Notifying collections that stay in lockstep.
//!
//! This crate provides:
//! - [`NotifyingList`] wrapping any [`OrderedList`] and reporting every
//!   mutation, with a reentrancy guard around dispatch
//! - [`ObservableMap`] with insertion-ordered keys, pair-level change events
//!   and derived property signals
//! - [`SyncGroup`] mirroring changes across a fixed set of lists and
//!   detecting divergence
//!
//! Everything is single-threaded: shared handles are `Rc`-based and
//! dispatch is synchronous.
//!
//! # Example
//!
//! ```
//! use lockstep::{NotifyingList, SharedVec, SyncGroup};
//!
//! let left = NotifyingList::new(SharedVec::new());
//! let right = NotifyingList::new(SharedVec::new());
//! let group = SyncGroup::new([left.clone(), right.clone()])?;
//!
//! left.add("One")?;
//! assert_eq!(right.to_vec()?, vec!["One"]);
//! assert_eq!(group.count()?, 1);
//! # Ok::<(), lockstep::CollectionError>(())
//! ```

/// List and group configuration, with environment overrides.
pub mod config;
mod guard;
/// Synchronized groups of notifying lists.
pub mod group;
/// Notifying list wrapper.
pub mod notifying_list;
/// Insertion-ordered observable map.
pub mod observable_map;

pub use config::{GroupConfig, ListConfig, ReentrancyPolicy, ReplacePolicy};
pub use group::{ItemObserver, SyncGroup, SyncGroupBuilder};
pub use notifying_list::{Iter, NotifyingList};
pub use observable_map::ObservableMap;

pub use lockstep_core::{
    ChangeAction, ChangeHandler, CollectionChange, CollectionError, Handler, ListenerId,
    Listeners, NotifyCollectionChanged, ObservableVec, OrderedList, PropertyName, Result,
    SharedVec, SourceId, Subscription,
};
