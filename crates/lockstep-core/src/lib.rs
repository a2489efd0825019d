#![forbid(unsafe_code)]

//! Core: change events, listener plumbing, and backing containers for lockstep.
//!
//! # Role in lockstep
//! `lockstep-core` is the vocabulary layer. It defines what a change looks
//! like ([`CollectionChange`]), how listeners attach and detach
//! ([`Listeners`], [`Subscription`]), the container capability that
//! wrappers consume ([`OrderedList`]), and the optional notification
//! capability a container may expose ([`NotifyCollectionChanged`]).
//!
//! # Primary responsibilities
//! - **Change model**: the four notification actions and their payloads.
//! - **Listener registry**: ordered handler lists with RAII unsubscription.
//! - **Backing containers**: [`SharedVec`] (silent) and [`ObservableVec`]
//!   (notifies on every structural change).
//!
//! # How it fits in the system
//! The `lockstep` crate builds the notifying wrapper, the observable map and
//! the synchronized group on top of these types. Nothing here knows about
//! groups or fan-out.

pub mod change;
pub mod error;
pub mod list;
pub mod listeners;

pub use change::{ChangeAction, CollectionChange, PropertyName};
pub use error::{CollectionError, Result};
pub use list::{NotifyCollectionChanged, ObservableVec, OrderedList, SharedVec};
pub use listeners::{ChangeHandler, Handler, ListenerId, Listeners, SourceId, Subscription};
