#![forbid(unsafe_code)]

//! Groups of notifying lists kept in lockstep.
//!
//! # Design
//!
//! A [`SyncGroup<T>`] owns handles to a fixed set of [`NotifyingList<T>`]
//! members and subscribes to each of them. Mutations reach the members in
//! three ways:
//!
//! 1. Through the group: the operation is applied to every member.
//! 2. Through one member: the member notifies the group, which applies the
//!    same logical change to every *other* member (the member whose
//!    [`SourceId`] matches the sender is skipped).
//! 3. Through a member's backing container: only visible if the container
//!    notifies. Otherwise members silently diverge; [`SyncGroup::count`]
//!    and [`SyncGroup::is_out_of_sync`] are the only detection.
//!
//! After each fan-out the group re-emits the change to its own listeners
//! with the group as sender.
//!
//! # Fan-out rules
//!
//! | Action    | Applied to each peer                                        |
//! |-----------|-------------------------------------------------------------|
//! | `Add`     | append; a mid-list insert at the origin inserts at the event index when inside the peer |
//! | `Remove`  | remove the first equal element                              |
//! | `Replace` | append the new element ([`ReplacePolicy::InPlace`] overwrites) |
//! | `Reset`   | clear                                                       |
//!
//! An `Add` counts as a mid-list insert when its index is not the origin's
//! last position at notification time. Appends stay appends on peers that
//! already hold extra elements.
//!
//! # Recursion bound
//!
//! The group records which members it is writing to at any moment.
//! Notifications whose sender is one of those members describe the change
//! being applied and are ignored. Every other member notification is queued
//! and fanned out in arrival order once the current write completes, so a
//! member listener may edit another member in response to a group write and
//! the edit still reaches every peer. The queue is drained by the outermost
//! caller; group listeners run with nothing being written and may mutate
//! the group.
//!
//! # Item observation
//!
//! A group built with [`SyncGroupBuilder::observe_items`] also subscribes to
//! notifications raised by the elements it adds. Such an item-level change
//! is applied to every member (none of them is the origin) and re-emitted.
//! The subscription is released when the element is removed through the
//! group, or when the group is cleared or disposed.
//!
//! # Failure Modes
//!
//! | Mode | Condition | Behavior |
//! |------|-----------|----------|
//! | Divergence | Member counts differ | `count()` fails with `CollectionsOutOfSync` |
//! | Member error | A member rejects the change | Error returned; earlier members keep the change; queued changes are dropped |
//! | Deferred fan-out | A member changes while the group is busy | Peers catch up after the current write; the member's call returns first |
//! | Disposed member | Member disposed before `build` | `Err(NullCollection)` |
//! | Torn down | Any call after [`SyncGroup::dispose`] | `Err(Disposed)` |
//! | Aliasing | Two members over one backing container | Unsupported; changes apply twice |

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use lockstep_core::{
    ChangeAction, ChangeHandler, CollectionChange, CollectionError, Listeners,
    NotifyCollectionChanged, Result, SourceId, Subscription,
};
use tracing::{debug, trace, trace_span};

use crate::config::{GroupConfig, ReplacePolicy};
use crate::guard::DepthGuard;
use crate::notifying_list::{Iter, NotifyingList};

/// Extracts the notification capability carried by an element, if any.
pub type ItemObserver<T> = dyn Fn(&T) -> Option<&dyn NotifyCollectionChanged<T>>;

/// A change waiting to be fanned out.
struct Pending<T> {
    /// Member that raised it; `None` for item-level changes.
    origin: Option<SourceId>,
    change: CollectionChange<T>,
    /// `Add` that landed before the origin's last element.
    positioned: bool,
}

struct GroupInner<T> {
    members: RefCell<Vec<NotifyingList<T>>>,
    disposed: Cell<bool>,
    listeners: Listeners<CollectionChange<T>>,
    /// Members the group is writing to, innermost last.
    writing: RefCell<Vec<SourceId>>,
    /// Non-zero while a group write is in progress.
    busy: Cell<usize>,
    draining: Cell<bool>,
    pending: RefCell<VecDeque<Pending<T>>>,
    member_subscriptions: RefCell<Vec<Subscription>>,
    /// One entry per observed element, keyed by the element's notifier.
    item_subscriptions: RefCell<Vec<(SourceId, Subscription)>>,
    item_observer: Option<Box<ItemObserver<T>>>,
    config: GroupConfig,
    id: SourceId,
}

impl<T: Clone + PartialEq + 'static> GroupInner<T> {
    fn members(&self) -> Result<Vec<NotifyingList<T>>> {
        if self.disposed.get() {
            return Err(CollectionError::Disposed);
        }
        Ok(self.members.borrow().clone())
    }

    fn on_member_changed(&self, sender: SourceId, change: &CollectionChange<T>) -> Result<()> {
        if self.disposed.get() || self.writing.borrow().contains(&sender) {
            return Ok(());
        }
        let positioned =
            change.action() == ChangeAction::Add && self.is_mid_list(sender, change.index());
        self.enqueue(Some(sender), change, positioned)
    }

    fn on_item_changed(&self, sender: SourceId, change: &CollectionChange<T>) -> Result<()> {
        if self.disposed.get() {
            return Ok(());
        }
        trace!(group = %self.id, item = %sender, action = %change.action(), "item change");
        self.enqueue(None, change, false)
    }

    /// Whether `index` lies before the last element of member `sender`.
    fn is_mid_list(&self, sender: SourceId, index: Option<usize>) -> bool {
        let Some(index) = index else {
            return false;
        };
        self.members
            .borrow()
            .iter()
            .find(|member| member.source_id() == sender)
            .and_then(|member| member.count().ok())
            .is_some_and(|count| index + 1 < count)
    }

    fn enqueue(
        &self,
        origin: Option<SourceId>,
        change: &CollectionChange<T>,
        positioned: bool,
    ) -> Result<()> {
        self.pending.borrow_mut().push_back(Pending {
            origin,
            change: change.clone(),
            positioned,
        });
        self.settle()
    }

    /// Drain queued changes unless a group write is still in progress.
    fn settle(&self) -> Result<()> {
        if self.busy.get() > 0 || self.draining.replace(true) {
            return Ok(());
        }
        let drained = self.drain();
        self.draining.set(false);
        if drained.is_err() {
            self.pending.borrow_mut().clear();
        }
        drained
    }

    fn drain(&self) -> Result<()> {
        loop {
            let Some(next) = self.pending.borrow_mut().pop_front() else {
                return Ok(());
            };
            if self.disposed.get() {
                self.pending.borrow_mut().clear();
                return Ok(());
            }
            self.fan_out(&next)?;
        }
    }

    fn fan_out(&self, pending: &Pending<T>) -> Result<()> {
        let members = self.members.borrow().clone();
        {
            let _guard = DepthGuard::enter(&self.busy);
            let _span = trace_span!(
                "fan_out",
                group = %self.id,
                origin = ?pending.origin,
                action = %pending.change.action()
            )
            .entered();
            let mut peers = 0usize;
            for member in members
                .iter()
                .filter(|m| Some(m.source_id()) != pending.origin)
            {
                self.write_to(member, |m| self.apply(m, &pending.change, pending.positioned))?;
                peers += 1;
            }
            trace!(peers, "change applied to members");
        }
        self.listeners.emit(self.id, &pending.change)
    }

    /// Run `write` against `member` with its notifications muted for the group.
    fn write_to<R>(
        &self,
        member: &NotifyingList<T>,
        write: impl FnOnce(&NotifyingList<T>) -> Result<R>,
    ) -> Result<R> {
        self.writing.borrow_mut().push(member.source_id());
        let written = write(member);
        self.writing.borrow_mut().pop();
        written
    }

    /// Apply a group-issued operation to every member, stopping at the
    /// first error.
    fn broadcast<R>(&self, write: impl Fn(&NotifyingList<T>) -> Result<R>) -> Result<Vec<R>> {
        let members = self.members()?;
        let written = {
            let _guard = DepthGuard::enter(&self.busy);
            members
                .iter()
                .map(|member| self.write_to(member, &write))
                .collect::<Result<Vec<R>>>()
        };
        if written.is_err() && self.busy.get() == 0 {
            self.pending.borrow_mut().clear();
        }
        written
    }

    /// Emit a group-issued change, then catch up on queued member changes.
    fn announce(&self, change: &CollectionChange<T>) -> Result<()> {
        self.listeners.emit(self.id, change)?;
        self.settle()
    }

    fn apply(
        &self,
        member: &NotifyingList<T>,
        change: &CollectionChange<T>,
        positioned: bool,
    ) -> Result<()> {
        match change.action() {
            ChangeAction::Add => {
                let Some(item) = change.new_item() else {
                    return Ok(());
                };
                match change.index() {
                    Some(index) if positioned && index < member.count()? => {
                        member.insert(index, item.clone())
                    }
                    _ => member.add(item.clone()),
                }
            }
            ChangeAction::Remove => match change.old_item() {
                Some(item) => member.remove(item).map(drop),
                None => Ok(()),
            },
            ChangeAction::Replace => {
                let Some(item) = change.new_item() else {
                    return Ok(());
                };
                match (self.config.replace, change.index()) {
                    (ReplacePolicy::InPlace, Some(index)) if index < member.count()? => {
                        member.set(index, item.clone()).map(drop)
                    }
                    _ => member.add(item.clone()),
                }
            }
            ChangeAction::Reset => member.clear(),
        }
    }

    fn observe_item(self: &Rc<Self>, item: &T) {
        let Some(observer) = &self.item_observer else {
            return;
        };
        let Some(notifier) = observer(item) else {
            return;
        };
        let weak: Weak<Self> = Rc::downgrade(self);
        let handler: Rc<ChangeHandler<T>> =
            Rc::new(move |sender: SourceId, change: &CollectionChange<T>| {
                match weak.upgrade() {
                    Some(inner) => inner.on_item_changed(sender, change),
                    None => Ok(()),
                }
            });
        let subscription = notifier.attach(handler);
        self.item_subscriptions
            .borrow_mut()
            .push((notifier.source_id(), subscription));
    }

    fn forget_item(&self, item: &T) {
        let Some(observer) = &self.item_observer else {
            return;
        };
        let Some(notifier) = observer(item) else {
            return;
        };
        let id = notifier.source_id();
        let removed = {
            let mut subscriptions = self.item_subscriptions.borrow_mut();
            subscriptions
                .iter()
                .position(|(source, _)| *source == id)
                .map(|position| subscriptions.remove(position))
        };
        drop(removed);
    }

    fn forget_all_items(&self) {
        let subscriptions = std::mem::take(&mut *self.item_subscriptions.borrow_mut());
        drop(subscriptions);
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SyncGroup`].
pub struct SyncGroupBuilder<T> {
    members: Vec<NotifyingList<T>>,
    config: GroupConfig,
    item_observer: Option<Box<ItemObserver<T>>>,
}

impl<T: Clone + PartialEq + 'static> SyncGroupBuilder<T> {
    #[must_use]
    pub fn new(members: impl IntoIterator<Item = NotifyingList<T>>) -> Self {
        Self {
            members: members.into_iter().collect(),
            config: GroupConfig::default(),
            item_observer: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: GroupConfig) -> Self {
        self.config = config;
        self
    }

    /// Subscribe to the notifications of every element added through the
    /// group. `observer` returns the element's notifier, or `None` for
    /// elements that do not notify.
    #[must_use]
    pub fn observe_items<F>(mut self, observer: F) -> Self
    where
        F: Fn(&T) -> Option<&dyn NotifyCollectionChanged<T>> + 'static,
    {
        self.item_observer = Some(Box::new(observer));
        self
    }

    /// Subscribe to every member and return the group.
    ///
    /// # Errors
    ///
    /// [`CollectionError::NullCollection`] if a member is already disposed.
    pub fn build(self) -> Result<SyncGroup<T>> {
        if self.members.iter().any(NotifyingList::is_disposed) {
            return Err(CollectionError::NullCollection("group member"));
        }

        let inner = Rc::new(GroupInner {
            members: RefCell::new(self.members),
            disposed: Cell::new(false),
            listeners: Listeners::new(),
            writing: RefCell::new(Vec::new()),
            busy: Cell::new(0),
            draining: Cell::new(false),
            pending: RefCell::new(VecDeque::new()),
            member_subscriptions: RefCell::new(Vec::new()),
            item_subscriptions: RefCell::new(Vec::new()),
            item_observer: self.item_observer,
            config: self.config,
            id: SourceId::next(),
        });

        let subscriptions: Vec<Subscription> = inner
            .members
            .borrow()
            .iter()
            .map(|member| {
                let weak = Rc::downgrade(&inner);
                member.subscribe(move |sender, change| match weak.upgrade() {
                    Some(inner) => inner.on_member_changed(sender, change),
                    None => Ok(()),
                })
            })
            .collect();
        *inner.member_subscriptions.borrow_mut() = subscriptions;

        debug!(
            group = %inner.id,
            members = inner.members.borrow().len(),
            replace = ?inner.config.replace,
            observes_items = inner.item_observer.is_some(),
            "sync group built"
        );
        Ok(SyncGroup { inner })
    }
}

// ============================================================================
// SyncGroup
// ============================================================================

/// A set of [`NotifyingList`]s that mirror each other's changes.
///
/// Cloning creates a new handle to the **same** group.
pub struct SyncGroup<T> {
    inner: Rc<GroupInner<T>>,
}

impl<T> Clone for SyncGroup<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for SyncGroup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncGroup")
            .field("id", &self.inner.id)
            .field("members", &self.inner.members.borrow().len())
            .field("listener_count", &self.inner.listeners.len())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> SyncGroup<T> {
    /// Group `members` with the default configuration.
    ///
    /// # Errors
    ///
    /// [`CollectionError::NullCollection`] if a member is already disposed.
    pub fn new(members: impl IntoIterator<Item = NotifyingList<T>>) -> Result<Self> {
        SyncGroupBuilder::new(members).build()
    }

    #[must_use]
    pub fn builder(members: impl IntoIterator<Item = NotifyingList<T>>) -> SyncGroupBuilder<T> {
        SyncGroupBuilder::new(members)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Append `item` to every member; emits one `Add`.
    pub fn add(&self, item: T) -> Result<()> {
        self.inner.broadcast(|member| member.add(item.clone()))?;
        self.inner.observe_item(&item);
        self.inner.announce(&CollectionChange::added(item, None))
    }

    /// Remove the first occurrence of `item` from every member. Returns
    /// whether any member removed something; emits `Remove` only then.
    pub fn remove(&self, item: &T) -> Result<bool> {
        let removed = self
            .inner
            .broadcast(|member| member.remove(item))?
            .contains(&true);
        if !removed {
            self.inner.settle()?;
            return Ok(false);
        }
        self.inner.forget_item(item);
        self.inner
            .announce(&CollectionChange::removed(item.clone(), None))?;
        Ok(true)
    }

    /// Clear every member; emits one `Reset`.
    pub fn clear(&self) -> Result<()> {
        self.inner.broadcast(NotifyingList::clear)?;
        self.inner.forget_all_items();
        self.inner.announce(&CollectionChange::reset())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Common member count.
    ///
    /// # Errors
    ///
    /// [`CollectionError::CollectionsOutOfSync`] naming the first member
    /// whose count differs from member 0.
    pub fn count(&self) -> Result<usize> {
        let members = self.inner.members()?;
        Ok(agree(&members, NotifyingList::count)?.unwrap_or(0))
    }

    /// Whether member counts disagree. A disposed member counts as
    /// disagreeing.
    #[must_use]
    pub fn is_out_of_sync(&self) -> bool {
        let Ok(members) = self.inner.members() else {
            return false;
        };
        let counts: Vec<Option<usize>> = members.iter().map(|m| m.count().ok()).collect();
        counts.iter().any(Option::is_none) || counts.windows(2).any(|pair| pair[0] != pair[1])
    }

    /// Common read-only flag.
    ///
    /// # Errors
    ///
    /// [`CollectionError::CollectionsOutOfSync`] if members disagree.
    pub fn is_read_only(&self) -> Result<bool> {
        let members = self.inner.members()?;
        Ok(agree(&members, NotifyingList::is_read_only)?.unwrap_or(false))
    }

    pub fn contains(&self, item: &T) -> Result<bool> {
        match self.inner.members()?.first() {
            Some(first) => first.contains(item),
            None => Ok(false),
        }
    }

    pub fn to_vec(&self) -> Result<Vec<T>> {
        match self.inner.members()?.first() {
            Some(first) => first.to_vec(),
            None => Ok(Vec::new()),
        }
    }

    /// Copy member 0 into `dest` starting at `start`.
    pub fn copy_to(&self, dest: &mut [T], start: usize) -> Result<()> {
        match self.inner.members()?.first() {
            Some(first) => first.copy_to(dest, start),
            None => Ok(()),
        }
    }

    /// Live iterator over member 0. Empty for an empty or disposed group.
    #[must_use]
    pub fn iter(&self) -> Iter<T> {
        match self.inner.members().ok().and_then(|m| m.into_iter().next()) {
            Some(first) => first.iter(),
            None => Iter::empty(),
        }
    }

    /// Handles to the members, in construction order.
    pub fn members(&self) -> Result<Vec<NotifyingList<T>>> {
        self.inner.members()
    }

    #[must_use]
    pub fn config(&self) -> GroupConfig {
        self.inner.config
    }

    // ========================================================================
    // Notification
    // ========================================================================

    /// Subscribe to group-level change events.
    pub fn subscribe(
        &self,
        handler: impl Fn(SourceId, &CollectionChange<T>) -> Result<()> + 'static,
    ) -> Subscription {
        self.inner.listeners.subscribe(handler)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Detach from every member and observed element. Members themselves
    /// stay usable. Every later call fails with [`CollectionError::Disposed`].
    pub fn dispose(&self) {
        self.inner.disposed.set(true);
        let subscriptions = std::mem::take(&mut *self.inner.member_subscriptions.borrow_mut());
        drop(subscriptions);
        self.inner.forget_all_items();
        self.inner.pending.borrow_mut().clear();
        let members = std::mem::take(&mut *self.inner.members.borrow_mut());
        drop(members);
        debug!(group = %self.inner.id, "disposed");
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

/// Common value of `read` across members, `None` for an empty group.
fn agree<T, V: PartialEq>(
    members: &[NotifyingList<T>],
    read: impl Fn(&NotifyingList<T>) -> Result<V>,
) -> Result<Option<V>> {
    let Some((first, rest)) = members.split_first() else {
        return Ok(None);
    };
    let expected = read(first)?;
    for (offset, member) in rest.iter().enumerate() {
        if read(member)? != expected {
            return Err(CollectionError::CollectionsOutOfSync { member: offset + 1 });
        }
    }
    Ok(Some(expected))
}

impl<T: Clone + PartialEq + 'static> NotifyCollectionChanged<T> for SyncGroup<T> {
    fn attach(&self, handler: Rc<ChangeHandler<T>>) -> Subscription {
        self.inner.listeners.subscribe_rc(handler)
    }

    fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    fn source_id(&self) -> SourceId {
        self.inner.id
    }
}

impl<'a, T: Clone + PartialEq + 'static> IntoIterator for &'a SyncGroup<T> {
    type Item = T;
    type IntoIter = Iter<T>;

    fn into_iter(self) -> Iter<T> {
        self.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use lockstep_core::{ObservableVec, OrderedList, SharedVec};

    fn pair<T: Clone + PartialEq + 'static>() -> (NotifyingList<T>, NotifyingList<T>) {
        (
            NotifyingList::new(SharedVec::new()),
            NotifyingList::new(SharedVec::new()),
        )
    }

    fn record<T: Clone + PartialEq + 'static>(
        group: &SyncGroup<T>,
    ) -> (Rc<RefCell<Vec<(SourceId, CollectionChange<T>)>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = Rc::clone(&log);
        let sub = group.subscribe(move |sender, change| {
            log_clone.borrow_mut().push((sender, change.clone()));
            Ok(())
        });
        (log, sub)
    }

    #[test]
    fn add_reaches_every_member() {
        let (col1, col2) = pair();
        let group = SyncGroup::new([col1.clone(), col2.clone()]).unwrap();

        group.add("One").unwrap();
        assert_eq!(col1.count().unwrap(), 1);
        assert_eq!(col2.count().unwrap(), 1);
        assert_eq!(group.count().unwrap(), 1);

        group.add("Two").unwrap();
        group.add("Three").unwrap();
        assert_eq!(group.count().unwrap(), 3);

        assert!(group.remove(&"Two").unwrap());
        assert_eq!(col1.count().unwrap(), 2);
        assert_eq!(col2.count().unwrap(), 2);
        assert_eq!(group.count().unwrap(), 2);
    }

    #[test]
    fn member_change_reaches_peers() {
        let (col1, col2) = pair();
        let group = SyncGroup::new([col1.clone(), col2.clone()]).unwrap();

        col1.add("One").unwrap();
        col2.add("Two").unwrap();
        assert_eq!(col1.to_vec().unwrap(), vec!["One", "Two"]);
        assert_eq!(col2.to_vec().unwrap(), vec!["One", "Two"]);

        col2.remove(&"One").unwrap();
        assert_eq!(col1.to_vec().unwrap(), vec!["Two"]);

        col1.clear().unwrap();
        assert_eq!(col2.count().unwrap(), 0);
        assert!(!group.is_out_of_sync());
    }

    #[test]
    fn member_listener_edit_during_group_write_reaches_peers() {
        let (col1, col2) = pair();
        let group = SyncGroup::new([col1.clone(), col2.clone()]).unwrap();
        let (log, _log_sub) = record(&group);
        let other = col1.clone();
        let _cascade = col2.subscribe(move |_, change| {
            if change.new_item() == Some(&"x") {
                other.add("z")?;
            }
            Ok(())
        });

        group.add("x").unwrap();

        assert_eq!(col1.to_vec().unwrap(), vec!["x", "z"]);
        assert_eq!(col2.to_vec().unwrap(), vec!["x", "z"]);
        assert!(!group.is_out_of_sync());
        let items: Vec<&str> = log
            .borrow()
            .iter()
            .filter_map(|(_, c)| c.new_item().copied())
            .collect();
        assert_eq!(items, vec!["x", "z"]);
        assert!(group.inner.writing.borrow().is_empty());
        assert!(group.inner.pending.borrow().is_empty());
    }

    #[test]
    fn append_onto_diverged_peer_stays_append() {
        let raw = SharedVec::new();
        let col1 = NotifyingList::new(SharedVec::new());
        let col2 = NotifyingList::new(raw.clone());
        let _group = SyncGroup::new([col1.clone(), col2.clone()]).unwrap();

        col1.add("a").unwrap();
        raw.push("b").unwrap();
        raw.push("c").unwrap();
        col1.add("x").unwrap();

        assert_eq!(col1.to_vec().unwrap(), vec!["a", "x"]);
        assert_eq!(col2.to_vec().unwrap(), vec!["a", "b", "c", "x"]);
    }

    #[test]
    fn member_error_drops_queued_changes() {
        let col1 = NotifyingList::new(SharedVec::new());
        let col2 = NotifyingList::new(SharedVec::new());
        let col3 = NotifyingList::new(SharedVec::read_only(Vec::new()));
        let group = SyncGroup::new([col1.clone(), col2.clone(), col3]).unwrap();
        let other = col1.clone();
        let _cascade = col2.subscribe(move |_, change| {
            if change.new_item() == Some(&1) {
                other.add(2)?;
            }
            Ok(())
        });

        assert_eq!(group.add(1), Err(CollectionError::ReadOnly));
        assert!(group.inner.pending.borrow().is_empty());
        assert_eq!(col2.to_vec().unwrap(), vec![1]);
    }

    #[test]
    fn single_member_group() {
        let col = NotifyingList::new(SharedVec::new());
        let group = SyncGroup::new([col.clone()]).unwrap();

        col.add("One").unwrap();
        col.add("Two").unwrap();
        col.add("Three").unwrap();
        col.remove(&"Two").unwrap();

        assert_eq!(group.count().unwrap(), 2);
        assert!(!group.is_out_of_sync());
    }

    #[test]
    fn insert_is_index_aware() {
        let (col1, col2) = pair();
        let _group = SyncGroup::new([col1.clone(), col2.clone()]).unwrap();

        col1.add('a').unwrap();
        col1.add('b').unwrap();
        col1.insert(1, 'x').unwrap();
        assert_eq!(col2.to_vec().unwrap(), vec!['a', 'x', 'b']);
    }

    #[test]
    fn insert_past_peer_end_appends() {
        let raw = SharedVec::new();
        let col1 = NotifyingList::new(raw.clone());
        let col2 = NotifyingList::new(SharedVec::new());
        let _group = SyncGroup::new([col1.clone(), col2.clone()]).unwrap();

        col1.add('a').unwrap();
        raw.push('q').unwrap();
        raw.push('r').unwrap();
        col1.insert(2, 'x').unwrap();

        assert_eq!(col1.to_vec().unwrap(), vec!['a', 'q', 'x', 'r']);
        assert_eq!(col2.to_vec().unwrap(), vec!['a', 'x']);
    }

    #[test]
    fn replace_appends_by_default() {
        let (col1, col2) = pair();
        let _group = SyncGroup::new([col1.clone(), col2.clone()]).unwrap();

        col1.add(1).unwrap();
        col1.add(2).unwrap();
        col1.set(0, 9).unwrap();

        assert_eq!(col1.to_vec().unwrap(), vec![9, 2]);
        assert_eq!(col2.to_vec().unwrap(), vec![1, 2, 9]);
    }

    #[test]
    fn replace_in_place_when_configured() {
        let (col1, col2) = pair();
        let group = SyncGroup::builder([col1.clone(), col2.clone()])
            .config(GroupConfig::new().with_replace(ReplacePolicy::InPlace))
            .build()
            .unwrap();
        assert_eq!(group.config().replace, ReplacePolicy::InPlace);

        col1.add(1).unwrap();
        col1.add(2).unwrap();
        col1.set(0, 9).unwrap();

        assert_eq!(col2.to_vec().unwrap(), vec![9, 2]);
        assert!(!group.is_out_of_sync());
    }

    #[test]
    fn remove_missing_item_is_false() {
        let (col1, col2) = pair::<&str>();
        let group = SyncGroup::new([col1, col2]).unwrap();
        let (log, _sub) = record(&group);

        assert!(!group.remove(&"ghost").unwrap());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn remove_tolerates_partial_membership() {
        let raw = SharedVec::new();
        let col1 = NotifyingList::new(raw.clone());
        let col2 = NotifyingList::new(SharedVec::new());
        let group = SyncGroup::new([col1.clone(), col2.clone()]).unwrap();

        raw.push("only-in-first").unwrap();
        assert!(group.remove(&"only-in-first").unwrap());
        assert_eq!(col1.count().unwrap(), 0);
        assert_eq!(col2.count().unwrap(), 0);
    }

    #[test]
    fn raw_backing_edit_diverges() {
        let raw = SharedVec::new();
        let col1 = NotifyingList::new(raw.clone());
        let col2 = NotifyingList::new(SharedVec::new());
        let group = SyncGroup::new([col1, col2]).unwrap();

        group.add("One").unwrap();
        raw.push("Two").unwrap();

        assert!(group.is_out_of_sync());
        assert_eq!(
            group.count(),
            Err(CollectionError::CollectionsOutOfSync { member: 1 })
        );
    }

    #[test]
    fn notifying_backing_edit_propagates() {
        let raw = ObservableVec::new();
        let col1 = NotifyingList::new(raw.clone());
        let col2 = NotifyingList::new(SharedVec::new());
        let group = SyncGroup::new([col1, col2.clone()]).unwrap();

        group.add("One").unwrap();
        group.add("Two").unwrap();
        raw.push("Three").unwrap();
        assert_eq!(col2.to_vec().unwrap(), vec!["One", "Two", "Three"]);

        raw.clear().unwrap();
        assert_eq!(group.count().unwrap(), 0);
        assert_eq!(col2.count().unwrap(), 0);
    }

    #[test]
    fn group_reemits_member_change_once() {
        let (col1, col2) = pair();
        let group = SyncGroup::new([col1.clone(), col2]).unwrap();
        let (log, _sub) = record(&group);

        col1.add(5).unwrap();

        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, group.source_id());
        assert_eq!(log[0].1.action(), ChangeAction::Add);
        assert_eq!(log[0].1.new_item(), Some(&5));
    }

    #[test]
    fn group_mutations_emit_once() {
        let (col1, col2) = pair();
        let group = SyncGroup::new([col1, col2]).unwrap();
        let (log, _sub) = record(&group);

        group.add(1).unwrap();
        group.remove(&1).unwrap();
        group.clear().unwrap();

        let actions: Vec<ChangeAction> = log.borrow().iter().map(|(_, c)| c.action()).collect();
        assert_eq!(
            actions,
            vec![ChangeAction::Add, ChangeAction::Remove, ChangeAction::Reset]
        );
    }

    #[test]
    fn group_listener_may_mutate_group() {
        let (col1, col2) = pair();
        let group = SyncGroup::new([col1, col2]).unwrap();
        let handle = group.clone();
        let _sub = group.subscribe(move |_, change| {
            if change.new_item() == Some(&1) {
                handle.add(2)?;
            }
            Ok(())
        });

        group.add(1).unwrap();
        assert_eq!(group.to_vec().unwrap(), vec![1, 2]);
        assert!(!group.is_out_of_sync());
    }

    #[test]
    fn disposed_member_is_rejected() {
        let (col1, col2) = pair::<u8>();
        col2.dispose();
        assert_eq!(
            SyncGroup::new([col1, col2]).unwrap_err(),
            CollectionError::NullCollection("group member")
        );
    }

    #[test]
    fn disposed_group_fails_and_detaches() {
        let (col1, col2) = pair();
        let group = SyncGroup::new([col1.clone(), col2.clone()]).unwrap();
        assert_eq!(col1.listener_count(), 1);

        group.dispose();
        assert!(group.is_disposed());
        assert_eq!(group.add(1), Err(CollectionError::Disposed));
        assert_eq!(group.count(), Err(CollectionError::Disposed));
        assert_eq!(col1.listener_count(), 0);

        col1.add(1).unwrap();
        assert_eq!(col2.count().unwrap(), 0);
        assert_eq!(group.iter().count(), 0);
    }

    #[test]
    fn read_only_aggregation() {
        let col1 = NotifyingList::new(SharedVec::read_only(vec![1]));
        let col2 = NotifyingList::new(SharedVec::read_only(vec![1]));
        let group = SyncGroup::new([col1, col2]).unwrap();
        assert_eq!(group.is_read_only(), Ok(true));
        assert_eq!(group.add(2), Err(CollectionError::ReadOnly));

        let col3 = NotifyingList::new(SharedVec::read_only(vec![1]));
        let col4 = NotifyingList::new(SharedVec::from_vec(vec![1]));
        let mixed = SyncGroup::new([col3, col4]).unwrap();
        assert_eq!(
            mixed.is_read_only(),
            Err(CollectionError::CollectionsOutOfSync { member: 1 })
        );
    }

    #[test]
    fn empty_group_reads() {
        let group: SyncGroup<u8> = SyncGroup::new([]).unwrap();
        assert_eq!(group.count(), Ok(0));
        assert!(!group.is_out_of_sync());
        assert_eq!(group.is_read_only(), Ok(false));
        assert_eq!(group.contains(&1), Ok(false));
        assert_eq!(group.iter().count(), 0);
        group.add(1).unwrap();
        assert_eq!(group.count(), Ok(0));
    }

    #[test]
    fn reads_delegate_to_first_member() {
        let (col1, col2) = pair();
        let group = SyncGroup::new([col1, col2]).unwrap();
        group.add("a").unwrap();
        group.add("b").unwrap();

        assert!(group.contains(&"a").unwrap());
        let mut dest = ["", "", ""];
        group.copy_to(&mut dest, 1).unwrap();
        assert_eq!(dest, ["", "a", "b"]);
        assert_eq!((&group).into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(group.members().unwrap().len(), 2);
    }

    #[test]
    fn member_error_reaches_member_caller() {
        let col1 = NotifyingList::new(SharedVec::new());
        let col2 = NotifyingList::new(SharedVec::read_only(Vec::new()));
        let _group = SyncGroup::new([col1.clone(), col2]).unwrap();

        assert_eq!(col1.add(1), Err(CollectionError::ReadOnly));
        assert_eq!(col1.count().unwrap(), 1);
    }

    #[derive(Clone, PartialEq, Debug)]
    struct Folder {
        name: &'static str,
        children: ObservableVec<Folder>,
    }

    impl Folder {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                children: ObservableVec::new(),
            }
        }
    }

    fn folder_notifier(folder: &Folder) -> Option<&dyn NotifyCollectionChanged<Folder>> {
        Some(&folder.children)
    }

    #[test]
    fn observed_item_changes_reach_members() {
        let (col1, col2) = pair();
        let group = SyncGroup::builder([col1.clone(), col2.clone()])
            .observe_items(folder_notifier)
            .build()
            .unwrap();

        let root = Folder::new("root");
        group.add(root.clone()).unwrap();
        assert_eq!(root.children.listener_count(), 1);

        let child = Folder::new("child");
        root.children.push(child.clone()).unwrap();

        assert_eq!(col1.to_vec().unwrap(), vec![root.clone(), child.clone()]);
        assert_eq!(col2.to_vec().unwrap(), vec![root.clone(), child]);
        assert!(!group.is_out_of_sync());
    }

    #[test]
    fn removed_item_is_no_longer_observed() {
        let (col1, col2) = pair();
        let group = SyncGroup::builder([col1, col2])
            .observe_items(folder_notifier)
            .build()
            .unwrap();

        let root = Folder::new("root");
        group.add(root.clone()).unwrap();
        assert!(group.remove(&root).unwrap());
        assert_eq!(root.children.listener_count(), 0);

        root.children.push(Folder::new("late")).unwrap();
        assert_eq!(group.count().unwrap(), 0);
    }

    #[test]
    fn clear_releases_observed_items() {
        let (col1, col2) = pair();
        let group = SyncGroup::builder([col1, col2])
            .observe_items(folder_notifier)
            .build()
            .unwrap();

        let a = Folder::new("a");
        let b = Folder::new("b");
        group.add(a.clone()).unwrap();
        group.add(b.clone()).unwrap();
        group.clear().unwrap();

        assert_eq!(a.children.listener_count(), 0);
        assert_eq!(b.children.listener_count(), 0);
        assert_eq!(a.name, "a");
    }
}
