#![forbid(unsafe_code)]

//! List wrapper that forwards mutations and reports them as change events.
//!
//! # Design
//!
//! [`NotifyingList<T>`] holds a shared handle to a caller-supplied
//! [`OrderedList<T>`] and never copies it: every read reflects the live
//! backing contents. Mutations go to the backing container first, then one
//! [`CollectionChange`] is dispatched to the wrapper's listeners with the
//! wrapper's [`SourceId`] as sender.
//!
//! If the backing container reports the notification capability, the
//! wrapper attaches to it at construction and re-emits its events. Edits
//! made directly on the backing container are therefore observed too.
//! Backing events raised while the wrapper itself is mutating are dropped,
//! so a wrapper call is reported exactly once.
//!
//! # Reentrancy
//!
//! A depth counter is raised around every dispatch of a wrapper-issued
//! change. A mutation that arrives while the counter is non-zero fails with
//! [`CollectionError::Reentrancy`] if more than one listener is attached.
//! With zero or one listener the nested mutation is allowed.
//! [`ReentrancyPolicy::Strict`] rejects every nested mutation.
//!
//! Re-emitted backing changes pass the same check but do not raise the
//! counter, so listeners may answer a direct backing edit by mutating the
//! wrapper.
//!
//! # Failure Modes
//!
//! | Mode | Condition | Behavior |
//! |------|-----------|----------|
//! | Nested mutation | Dispatch active, >1 listener | `Err(Reentrancy)`, backing untouched |
//! | Listener error | A handler returns `Err` | Backing already changed, error returned |
//! | Torn down | Any call after [`NotifyingList::dispose`] | `Err(Disposed)` |
//! | Bad index | Index past the end | `Err(IndexOutOfRange)` |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use lockstep_core::{
    ChangeHandler, CollectionChange, CollectionError, Listeners, NotifyCollectionChanged,
    OrderedList, Result, SourceId, Subscription,
};
use tracing::{debug, trace};

use crate::config::{ListConfig, ReentrancyPolicy};
use crate::guard::DepthGuard;

/// Shared interior for [`NotifyingList<T>`].
struct ListInner<T> {
    /// `None` once disposed.
    items: RefCell<Option<Rc<dyn OrderedList<T>>>>,
    listeners: Listeners<CollectionChange<T>>,
    dispatch_depth: Cell<usize>,
    /// Non-zero while a wrapper method is writing to the backing container.
    mutating: Cell<usize>,
    backing_subscription: RefCell<Option<Subscription>>,
    config: ListConfig,
    id: SourceId,
}

impl<T: Clone + PartialEq + 'static> ListInner<T> {
    fn items(&self) -> Result<Rc<dyn OrderedList<T>>> {
        self.items
            .borrow()
            .as_ref()
            .map(Rc::clone)
            .ok_or(CollectionError::Disposed)
    }

    fn check_reentrancy(&self) -> Result<()> {
        if self.dispatch_depth.get() == 0 {
            return Ok(());
        }
        let blocked = match self.config.reentrancy {
            ReentrancyPolicy::ListenerCount => self.listeners.len() > 1,
            ReentrancyPolicy::Strict => true,
        };
        if blocked {
            Err(CollectionError::Reentrancy)
        } else {
            Ok(())
        }
    }

    fn dispatch(&self, change: &CollectionChange<T>) -> Result<()> {
        if self.listeners.is_empty() {
            return Ok(());
        }
        let _guard = DepthGuard::enter(&self.dispatch_depth);
        self.listeners.emit(self.id, change)
    }

    fn on_backing_changed(&self, change: &CollectionChange<T>) -> Result<()> {
        if self.mutating.get() > 0 {
            return Ok(());
        }
        self.check_reentrancy()?;
        trace!(list = %self.id, action = %change.action(), "re-emitting backing change");
        // Forwarded as-is: the backing container owns this dispatch, so the
        // wrapper's depth stays where it was.
        self.listeners.emit(self.id, change)
    }

    /// Run a backing write with backing notifications muted.
    fn write<R>(&self, f: impl FnOnce(&dyn OrderedList<T>) -> Result<R>) -> Result<R> {
        self.check_reentrancy()?;
        let items = self.items()?;
        let _muted = DepthGuard::enter(&self.mutating);
        f(items.as_ref())
    }
}

/// Ordered list wrapper with change notification.
///
/// Cloning creates a new handle to the **same** wrapper: same backing
/// container, same listeners, same identity.
pub struct NotifyingList<T> {
    inner: Rc<ListInner<T>>,
}

impl<T> Clone for NotifyingList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for NotifyingList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.inner.items.borrow().as_ref().map(|items| items.len());
        f.debug_struct("NotifyingList")
            .field("id", &self.inner.id)
            .field("len", &len)
            .field("listener_count", &self.inner.listeners.len())
            .field("dispatch_depth", &self.inner.dispatch_depth.get())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> NotifyingList<T> {
    /// Wrap `backing` with the default configuration.
    #[must_use]
    pub fn new(backing: impl OrderedList<T> + 'static) -> Self {
        Self::with_config(backing, ListConfig::default())
    }

    /// Wrap `backing`. If it reports the notification capability, the
    /// wrapper attaches to it now.
    #[must_use]
    pub fn with_config(backing: impl OrderedList<T> + 'static, config: ListConfig) -> Self {
        let items: Rc<dyn OrderedList<T>> = Rc::new(backing);
        let inner = Rc::new(ListInner {
            items: RefCell::new(Some(Rc::clone(&items))),
            listeners: Listeners::new(),
            dispatch_depth: Cell::new(0),
            mutating: Cell::new(0),
            backing_subscription: RefCell::new(None),
            config,
            id: SourceId::next(),
        });

        if let Some(notifier) = items.as_notifying() {
            let weak = Rc::downgrade(&inner);
            let handler: Rc<ChangeHandler<T>> =
                Rc::new(move |_sender: SourceId, change: &CollectionChange<T>| {
                    match weak.upgrade() {
                        Some(inner) => inner.on_backing_changed(change),
                        None => Ok(()),
                    }
                });
            let subscription = notifier.attach(handler);
            debug!(
                list = %inner.id,
                backing = %notifier.source_id(),
                "attached to notifying backing container"
            );
            *inner.backing_subscription.borrow_mut() = Some(subscription);
        }

        Self { inner }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Append `item`; emits `Add`.
    ///
    /// # Errors
    ///
    /// `Reentrancy`, `Disposed`, backing failures, or a listener error.
    pub fn add(&self, item: T) -> Result<()> {
        let index = self.inner.write(|items| {
            items.push(item.clone())?;
            Ok(items.len().saturating_sub(1))
        })?;
        self.inner
            .dispatch(&CollectionChange::added(item, Some(index)))
    }

    /// Insert `item` before `index`; emits `Add` with the index.
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.inner.write(|items| items.insert(index, item.clone()))?;
        self.inner
            .dispatch(&CollectionChange::added(item, Some(index)))
    }

    /// Remove the element at `index`; emits `Remove`.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        let removed = self.inner.write(|items| items.remove_at(index))?;
        self.inner
            .dispatch(&CollectionChange::removed(removed.clone(), Some(index)))?;
        Ok(removed)
    }

    /// Overwrite the element at `index`; emits `Replace`. Returns the old
    /// element.
    pub fn set(&self, index: usize, item: T) -> Result<T> {
        let old = self.inner.write(|items| items.set(index, item.clone()))?;
        self.inner
            .dispatch(&CollectionChange::replaced(item, old.clone(), index))?;
        Ok(old)
    }

    /// Remove the first element equal to `item`; emits `Remove` only when
    /// something was removed.
    pub fn remove(&self, item: &T) -> Result<bool> {
        let removed = self.inner.write(|items| match items.index_of(item) {
            Some(index) => items.remove_at(index).map(|old| Some((old, index))),
            None => Ok(None),
        })?;
        match removed {
            Some((old, index)) => {
                self.inner
                    .dispatch(&CollectionChange::removed(old, Some(index)))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove everything; emits `Reset`.
    pub fn clear(&self) -> Result<()> {
        self.inner.write(|items| items.clear())?;
        self.inner.dispatch(&CollectionChange::reset())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get(&self, index: usize) -> Result<T> {
        let items = self.inner.items()?;
        items.get(index).ok_or(CollectionError::IndexOutOfRange {
            index,
            len: items.len(),
        })
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.inner.items()?.len())
    }

    pub fn index_of(&self, item: &T) -> Result<Option<usize>> {
        Ok(self.inner.items()?.index_of(item))
    }

    pub fn contains(&self, item: &T) -> Result<bool> {
        Ok(self.inner.items()?.contains(item))
    }

    pub fn is_read_only(&self) -> Result<bool> {
        Ok(self.inner.items()?.is_read_only())
    }

    /// Snapshot of the current contents.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        let items = self.inner.items()?;
        Ok((0..items.len()).filter_map(|i| items.get(i)).collect())
    }

    /// Copy the contents into `dest` starting at `start`.
    ///
    /// # Errors
    ///
    /// `IndexOutOfRange` if the contents do not fit.
    pub fn copy_to(&self, dest: &mut [T], start: usize) -> Result<()> {
        let snapshot = self.to_vec()?;
        let end = start.saturating_add(snapshot.len());
        if end > dest.len() {
            return Err(CollectionError::IndexOutOfRange {
                index: end.saturating_sub(1).max(start),
                len: dest.len(),
            });
        }
        dest[start..end].clone_from_slice(&snapshot);
        Ok(())
    }

    /// Live iterator: each step reads the backing container afresh.
    #[must_use]
    pub fn iter(&self) -> Iter<T> {
        Iter {
            list: Some(self.clone()),
            next: 0,
        }
    }

    // ========================================================================
    // Notification
    // ========================================================================

    /// Subscribe to change events.
    pub fn subscribe(
        &self,
        handler: impl Fn(SourceId, &CollectionChange<T>) -> Result<()> + 'static,
    ) -> Subscription {
        self.inner.listeners.subscribe(handler)
    }

    /// Whether a dispatch is on the call stack.
    #[must_use]
    pub fn is_dispatching(&self) -> bool {
        self.inner.dispatch_depth.get() > 0
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Release the backing container and detach from its notifications.
    /// Every later call fails with [`CollectionError::Disposed`].
    pub fn dispose(&self) {
        let subscription = self.inner.backing_subscription.borrow_mut().take();
        drop(subscription);
        let items = self.inner.items.borrow_mut().take();
        drop(items);
        debug!(list = %self.inner.id, "disposed");
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.items.borrow().is_none()
    }
}

impl<T: Clone + PartialEq + 'static> NotifyCollectionChanged<T> for NotifyingList<T> {
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

/// Live iterator over a [`NotifyingList`].
///
/// Stops at the first index past the end, or when the list is disposed.
pub struct Iter<T> {
    list: Option<NotifyingList<T>>,
    next: usize,
}

impl<T> Iter<T> {
    pub(crate) fn empty() -> Self {
        Self { list: None, next: 0 }
    }
}

impl<T: Clone + PartialEq + 'static> Iterator for Iter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let list = self.list.as_ref()?;
        let item = list.inner.items().ok()?.get(self.next)?;
        self.next += 1;
        Some(item)
    }
}

impl<'a, T: Clone + PartialEq + 'static> IntoIterator for &'a NotifyingList<T> {
    type Item = T;
    type IntoIter = Iter<T>;

    fn into_iter(self) -> Iter<T> {
        self.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
