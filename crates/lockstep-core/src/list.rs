#![forbid(unsafe_code)]

//! Ordered container capability and the two backing containers.
//!
//! # Design
//!
//! Wrappers consume containers through [`OrderedList<T>`]. Every method takes
//! `&self`: backing containers are cheap-to-clone handles over shared storage
//! (`Rc<RefCell<Vec<T>>>`), so the caller can keep one handle and mutate the
//! container directly while a wrapper holds another. Reads always see the
//! live contents.
//!
//! Change notification is an optional capability. A container that raises
//! structural events returns itself from [`OrderedList::as_notifying`];
//! wrappers query this once at construction.
//!
//! | Container          | Notifies | Typical use                         |
//! |--------------------|----------|-------------------------------------|
//! | [`SharedVec<T>`]     | no       | plain storage; bypass edits go unseen |
//! | [`ObservableVec<T>`] | yes      | storage whose direct edits propagate  |

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::change::CollectionChange;
use crate::error::{CollectionError, Result};
use crate::listeners::{ChangeHandler, Listeners, SourceId, Subscription};

/// Capability of raising structural change notifications.
pub trait NotifyCollectionChanged<T> {
    /// Attach a change handler.
    fn attach(&self, handler: Rc<ChangeHandler<T>>) -> Subscription;

    /// Number of attached handlers.
    fn listener_count(&self) -> usize;

    /// Identity passed as the sender of every notification.
    fn source_id(&self) -> SourceId;
}

/// Ordered, index-addressable container consumed by the notifying wrapper.
pub trait OrderedList<T> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone of the element at `index`, or `None` past the end.
    fn get(&self, index: usize) -> Option<T>;

    /// Overwrite the element at `index`, returning the previous element.
    fn set(&self, index: usize, item: T) -> Result<T>;

    /// Append to the end.
    fn push(&self, item: T) -> Result<()>;

    /// Insert before `index` (`index == len` appends).
    fn insert(&self, index: usize, item: T) -> Result<()>;

    /// Remove and return the element at `index`.
    fn remove_at(&self, index: usize) -> Result<T>;

    /// Remove the first element equal to `item`.
    fn remove(&self, item: &T) -> Result<bool> {
        match self.index_of(item) {
            Some(index) => self.remove_at(index).map(|_| true),
            None => Ok(false),
        }
    }

    fn clear(&self) -> Result<()>;

    fn index_of(&self, item: &T) -> Option<usize>;

    fn contains(&self, item: &T) -> bool {
        self.index_of(item).is_some()
    }

    fn is_read_only(&self) -> bool {
        false
    }

    /// Notification capability, if this container raises change events.
    fn as_notifying(&self) -> Option<&dyn NotifyCollectionChanged<T>> {
        None
    }
}

fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(CollectionError::IndexOutOfRange { index, len })
    }
}

fn check_insert_index(index: usize, len: usize) -> Result<()> {
    if index <= len {
        Ok(())
    } else {
        Err(CollectionError::IndexOutOfRange { index, len })
    }
}

// ---------------------------------------------------------------------------
// SharedVec
// ---------------------------------------------------------------------------

/// Shared vector without change notification.
///
/// Cloning creates a new handle to the **same** storage.
pub struct SharedVec<T> {
    items: Rc<RefCell<Vec<T>>>,
    read_only: bool,
}

impl<T> Clone for SharedVec<T> {
    fn clone(&self) -> Self {
        Self {
            items: Rc::clone(&self.items),
            read_only: self.read_only,
        }
    }
}

impl<T> Default for SharedVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedVec")
            .field("items", &self.items.borrow())
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl<T> SharedVec<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    #[must_use]
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            items: Rc::new(RefCell::new(items)),
            read_only: false,
        }
    }

    /// A handle that rejects every mutation with [`CollectionError::ReadOnly`].
    #[must_use]
    pub fn read_only(items: Vec<T>) -> Self {
        Self {
            items: Rc::new(RefCell::new(items)),
            read_only: true,
        }
    }

    /// Access the contents by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.items.borrow())
    }

    /// Whether both handles share storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.items, &other.items)
    }

    fn writable(&self) -> Result<()> {
        if self.read_only {
            Err(CollectionError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

impl<T: Clone> SharedVec<T> {
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.items.borrow().clone()
    }
}

impl<T: Clone + PartialEq> OrderedList<T> for SharedVec<T> {
    fn len(&self) -> usize {
        self.items.borrow().len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.items.borrow().get(index).cloned()
    }

    fn set(&self, index: usize, item: T) -> Result<T> {
        self.writable()?;
        let mut items = self.items.borrow_mut();
        check_index(index, items.len())?;
        Ok(std::mem::replace(&mut items[index], item))
    }

    fn push(&self, item: T) -> Result<()> {
        self.writable()?;
        self.items.borrow_mut().push(item);
        Ok(())
    }

    fn insert(&self, index: usize, item: T) -> Result<()> {
        self.writable()?;
        let mut items = self.items.borrow_mut();
        check_insert_index(index, items.len())?;
        items.insert(index, item);
        Ok(())
    }

    fn remove_at(&self, index: usize) -> Result<T> {
        self.writable()?;
        let mut items = self.items.borrow_mut();
        check_index(index, items.len())?;
        Ok(items.remove(index))
    }

    fn clear(&self) -> Result<()> {
        self.writable()?;
        self.items.borrow_mut().clear();
        Ok(())
    }

    fn index_of(&self, item: &T) -> Option<usize> {
        self.items.borrow().iter().position(|x| x == item)
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

// ---------------------------------------------------------------------------
// ObservableVec
// ---------------------------------------------------------------------------

struct ObservableVecInner<T> {
    items: RefCell<Vec<T>>,
    listeners: Listeners<CollectionChange<T>>,
    id: SourceId,
}

/// Shared vector that notifies on every structural change.
///
/// Cloning creates a new handle to the same storage and the same
/// listeners. Equality is identity: two handles are equal when they share
/// storage.
///
/// Insertion is reported as `Add` with the insertion index; `clear` always
/// reports `Reset`, even on an empty vector.
pub struct ObservableVec<T> {
    inner: Rc<ObservableVecInner<T>>,
}

impl<T> Clone for ObservableVec<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for ObservableVec<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableVec")
            .field("id", &self.inner.id)
            .field("items", &self.inner.items.borrow())
            .field("listener_count", &self.inner.listeners.len())
            .finish()
    }
}

impl<T: 'static> Default for ObservableVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> ObservableVec<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    #[must_use]
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            inner: Rc::new(ObservableVecInner {
                items: RefCell::new(items),
                listeners: Listeners::new(),
                id: SourceId::next(),
            }),
        }
    }

    /// Subscribe to structural changes.
    pub fn subscribe(
        &self,
        handler: impl Fn(SourceId, &CollectionChange<T>) -> Result<()> + 'static,
    ) -> Subscription {
        self.inner.listeners.subscribe(handler)
    }

    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.inner.items.borrow())
    }

    fn notify(&self, change: impl FnOnce() -> CollectionChange<T>) -> Result<()> {
        if self.inner.listeners.is_empty() {
            return Ok(());
        }
        self.inner.listeners.emit(self.inner.id, &change())
    }
}

impl<T: Clone + 'static> ObservableVec<T> {
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.items.borrow().clone()
    }
}

impl<T: 'static> NotifyCollectionChanged<T> for ObservableVec<T> {
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

impl<T: Clone + PartialEq + 'static> OrderedList<T> for ObservableVec<T> {
    fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.inner.items.borrow().get(index).cloned()
    }

    fn set(&self, index: usize, item: T) -> Result<T> {
        let old = {
            let mut items = self.inner.items.borrow_mut();
            check_index(index, items.len())?;
            std::mem::replace(&mut items[index], item.clone())
        };
        self.notify(|| CollectionChange::replaced(item, old.clone(), index))?;
        Ok(old)
    }

    fn push(&self, item: T) -> Result<()> {
        let index = {
            let mut items = self.inner.items.borrow_mut();
            items.push(item.clone());
            items.len() - 1
        };
        self.notify(|| CollectionChange::added(item, Some(index)))
    }

    fn insert(&self, index: usize, item: T) -> Result<()> {
        {
            let mut items = self.inner.items.borrow_mut();
            check_insert_index(index, items.len())?;
            items.insert(index, item.clone());
        }
        self.notify(|| CollectionChange::added(item, Some(index)))
    }

    fn remove_at(&self, index: usize) -> Result<T> {
        let removed = {
            let mut items = self.inner.items.borrow_mut();
            check_index(index, items.len())?;
            items.remove(index)
        };
        self.notify(|| CollectionChange::removed(removed.clone(), Some(index)))?;
        Ok(removed)
    }

    fn clear(&self) -> Result<()> {
        self.inner.items.borrow_mut().clear();
        self.notify(CollectionChange::reset)
    }

    fn index_of(&self, item: &T) -> Option<usize> {
        self.inner.items.borrow().iter().position(|x| x == item)
    }

    fn as_notifying(&self) -> Option<&dyn NotifyCollectionChanged<T>> {
        Some(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeAction;

    fn recorder<T: Clone + 'static>(
        vec: &ObservableVec<T>,
    ) -> (Rc<RefCell<Vec<CollectionChange<T>>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = Rc::clone(&log);
        let sub = vec.subscribe(move |_, change| {
            log_clone.borrow_mut().push(change.clone());
            Ok(())
        });
        (log, sub)
    }

    #[test]
    fn shared_vec_clone_shares_storage() {
        let a = SharedVec::new();
        let b = a.clone();
        a.push("One").unwrap();
        assert_eq!(b.len(), 1);
        assert!(a.ptr_eq(&b));
        assert!(a.as_notifying().is_none());
    }

    #[test]
    fn shared_vec_bounds() {
        let v = SharedVec::from_vec(vec![1, 2]);
        assert_eq!(
            v.remove_at(2),
            Err(CollectionError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            v.set(5, 0),
            Err(CollectionError::IndexOutOfRange { index: 5, len: 2 })
        );
        v.insert(2, 3).unwrap();
        assert_eq!(v.to_vec(), vec![1, 2, 3]);
        assert!(v.insert(9, 9).is_err());
    }

    #[test]
    fn shared_vec_remove_first_match() {
        let v = SharedVec::from_vec(vec!["a", "b", "a"]);
        assert!(v.remove(&"a").unwrap());
        assert_eq!(v.to_vec(), vec!["b", "a"]);
        assert!(!v.remove(&"z").unwrap());
        assert!(v.contains(&"a"));
        assert_eq!(v.index_of(&"a"), Some(1));
    }

    #[test]
    fn read_only_rejects_mutation() {
        let v = SharedVec::read_only(vec![1]);
        assert!(v.is_read_only());
        assert_eq!(v.push(2), Err(CollectionError::ReadOnly));
        assert_eq!(v.clear(), Err(CollectionError::ReadOnly));
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn observable_vec_reports_each_action() {
        let v = ObservableVec::new();
        let (log, _sub) = recorder(&v);

        v.push("One").unwrap();
        v.insert(0, "Zero").unwrap();
        v.set(1, "Uno").unwrap();
        v.remove(&"Zero").unwrap();
        v.clear().unwrap();

        let log = log.borrow();
        let actions: Vec<ChangeAction> = log.iter().map(CollectionChange::action).collect();
        assert_eq!(
            actions,
            vec![
                ChangeAction::Add,
                ChangeAction::Add,
                ChangeAction::Replace,
                ChangeAction::Remove,
                ChangeAction::Reset,
            ]
        );
        assert_eq!(log[0].index(), Some(0));
        assert_eq!(log[1].index(), Some(0));
        assert_eq!(log[2].new_item(), Some(&"Uno"));
        assert_eq!(log[2].old_item(), Some(&"One"));
        assert_eq!(log[3].old_item(), Some(&"Zero"));
        assert_eq!(log[3].index(), Some(0));
    }

    #[test]
    fn observable_vec_sender_is_its_id() {
        let v: ObservableVec<u8> = ObservableVec::new();
        let seen = Rc::new(RefCell::new(None));
        let seen_clone = Rc::clone(&seen);
        let _sub = v.subscribe(move |sender, _| {
            *seen_clone.borrow_mut() = Some(sender);
            Ok(())
        });
        v.push(1).unwrap();
        assert_eq!(*seen.borrow(), Some(v.source_id()));
    }

    #[test]
    fn observable_vec_handler_can_read_during_dispatch() {
        let v = ObservableVec::new();
        let reader = v.clone();
        let seen_len = Rc::new(RefCell::new(0));
        let seen_clone = Rc::clone(&seen_len);
        let _sub = v.subscribe(move |_, _| {
            *seen_clone.borrow_mut() = reader.len();
            Ok(())
        });
        v.push(10).unwrap();
        v.push(20).unwrap();
        assert_eq!(*seen_len.borrow(), 2);
    }

    #[test]
    fn with_borrows_live_contents() {
        let shared = SharedVec::from_vec(vec![String::from("a"), String::from("bb")]);
        let handle = shared.clone();
        handle.push(String::from("ccc")).unwrap();
        let total: usize = shared.with(|items| items.iter().map(String::len).sum());
        assert_eq!(total, 6);

        let v = ObservableVec::from_vec(vec![1, 2]);
        let reader = v.clone();
        let sums = Rc::new(RefCell::new(Vec::new()));
        let sums_clone = Rc::clone(&sums);
        let _sub = v.subscribe(move |_, _| {
            sums_clone.borrow_mut().push(reader.with(|items| items.iter().sum::<i32>()));
            Ok(())
        });
        v.push(3).unwrap();
        v.remove_at(0).unwrap();
        assert_eq!(*sums.borrow(), vec![6, 5]);
        assert_eq!(v.with(<[i32]>::len), 2);
    }

    #[test]
    fn observable_vec_failed_index_does_not_notify() {
        let v: ObservableVec<u8> = ObservableVec::new();
        let (log, _sub) = recorder(&v);
        assert!(v.remove_at(0).is_err());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn observable_vec_equality_is_identity() {
        let a: ObservableVec<u8> = ObservableVec::from_vec(vec![1]);
        let b: ObservableVec<u8> = ObservableVec::from_vec(vec![1]);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(a.as_notifying().is_some());
        assert_eq!(a.listener_count(), 0);
    }
}
