#![forbid(unsafe_code)]

//! Ordered listener registry with RAII unsubscription.
//!
//! # Design
//!
//! [`Listeners<A>`] keeps handlers in registration order inside shared,
//! reference-counted storage. [`Listeners::subscribe`] hands back a
//! [`Subscription`] guard holding a weak pointer to that storage; dropping
//! the guard removes the handler immediately, so [`Listeners::len`] is
//! always the exact number of attached handlers. The reentrancy guard in the
//! notifying wrapper depends on that count.
//!
//! # Dispatch
//!
//! [`Listeners::emit`] snapshots the handler list before invoking anything,
//! then calls each handler with the sender's [`SourceId`] and the event.
//! Handlers may subscribe, unsubscribe or mutate other containers during
//! dispatch; changes to the list take effect on the next emit. The first
//! handler to return an error stops dispatch and the error is returned.
//!
//! # Failure Modes
//!
//! | Mode | Condition | Behavior |
//! |------|-----------|----------|
//! | Handler error | Handler returns `Err` | Later handlers skipped, error returned |
//! | Registry dropped | Guard outlives the registry | Guard drop is a no-op |
//! | Guard leaked | Guard stored forever | Handler stays attached |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::change::CollectionChange;
use crate::error::Result;

/// Process-unique identity of an object that dispatches notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    /// Allocate a fresh identity.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of one registered handler within a [`Listeners`] registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Handler signature: sender identity plus the event.
pub type Handler<A> = dyn Fn(SourceId, &A) -> Result<()>;

/// Handler for structural collection changes.
pub type ChangeHandler<T> = Handler<CollectionChange<T>>;

type HandlerRc<A> = Rc<Handler<A>>;

/// Shared interior of [`Listeners<A>`].
struct Slots<A> {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(ListenerId, HandlerRc<A>)>>,
}

/// Type-erased removal hook so [`Subscription`] is not generic.
trait Detach {
    fn detach(&self, id: ListenerId) -> bool;
    fn contains(&self, id: ListenerId) -> bool;
}

impl<A> Detach for Slots<A> {
    fn detach(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.entries.borrow().iter().any(|(entry_id, _)| *entry_id == id)
    }
}

/// Ordered list of event handlers.
pub struct Listeners<A> {
    slots: Rc<Slots<A>>,
}

impl<A> fmt::Debug for Listeners<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.slots.entries.borrow().len())
            .finish()
    }
}

impl<A: 'static> Default for Listeners<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> Listeners<A> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Rc::new(Slots {
                next_id: Cell::new(0),
                entries: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Attach a handler. It stays attached until the returned guard is
    /// dropped or [`Listeners::unsubscribe`] is called with its id.
    pub fn subscribe(&self, handler: impl Fn(SourceId, &A) -> Result<()> + 'static) -> Subscription {
        self.subscribe_rc(Rc::new(handler))
    }

    /// Attach an already shared handler.
    pub fn subscribe_rc(&self, handler: HandlerRc<A>) -> Subscription {
        let id = ListenerId(self.slots.next_id.get());
        self.slots.next_id.set(id.0 + 1);
        self.slots.entries.borrow_mut().push((id, handler));
        let slots: Rc<dyn Detach> = self.slots.clone();
        Subscription {
            id,
            slots: Rc::downgrade(&slots),
        }
    }
}

impl<A> Listeners<A> {
    /// Detach a handler by id. Returns whether it was attached.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.slots.detach(id)
    }

    /// Number of attached handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every attached handler in registration order.
    ///
    /// # Errors
    ///
    /// Returns the first handler error; remaining handlers are not called.
    pub fn emit(&self, sender: SourceId, event: &A) -> Result<()> {
        let handlers: Vec<HandlerRc<A>> = self
            .slots
            .entries
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in &handlers {
            handler(sender, event)?;
        }
        Ok(())
    }
}

/// RAII guard for an attached handler.
///
/// Dropping the guard detaches the handler from its registry right away.
#[must_use = "dropping a Subscription detaches its handler"]
pub struct Subscription {
    id: ListenerId,
    slots: Weak<dyn Detach>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Whether the handler is still attached to a live registry.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.slots
            .upgrade()
            .is_some_and(|slots| slots.contains(self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(slots) = self.slots.upgrade() {
            slots.detach(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
