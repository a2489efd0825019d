#![forbid(unsafe_code)]

//! Insertion-ordered map with structural and property change notification.
//!
//! # Design
//!
//! [`ObservableMap<K, V>`] stores keys and values in two parallel vectors.
//! `values[i]` belongs to `keys[i]`; both vectors change together inside a
//! single method, so their lengths match at every observable instant.
//! Lookups are linear scans. Iteration follows insertion order.
//!
//! Every structural mutation raises, in this order:
//!
//! 1. The four property signals: `Count`, `Item[]`, `Keys`, `Values`.
//! 2. One [`CollectionChange`] over `(key, value)` pairs.
//!
//! Setting a key to a value equal to the current one changes nothing and
//! raises nothing. Clearing an empty map raises nothing either.
//!
//! # Invariants
//!
//! 1. `keys.len() == values.len()`.
//! 2. No key appears twice.
//! 3. Change indices refer to positions in insertion order.

use std::fmt;
use std::iter::Zip;
use std::slice;

use lockstep_core::{
    CollectionChange, CollectionError, Listeners, PropertyName, Result, SourceId, Subscription,
};

/// Map from `K` to `V` that reports every change.
pub struct ObservableMap<K, V> {
    keys: Vec<K>,
    values: Vec<V>,
    changes: Listeners<CollectionChange<(K, V)>>,
    properties: Listeners<PropertyName>,
    id: SourceId,
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for ObservableMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.keys.iter().zip(self.values.iter()))
            .finish()
    }
}

impl<K, V> Default for ObservableMap<K, V>
where
    K: Clone + PartialEq + fmt::Debug + 'static,
    V: Clone + PartialEq + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ObservableMap<K, V>
where
    K: Clone + PartialEq + fmt::Debug + 'static,
    V: Clone + PartialEq + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
            changes: Listeners::new(),
            properties: Listeners::new(),
            id: SourceId::next(),
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Insert or replace.
    ///
    /// - Absent key: appended; `Add` at the new tail position.
    /// - Present key, different value: replaced in place; `Replace` with
    ///   both pairs and the key's position.
    /// - Present key, equal value: no-op.
    ///
    /// # Errors
    ///
    /// Only listener errors.
    pub fn set(&mut self, key: K, value: V) -> Result<()> {
        self.insert(key, value, false)
    }

    /// Insert a new key.
    ///
    /// # Errors
    ///
    /// [`CollectionError::DuplicateKey`] if `key` is already present.
    pub fn add(&mut self, key: K, value: V) -> Result<()> {
        self.insert(key, value, true)
    }

    /// Remove `key`, returning its value; `Remove` with the pair and its
    /// former position.
    ///
    /// # Errors
    ///
    /// [`CollectionError::KeyNotFound`] if `key` is absent.
    pub fn remove(&mut self, key: &K) -> Result<V> {
        let index = self.require(key)?;
        let removed_key = self.keys.remove(index);
        let removed_value = self.values.remove(index);
        self.notify(|| {
            CollectionChange::removed((removed_key, removed_value.clone()), Some(index))
        })?;
        Ok(removed_value)
    }

    /// Empty the map; one `Reset`.
    pub fn clear(&mut self) -> Result<()> {
        if self.keys.is_empty() {
            return Ok(());
        }
        self.keys.clear();
        self.values.clear();
        self.notify(CollectionChange::reset)
    }

    fn insert(&mut self, key: K, value: V, add: bool) -> Result<()> {
        match self.position(&key) {
            Some(_) if add => Err(CollectionError::DuplicateKey(format!("{key:?}"))),
            Some(index) => {
                if self.values[index] == value {
                    return Ok(());
                }
                let old = std::mem::replace(&mut self.values[index], value.clone());
                self.notify(|| CollectionChange::replaced((key.clone(), value), (key, old), index))
            }
            None => {
                self.keys.push(key.clone());
                self.values.push(value.clone());
                let index = self.keys.len() - 1;
                self.notify(|| CollectionChange::added((key, value), Some(index)))
            }
        }
    }

    fn notify(&self, change: impl FnOnce() -> CollectionChange<(K, V)>) -> Result<()> {
        for property in PropertyName::ALL {
            self.properties.emit(self.id, &property)?;
        }
        if self.changes.is_empty() {
            return Ok(());
        }
        self.changes.emit(self.id, &change())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    fn position(&self, key: &K) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    fn require(&self, key: &K) -> Result<usize> {
        self.position(key)
            .ok_or_else(|| CollectionError::KeyNotFound(format!("{key:?}")))
    }

    /// # Errors
    ///
    /// [`CollectionError::KeyNotFound`] if `key` is absent.
    pub fn get(&self, key: &K) -> Result<&V> {
        let index = self.require(key)?;
        Ok(&self.values[index])
    }

    #[must_use]
    pub fn try_get(&self, key: &K) -> Option<&V> {
        self.position(key).map(|index| &self.values[index])
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.position(key).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Values, positionally paired with [`ObservableMap::keys`].
    #[must_use]
    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn iter(&self) -> Zip<slice::Iter<'_, K>, slice::Iter<'_, V>> {
        self.keys.iter().zip(self.values.iter())
    }

    // ========================================================================
    // Notification
    // ========================================================================

    /// Subscribe to pair-level structural changes.
    pub fn subscribe(
        &self,
        handler: impl Fn(SourceId, &CollectionChange<(K, V)>) -> Result<()> + 'static,
    ) -> Subscription {
        self.changes.subscribe(handler)
    }

    /// Subscribe to the derived property signals.
    pub fn subscribe_property(
        &self,
        handler: impl Fn(SourceId, &PropertyName) -> Result<()> + 'static,
    ) -> Subscription {
        self.properties.subscribe(handler)
    }

    #[must_use]
    pub fn source_id(&self) -> SourceId {
        self.id
    }
}

impl<'a, K, V> IntoIterator for &'a ObservableMap<K, V>
where
    K: Clone + PartialEq + fmt::Debug + 'static,
    V: Clone + PartialEq + 'static,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Zip<slice::Iter<'a, K>, slice::Iter<'a, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
