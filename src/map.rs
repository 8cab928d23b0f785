use crate::any_value::AnyValue;
use crate::error::MapError;
use crate::mappable::{Sink, Source};
use crate::store::Store;
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tracing::{trace, warn};

/// A thread-safe heterogeneous map holding type-erased values
///
/// `SymbolMap` is the default backing store of a
/// [`SymbolContext`](crate::SymbolContext). Clones share the same underlying
/// storage, and every operation holds a single lock, which makes the
/// [`Store::compute`] primitive atomic across all keys.
///
/// # Examples
///
/// ```
/// use sovran_symbolmap::{AnyValue, MapError, Store, SymbolMap};
///
/// let store = SymbolMap::<String>::new();
/// store.put("numbers".to_string(), AnyValue::new(vec![1, 2, 3]))?;
///
/// // Inspect without cloning the vector out
/// let length = store.with(&"numbers".to_string(), |v: &Vec<i32>| v.len())?;
/// assert_eq!(length, 3);
///
/// // The wrong type is reported, not silently ignored
/// let wrong = store.with(&"numbers".to_string(), |s: &String| s.len());
/// assert!(matches!(wrong, Err(MapError::TypeMismatch)));
/// # Ok::<(), MapError>(())
/// ```
#[derive(Clone, Debug)]
pub struct SymbolMap<K> {
    items: Arc<Mutex<HashMap<K, AnyValue>>>,
}

impl<K> SymbolMap<K>
where
    K: Eq + Hash,
{
    /// Creates a new, empty SymbolMap
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns a vector of all keys in the map
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    pub fn keys(&self) -> Result<Vec<K>, MapError>
    where
        K: Clone,
    {
        let store = self.items.lock().map_err(|_| MapError::LockError)?;
        Ok(store.keys().cloned().collect())
    }

    /// Calls `f` with a reference to the stored value
    ///
    /// # Errors
    ///
    /// - Returns `MapError::LockError` if the internal lock cannot be acquired
    /// - Returns `MapError::KeyNotFound` if the key doesn't exist
    /// - Returns `MapError::TypeMismatch` if the value is not a `V`
    pub fn with<V, F, R>(&self, key: &K, f: F) -> Result<R, MapError>
    where
        K: Debug,
        V: Any,
        F: FnOnce(&V) -> R,
    {
        let store = self.items.lock().map_err(|_| MapError::LockError)?;
        let value = store
            .get(key)
            .ok_or_else(|| MapError::KeyNotFound(format!("{:?}", key)))?;
        let value = value.downcast_ref::<V>().ok_or(MapError::TypeMismatch)?;
        Ok(f(value))
    }

    /// Applies a function to all key-value pairs in the map
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired,
    /// or any error returned by the provided function.
    pub fn apply<F>(&self, mut f: F) -> Result<(), MapError>
    where
        F: FnMut(&K, &AnyValue) -> Result<(), MapError>,
    {
        let store = self.items.lock().map_err(|_| MapError::LockError)?;
        for (key, value) in store.iter() {
            f(key, value)?;
        }
        Ok(())
    }
}

impl<K> Default for SymbolMap<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Store<K> for SymbolMap<K>
where
    K: Eq + Hash,
{
    fn get(&self, key: &K) -> Result<Option<AnyValue>, MapError> {
        let store = self.items.lock().map_err(|_| MapError::LockError)?;
        Ok(store.get(key).cloned())
    }

    fn put(&self, key: K, value: AnyValue) -> Result<Option<AnyValue>, MapError> {
        let mut store = self.items.lock().map_err(|_| MapError::LockError)?;
        Ok(store.insert(key, value))
    }

    fn remove(&self, key: &K) -> Result<Option<AnyValue>, MapError> {
        let mut store = self.items.lock().map_err(|_| MapError::LockError)?;
        Ok(store.remove(key))
    }

    fn clear(&self) -> Result<(), MapError> {
        let mut store = self.items.lock().map_err(|_| MapError::LockError)?;
        store.clear();
        Ok(())
    }

    fn len(&self) -> Result<usize, MapError> {
        let store = self.items.lock().map_err(|_| MapError::LockError)?;
        Ok(store.len())
    }

    fn compute<E, F>(&self, key: K, f: F) -> Result<Option<AnyValue>, E>
    where
        E: From<MapError>,
        F: FnOnce(Option<&AnyValue>) -> Result<Option<AnyValue>, E>,
    {
        let mut store = self.items.lock().map_err(|_| MapError::LockError)?;
        match f(store.get(&key))? {
            Some(value) => {
                store.insert(key, value.clone());
                Ok(Some(value))
            }
            None => {
                if store.remove(&key).is_some() {
                    trace!("compute removed entry");
                }
                Ok(None)
            }
        }
    }
}

impl<K> Source<K> for SymbolMap<K>
where
    K: Eq + Hash,
{
    fn pull(&self, key: &K) -> Option<AnyValue> {
        match Store::get(self, key) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "read from symbol map failed");
                None
            }
        }
    }
}

impl<K> Sink<K> for SymbolMap<K>
where
    K: Eq + Hash,
{
    fn push(&mut self, key: K, value: AnyValue) {
        if let Err(e) = Store::put(self, key, value) {
            warn!(error = %e, "write to symbol map failed");
        }
    }

    fn discard(&mut self, key: &K) {
        if let Err(e) = Store::remove(self, key) {
            warn!(error = %e, "removal from symbol map failed");
        }
    }
}
