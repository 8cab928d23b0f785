use crate::any_value::AnyValue;
use crate::error::MapError;
use std::sync::Arc;

/// The backing-store contract.
///
/// Implementations hold type-erased values and provide a single atomic
/// compound primitive, [`compute`](Store::compute), from which every
/// read-then-conditionally-write operation is built. Atomicity is per key.
///
/// The closure passed to `compute` runs while the store holds whatever
/// guards its key. Calling back into the same store from inside it deadlocks
/// [`SymbolMap`](crate::SymbolMap) and may deadlock a `DashMap`.
pub trait Store<K> {
    /// Returns the raw value stored under `key`
    fn get(&self, key: &K) -> Result<Option<AnyValue>, MapError>;

    /// Writes `value`, returning the raw value it displaced
    fn put(&self, key: K, value: AnyValue) -> Result<Option<AnyValue>, MapError>;

    /// Removes the entry, returning its raw value
    fn remove(&self, key: &K) -> Result<Option<AnyValue>, MapError>;

    fn clear(&self) -> Result<(), MapError>;

    fn len(&self) -> Result<usize, MapError>;

    /// Atomically replaces the entry under `key` by the outcome of `f`.
    ///
    /// `f` sees the current raw value; returning `Ok(None)` removes the entry,
    /// returning an error leaves it untouched. The value now stored is
    /// returned.
    fn compute<E, F>(&self, key: K, f: F) -> Result<Option<AnyValue>, E>
    where
        E: From<MapError>,
        F: FnOnce(Option<&AnyValue>) -> Result<Option<AnyValue>, E>;

    fn is_empty(&self) -> Result<bool, MapError> {
        Ok(self.len()? == 0)
    }

    fn contains_key(&self, key: &K) -> Result<bool, MapError> {
        Ok(self.get(key)?.is_some())
    }

    /// Installs `value` if the key is vacant, otherwise stores
    /// `f(value, current)` or removes the entry when that is `None`
    fn merge<F>(&self, key: K, value: AnyValue, f: F) -> Result<Option<AnyValue>, MapError>
    where
        F: FnOnce(&AnyValue, &AnyValue) -> Option<AnyValue>,
    {
        self.compute(key, |current| {
            Ok::<_, MapError>(match current {
                Some(current) => f(&value, current),
                None => Some(value.clone()),
            })
        })
    }

    /// Writes `value` only if the key is vacant, returning the occupant
    /// otherwise
    fn put_if_absent(&self, key: K, value: AnyValue) -> Result<Option<AnyValue>, MapError> {
        let mut occupant = None;
        self.compute(key, |current| {
            occupant = current.cloned();
            Ok::<_, MapError>(Some(current.cloned().unwrap_or(value)))
        })?;
        Ok(occupant)
    }

    /// Writes `value` only if the key is occupied, returning the raw value it
    /// displaced
    fn replace(&self, key: K, value: AnyValue) -> Result<Option<AnyValue>, MapError> {
        let mut previous = None;
        self.compute(key, |current| {
            previous = current.cloned();
            Ok::<_, MapError>(current.map(|_| value))
        })?;
        Ok(previous)
    }

    /// Writes `value` only if the current value satisfies `expected`
    fn replace_if<P>(&self, key: K, expected: P, value: AnyValue) -> Result<bool, MapError>
    where
        P: FnOnce(&AnyValue) -> bool,
    {
        let mut replaced = false;
        self.compute(key, |current| {
            let Some(current) = current else {
                return Ok::<_, MapError>(None);
            };
            if expected(current) {
                replaced = true;
                return Ok(Some(value));
            }
            Ok(Some(current.clone()))
        })?;
        Ok(replaced)
    }

    /// Removes the entry only if its value satisfies `predicate`
    fn remove_if<P>(&self, key: K, predicate: P) -> Result<bool, MapError>
    where
        P: FnOnce(&AnyValue) -> bool,
    {
        let mut removed = false;
        self.compute(key, |current| {
            let Some(current) = current else {
                return Ok::<_, MapError>(None);
            };
            if predicate(current) {
                removed = true;
                return Ok(None);
            }
            Ok(Some(current.clone()))
        })?;
        Ok(removed)
    }
}

impl<K, S> Store<K> for Arc<S>
where
    S: Store<K> + ?Sized,
{
    fn get(&self, key: &K) -> Result<Option<AnyValue>, MapError> {
        (**self).get(key)
    }

    fn put(&self, key: K, value: AnyValue) -> Result<Option<AnyValue>, MapError> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &K) -> Result<Option<AnyValue>, MapError> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<(), MapError> {
        (**self).clear()
    }

    fn len(&self) -> Result<usize, MapError> {
        (**self).len()
    }

    fn compute<E, F>(&self, key: K, f: F) -> Result<Option<AnyValue>, E>
    where
        E: From<MapError>,
        F: FnOnce(Option<&AnyValue>) -> Result<Option<AnyValue>, E>,
    {
        (**self).compute(key, f)
    }
}

/// A view of a store that refuses every write with `MapError::ReadOnly`
#[derive(Clone, Debug)]
pub struct ReadOnly<S> {
    inner: S,
}

impl<S> ReadOnly<S> {
    /// Wraps a store, refusing every write through the wrapper
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<K, S: Store<K>> Store<K> for ReadOnly<S> {
    fn get(&self, key: &K) -> Result<Option<AnyValue>, MapError> {
        self.inner.get(key)
    }

    fn put(&self, _key: K, _value: AnyValue) -> Result<Option<AnyValue>, MapError> {
        Err(MapError::ReadOnly)
    }

    fn remove(&self, _key: &K) -> Result<Option<AnyValue>, MapError> {
        Err(MapError::ReadOnly)
    }

    fn clear(&self) -> Result<(), MapError> {
        Err(MapError::ReadOnly)
    }

    fn len(&self) -> Result<usize, MapError> {
        self.inner.len()
    }

    fn compute<E, F>(&self, _key: K, _f: F) -> Result<Option<AnyValue>, E>
    where
        E: From<MapError>,
        F: FnOnce(Option<&AnyValue>) -> Result<Option<AnyValue>, E>,
    {
        Err(MapError::ReadOnly.into())
    }
}

#[cfg(feature = "dashmap")]
mod concurrent {
    use super::Store;
    use crate::any_value::AnyValue;
    use crate::error::MapError;
    use crate::mappable::{Sink, Source};
    use dashmap::mapref::entry::Entry;
    use dashmap::DashMap;
    use std::hash::{BuildHasher, Hash};
    use tracing::trace;

    impl<K, S> Store<K> for DashMap<K, AnyValue, S>
    where
        K: Eq + Hash,
        S: BuildHasher + Clone,
    {
        fn get(&self, key: &K) -> Result<Option<AnyValue>, MapError> {
            Ok(DashMap::get(self, key).map(|entry| entry.value().clone()))
        }

        fn put(&self, key: K, value: AnyValue) -> Result<Option<AnyValue>, MapError> {
            Ok(DashMap::insert(self, key, value))
        }

        fn remove(&self, key: &K) -> Result<Option<AnyValue>, MapError> {
            Ok(DashMap::remove(self, key).map(|(_, value)| value))
        }

        fn clear(&self) -> Result<(), MapError> {
            DashMap::clear(self);
            Ok(())
        }

        fn len(&self) -> Result<usize, MapError> {
            Ok(DashMap::len(self))
        }

        fn compute<E, F>(&self, key: K, f: F) -> Result<Option<AnyValue>, E>
        where
            E: From<MapError>,
            F: FnOnce(Option<&AnyValue>) -> Result<Option<AnyValue>, E>,
        {
            // The entry guard holds the shard lock for the whole closure
            match self.entry(key) {
                Entry::Occupied(mut occupied) => match f(Some(occupied.get()))? {
                    Some(value) => {
                        occupied.insert(value.clone());
                        Ok(Some(value))
                    }
                    None => {
                        trace!("compute removed entry");
                        occupied.remove();
                        Ok(None)
                    }
                },
                Entry::Vacant(vacant) => match f(None)? {
                    Some(value) => {
                        vacant.insert(value.clone());
                        Ok(Some(value))
                    }
                    None => Ok(None),
                },
            }
        }
    }

    impl<K, S> Source<K> for DashMap<K, AnyValue, S>
    where
        K: Eq + Hash,
        S: BuildHasher + Clone,
    {
        fn pull(&self, key: &K) -> Option<AnyValue> {
            DashMap::get(self, key).map(|entry| entry.value().clone())
        }
    }

    impl<K, S> Sink<K> for DashMap<K, AnyValue, S>
    where
        K: Eq + Hash,
        S: BuildHasher + Clone,
    {
        fn push(&mut self, key: K, value: AnyValue) {
            DashMap::insert(self, key, value);
        }

        fn discard(&mut self, key: &K) {
            DashMap::remove(self, key);
        }
    }
}
