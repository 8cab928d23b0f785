use crate::adaptation::SymbolValue;
use crate::any_value::{as_argument, AnyValue};
use crate::error::{AdaptationError, MapError};
use crate::map::SymbolMap;
use crate::mappable::Mappable;
use crate::provider::{AdaptationProvider, AdaptationStrategy};
use crate::result::AdaptationResult;
use crate::store::{ReadOnly, Store};
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::marker::PhantomData;
use tracing::debug;

/// Typed access to a backing store, keyed by symbols.
///
/// Every value written through a context has passed the adaptation of the
/// symbol it is written under, so reads through the same symbol always see
/// adapted values. Operations that read and then conditionally write go
/// through the single atomic [`Store::compute`] primitive.
///
/// Values handed over by the caller (`put`, `set`, `add`, `put_if_absent`,
/// `replace`, `replace_if`, and the candidate of `merge`) must adapt, or the
/// call fails with [`MapError::Adaptation`] and leaves the store untouched.
/// Values produced by remapping functions are treated as absent when they do
/// not adapt, which removes the entry.
///
/// Remapping functions run while the store guards the key, so they must not
/// call back into the same context.
///
/// # Examples
///
/// ```
/// use sovran_symbolmap::{Downcasting, InternalSymbol, MapError, SymbolContext, SymbolKey};
///
/// let name = InternalSymbol::named("name", Downcasting::<String>::to());
/// let visits = InternalSymbol::named("visits", Downcasting::<u32>::with_fallback_value(0)?);
///
/// let context = SymbolContext::<SymbolKey>::new();
/// context.set(&name, "ada".to_string())?.add(&visits, 1)?;
///
/// assert_eq!(context.get(&name)?, Some("ada".to_string()));
/// assert_eq!(context.merge(&visits, 1, |a, b| Some(a + b))?, Some(2));
///
/// context.discard(&visits)?;
/// assert_eq!(context.get(&visits)?, None);
/// assert_eq!(context.give(&visits)?, Some(0));
/// # Ok::<(), MapError>(())
/// ```
pub struct SymbolContext<K, S = SymbolMap<K>> {
    store: S,
    _key: PhantomData<fn(K)>,
}

impl<K> SymbolContext<K>
where
    K: Clone + Eq + Hash,
{
    /// Creates a context over a fresh [`SymbolMap`]
    pub fn new() -> Self {
        Self::with_store(SymbolMap::new())
    }
}

impl<K> Default for SymbolContext<K>
where
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S> SymbolContext<K, S>
where
    K: Clone + Eq + Hash,
    S: Store<K>,
{
    /// A context over an existing store; values already in it are adapted on read
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            _key: PhantomData,
        }
    }

    /// The backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Gives the backing store back
    pub fn into_store(self) -> S {
        self.store
    }

    /// A read-only view sharing this context's store
    pub fn unmodifiable(&self) -> SymbolContext<K, ReadOnly<S>>
    where
        S: Clone,
    {
        SymbolContext::with_store(ReadOnly::new(self.store.clone()))
    }

    /// Returns the number of entries in the store
    pub fn len(&self) -> Result<usize, MapError> {
        self.store.len()
    }

    /// Returns true if the store holds no entries
    pub fn is_empty(&self) -> Result<bool, MapError> {
        self.store.is_empty()
    }

    /// The adapted value, `None` when absent or refused
    ///
    /// # Errors
    ///
    /// Propagates store failures such as `MapError::LockError`.
    pub fn get<T, M>(&self, symbol: &M) -> Result<Option<T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        let raw = self.store.get(&symbol.remap())?;
        Ok(symbol.nullable(as_argument(raw.as_ref())))
    }

    /// Same as [`get`](SymbolContext::get)
    pub fn find<T, M>(&self, symbol: &M) -> Result<Option<T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        self.get(symbol)
    }

    /// The adapted value, or the symbol's fallback
    pub fn give<T, M>(&self, symbol: &M) -> Result<Option<T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        let raw = self.store.get(&symbol.remap())?;
        Ok(symbol.surrogate(as_argument(raw.as_ref())))
    }

    /// The full adaptation outcome for the stored value
    pub fn yield_from<T, M>(&self, symbol: &M) -> Result<AdaptationResult<'static, T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        Ok(match self.store.get(&symbol.remap())? {
            Some(raw) => symbol.adapt_value(raw),
            None => AdaptationResult::of(None, None, symbol),
        })
    }

    /// The adapted value or the fallback, failing when neither exists
    ///
    /// # Errors
    ///
    /// - Returns `MapError::Adaptation(AdaptationError::Missing)` when nothing
    ///   usable is stored and the symbol has no fallback
    /// - Propagates store failures
    pub fn require<T, M>(&self, symbol: &M) -> Result<T, MapError>
    where
        K: Debug,
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        let key = symbol.remap();
        let raw = self.store.get(&key)?;
        symbol.surrogate(as_argument(raw.as_ref())).ok_or_else(|| {
            AdaptationError::Missing {
                key: format!("{:?}", key),
            }
            .into()
        })
    }

    /// Returns true if a value that adapts is stored for the symbol
    pub fn contains<T, M>(&self, symbol: &M) -> Result<bool, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        Ok(self.get(symbol)?.is_some())
    }

    /// Writes an adapted value, returning the adapted previous value
    ///
    /// # Errors
    ///
    /// Returns `MapError::Adaptation` if the symbol refuses `value`; the store
    /// is left untouched.
    pub fn put<T, M>(&self, symbol: &M, value: T) -> Result<Option<T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        let item = Self::admit(symbol, value)?;
        let previous = self.store.put(symbol.remap(), AnyValue::new(item))?;
        Ok(symbol.nullable(as_argument(previous.as_ref())))
    }

    /// Builder form of [`put`](SymbolContext::put)
    pub fn set<T, M>(&self, symbol: &M, value: T) -> Result<&Self, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        self.put(symbol, value)?;
        Ok(self)
    }

    /// Installs `value` unless a value that adapts is already stored, and
    /// returns whichever value occupies the slot afterwards
    ///
    /// # Errors
    ///
    /// Returns `MapError::Adaptation` if the symbol refuses `value`.
    pub fn put_if_absent<T, M>(&self, symbol: &M, value: T) -> Result<Option<T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        let item = Self::admit(symbol, value)?;
        let stored = self.store.compute(symbol.remap(), |raw| {
            Ok::<_, MapError>(match Self::valid(symbol, raw) {
                Some(raw) => Some(raw.clone()),
                None => Some(AnyValue::new(item)),
            })
        })?;
        Ok(symbol.nullable(as_argument(stored.as_ref())))
    }

    /// Builder form of [`put_if_absent`](SymbolContext::put_if_absent)
    pub fn add<T, M>(&self, symbol: &M, value: T) -> Result<&Self, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        self.put_if_absent(symbol, value)?;
        Ok(self)
    }

    /// Writes `value` only if the key is occupied, returning the adapted
    /// previous value
    pub fn replace<T, M>(&self, symbol: &M, value: T) -> Result<Option<T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        let item = Self::admit(symbol, value)?;
        let previous = self.store.replace(symbol.remap(), AnyValue::new(item))?;
        Ok(symbol.nullable(as_argument(previous.as_ref())))
    }

    /// Writes `value` only if the stored value adapts to `expected`
    pub fn replace_if<T, M>(&self, symbol: &M, expected: &T, value: T) -> Result<bool, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        let item = Self::admit(symbol, value)?;
        self.store.replace_if(
            symbol.remap(),
            |current| symbol.nullable(Some(current.as_any())).as_ref() == Some(expected),
            AnyValue::new(item),
        )
    }

    /// Removes the entry, returning its adapted value
    pub fn remove<T, M>(&self, symbol: &M) -> Result<Option<T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        let previous = self.store.remove(&symbol.remap())?;
        Ok(symbol.nullable(as_argument(previous.as_ref())))
    }

    /// Removes the entry if its adapted value satisfies `predicate`
    pub fn remove_if<T, M, P>(&self, symbol: &M, predicate: P) -> Result<bool, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
        P: FnOnce(&T) -> bool,
    {
        self.store.remove_if(symbol.remap(), |current| {
            symbol
                .nullable(Some(current.as_any()))
                .is_some_and(|value| predicate(&value))
        })
    }

    /// Removes the entry
    pub fn discard<T, M>(&self, symbol: &M) -> Result<&Self, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        self.store.remove(&symbol.remap())?;
        Ok(self)
    }

    /// Removes every entry
    pub fn clear(&self) -> Result<&Self, MapError> {
        self.store.clear()?;
        Ok(self)
    }

    /// Installs `value` if nothing that adapts is stored, otherwise stores
    /// `f(value, current)` or removes the entry when that yields nothing
    /// that adapts
    ///
    /// # Errors
    ///
    /// Returns `MapError::Adaptation` if the symbol refuses `value`.
    pub fn merge<T, M, F>(&self, symbol: &M, value: T, f: F) -> Result<Option<T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
        F: FnOnce(T, T) -> Option<T>,
    {
        let item = Self::admit(symbol, value)?;
        let stored = self.store.compute(symbol.remap(), |raw| {
            let merged = match symbol.nullable(as_argument(raw)) {
                Some(current) => f(item, current),
                None => Some(item),
            };
            Ok::<_, MapError>(Self::settle(symbol, merged))
        })?;
        Ok(symbol.nullable(as_argument(stored.as_ref())))
    }

    /// Replaces the entry by `f(key, current)`; `None` or a value that does
    /// not adapt removes it
    ///
    /// `f` works on adapted values only, so there is no separate "no change"
    /// result: returning `current` keeps the entry, rewritten in its adapted
    /// form when the store held a foreign representation.
    pub fn compute<T, M, F>(&self, symbol: &M, f: F) -> Result<Option<T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
        F: FnOnce(&K, Option<T>) -> Option<T>,
    {
        let key = symbol.remap();
        let stored = self.store.compute(key.clone(), |raw| {
            let current = symbol.nullable(as_argument(raw));
            Ok::<_, MapError>(Self::settle(symbol, f(&key, current)))
        })?;
        Ok(symbol.nullable(as_argument(stored.as_ref())))
    }

    /// Stores `f(key)` unless a value that adapts is present; `f` is not
    /// called in that case
    ///
    /// # Examples
    ///
    /// ```
    /// use sovran_symbolmap::{Downcasting, InternalSymbol, MapError, SymbolContext, SymbolKey};
    ///
    /// let name = InternalSymbol::new(Downcasting::<String>::with_fallback_value("defaultName".to_string())?);
    /// let context = SymbolContext::<SymbolKey>::new();
    ///
    /// let first = context.compute_if_absent(&name, |_| Some("generated".to_string()))?;
    /// assert_eq!(first.as_deref(), Some("generated"));
    ///
    /// let second = context.compute_if_absent(&name, |_| unreachable!())?;
    /// assert_eq!(second.as_deref(), Some("generated"));
    /// # Ok::<(), MapError>(())
    /// ```
    pub fn compute_if_absent<T, M, F>(&self, symbol: &M, f: F) -> Result<Option<T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
        F: FnOnce(&K) -> Option<T>,
    {
        let key = symbol.remap();
        let stored = self.store.compute(key.clone(), |raw| {
            Ok::<_, MapError>(match Self::valid(symbol, raw) {
                Some(raw) => Some(raw.clone()),
                None => Self::settle(symbol, f(&key)),
            })
        })?;
        Ok(symbol.nullable(as_argument(stored.as_ref())))
    }

    /// Replaces a value that adapts by `f(key, current)`; a raw value that
    /// does not adapt is dropped
    pub fn compute_if_present<T, M, F>(&self, symbol: &M, f: F) -> Result<Option<T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
        F: FnOnce(&K, T) -> Option<T>,
    {
        let key = symbol.remap();
        let stored = self.store.compute(key.clone(), |raw| {
            Ok::<_, MapError>(match symbol.nullable(as_argument(raw)) {
                Some(current) => Self::settle(symbol, f(&key, current)),
                None => None,
            })
        })?;
        Ok(symbol.nullable(as_argument(stored.as_ref())))
    }

    /// Like [`compute_if_absent`](SymbolContext::compute_if_absent) with a
    /// supplier that ignores the key
    pub fn supply_if_absent<T, M, F>(&self, symbol: &M, f: F) -> Result<Option<T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
        F: FnOnce() -> Option<T>,
    {
        self.compute_if_absent(symbol, |_| f())
    }

    /// Replaces a value that adapts by the supplied one
    pub fn supply_if_present<T, M, F>(&self, symbol: &M, f: F) -> Result<Option<T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
        F: FnOnce() -> Option<T>,
    {
        self.compute_if_present(symbol, |_, _| f())
    }

    /// Returns the adapted stored value, or installs the symbol's fallback
    /// when nothing is stored. A stored value that does not adapt is left in
    /// place.
    pub fn have<T, M>(&self, symbol: &M) -> Result<Option<T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        let stored = self.store.compute(symbol.remap(), |raw| {
            Ok::<_, MapError>(match raw {
                Some(raw) => Some(raw.clone()),
                None => symbol.fallback().get().map(AnyValue::new),
            })
        })?;
        Ok(symbol.nullable(as_argument(stored.as_ref())))
    }

    /// Keeps a stored value that adapts, otherwise installs the surrogate,
    /// and returns whatever occupies the slot
    pub fn supply<T, M>(&self, symbol: &M) -> Result<Option<T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        symbol.supply(&self.store)
    }

    /// Stores the adapted value, or removes the entry when `value` is `None`
    /// or does not adapt
    pub fn let_value<T, M>(&self, symbol: &M, value: Option<T>) -> Result<Option<T>, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        let key = symbol.remap();
        match Self::settle(symbol, value) {
            Some(item) => {
                self.store.put(key, item.clone())?;
                Ok(symbol.nullable(Some(item.as_any())))
            }
            None => {
                self.store.remove(&key)?;
                Ok(None)
            }
        }
    }
}

impl<K, S: Clone> Clone for SymbolContext<K, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _key: PhantomData,
        }
    }
}

impl<K, S: Debug> Debug for SymbolContext<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolContext")
            .field("store", &self.store)
            .finish()
    }
}

impl<K, S> SymbolContext<K, S>
where
    K: Clone + Eq + Hash,
    S: Store<K>,
{
    /// Adapts a caller-supplied value, refusing it with an error
    fn admit<T, M>(symbol: &M, value: T) -> Result<T, MapError>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        symbol.adapt_value(AnyValue::new(value)).require().map_err(|e| {
            debug!(rtti = symbol.rtti().name(), error = %e, "value refused by symbol");
            MapError::from(e)
        })
    }

    /// Adapts a computed value, dropping it when refused
    fn settle<T, M>(symbol: &M, candidate: Option<T>) -> Option<AnyValue>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        let candidate = candidate?;
        match symbol.nullable(Some(&candidate)) {
            Some(adapted) => Some(AnyValue::new(adapted)),
            None => {
                debug!(rtti = symbol.rtti().name(), value = ?candidate, "computed value refused, entry dropped");
                None
            }
        }
    }

    fn valid<'a, T, M>(symbol: &M, raw: Option<&'a AnyValue>) -> Option<&'a AnyValue>
    where
        T: SymbolValue,
        M: Mappable<K, T> + ?Sized,
    {
        raw.filter(|raw| symbol.nullable(Some(raw.as_any())).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downcasting::{Downcasting, Unifying};
    use crate::symbol::{ExternalSymbol, InternalSymbol, SymbolKey};
    use std::any::Any;
    use std::cell::Cell;

    fn int_value(o: &dyn Any) -> Option<i32> {
        o.downcast_ref::<f64>().map(|v| *v as i32)
    }

    fn positive() -> InternalSymbol<i32> {
        InternalSymbol::named("positive", Downcasting::<i32>::with_filter(|v| *v > 0))
    }

    #[test]
    fn test_put_and_get() -> Result<(), MapError> {
        let symbol = positive();
        let context = SymbolContext::<SymbolKey>::new();

        assert_eq!(context.put(&symbol, 1)?, None);
        assert_eq!(context.get(&symbol)?, Some(1));
        assert_eq!(context.find(&symbol)?, Some(1));
        assert_eq!(context.put(&symbol, 2)?, Some(1));
        assert!(context.contains(&symbol)?);
        assert_eq!(context.len()?, 1);
        Ok(())
    }

    #[test]
    fn test_rejected_put_leaves_store() -> Result<(), MapError> {
        let symbol = positive();
        let context = SymbolContext::<SymbolKey>::new();
        context.put(&symbol, 5)?;

        let refused = context.put(&symbol, -5);
        assert!(matches!(
            refused,
            Err(MapError::Adaptation(AdaptationError::Rejected { .. }))
        ));
        assert_eq!(context.get(&symbol)?, Some(5));

        assert!(context.set(&symbol, 0).is_err());
        assert!(context.replace(&symbol, 0).is_err());
        assert!(context.merge(&symbol, 0, |a, _| Some(a)).is_err());
        assert_eq!(context.get(&symbol)?, Some(5));
        Ok(())
    }

    #[test]
    fn test_put_if_absent() -> Result<(), MapError> {
        let symbol = positive();
        let context = SymbolContext::<SymbolKey>::new();

        assert_eq!(context.put_if_absent(&symbol, 1)?, Some(1));
        assert_eq!(context.put_if_absent(&symbol, 2)?, Some(1));
        assert!(context.put_if_absent(&symbol, -2).is_err());

        // A stored value the symbol refuses counts as absent
        context.store().put(symbol.remap(), AnyValue::new("junk"))?;
        assert_eq!(context.put_if_absent(&symbol, 3)?, Some(3));

        context.clear()?.add(&symbol, 4)?.add(&symbol, 5)?;
        assert_eq!(context.get(&symbol)?, Some(4));
        Ok(())
    }

    #[test]
    fn test_replace() -> Result<(), MapError> {
        let symbol = positive();
        let context = SymbolContext::<SymbolKey>::new();

        assert_eq!(context.replace(&symbol, 1)?, None);
        assert_eq!(context.get(&symbol)?, None);

        context.put(&symbol, 1)?;
        assert_eq!(context.replace(&symbol, 2)?, Some(1));
        assert!(!context.replace_if(&symbol, &1, 3)?);
        assert!(context.replace_if(&symbol, &2, 3)?);
        assert_eq!(context.get(&symbol)?, Some(3));
        Ok(())
    }

    #[test]
    fn test_remove() -> Result<(), MapError> {
        let symbol = positive();
        let context = SymbolContext::<SymbolKey>::new();
        context.put(&symbol, 7)?;

        assert!(!context.remove_if(&symbol, |v| *v > 10)?);
        assert!(context.remove_if(&symbol, |v| *v == 7)?);
        assert!(context.is_empty()?);

        context.put(&symbol, 8)?;
        assert_eq!(context.remove(&symbol)?, Some(8));
        assert_eq!(context.remove(&symbol)?, None);

        context.put(&symbol, 9)?;
        context.discard(&symbol)?;
        assert!(!context.contains(&symbol)?);
        Ok(())
    }

    #[test]
    fn test_merge() -> Result<(), MapError> {
        let symbol = positive();
        let context = SymbolContext::<SymbolKey>::new();

        assert_eq!(context.merge(&symbol, 2, |a, b| Some(a + b))?, Some(2));
        assert_eq!(context.merge(&symbol, 3, |a, b| Some(a + b))?, Some(5));

        // A combination the symbol refuses removes the entry
        assert_eq!(context.merge(&symbol, 6, |a, b| Some(b - a))?, None);
        assert_eq!(context.find(&symbol)?, None);

        context.put(&symbol, 1)?;
        assert_eq!(context.merge(&symbol, 1, |_, _| None)?, None);
        assert!(context.is_empty()?);
        Ok(())
    }

    #[test]
    fn test_compute() -> Result<(), MapError> {
        let symbol = positive();
        let context = SymbolContext::<SymbolKey>::new();

        let result = context.compute(&symbol, |key, current| {
            assert_eq!(key, &symbol.remap());
            assert_eq!(current, None);
            Some(10)
        })?;
        assert_eq!(result, Some(10));

        assert_eq!(context.compute(&symbol, |_, v| v.map(|v| v * 2))?, Some(20));
        assert_eq!(context.compute(&symbol, |_, v| v.map(|v| -v))?, None);
        assert!(context.is_empty()?);
        Ok(())
    }

    #[test]
    fn test_compute_returning_current_keeps_entry() -> Result<(), MapError> {
        let symbol = InternalSymbol::new(Unifying::<i32>::to(int_value));
        let context = SymbolContext::<SymbolKey>::new();
        context.store().put(symbol.remap(), AnyValue::new(4.5f64))?;

        assert_eq!(context.compute(&symbol, |_, current| current)?, Some(4));
        assert!(context.store().with(&symbol.remap(), |v: &i32| *v == 4)?);

        assert_eq!(context.compute(&symbol, |_, current| current)?, Some(4));
        assert_eq!(context.len()?, 1);
        Ok(())
    }

    #[test]
    fn test_compute_if_absent_generator_called_once() -> Result<(), MapError> {
        let symbol = InternalSymbol::new(
            Downcasting::<String>::with_fallback_value("defaultName".to_string())
                .map_err(MapError::from)?,
        );
        let context = SymbolContext::<SymbolKey>::new();
        let calls = Cell::new(0);
        let generate = |_: &SymbolKey| {
            calls.set(calls.get() + 1);
            Some("generated".to_string())
        };

        assert_eq!(
            context.compute_if_absent(&symbol, generate)?,
            Some("generated".to_string())
        );
        assert_eq!(
            context.compute_if_absent(&symbol, generate)?,
            Some("generated".to_string())
        );
        assert_eq!(calls.get(), 1);
        Ok(())
    }

    #[test]
    fn test_compute_if_present() -> Result<(), MapError> {
        let symbol = positive();
        let context = SymbolContext::<SymbolKey>::new();

        assert_eq!(context.compute_if_present(&symbol, |_, v| Some(v + 1))?, None);
        assert!(context.is_empty()?);

        context.put(&symbol, 1)?;
        assert_eq!(context.compute_if_present(&symbol, |_, v| Some(v + 1))?, Some(2));

        // Raw values the symbol refuses are dropped
        context.store().put(symbol.remap(), AnyValue::new(-1i32))?;
        assert_eq!(context.compute_if_present(&symbol, |_, v| Some(v))?, None);
        assert!(context.is_empty()?);
        Ok(())
    }

    #[test]
    fn test_supply_variants() -> Result<(), MapError> {
        let symbol = positive();
        let context = SymbolContext::<SymbolKey>::new();

        assert_eq!(context.supply_if_present(&symbol, || Some(1))?, None);
        assert_eq!(context.supply_if_absent(&symbol, || Some(1))?, Some(1));
        assert_eq!(context.supply_if_absent(&symbol, || Some(2))?, Some(1));
        assert_eq!(context.supply_if_present(&symbol, || Some(3))?, Some(3));
        assert_eq!(context.supply_if_present(&symbol, || None)?, None);
        assert!(context.is_empty()?);
        Ok(())
    }

    #[test]
    fn test_have_and_supply() -> Result<(), MapError> {
        let defaulted = InternalSymbol::new(
            Unifying::<i32>::with_fallback_value(int_value, 0).map_err(MapError::from)?,
        );
        let context = SymbolContext::<SymbolKey>::new();

        assert_eq!(context.have(&defaulted)?, Some(0));
        assert_eq!(context.get(&defaulted)?, Some(0));

        context.store().put(defaulted.remap(), AnyValue::new("junk"))?;
        assert_eq!(context.have(&defaulted)?, None);
        assert!(context.store().get(&defaulted.remap())?.is_some());

        assert_eq!(context.supply(&defaulted)?, Some(0));
        assert_eq!(context.get(&defaulted)?, Some(0));

        // A foreign value that unifies is kept as it is
        context.store().put(defaulted.remap(), AnyValue::new(4.5f64))?;
        assert_eq!(context.supply(&defaulted)?, Some(4));
        assert!(context
            .store()
            .get(&defaulted.remap())?
            .is_some_and(|raw| raw.is_type::<f64>()));
        Ok(())
    }

    #[test]
    fn test_let_value() -> Result<(), MapError> {
        let symbol = positive();
        let context = SymbolContext::<SymbolKey>::new();

        assert_eq!(context.let_value(&symbol, Some(3))?, Some(3));
        assert_eq!(context.get(&symbol)?, Some(3));
        assert_eq!(context.let_value(&symbol, Some(-3))?, None);
        assert!(context.is_empty()?);
        context.put(&symbol, 3)?;
        assert_eq!(context.let_value(&symbol, None)?, None);
        assert!(context.is_empty()?);
        Ok(())
    }

    #[test]
    fn test_require_and_yield() -> Result<(), MapError> {
        let symbol = ExternalSymbol::new("limits.max", Downcasting::<u64>::to());
        let context = SymbolContext::<SymbolKey>::new();

        match context.require(&symbol) {
            Err(MapError::Adaptation(AdaptationError::Missing { key })) => {
                assert_eq!(key, "SymbolKey(limits.max)")
            }
            other => panic!("expected missing item, got {:?}", other),
        }
        assert!(context.yield_from(&symbol)?.request().map_err(MapError::from)?.is_none());

        context.store().put(symbol.remap(), AnyValue::new(1u8))?;
        assert!(context.yield_from(&symbol)?.request().is_err());

        context.put(&symbol, 9)?;
        assert_eq!(context.require(&symbol)?, 9);
        Ok(())
    }

    #[test]
    fn test_unmodifiable_view() -> Result<(), MapError> {
        let symbol = positive();
        let context = SymbolContext::<SymbolKey>::new();
        context.put(&symbol, 1)?;

        let view = context.unmodifiable();
        assert_eq!(view.get(&symbol)?, Some(1));
        assert!(matches!(view.put(&symbol, 2), Err(MapError::ReadOnly)));
        assert!(matches!(view.put_if_absent(&symbol, 2), Err(MapError::ReadOnly)));
        assert!(matches!(view.discard(&symbol), Err(MapError::ReadOnly)));
        assert!(matches!(view.clear(), Err(MapError::ReadOnly)));

        // Strict rejection is reported before the store is consulted
        assert!(matches!(view.put(&symbol, -1), Err(MapError::Adaptation(_))));

        context.put(&symbol, 2)?;
        assert_eq!(view.get(&symbol)?, Some(2));
        Ok(())
    }

    #[test]
    fn test_constant_keys() -> Result<(), MapError> {
        use crate::mappable::ConstantMappable;

        let port = ConstantMappable::new("port", Downcasting::<u16>::to());
        let context = SymbolContext::<&str>::new();
        context.put(&port, 8080)?;
        assert_eq!(context.get(&port)?, Some(8080));
        assert_eq!(context.store().keys()?, vec!["port"]);
        Ok(())
    }
}
