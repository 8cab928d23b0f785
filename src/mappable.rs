use crate::adaptation::{Adaptation, SymbolValue};
use crate::any_value::{as_argument, AnyValue};
use crate::error::{AdaptationError, MapError};
use crate::provider::{AdaptationProvider, AdaptationStrategy, Fallback, Provider, TypeTag};
use crate::result::AdaptationResult;
use crate::store::Store;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Debug};
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use tracing::debug;

/// A read-only collaborator that yields raw values by key
pub trait Source<K> {
    fn pull(&self, key: &K) -> Option<AnyValue>;
}

/// A write target that accepts raw values by key
pub trait Sink<K> {
    fn push(&mut self, key: K, value: AnyValue);

    fn discard(&mut self, key: &K);
}

/// Adapts a plain function into a [`Source`]
pub struct FnSource<F>(pub F);

impl<K, F> Source<K> for FnSource<F>
where
    F: Fn(&K) -> Option<AnyValue>,
{
    fn pull(&self, key: &K) -> Option<AnyValue> {
        (self.0)(key)
    }
}

/// Adapts a plain function into a [`Sink`]; `None` signals a removal
pub struct FnSink<F>(pub F);

impl<K, F> Sink<K> for FnSink<F>
where
    K: Clone,
    F: FnMut(K, Option<AnyValue>),
{
    fn push(&mut self, key: K, value: AnyValue) {
        (self.0)(key, Some(value))
    }

    fn discard(&mut self, key: &K) {
        (self.0)(key.clone(), None)
    }
}

impl<K, S> Source<K> for HashMap<K, AnyValue, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn pull(&self, key: &K) -> Option<AnyValue> {
        self.get(key).cloned()
    }
}

impl<K, S> Sink<K> for HashMap<K, AnyValue, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn push(&mut self, key: K, value: AnyValue) {
        self.insert(key, value);
    }

    fn discard(&mut self, key: &K) {
        self.remove(key);
    }
}

impl<K: Ord> Source<K> for BTreeMap<K, AnyValue> {
    fn pull(&self, key: &K) -> Option<AnyValue> {
        self.get(key).cloned()
    }
}

impl<K: Ord> Sink<K> for BTreeMap<K, AnyValue> {
    fn push(&mut self, key: K, value: AnyValue) {
        self.insert(key, value);
    }

    fn discard(&mut self, key: &K) {
        self.remove(key);
    }
}

/// A key bound to the adaptation of the values stored under it.
///
/// Every accessor is the composition of two primitives: pulling the raw value
/// for [`remap`](Mappable::remap) out of a collaborator, and running the
/// adaptation over it.
///
/// # Examples
///
/// ```
/// use sovran_symbolmap::{AdaptationError, AnyValue, ConstantMappable, Downcasting, Mappable};
/// use std::collections::HashMap;
///
/// let port = ConstantMappable::new("port", Downcasting::<u16>::with_fallback_value(8080)?);
/// let mut settings: HashMap<&str, AnyValue> = HashMap::new();
///
/// assert_eq!(port.get(&settings), None);
/// assert_eq!(port.give(&settings), Some(8080));
///
/// port.set(&mut settings, &"not a port");
/// assert!(settings.is_empty());
///
/// port.put(&mut settings, 9000);
/// assert_eq!(port.get(&settings), Some(9000));
/// # Ok::<(), AdaptationError>(())
/// ```
pub trait Mappable<K, V: SymbolValue>: AdaptationProvider<V> {
    /// The key to use against collaborators; stable under equality across calls
    fn remap(&self) -> K;

    /// Adapted value, `None` when absent or refused
    fn get<S>(&self, source: &S) -> Option<V>
    where
        S: Source<K> + ?Sized,
    {
        self.nullable(as_argument(source.pull(&self.remap()).as_ref()))
    }

    /// Same as [`get`](Mappable::get)
    fn find<S>(&self, source: &S) -> Option<V>
    where
        S: Source<K> + ?Sized,
    {
        self.get(source)
    }

    /// Adapted value, or the fallback when that yields nothing
    fn give<S>(&self, source: &S) -> Option<V>
    where
        S: Source<K> + ?Sized,
    {
        self.surrogate(as_argument(source.pull(&self.remap()).as_ref()))
    }

    /// The full adaptation outcome, including the raw argument
    fn yield_from<S>(&self, source: &S) -> AdaptationResult<'static, V>
    where
        S: Source<K> + ?Sized,
    {
        match source.pull(&self.remap()) {
            Some(raw) => self.adapt_value(raw),
            None => AdaptationResult::of(None, None, self),
        }
    }

    /// Adapted value, else the fallback, else an error naming the key
    ///
    /// # Errors
    ///
    /// Returns `AdaptationError::Missing` when neither is available.
    fn require<S>(&self, source: &S) -> Result<V, AdaptationError>
    where
        S: Source<K> + ?Sized,
        K: Debug,
    {
        let key = self.remap();
        self.surrogate(as_argument(source.pull(&key).as_ref()))
            .ok_or_else(|| AdaptationError::Missing {
                key: format!("{:?}", key),
            })
    }

    /// Writes the value if the adaptation accepts it
    fn put<W>(&self, sink: &mut W, value: V) -> Option<V>
    where
        W: Sink<K> + ?Sized,
    {
        self.set(sink, &value)
    }

    /// Adapts any value and writes the result; a refused value empties the slot
    fn set<W>(&self, sink: &mut W, value: &dyn Any) -> Option<V>
    where
        W: Sink<K> + ?Sized,
    {
        let key = self.remap();
        let adapted = self.nullable(Some(value));
        match &adapted {
            Some(item) => sink.push(key, AnyValue::new(item.clone())),
            None => {
                debug!(rtti = self.rtti().name(), "refused value, entry discarded");
                sink.discard(&key);
            }
        }
        adapted
    }

    /// Adapts the value and writes it, or removes the entry if nothing adapts
    fn let_value<W>(&self, sink: &mut W, value: Option<&dyn Any>) -> Option<V>
    where
        W: Sink<K> + ?Sized,
    {
        let key = self.remap();
        let adapted = self.nullable(value);
        match &adapted {
            Some(item) => sink.push(key, AnyValue::new(item.clone())),
            None => sink.discard(&key),
        }
        adapted
    }

    /// Returns the adapted present value without writing, or installs the
    /// fallback when nothing is present
    fn have<M>(&self, map: &mut M) -> Option<V>
    where
        M: Source<K> + Sink<K> + ?Sized,
    {
        let key = self.remap();
        if let Some(raw) = map.pull(&key) {
            return self.nullable(Some(raw.as_any()));
        }
        let fallback = self.fallback().get();
        if let Some(value) = &fallback {
            map.push(key, AnyValue::new(value.clone()));
        }
        fallback
    }

    /// Atomically keeps a valid stored value or replaces it by the surrogate,
    /// returning whatever occupies the slot afterwards
    ///
    /// # Errors
    ///
    /// Propagates store failures such as `MapError::LockError`.
    fn supply<S>(&self, store: &S) -> Result<Option<V>, MapError>
    where
        S: Store<K> + ?Sized,
    {
        let stored = store.compute(self.remap(), |raw| {
            if let Some(raw) = raw {
                if self.nullable(Some(raw.as_any())).is_some() {
                    return Ok::<_, MapError>(Some(raw.clone()));
                }
            }
            Ok(self.surrogate(None).map(AnyValue::new))
        })?;
        Ok(self.nullable(as_argument(stored.as_ref())))
    }
}

/// A mappable with a key fixed at construction
pub struct ConstantMappable<K, V> {
    key: K,
    provider: Provider<V>,
}

impl<K: Clone, V: SymbolValue> ConstantMappable<K, V> {
    /// Binds `provider` to a fixed key
    pub fn new(key: K, provider: Provider<V>) -> Self {
        Self { key, provider }
    }
}

impl<K, V: SymbolValue> AdaptationProvider<V> for ConstantMappable<K, V> {
    fn adaptation(&self) -> &Adaptation<V> {
        self.provider.adaptation()
    }

    fn fallback(&self) -> &Fallback<V> {
        self.provider.fallback()
    }

    fn rtti(&self) -> TypeTag {
        self.provider.rtti()
    }
}

impl<K: Clone, V: SymbolValue> Mappable<K, V> for ConstantMappable<K, V> {
    fn remap(&self) -> K {
        self.key.clone()
    }
}

impl<K: Clone, V> Clone for ConstantMappable<K, V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            provider: self.provider.clone(),
        }
    }
}

impl<K: Debug, V> Debug for ConstantMappable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstantMappable")
            .field("key", &self.key)
            .field("provider", &self.provider)
            .finish()
    }
}

type KeyFn<K> = dyn Fn() -> K + Send + Sync;

/// A mappable whose key is recomputed on every call, e.g. from thread-local
/// context. The supplier must return equal keys for as long as the mapping is
/// meant to address the same slot.
pub struct DynamicMappable<K, V> {
    key: Arc<KeyFn<K>>,
    provider: Provider<V>,
}

impl<K, V: SymbolValue> DynamicMappable<K, V> {
    /// Binds `provider` to a key computed on every access
    pub fn new<F>(key: F, provider: Provider<V>) -> Self
    where
        F: Fn() -> K + Send + Sync + 'static,
    {
        Self {
            key: Arc::new(key),
            provider,
        }
    }
}

impl<K, V: SymbolValue> AdaptationProvider<V> for DynamicMappable<K, V> {
    fn adaptation(&self) -> &Adaptation<V> {
        self.provider.adaptation()
    }

    fn fallback(&self) -> &Fallback<V> {
        self.provider.fallback()
    }

    fn rtti(&self) -> TypeTag {
        self.provider.rtti()
    }
}

impl<K, V: SymbolValue> Mappable<K, V> for DynamicMappable<K, V> {
    fn remap(&self) -> K {
        (self.key)()
    }
}

impl<K, V> Clone for DynamicMappable<K, V> {
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
            provider: self.provider.clone(),
        }
    }
}

impl<K, V> Debug for DynamicMappable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicMappable")
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}
