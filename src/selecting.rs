use crate::adaptation::{Adaptation, SymbolValue};
use crate::any_value::{unwrap_any, AnyValue};
use crate::error::AdaptationError;
use crate::provider::{Fallback, Provider, TypeTag};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A value that knows how to present itself as other types.
///
/// Implementations return an [`AnyValue`] holding exactly the type `tag`
/// stands for, or `None` when they have no such form. Whatever they return
/// for a type must be stable for equal inputs.
pub trait Adaptable: Send + Sync {
    fn adapt(&self, tag: TypeTag) -> Option<AnyValue>;
}

/// Marks a stored value as [`Adaptable`].
///
/// Stores hold plain `Any` values, so a self-adapting value is stored inside
/// this wrapper for [`Selecting`] providers to find it.
#[derive(Clone)]
pub struct Adaptive(Arc<dyn Adaptable>);

impl Adaptive {
    pub fn new<A: Adaptable + 'static>(value: A) -> Self {
        Self(Arc::new(value))
    }

    /// Asks the wrapped value for its `T` form
    pub fn adapt_to<T: SymbolValue>(&self) -> Option<T> {
        self.0
            .adapt(TypeTag::of::<T>())
            .and_then(|value| value.downcast_ref::<T>().cloned())
    }
}

impl Adaptable for Adaptive {
    fn adapt(&self, tag: TypeTag) -> Option<AnyValue> {
        self.0.adapt(tag)
    }
}

impl fmt::Debug for Adaptive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Adaptive(..)")
    }
}

/// Providers that let the value choose its own representation.
///
/// A value already of type `T` is taken as is; an [`Adaptive`] is asked for
/// its `T` form; anything else adapts to nothing.
///
/// # Examples
///
/// ```
/// use sovran_symbolmap::{Adaptable, AdaptationError, AdaptationStrategy, Adaptive, AnyValue, Selecting, TypeTag};
///
/// struct Celsius(f64);
///
/// impl Adaptable for Celsius {
///     fn adapt(&self, tag: TypeTag) -> Option<AnyValue> {
///         if tag == TypeTag::of::<f64>() {
///             Some(AnyValue::new(self.0))
///         } else if tag == TypeTag::of::<String>() {
///             Some(AnyValue::new(format!("{}°C", self.0)))
///         } else {
///             None
///         }
///     }
/// }
///
/// let reading = AnyValue::new(Adaptive::new(Celsius(21.5)));
///
/// let degrees = Selecting::<f64>::using();
/// let label = Selecting::<String>::with_fallback_value("n/a".to_string())?;
/// let count = Selecting::<u32>::using();
///
/// assert_eq!(degrees.nullable(Some(&reading)), Some(21.5));
/// assert_eq!(label.nullable(Some(&reading)), Some("21.5°C".to_string()));
/// assert_eq!(count.nullable(Some(&reading)), None);
/// assert_eq!(label.surrogate(Some(&7u8)), Some("n/a".to_string()));
/// # Ok::<(), AdaptationError>(())
/// ```
pub struct Selecting<T>(PhantomData<fn() -> T>);

impl<T: SymbolValue> Selecting<T> {
    /// Selects the `T` form of the argument
    pub fn apply(o: Option<&dyn Any>) -> Option<T> {
        Self::select(unwrap_any(o?))
    }

    /// The selection as an adaptation
    pub fn adaptation() -> Adaptation<T> {
        Adaptation::new(Self::select)
    }

    /// Plain selection, no fallback
    pub fn using() -> Provider<T> {
        Provider::without_fallback(Self::adaptation())
    }

    /// Selection narrowed by a predicate, no fallback
    pub fn with_filter<P>(predicate: P) -> Provider<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Provider::without_fallback(Self::adaptation().filter(predicate))
    }

    /// Selection with a computed fallback
    ///
    /// # Errors
    ///
    /// Returns `AdaptationError::InconsistentFallback` if the fallback does not
    /// adapt to itself.
    pub fn with_fallback<F>(fallback: F) -> Result<Provider<T>, AdaptationError>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Provider::new(Self::adaptation(), Fallback::from_fn(fallback))
    }

    /// Selection with a constant fallback
    ///
    /// # Errors
    ///
    /// Returns `AdaptationError::InconsistentFallback` if the fallback does not
    /// adapt to itself.
    pub fn with_fallback_value(fallback: T) -> Result<Provider<T>, AdaptationError> {
        Provider::new(Self::adaptation(), Fallback::value(fallback))
    }

    /// Selection, predicate and computed fallback
    ///
    /// # Errors
    ///
    /// Returns `AdaptationError::InconsistentFallback` if the predicate refuses
    /// the fallback.
    pub fn define<P, F>(predicate: P, fallback: F) -> Result<Provider<T>, AdaptationError>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Provider::new(
            Self::adaptation().filter(predicate),
            Fallback::from_fn(fallback),
        )
    }

    // A `T` wins over asking, so selected values stay fixed points
    fn select(o: &dyn Any) -> Option<T> {
        if let Some(value) = o.downcast_ref::<T>() {
            return Some(value.clone());
        }
        o.downcast_ref::<Adaptive>()?.adapt_to::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SymbolContext;
    use crate::error::MapError;
    use crate::provider::{AdaptationProvider, AdaptationStrategy};
    use crate::store::Store;
    use crate::symbol::{InternalSymbol, SymbolKey};
    use crate::Mappable;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Version {
        major: u32,
        minor: u32,
    }

    impl Adaptable for Version {
        fn adapt(&self, tag: TypeTag) -> Option<AnyValue> {
            if tag == TypeTag::of::<String>() {
                Some(AnyValue::new(format!("{}.{}", self.major, self.minor)))
            } else if tag == TypeTag::of::<u32>() {
                Some(AnyValue::new(self.major))
            } else if tag == TypeTag::of::<i64>() {
                // Wrong type on purpose
                Some(AnyValue::new(self.major))
            } else {
                None
            }
        }
    }

    fn version() -> Adaptive {
        Adaptive::new(Version { major: 2, minor: 7 })
    }

    #[test]
    fn test_using() {
        let text = Selecting::<String>::using();
        let major = Selecting::<u32>::using();
        let v = version();

        assert_eq!(text.nullable(Some(&v)), Some("2.7".to_string()));
        assert_eq!(major.nullable(Some(&v)), Some(2));
        assert_eq!(Selecting::<bool>::using().nullable(Some(&v)), None);
        assert_eq!(text.nullable(Some(&"plain".to_string())), Some("plain".to_string()));
        assert_eq!(major.nullable(Some(&1.5f64)), None);
        assert_eq!(major.nullable(None), None);
        assert!(!major.fallback().is_defined());
    }

    #[test]
    fn test_mistyped_answer_refused() {
        assert_eq!(Selecting::<i64>::apply(Some(&version())), None);
    }

    #[test]
    fn test_apply_unwraps_stored_values() {
        let stored = AnyValue::new(version());
        assert_eq!(Selecting::<u32>::apply(Some(&stored)), Some(2));
        assert_eq!(Selecting::<u32>::apply(None), None);
        assert_eq!(version().adapt_to::<String>(), Some("2.7".to_string()));
    }

    #[test]
    fn test_selection_is_idempotent() {
        let adaptation = Selecting::<String>::adaptation();
        let v = version();
        assert!(adaptation.is_consistent_for(Some(&v)));
        assert!(adaptation.is_consistent_for(Some(&3u8)));
    }

    #[test]
    fn test_filter_and_fallbacks() -> Result<(), AdaptationError> {
        let recent = Selecting::<u32>::with_filter(|major| *major >= 3);
        assert_eq!(recent.nullable(Some(&version())), None);

        let p = Selecting::<u32>::define(|major| *major >= 3, || 3)?;
        assert_eq!(p.surrogate(Some(&version())), Some(3));
        assert!(Selecting::<u32>::define(|major| *major >= 3, || 1).is_err());

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let p = Selecting::<String>::with_fallback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            "unknown".to_string()
        })?;
        assert_eq!(p.surrogate(Some(&version())), Some("2.7".to_string()));
        let checked = calls.load(Ordering::SeqCst);
        assert_eq!(p.surrogate(None), Some("unknown".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), checked + 1);

        let p = Selecting::<String>::with_fallback_value("none".to_string())?;
        assert_eq!(p.fallback_to("other".to_string())?.surrogate(None), Some("other".to_string()));
        Ok(())
    }

    #[test]
    fn test_selected_through_context() -> Result<(), MapError> {
        let label = InternalSymbol::named("label", Selecting::<String>::using());
        let context = SymbolContext::<SymbolKey>::new();
        context.store().put(label.remap(), AnyValue::new(version()))?;

        assert_eq!(context.get(&label)?, Some("2.7".to_string()));
        assert_eq!(context.compute_if_present(&label, |_, v| Some(v))?, Some("2.7".to_string()));
        assert!(context.store().with(&label.remap(), |v: &String| v == "2.7")?);
        Ok(())
    }
}
