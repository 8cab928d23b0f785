use crate::adaptation::{Adaptation, SymbolValue};
use crate::any_value::unwrap_any;
use crate::error::AdaptationError;
use crate::provider::{Fallback, Provider};
use std::any::Any;
use std::marker::PhantomData;

/// Providers that adapt by type check and cast.
///
/// A value of exactly `T` adapts to itself, anything else to nothing, so
/// idempotence holds by construction.
///
/// # Examples
///
/// ```
/// use sovran_symbolmap::{AdaptationError, AdaptationStrategy, Downcasting};
///
/// let names = Downcasting::<String>::with_fallback_value("anonymous".to_string())?;
///
/// assert_eq!(names.nullable(Some(&"ada".to_string())), Some("ada".to_string()));
/// assert_eq!(names.nullable(Some(&42i32)), None);
/// assert_eq!(names.surrogate(Some(&42i32)), Some("anonymous".to_string()));
/// # Ok::<(), AdaptationError>(())
/// ```
pub struct Downcasting<T>(PhantomData<fn() -> T>);

impl<T: SymbolValue> Downcasting<T> {
    /// Casts the argument to `T` when it is one
    pub fn apply(o: Option<&dyn Any>) -> Option<T> {
        o.map(unwrap_any)
            .and_then(|o| o.downcast_ref::<T>())
            .cloned()
    }

    /// The bare cast as an adaptation
    pub fn adaptation() -> Adaptation<T> {
        Adaptation::new(|o| o.downcast_ref::<T>().cloned())
    }

    /// Plain cast, no fallback
    pub fn to() -> Provider<T> {
        Provider::without_fallback(Self::adaptation())
    }

    /// Cast narrowed by a predicate, no fallback
    pub fn with_filter<P>(predicate: P) -> Provider<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Provider::without_fallback(Self::adaptation().filter(predicate))
    }

    /// Plain cast with a computed fallback
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

    /// Plain cast with a constant fallback
    ///
    /// # Errors
    ///
    /// Returns `AdaptationError::InconsistentFallback` if the fallback does not
    /// adapt to itself.
    pub fn with_fallback_value(fallback: T) -> Result<Provider<T>, AdaptationError> {
        Provider::new(Self::adaptation(), Fallback::value(fallback))
    }

    /// Cast, predicate and computed fallback
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
}

/// Providers that cast values already of type `T` and convert foreign values
/// through a unification function.
///
/// The cast always wins: the unification function never sees a `T`, so a
/// unification that returns `T` keeps the adaptation idempotent.
///
/// # Examples
///
/// ```
/// use sovran_symbolmap::{AdaptationError, AdaptationStrategy, Unifying};
/// use std::any::Any;
///
/// fn int_value(o: &dyn Any) -> Option<i32> {
///     o.downcast_ref::<f64>().map(|v| *v as i32)
///         .or_else(|| o.downcast_ref::<i64>().map(|v| *v as i32))
/// }
///
/// let ints = Unifying::<i32>::with_fallback_value(int_value, 0)?;
///
/// assert_eq!(ints.nullable(Some(&3.7f64)), Some(3));
/// assert_eq!(ints.nullable(Some(&"x")), None);
/// assert_eq!(ints.surrogate(Some(&"x")), Some(0));
/// # Ok::<(), AdaptationError>(())
/// ```
pub struct Unifying<T>(PhantomData<fn() -> T>);

impl<T: SymbolValue> Unifying<T> {
    /// Casts the argument, or hands it to `unify` when it is not a `T`
    pub fn apply<U>(unify: &U, o: Option<&dyn Any>) -> Option<T>
    where
        U: Fn(&dyn Any) -> Option<T>,
    {
        let o = unwrap_any(o?);
        match o.downcast_ref::<T>() {
            Some(value) => Some(value.clone()),
            None => unify(o),
        }
    }

    /// The cast-or-unify function as an adaptation
    pub fn adaptation<U>(unify: U) -> Adaptation<T>
    where
        U: Fn(&dyn Any) -> Option<T> + Send + Sync + 'static,
    {
        Adaptation::new(move |o| match o.downcast_ref::<T>() {
            Some(value) => Some(value.clone()),
            None => unify(o),
        })
    }

    /// Cast or unify, no fallback
    pub fn to<U>(unify: U) -> Provider<T>
    where
        U: Fn(&dyn Any) -> Option<T> + Send + Sync + 'static,
    {
        Provider::without_fallback(Self::adaptation(unify))
    }

    /// Cast or unify, narrowed by a predicate, no fallback
    pub fn with_filter<U, P>(unify: U, predicate: P) -> Provider<T>
    where
        U: Fn(&dyn Any) -> Option<T> + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Provider::without_fallback(Self::adaptation(unify).filter(predicate))
    }

    /// Cast or unify with a computed fallback
    ///
    /// # Errors
    ///
    /// Returns `AdaptationError::InconsistentFallback` if the fallback does not
    /// adapt to itself.
    pub fn with_fallback<U, F>(unify: U, fallback: F) -> Result<Provider<T>, AdaptationError>
    where
        U: Fn(&dyn Any) -> Option<T> + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Provider::new(Self::adaptation(unify), Fallback::from_fn(fallback))
    }

    /// Cast or unify with a constant fallback
    ///
    /// # Errors
    ///
    /// Returns `AdaptationError::InconsistentFallback` if the fallback does not
    /// adapt to itself.
    pub fn with_fallback_value<U>(unify: U, fallback: T) -> Result<Provider<T>, AdaptationError>
    where
        U: Fn(&dyn Any) -> Option<T> + Send + Sync + 'static,
    {
        Provider::new(Self::adaptation(unify), Fallback::value(fallback))
    }

    /// Cast or unify, predicate and computed fallback
    ///
    /// # Errors
    ///
    /// Returns `AdaptationError::InconsistentFallback` if the predicate refuses
    /// the fallback.
    pub fn define<U, P, F>(unify: U, predicate: P, fallback: F) -> Result<Provider<T>, AdaptationError>
    where
        U: Fn(&dyn Any) -> Option<T> + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Provider::new(
            Self::adaptation(unify).filter(predicate),
            Fallback::from_fn(fallback),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{AdaptationProvider, AdaptationStrategy};
    use crate::AnyValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn int_value(o: &dyn Any) -> Option<i32> {
        o.downcast_ref::<f64>()
            .map(|v| *v as i32)
            .or_else(|| o.downcast_ref::<i64>().map(|v| *v as i32))
    }

    #[test]
    fn test_downcasting_to() {
        let p = Downcasting::<String>::to();
        assert_eq!(p.nullable(Some(&"a".to_string())), Some("a".to_string()));
        assert_eq!(p.nullable(Some(&1i32)), None);
        assert_eq!(p.nullable(None), None);
        assert_eq!(p.surrogate(Some(&1i32)), None);
        assert!(!p.fallback().is_defined());
    }

    #[test]
    fn test_downcasting_apply_unwraps() {
        let stored = AnyValue::new(5u16);
        assert_eq!(Downcasting::<u16>::apply(Some(&stored)), Some(5));
        assert_eq!(Downcasting::<u32>::apply(Some(&stored)), None);
        assert_eq!(Downcasting::<u16>::apply(None), None);
    }

    #[test]
    fn test_downcasting_filter() {
        let p = Downcasting::<i32>::with_filter(|v| *v >= 0);
        assert_eq!(p.nullable(Some(&1i32)), Some(1));
        assert_eq!(p.nullable(Some(&-1i32)), None);
    }

    #[test]
    fn test_downcasting_fallbacks() -> Result<(), AdaptationError> {
        let p = Downcasting::<Vec<u8>>::with_fallback(Vec::new)?;
        assert_eq!(p.surrogate(Some(&"nope")), Some(Vec::new()));

        let p = Downcasting::<i32>::with_fallback_value(5)?;
        assert_eq!(p.surrogate(None), Some(5));

        let p = Downcasting::<i32>::define(|v| *v >= 0, || 0)?;
        assert_eq!(p.nullable(Some(&-3i32)), None);
        assert_eq!(p.surrogate(Some(&-3i32)), Some(0));

        assert!(Downcasting::<i32>::define(|v| *v > 0, || 0).is_err());
        Ok(())
    }

    #[test]
    fn test_unifying_to() {
        let p = Unifying::<i32>::to(int_value);
        assert_eq!(p.nullable(Some(&1i32)), Some(1));
        assert_eq!(p.nullable(Some(&2.0f64)), Some(2));
        assert_eq!(p.nullable(Some(&3i64)), Some(3));
        assert_eq!(p.nullable(Some(&"4")), None);
    }

    #[test]
    fn test_unifying_fallback() -> Result<(), AdaptationError> {
        let p = Unifying::<i32>::with_fallback_value(int_value, 0)?;
        assert_eq!(p.nullable(Some(&3.7f64)), Some(3));
        assert_eq!(p.nullable(Some(&"x")), None);
        assert_eq!(p.surrogate(Some(&"x")), Some(0));
        assert_eq!(p.nullable(Some(&0i32)), Some(0));
        Ok(())
    }

    #[test]
    fn test_unifying_filter() -> Result<(), AdaptationError> {
        let p = Unifying::<i32>::with_filter(int_value, |i| 0 <= *i);
        assert_eq!(p.nullable(Some(&2.0f64)), Some(2));
        assert_eq!(p.nullable(Some(&-1i32)), None);
        assert_eq!(p.nullable(Some(&-1.5f64)), None);

        let p = Unifying::<i32>::define(int_value, |i| 0 <= *i, || 0)?;
        assert_eq!(p.surrogate(Some(&-1i64)), Some(0));
        assert!(Unifying::<i32>::with_fallback(int_value, || 1).is_ok());
        Ok(())
    }

    #[test]
    fn test_unification_skipped_for_exact_type() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let adaptation = Unifying::<i32>::adaptation(move |o| {
            counter.fetch_add(1, Ordering::SeqCst);
            int_value(o)
        });

        assert_eq!(adaptation.attempt(&9i32), Some(9));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(adaptation.attempt(&9.9f64), Some(9));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(Unifying::apply(&int_value, Some(&4.2f64)), Some(4));
    }
}
