use crate::any_value::unwrap_any;
use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Bound for every type a symbol can adapt to.
///
/// `PartialEq` lets the fallback check compare a default with its adapted
/// form, `Debug` feeds diagnostics. Blanket-implemented.
pub trait SymbolValue: Any + Clone + PartialEq + Debug + Send + Sync {}

impl<T> SymbolValue for T where T: Any + Clone + PartialEq + Debug + Send + Sync {}

type AdaptFn<T> = dyn Fn(&dyn Any) -> Option<T> + Send + Sync;

/// An idempotent partial function from any value to `T`.
///
/// Implementations must honour three rules:
///
/// - `apply(None)` is `None`
/// - repeated calls with equal input give equal output
/// - adapting an already adapted value is a no-op: `apply(apply(x)) == apply(x)`
///
/// An [`AnyValue`](crate::AnyValue) passed as the argument is unwrapped before the
/// function sees it, so stored values and the values they wrap adapt alike.
///
/// # Examples
///
/// ```
/// use sovran_symbolmap::Adaptation;
/// use std::any::Any;
///
/// let even = Adaptation::new(|o: &dyn Any| o.downcast_ref::<i32>().copied())
///     .filter(|v| v % 2 == 0);
///
/// assert_eq!(even.apply(Some(&4i32)), Some(4));
/// assert_eq!(even.apply(Some(&3i32)), None);
/// assert_eq!(even.apply(None), None);
/// ```
pub struct Adaptation<T> {
    f: Arc<AdaptFn<T>>,
}

impl<T: SymbolValue> Adaptation<T> {
    /// Wraps a function that is only ever called with a present argument
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&dyn Any) -> Option<T> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Adapts the argument, `None` in gives `None` out
    pub fn apply(&self, o: Option<&dyn Any>) -> Option<T> {
        let o = o?;
        (self.f)(unwrap_any(o))
    }

    /// Adapts a present argument
    pub fn attempt(&self, o: &dyn Any) -> Option<T> {
        self.apply(Some(o))
    }

    /// Returns an adaptation that drops results failing the predicate.
    ///
    /// The predicate must be pure, otherwise stability is lost.
    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let inner = Arc::clone(&self.f);
        Self::new(move |o| inner(o).filter(|result| predicate(result)))
    }

    /// Composes the adaptation with a mapping for interop with plain functions.
    ///
    /// The composed function is not an adaptation itself and carries none of its
    /// guarantees.
    pub fn map<U, M>(&self, mapping: M) -> impl Fn(Option<&dyn Any>) -> U + Send + Sync + 'static
    where
        U: 'static,
        M: Fn(Option<T>) -> U + Send + Sync + 'static,
    {
        let this = self.clone();
        move |o: Option<&dyn Any>| mapping(this.apply(o))
    }

    /// Probes the stability and idempotence rules for one input
    pub fn is_consistent_for(&self, o: Option<&dyn Any>) -> bool {
        let first = self.apply(o);
        if first != self.apply(o) {
            return false;
        }
        match &first {
            Some(value) => self.attempt(value) == first,
            None => true,
        }
    }
}

impl<T> Clone for Adaptation<T> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<T> Debug for Adaptation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Adaptation<{}>", std::any::type_name::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AnyValue;

    fn strings() -> Adaptation<String> {
        Adaptation::new(|o| o.downcast_ref::<String>().cloned())
    }

    #[test]
    fn test_null_in_null_out() {
        assert_eq!(strings().apply(None), None);
        assert_eq!(strings().filter(|_| true).apply(None), None);
    }

    #[test]
    fn test_downcast_and_idempotence() {
        let a = strings();
        let text = "hello".to_string();
        assert_eq!(a.attempt(&text), Some(text.clone()));
        assert_eq!(a.attempt(&5i32), None);
        assert!(a.is_consistent_for(Some(&text)));
        assert!(a.is_consistent_for(Some(&5i32)));
        assert!(a.is_consistent_for(None));
    }

    #[test]
    fn test_filter_keeps_stability() {
        let short = strings().filter(|s| s.len() < 4);
        assert_eq!(short.attempt(&"abc".to_string()), Some("abc".to_string()));
        assert_eq!(short.attempt(&"abcd".to_string()), None);
        assert!(short.is_consistent_for(Some(&"abcd".to_string())));
    }

    #[test]
    fn test_map_composes() {
        let length = strings().map(|s| s.map(|s| s.len()).unwrap_or(0));
        assert_eq!(length(Some(&"four".to_string())), 4);
        assert_eq!(length(Some(&1u8)), 0);
        assert_eq!(length(None), 0);
    }

    #[test]
    fn test_unwraps_stored_values() {
        let stored = AnyValue::new("inside".to_string());
        assert_eq!(strings().attempt(&stored), Some("inside".to_string()));
    }

    #[test]
    fn test_inconsistent_adaptation_detected() {
        // Increments on every pass, so a second pass changes the result
        let drifting = Adaptation::new(|o| o.downcast_ref::<i32>().map(|v| v + 1));
        assert!(!drifting.is_consistent_for(Some(&1i32)));
    }
}
