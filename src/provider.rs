use crate::adaptation::{Adaptation, SymbolValue};
use crate::any_value::AnyValue;
use crate::error::AdaptationError;
use crate::result::{AdaptationResult, Argument};
use std::any::{Any, TypeId};
use std::fmt::{self, Debug, Display};
use std::sync::Arc;
use tracing::{trace, warn};

/// Run-time type descriptor, carried for diagnostics only
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    /// The tag of `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` the tag stands for
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The type name, for diagnostics only
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.name)
    }
}

impl Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

type SupplierFn<T> = dyn Fn() -> Option<T> + Send + Sync;

/// A deferred default value.
///
/// The supplier runs on every [`get`](Fallback::get); nothing is memoized, so a
/// supplier may hand out a fresh mutable default each time.
pub struct Fallback<T> {
    supplier: Option<Arc<SupplierFn<T>>>,
}

impl<T> Fallback<T> {
    /// A fallback that never supplies anything
    pub fn none() -> Self {
        Self { supplier: None }
    }

    /// Returns true if a supplier is attached
    pub fn is_defined(&self) -> bool {
        self.supplier.is_some()
    }
}

impl<T: SymbolValue> Fallback<T> {
    /// A fallback that hands out clones of a constant
    pub fn value(value: T) -> Self {
        Self::from_optional(move || Some(value.clone()))
    }

    /// A fallback computed on demand
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::from_optional(move || Some(f()))
    }

    /// A fallback computed on demand that may decline to supply a value
    pub fn from_optional<F>(f: F) -> Self
    where
        F: Fn() -> Option<T> + Send + Sync + 'static,
    {
        Self {
            supplier: Some(Arc::new(f)),
        }
    }

    /// Evaluates the supplier
    pub fn get(&self) -> Option<T> {
        self.supplier.as_ref().and_then(|supplier| supplier())
    }
}

impl<T> Clone for Fallback<T> {
    fn clone(&self) -> Self {
        Self {
            supplier: self.supplier.clone(),
        }
    }
}

impl<T> Default for Fallback<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> Debug for Fallback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_defined() { "present" } else { "absent" };
        write!(f, "Fallback({})", state)
    }
}

/// Bundles an adaptation with its fallback and type descriptor
pub trait AdaptationProvider<T: SymbolValue> {
    fn adaptation(&self) -> &Adaptation<T>;

    fn fallback(&self) -> &Fallback<T>;

    fn rtti(&self) -> TypeTag {
        TypeTag::of::<T>()
    }
}

/// Application methods available on every [`AdaptationProvider`]
pub trait AdaptationStrategy<T: SymbolValue>: AdaptationProvider<T> {
    /// Adapts the argument, `None` when absent or refused
    fn nullable(&self, o: Option<&dyn Any>) -> Option<T> {
        self.adaptation().apply(o)
    }

    /// Adapts the argument, substituting the fallback when that yields nothing.
    ///
    /// The fallback is handed out as supplied. Its consistency is checked once,
    /// when a [`Provider`] is built.
    fn surrogate(&self, o: Option<&dyn Any>) -> Option<T> {
        self.nullable(o).or_else(|| self.fallback().get())
    }

    /// Adapts a borrowed argument, keeping it for later error reporting
    fn adapt<'a>(&self, o: Option<&'a dyn Any>) -> AdaptationResult<'a, T> {
        AdaptationResult::of(o.map(Argument::Borrowed), self.nullable(o), self)
    }

    /// Adapts an owned, type-erased argument
    fn adapt_value(&self, value: AnyValue) -> AdaptationResult<'static, T> {
        let adapted = self.nullable(Some(value.as_any()));
        AdaptationResult::of(Some(Argument::Shared(value)), adapted, self)
    }
}

impl<T, P> AdaptationStrategy<T> for P
where
    T: SymbolValue,
    P: AdaptationProvider<T> + ?Sized,
{
}

/// The stock [`AdaptationProvider`].
///
/// Construction verifies that the fallback survives its own adaptation
/// unchanged, so an inconsistent default is reported where it is declared
/// instead of leaking into stores.
///
/// # Examples
///
/// ```
/// use sovran_symbolmap::{AdaptationError, AdaptationProvider, Downcasting};
///
/// // A default the filter refuses is a configuration error
/// let broken = Downcasting::<i32>::define(|v| *v > 0, || 0);
/// assert!(matches!(broken, Err(AdaptationError::InconsistentFallback { .. })));
///
/// let positive = Downcasting::<i32>::define(|v| *v > 0, || 1)?;
/// assert_eq!(positive.fallback().get(), Some(1));
/// # Ok::<(), AdaptationError>(())
/// ```
pub struct Provider<T> {
    adaptation: Adaptation<T>,
    fallback: Fallback<T>,
    rtti: TypeTag,
}

impl<T: SymbolValue> Provider<T> {
    /// Creates a provider after checking the fallback against the adaptation
    ///
    /// # Errors
    ///
    /// Returns `AdaptationError::InconsistentFallback` if adapting the fallback
    /// value does not give the same value back.
    pub fn new(adaptation: Adaptation<T>, fallback: Fallback<T>) -> Result<Self, AdaptationError> {
        check_fallback(&adaptation, &fallback)?;
        trace!(
            rtti = std::any::type_name::<T>(),
            fallback = fallback.is_defined(),
            "adaptation provider created"
        );
        Ok(Self {
            adaptation,
            fallback,
            rtti: TypeTag::of::<T>(),
        })
    }

    /// Creates a provider without a fallback, which is always consistent
    pub fn without_fallback(adaptation: Adaptation<T>) -> Self {
        Self {
            adaptation,
            fallback: Fallback::none(),
            rtti: TypeTag::of::<T>(),
        }
    }

    /// Same adaptation, constant fallback
    pub fn fallback_to(&self, value: T) -> Result<Self, AdaptationError> {
        Self::new(self.adaptation.clone(), Fallback::value(value))
    }

    /// Same adaptation, computed fallback
    pub fn fallback_with<F>(&self, f: F) -> Result<Self, AdaptationError>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::new(self.adaptation.clone(), Fallback::from_fn(f))
    }

    /// Narrows the adaptation, re-checking the current fallback
    pub fn filter<P>(&self, predicate: P) -> Result<Self, AdaptationError>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::new(self.adaptation.filter(predicate), self.fallback.clone())
    }
}

impl<T: SymbolValue> AdaptationProvider<T> for Provider<T> {
    fn adaptation(&self) -> &Adaptation<T> {
        &self.adaptation
    }

    fn fallback(&self) -> &Fallback<T> {
        &self.fallback
    }

    fn rtti(&self) -> TypeTag {
        self.rtti
    }
}

impl<T> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            adaptation: self.adaptation.clone(),
            fallback: self.fallback.clone(),
            rtti: self.rtti,
        }
    }
}

impl<T> Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("rtti", &self.rtti)
            .field("fallback", &self.fallback)
            .finish()
    }
}

fn check_fallback<T: SymbolValue>(
    adaptation: &Adaptation<T>,
    fallback: &Fallback<T>,
) -> Result<(), AdaptationError> {
    let value = fallback.get();
    let adapted = adaptation.apply(value.as_ref().map(|v| v as &dyn Any));
    if adapted == value {
        return Ok(());
    }

    let expected = std::any::type_name::<T>();
    warn!(expected, fallback = ?value, adapted = ?adapted, "fallback does not survive its own adaptation");
    Err(AdaptationError::InconsistentFallback {
        expected,
        fallback: format!("{:?}", value),
    })
}
