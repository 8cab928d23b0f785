use crate::adaptation::SymbolValue;
use crate::any_value::AnyValue;
use crate::error::AdaptationError;
use crate::provider::{AdaptationProvider, Fallback};
use std::any::Any;
use std::fmt::{self, Debug};

/// The input an adaptation was applied to
#[derive(Clone)]
pub enum Argument<'a> {
    /// Borrowed from the caller
    Borrowed(&'a dyn Any),
    /// Pulled out of a store
    Shared(AnyValue),
}

impl<'a> Argument<'a> {
    /// The argument as a plain `&dyn Any`, unwrapping a shared store value
    pub fn as_any(&self) -> &dyn Any {
        match self {
            Argument::Borrowed(o) => *o,
            Argument::Shared(value) => value.as_any(),
        }
    }

    fn to_shared(&self) -> Option<AnyValue> {
        match self {
            Argument::Borrowed(o) => o.downcast_ref::<AnyValue>().cloned(),
            Argument::Shared(value) => Some(value.clone()),
        }
    }
}

impl Debug for Argument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Borrowed(_) => f.write_str("<borrowed>"),
            Argument::Shared(value) => Debug::fmt(value, f),
        }
    }
}

#[derive(Clone)]
enum State<T> {
    Immediate,
    Deferred(Fallback<T>),
    Terminal,
}

/// The outcome of one adaptation: the argument, the adapted value if any, and
/// access to the fallback of the strategy that produced it.
///
/// [`fallback`](AdaptationResult::fallback) substitutes the default only when
/// the value is missing, and a result that already went through it ignores
/// further calls, so `result.fallback().fallback()` evaluates the supplier once.
///
/// # Examples
///
/// ```
/// use sovran_symbolmap::{AdaptationError, AdaptationStrategy, Downcasting};
///
/// let counts = Downcasting::<u32>::with_fallback_value(0)?;
///
/// let seven = "seven".to_string();
/// let parsed = counts.adapt(Some(&seven));
/// assert!(!parsed.is_present());
/// assert_eq!(parsed.fallback().resolve(), Some(0));
///
/// // Nothing to adapt is acceptable for request, a refused value is not
/// assert_eq!(counts.adapt(None).request()?, None);
/// assert!(counts.adapt(Some(&seven)).request().is_err());
/// # Ok::<(), AdaptationError>(())
/// ```
#[derive(Clone)]
pub struct AdaptationResult<'a, T> {
    argument: Option<Argument<'a>>,
    value: Option<T>,
    state: State<T>,
}

impl<'a, T: SymbolValue> AdaptationResult<'a, T> {
    /// A result without access to any fallback
    pub fn immediate(argument: Option<Argument<'a>>, value: Option<T>) -> Self {
        Self {
            argument,
            value,
            state: State::Immediate,
        }
    }

    /// A result that consults `fallback` when asked to
    pub fn deferred(argument: Option<Argument<'a>>, value: Option<T>, fallback: Fallback<T>) -> Self {
        let state = if fallback.is_defined() {
            State::Deferred(fallback)
        } else {
            State::Immediate
        };
        Self {
            argument,
            value,
            state,
        }
    }

    /// A result bound to the fallback of `provider`
    pub fn of<P>(argument: Option<Argument<'a>>, value: Option<T>, provider: &P) -> Self
    where
        P: AdaptationProvider<T> + ?Sized,
    {
        Self::deferred(argument, value, provider.fallback().clone())
    }

    /// The original argument, `None` if there was nothing to adapt
    pub fn argument(&self) -> Option<&dyn Any> {
        self.argument.as_ref().map(Argument::as_any)
    }

    /// The current value
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Takes the current value
    pub fn resolve(self) -> Option<T> {
        self.value
    }

    /// Returns true if a value is present
    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    /// Calls `f` with the value if there is one
    pub fn if_present<F: FnOnce(&T)>(&self, f: F) {
        if let Some(value) = &self.value {
            f(value);
        }
    }

    /// Returns true once the fallback has been applied
    pub fn is_fallback(&self) -> bool {
        matches!(self.state, State::Terminal)
    }

    /// Returns the value, failing whenever it is missing
    ///
    /// # Errors
    ///
    /// - `AdaptationError::Absent` if there was no argument
    /// - `AdaptationError::Rejected` if the argument was refused
    pub fn require(self) -> Result<T, AdaptationError> {
        match self.value {
            Some(value) => Ok(value),
            None => Err(rejection::<T>(self.argument.as_ref())),
        }
    }

    /// Returns the value or the error built from the argument
    pub fn require_with<E, F>(self, f: F) -> Result<T, E>
    where
        F: FnOnce(Option<&dyn Any>) -> E,
    {
        match self.value {
            Some(value) => Ok(value),
            None => Err(f(self.argument.as_ref().map(Argument::as_any))),
        }
    }

    /// Returns the value, tolerating a missing argument
    ///
    /// # Errors
    ///
    /// Returns `AdaptationError::Rejected` if an argument was present but
    /// refused. A missing argument yields `Ok(None)`.
    pub fn request(self) -> Result<Option<T>, AdaptationError> {
        match (self.value, &self.argument) {
            (Some(value), _) => Ok(Some(value)),
            (None, None) => Ok(None),
            (None, Some(argument)) => Err(rejection::<T>(Some(argument))),
        }
    }

    /// Like [`request`](AdaptationResult::request) with a custom error
    pub fn request_with<E, F>(self, f: F) -> Result<Option<T>, E>
    where
        F: FnOnce(&dyn Any) -> E,
    {
        match (self.value, &self.argument) {
            (Some(value), _) => Ok(Some(value)),
            (None, None) => Ok(None),
            (None, Some(argument)) => Err(f(argument.as_any())),
        }
    }

    /// Substitutes the fallback if the value is missing
    pub fn fallback(self) -> Self {
        let value = match self.state {
            State::Terminal => return self,
            State::Immediate => self.value,
            State::Deferred(fallback) => self.value.or_else(|| fallback.get()),
        };
        Self {
            argument: self.argument,
            value,
            state: State::Terminal,
        }
    }

    /// Hands the whole result to `f`, for chaining into plain code
    pub fn map<V, F>(self, f: F) -> V
    where
        F: FnOnce(Self) -> V,
    {
        f(self)
    }
}

impl<T: Debug> Debug for AdaptationResult<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fallback = match self.state {
            State::Immediate => "absent",
            State::Deferred(_) => "present",
            State::Terminal => "this",
        };
        f.debug_struct("AdaptationResult")
            .field("result", &self.value)
            .field("argument", &self.argument)
            .field("fallback", &fallback)
            .finish()
    }
}

fn rejection<T>(argument: Option<&Argument<'_>>) -> AdaptationError {
    let expected = std::any::type_name::<T>();
    match argument {
        Some(argument) => AdaptationError::Rejected {
            expected,
            argument: argument.to_shared(),
        },
        None => AdaptationError::Absent { expected },
    }
}
