use crate::any_value::AnyValue;
use thiserror::Error;

/// Errors raised by adaptations and the providers that bundle them
#[derive(Debug, Clone, Error)]
pub enum AdaptationError {
    /// A provider was configured with a fallback that its own adaptation rejects
    /// or alters. This is a programming error and surfaces at construction.
    #[error("fallback {fallback} does not survive its own adaptation to `{expected}`")]
    InconsistentFallback {
        expected: &'static str,
        fallback: String,
    },

    /// A value was present but the adaptation refused it
    #[error("adaptation to `{expected}` rejected {}", describe(.argument))]
    Rejected {
        expected: &'static str,
        argument: Option<AnyValue>,
    },

    /// There was nothing to adapt and the caller demanded a value
    #[error("no value to adapt to `{expected}`")]
    Absent { expected: &'static str },

    /// A keyed lookup found neither an adaptable value nor a fallback
    #[error("missing item: {key}")]
    Missing { key: String },
}

fn describe(argument: &Option<AnyValue>) -> String {
    match argument {
        Some(value) => format!("a value of type `{}`", value.type_name()),
        None => "a borrowed value".to_string(),
    }
}

/// Errors that can occur when using a symbol store
#[derive(Debug, Clone, Error)]
pub enum MapError {
    /// Failed to acquire lock on the store
    #[error("failed to acquire lock")]
    LockError,

    /// The requested key was not found
    #[error("key not found in store: {0}")]
    KeyNotFound(String),

    /// Attempted to access a value with a type that doesn't match what was stored
    #[error("type mismatch for the requested key")]
    TypeMismatch,

    /// The store does not accept modifications
    #[error("store is read-only")]
    ReadOnly,

    /// A value was refused by the adaptation of the symbol it was written under
    #[error(transparent)]
    Adaptation(#[from] AdaptationError),
}
