use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A type-erased value as held by a store.
///
/// Cloning is cheap: clones share the same allocation, so handing a stored
/// value out of a lock never copies the payload.
#[derive(Clone)]
pub struct AnyValue {
    type_id: TypeId,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl AnyValue {
    /// Create a new AnyValue from a value of any type that implements Any, Send, and Sync
    pub fn new<T: 'static + Any + Send + Sync>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    /// The `TypeId` of the wrapped value
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The type name of the wrapped value, for diagnostics only
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check if the contained value is of type T
    pub fn is_type<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Get a reference to the contained value if it is of type T
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// The wrapped value as a plain `&dyn Any`, suitable as an adaptation argument
    pub fn as_any(&self) -> &dyn Any {
        &*self.value
    }

    /// Returns true if both handles share the same allocation
    pub fn ptr_eq(&self, other: &AnyValue) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyValue({})", self.type_name)
    }
}

/// Unwraps an `AnyValue` that was passed where a plain value was expected.
pub(crate) fn unwrap_any(o: &dyn Any) -> &dyn Any {
    match o.downcast_ref::<AnyValue>() {
        Some(value) => value.as_any(),
        None => o,
    }
}

/// Turns an optional stored value into an adaptation argument.
pub(crate) fn as_argument(value: Option<&AnyValue>) -> Option<&dyn Any> {
    value.map(AnyValue::as_any)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_checks() {
        let value = AnyValue::new(42i32);
        assert!(value.is_type::<i32>());
        assert!(!value.is_type::<i64>());
        assert_eq!(value.downcast_ref::<i32>(), Some(&42));
        assert_eq!(value.downcast_ref::<String>(), None);
        assert_eq!(value.type_name(), "i32");
    }

    #[test]
    fn test_clones_share_payload() {
        let value = AnyValue::new(vec![1, 2, 3]);
        let other = value.clone();
        assert!(value.ptr_eq(&other));
        assert!(!value.ptr_eq(&AnyValue::new(vec![1, 2, 3])));
    }

    #[test]
    fn test_unwrap_nested() {
        let value = AnyValue::new("text".to_string());
        let erased: &dyn Any = &value;
        assert_eq!(
            unwrap_any(erased).downcast_ref::<String>(),
            Some(&"text".to_string())
        );

        let plain: &dyn Any = &7u8;
        assert_eq!(unwrap_any(plain).downcast_ref::<u8>(), Some(&7));
    }
}
