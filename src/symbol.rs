use crate::adaptation::{Adaptation, SymbolValue};
use crate::mappable::Mappable;
use crate::provider::{AdaptationProvider, Fallback, Provider, TypeTag};
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug)]
struct Token {
    name: Option<String>,
}

#[derive(Clone)]
enum Identity {
    Internal(Arc<Token>),
    External(Arc<str>),
}

/// The map key a symbol stands for.
///
/// Internal keys compare by identity: a key is only equal to its own clones,
/// whatever name it carries. External keys compare by their published
/// identifier, so they can be rebuilt on the other side of a process
/// boundary. The two kinds never compare equal.
#[derive(Clone)]
pub struct SymbolKey(Identity);

impl SymbolKey {
    /// A fresh identity, optionally annotated with a name for diagnostics
    pub fn unique(name: Option<&str>) -> Self {
        Self(Identity::Internal(Arc::new(Token {
            name: name.map(str::to_owned),
        })))
    }

    /// A key equal to every other key with the same identifier
    pub fn published(identifier: impl Into<Arc<str>>) -> Self {
        Self(Identity::External(identifier.into()))
    }

    /// The name or identifier, if any
    pub fn label(&self) -> Option<&str> {
        match &self.0 {
            Identity::Internal(token) => token.name.as_deref(),
            Identity::External(identifier) => Some(identifier.as_ref()),
        }
    }

    /// Returns true for a published identifier
    pub fn is_external(&self) -> bool {
        matches!(self.0, Identity::External(_))
    }
}

impl PartialEq for SymbolKey {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Identity::Internal(a), Identity::Internal(b)) => Arc::ptr_eq(a, b),
            (Identity::External(a), Identity::External(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for SymbolKey {}

impl Hash for SymbolKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Identity::Internal(token) => {
                0u8.hash(state);
                std::ptr::hash(Arc::as_ptr(token), state);
            }
            Identity::External(identifier) => {
                1u8.hash(state);
                identifier.hash(state);
            }
        }
    }
}

impl Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Identity::Internal(token) => match &token.name {
                Some(name) => write!(f, "{}@{:p}", name, Arc::as_ptr(token)),
                None => write!(f, "symbol@{:p}", Arc::as_ptr(token)),
            },
            Identity::External(identifier) => f.write_str(identifier),
        }
    }
}

impl Debug for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolKey({})", self)
    }
}

/// A typed key that is also the adaptation authority for values stored
/// under it
pub trait Symbol<T: SymbolValue>: Mappable<SymbolKey, T> {
    fn key(&self) -> &SymbolKey;
}

/// A symbol with identity equality.
///
/// Each call to [`new`](InternalSymbol::new) mints a distinct key; clones share
/// it. Keep one canonical instance per meaning, typically in a `static`.
///
/// # Examples
///
/// ```
/// use sovran_symbolmap::{AnyValue, Downcasting, InternalSymbol, Mappable, SymbolKey};
/// use std::collections::HashMap;
///
/// let a = InternalSymbol::named("retries", Downcasting::<u32>::to());
/// let b = InternalSymbol::named("retries", Downcasting::<u32>::to());
/// assert_ne!(a, b);
/// assert_eq!(a, a.clone());
///
/// let mut map: HashMap<SymbolKey, AnyValue> = HashMap::new();
/// a.put(&mut map, 3);
/// assert_eq!(a.get(&map), Some(3));
/// assert_eq!(b.get(&map), None);
/// ```
pub struct InternalSymbol<T> {
    key: SymbolKey,
    provider: Provider<T>,
}

impl<T: SymbolValue> InternalSymbol<T> {
    /// An anonymous symbol with a fresh identity
    pub fn new(provider: Provider<T>) -> Self {
        Self {
            key: SymbolKey::unique(None),
            provider,
        }
    }

    /// A symbol whose name shows up in diagnostics; equality stays identity
    pub fn named(name: &str, provider: Provider<T>) -> Self {
        Self {
            key: SymbolKey::unique(Some(name)),
            provider,
        }
    }

    /// The diagnostic name, if one was given
    pub fn name(&self) -> Option<&str> {
        self.key.label()
    }
}

/// A symbol equal to every other external symbol with the same identifier.
///
/// # Examples
///
/// ```
/// use sovran_symbolmap::{AnyValue, Downcasting, ExternalSymbol, Mappable, SymbolKey};
/// use std::collections::HashMap;
///
/// let written = ExternalSymbol::new("app.port", Downcasting::<u16>::to());
/// let rebuilt = ExternalSymbol::new("app.port", Downcasting::<u16>::to());
/// assert_eq!(written, rebuilt);
///
/// let mut map: HashMap<SymbolKey, AnyValue> = HashMap::new();
/// written.put(&mut map, 8080);
/// assert_eq!(rebuilt.get(&map), Some(8080));
/// ```
pub struct ExternalSymbol<T> {
    key: SymbolKey,
    provider: Provider<T>,
}

impl<T: SymbolValue> ExternalSymbol<T> {
    /// A symbol for the published `identifier`
    pub fn new(identifier: impl Into<Arc<str>>, provider: Provider<T>) -> Self {
        Self {
            key: SymbolKey::published(identifier),
            provider,
        }
    }

    /// The published identifier
    pub fn identifier(&self) -> &str {
        self.key.label().unwrap_or_default()
    }
}

/// An identity symbol carrying a typed tag.
///
/// The tag travels with the key for code that inspects symbols (a unit or an
/// access level) and takes no part in equality.
///
/// # Examples
///
/// ```
/// use sovran_symbolmap::{Downcasting, TaggedSymbol};
///
/// #[derive(Debug, PartialEq)]
/// enum Unit {
///     Millis,
/// }
///
/// let timeout = TaggedSymbol::named("timeout", Unit::Millis, Downcasting::<u64>::to());
/// assert_eq!(timeout.tag(), &Unit::Millis);
/// assert_eq!(timeout.name(), Some("timeout"));
/// ```
pub struct TaggedSymbol<T, G> {
    key: SymbolKey,
    provider: Provider<T>,
    tag: G,
}

impl<T: SymbolValue, G> TaggedSymbol<T, G> {
    /// An anonymous tagged symbol with a fresh identity
    pub fn new(tag: G, provider: Provider<T>) -> Self {
        Self {
            key: SymbolKey::unique(None),
            provider,
            tag,
        }
    }

    /// A tagged symbol whose name shows up in diagnostics
    pub fn named(name: &str, tag: G, provider: Provider<T>) -> Self {
        Self {
            key: SymbolKey::unique(Some(name)),
            provider,
            tag,
        }
    }

    /// The tag given at construction
    pub fn tag(&self) -> &G {
        &self.tag
    }

    /// The diagnostic name, if one was given
    pub fn name(&self) -> Option<&str> {
        self.key.label()
    }
}

impl<T, G: Clone> Clone for TaggedSymbol<T, G> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            provider: self.provider.clone(),
            tag: self.tag.clone(),
        }
    }
}

impl<T, G: Debug> Debug for TaggedSymbol<T, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedSymbol")
            .field("key", &self.key)
            .field("tag", &self.tag)
            .field("provider", &self.provider)
            .finish()
    }
}

// Keyed behaviour shared by every symbol type; `$extra` are the generics
// beyond the value type
macro_rules! symbol_impls {
    ($name:ident $(, $extra:ident)*) => {
        impl<T: SymbolValue $(, $extra)*> AdaptationProvider<T> for $name<T $(, $extra)*> {
            fn adaptation(&self) -> &Adaptation<T> {
                self.provider.adaptation()
            }

            fn fallback(&self) -> &Fallback<T> {
                self.provider.fallback()
            }

            fn rtti(&self) -> TypeTag {
                self.provider.rtti()
            }
        }

        impl<T: SymbolValue $(, $extra)*> Mappable<SymbolKey, T> for $name<T $(, $extra)*> {
            fn remap(&self) -> SymbolKey {
                self.key.clone()
            }
        }

        impl<T: SymbolValue $(, $extra)*> Symbol<T> for $name<T $(, $extra)*> {
            fn key(&self) -> &SymbolKey {
                &self.key
            }
        }

        impl<T $(, $extra)*> PartialEq for $name<T $(, $extra)*> {
            fn eq(&self, other: &Self) -> bool {
                self.key == other.key
            }
        }

        impl<T $(, $extra)*> Eq for $name<T $(, $extra)*> {}

        impl<T $(, $extra)*> Hash for $name<T $(, $extra)*> {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.key.hash(state)
            }
        }

        impl<T $(, $extra)*> Display for $name<T $(, $extra)*> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                Display::fmt(&self.key, f)
            }
        }
    };
}

macro_rules! plain_symbol_impls {
    ($name:ident) => {
        symbol_impls!($name);

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                Self {
                    key: self.key.clone(),
                    provider: self.provider.clone(),
                }
            }
        }

        impl<T> Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("key", &self.key)
                    .field("provider", &self.provider)
                    .finish()
            }
        }
    };
}

plain_symbol_impls!(InternalSymbol);
plain_symbol_impls!(ExternalSymbol);
symbol_impls!(TaggedSymbol, G);
