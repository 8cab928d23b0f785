//! # sovran-symbolmap
//!
//! Typed keys for heterogeneous maps.
//!
//! A *symbol* is a map key that also owns the rules for the values stored
//! under it: an idempotent adaptation that turns any value into a `T` or
//! refuses it, plus an optional fallback. Reads through a symbol always
//! return adapted values, and writes through a [`SymbolContext`] only ever
//! store values the symbol accepts.
//!
//! ## Key Features
//!
//! - **Adaptations, not casts**: an [`Adaptation`] may unify foreign
//!   representations (an `f64` into an `i32`, say) as long as it stays
//!   idempotent
//! - **Checked fallbacks**: a [`Provider`] refuses a fallback that does not
//!   survive its own adaptation, at construction time
//! - **Identity or identifier keys**: [`InternalSymbol`] and [`TaggedSymbol`]
//!   compare by identity, [`ExternalSymbol`] by a published identifier
//! - **Self-adapting values**: a [`Selecting`] provider asks an [`Adaptable`]
//!   value for the representation it needs
//! - **Atomic mutation**: every read-then-write in [`SymbolContext`] goes
//!   through the store's single [`Store::compute`] primitive
//! - **Pluggable stores**: [`SymbolMap`] by default, `DashMap` behind the
//!   `dashmap` feature, or any [`Store`] implementation
//!
//! ## Usage Examples
//!
//! ### Basic Usage
//!
//! ```rust
//! use sovran_symbolmap::prelude::*;
//!
//! fn main() -> Result<(), MapError> {
//!     let user = InternalSymbol::named("user", Downcasting::<String>::to());
//!     let retries = InternalSymbol::named(
//!         "retries",
//!         Downcasting::<u8>::define(|n| *n <= 5, || 3)?,
//!     );
//!
//!     let context = SymbolContext::<SymbolKey>::new();
//!     context.put(&user, "alice".to_string())?;
//!
//!     assert_eq!(context.get(&user)?, Some("alice".to_string()));
//!     assert_eq!(context.give(&retries)?, Some(3));
//!
//!     // Out of range: refused, nothing is written
//!     match context.put(&retries, 9) {
//!         Err(MapError::Adaptation(e)) => println!("refused: {}", e),
//!         other => panic!("unexpected: {:?}", other),
//!     }
//!     assert_eq!(context.get(&retries)?, None);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Unifying Foreign Values
//!
//! ```rust
//! use sovran_symbolmap::prelude::*;
//! use std::any::Any;
//!
//! fn int_value(o: &dyn Any) -> Option<i32> {
//!     o.downcast_ref::<f64>().map(|v| *v as i32)
//!         .or_else(|| o.downcast_ref::<String>().and_then(|s| s.parse().ok()))
//! }
//!
//! fn main() -> Result<(), MapError> {
//!     let port = ExternalSymbol::new("port", Unifying::<i32>::with_fallback_value(int_value, 80)?);
//!
//!     // Values written by someone who knew nothing about the symbol
//!     let raw = SymbolMap::<SymbolKey>::new();
//!     raw.put(SymbolKey::published("port"), AnyValue::new("8080".to_string()))?;
//!
//!     let context = SymbolContext::with_store(raw);
//!     assert_eq!(context.get(&port)?, Some(8080));
//!
//!     // Rewrites the slot with the adapted form
//!     assert_eq!(context.compute_if_present(&port, |_, p| Some(p))?, Some(8080));
//!     assert!(context.store().with(&SymbolKey::published("port"), |p: &i32| *p == 8080)?);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Plain Collections
//!
//! Symbols read from anything implementing [`Source`] and write to anything
//! implementing [`Sink`], including a `HashMap` or a function:
//!
//! ```rust
//! use sovran_symbolmap::prelude::*;
//! use std::collections::HashMap;
//!
//! let debug = ConstantMappable::new("debug", Downcasting::<bool>::to());
//!
//! let env = FnSource(|key: &&str| (*key == "debug").then(|| AnyValue::new(true)));
//! assert_eq!(debug.get(&env), Some(true));
//!
//! let mut copy: HashMap<&str, AnyValue> = HashMap::new();
//! debug.let_value(&mut copy, Some(&true));
//! assert_eq!(debug.get(&copy), Some(true));
//! ```
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events and installs no subscriber: `warn` when
//! a provider is built with an inconsistent fallback, `debug` when a value is
//! refused or dropped, `trace` for provider construction and store removals.

mod adaptation;
mod any_value;
mod context;
mod downcasting;
mod error;
mod map;
mod mappable;
mod provider;
mod result;
mod selecting;
mod store;
mod symbol;

pub use adaptation::{Adaptation, SymbolValue};
pub use any_value::AnyValue;
pub use context::SymbolContext;
pub use downcasting::{Downcasting, Unifying};
pub use error::{AdaptationError, MapError};
pub use map::SymbolMap;
pub use mappable::{ConstantMappable, DynamicMappable, FnSink, FnSource, Mappable, Sink, Source};
pub use provider::{AdaptationProvider, AdaptationStrategy, Fallback, Provider, TypeTag};
pub use result::{AdaptationResult, Argument};
pub use selecting::{Adaptable, Adaptive, Selecting};
pub use store::{ReadOnly, Store};
pub use symbol::{ExternalSymbol, InternalSymbol, Symbol, SymbolKey, TaggedSymbol};

/// Glob import for the common surface
pub mod prelude {
    pub use crate::{
        Adaptable, AdaptationError, AdaptationProvider, AdaptationStrategy, Adaptive, AnyValue,
        ConstantMappable, Downcasting, ExternalSymbol, FnSink, FnSource, InternalSymbol, MapError,
        Mappable, Selecting, Store, Symbol, SymbolContext, SymbolKey, SymbolMap, TaggedSymbol,
        TypeTag, Unifying,
    };
}
