//! # pantry_reactive - Reactive Primitives
//!
//! The two reactive building blocks the registry consumes:
//! - [`Signal`]: a mutable observable cell with subscribers
//! - [`EffectScope`]: a disposable arena of cleanup callbacks and child
//!   scopes, stopped as a unit
//!
//! Anything that subscribes while a scope is current is released when
//! that scope stops, so stopping a root scope tears down everything that
//! was created under it.

pub mod scope;
pub mod signal;

pub use scope::{current_scope, on_scope_dispose, Disposer, EffectScope, ScopeState};
pub use signal::{Signal, SubscriberId, Subscription};

/// Prelude
pub mod prelude {
    pub use crate::{current_scope, on_scope_dispose, EffectScope, ScopeState, Signal, Subscription};
}
