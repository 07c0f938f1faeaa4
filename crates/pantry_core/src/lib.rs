//! # pantry_core - Pantry Core
//!
//! Core primitives shared by every Pantry crate:
//! - **Identifiers**: store names and per-instance ids
//! - **State trees**: the plain-data shape of root state
//! - **Configuration**: build/environment switches loaded from TOML
//!
//! ## Philosophy
//! A pantry is the one place every store of an application registers
//! itself. Everything above this crate (reactivity, host wiring, the
//! registry itself) builds on these types.

pub mod id;
pub mod state;
pub mod config;

pub use id::*;
pub use state::*;
pub use config::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::id::{PantryId, StoreId};
    pub use crate::state::{StateTree, StateValue};
    pub use crate::config::{ConfigError, Environment, PantryConfig};
}
