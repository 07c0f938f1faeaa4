//! Active pantry resolution
//!
//! Stores find their pantry without it being passed around. In order:
//!
//! 1. A pantry passed explicitly by the caller, ignored while a testing
//!    pantry is active
//! 2. The pantry provided to the current app's injection context
//! 3. The process-wide active slot
//!
//! The slot is shared by every thread. Servers rendering concurrent
//! requests should run each request inside its own app context (see
//! [`App::run_with_context`](pantry_host::App::run_with_context)) so the
//! context lookup answers before the slot is consulted.

use pantry_host::{has_injection_context, inject};
use parking_lot::RwLock;

use crate::registry::{Pantry, PANTRY_KEY};
use crate::{PantryError, Result};

static ACTIVE: RwLock<Option<Pantry>> = parking_lot::const_rwlock(None);

/// Overwrite the process-wide active pantry and return the value set.
/// Passing `None` clears the slot.
pub fn set_active_pantry(pantry: Option<Pantry>) -> Option<Pantry> {
    let previous = std::mem::replace(&mut *ACTIVE.write(), pantry.clone());
    if let Some(pantry) = &pantry {
        log::trace!("active pantry is now {}", pantry.id());
    }
    // Dropped outside the slot's lock.
    drop(previous);
    pantry
}

/// The pantry in the process-wide slot
pub fn global_active_pantry() -> Option<Pantry> {
    ACTIVE.read().clone()
}

/// The pantry provided to the current injection context
pub fn context_pantry() -> Option<Pantry> {
    if has_injection_context() {
        inject(&PANTRY_KEY)
    } else {
        None
    }
}

/// The pantry visible from here: the injection context's, else the slot's
pub fn get_active_pantry() -> Option<Pantry> {
    context_pantry().or_else(global_active_pantry)
}

/// Resolve the pantry a store should register against.
///
/// A resolved pantry other than the slot's own becomes the new active
/// pantry. Fails with [`PantryError::NoActivePantry`] when nothing is
/// available.
pub fn resolve_pantry(explicit: Option<&Pantry>) -> Result<Pantry> {
    let global = global_active_pantry();
    let testing = global.as_ref().is_some_and(Pantry::is_testing);

    let chosen = explicit
        .filter(|_| !testing)
        .cloned()
        .or_else(context_pantry);

    match chosen {
        Some(pantry) => {
            let already_active = global.as_ref().is_some_and(|g| g.ptr_eq(&pantry));
            if !already_active {
                set_active_pantry(Some(pantry.clone()));
            }
            Ok(pantry)
        }
        None => global.ok_or(PantryError::NoActivePantry),
    }
}
