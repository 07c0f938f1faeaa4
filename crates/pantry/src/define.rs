//! Store accessors

use std::fmt;
use std::sync::Arc;

use pantry_core::StoreId;

use crate::active::resolve_pantry;
use crate::registry::Pantry;
use crate::store::{Store, StoreOptions};
use crate::Result;

/// Accessor returned by [`define_store`]
#[derive(Clone)]
pub struct UseStore {
    options: Arc<StoreOptions>,
}

impl UseStore {
    /// Id of the store this accessor realizes
    pub fn id(&self) -> &StoreId {
        self.options.id()
    }

    /// Options the store was defined with
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Get the store from `pantry`, or from the resolved active pantry
    /// when `None`, realizing it on first use.
    pub fn get(&self, pantry: Option<&Pantry>) -> Result<Store> {
        let pantry = resolve_pantry(pantry)?;
        pantry.realize(&self.options)
    }
}

impl fmt::Debug for UseStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UseStore").field(self.id()).finish()
    }
}

/// Define a store. Nothing is realized until [`UseStore::get`].
pub fn define_store(options: StoreOptions) -> UseStore {
    UseStore {
        options: Arc::new(options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::active::set_active_pantry;
    use crate::PantryError;
    use serde_json::json;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_get_uses_active_pantry() {
        let pantry = Pantry::new();
        set_active_pantry(Some(pantry.clone()));

        let use_counter = define_store(StoreOptions::new("counter").state(|| json!({ "count": 0 })));
        let first = use_counter.get(None).unwrap();
        let second = use_counter.get(None).unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(pantry.snapshot()["counter"], json!({ "count": 0 }));
    }

    #[test]
    #[serial]
    fn test_get_with_explicit_pantry() {
        set_active_pantry(None);
        let pantry = Pantry::new();
        let use_cart = define_store(StoreOptions::new("cart"));

        assert!(matches!(use_cart.get(None), Err(PantryError::NoActivePantry)));
        use_cart.get(Some(&pantry)).unwrap();
        assert!(pantry.has_store("cart"));
    }

    #[test]
    #[serial]
    fn test_nested_store_resolves_same_pantry() {
        let pantry = Pantry::new();
        set_active_pantry(None);

        let use_user = define_store(StoreOptions::new("user"));
        let inner = use_user.clone();
        let use_cart = define_store(StoreOptions::new("cart").setup(move |_| {
            inner.get(None).map_err(|e| crate::ExtensionError::msg(e.to_string()))?;
            Ok(())
        }));

        use_cart.get(Some(&pantry)).unwrap();
        assert!(pantry.has_store("user"));
        assert!(pantry.has_store("cart"));
    }
}
