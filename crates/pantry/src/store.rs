//! Stores and their definition options
//!
//! A store's state lives in the pantry's root state under the store's id;
//! the [`Store`] handle reads and writes that slice. Store handles are
//! cheap to clone and every clone is the same store.

use std::fmt;
use std::sync::Arc;

use pantry_core::{StateTree, StateValue, StoreId};
use pantry_reactive::{EffectScope, Signal, Subscription};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

use crate::plugin::{ExtensionError, StoreProperties};
use crate::{PantryError, Result};

/// Produces a store's initial state
pub type StateFn = Arc<dyn Fn() -> StateValue + Send + Sync>;

/// Runs once, inside the store's scope, when the store is realized
pub type SetupFn = Arc<dyn Fn(&Store) -> std::result::Result<(), ExtensionError> + Send + Sync>;

/// How a store is defined. Plugins receive these options unchanged.
#[derive(Clone)]
pub struct StoreOptions {
    id: StoreId,
    state: Option<StateFn>,
    setup: Option<SetupFn>,
    extra: Map<String, Value>,
}

impl StoreOptions {
    /// Options for a store named `id`
    pub fn new(id: impl Into<StoreId>) -> Self {
        Self {
            id: id.into(),
            state: None,
            setup: None,
            extra: Map::new(),
        }
    }

    /// Set the initial state factory
    pub fn state<F>(mut self, f: F) -> Self
    where
        F: Fn() -> StateValue + Send + Sync + 'static,
    {
        self.state = Some(Arc::new(f));
        self
    }

    /// Set the setup hook
    pub fn setup<F>(mut self, f: F) -> Self
    where
        F: Fn(&Store) -> std::result::Result<(), ExtensionError> + Send + Sync + 'static,
    {
        self.setup = Some(Arc::new(f));
        self
    }

    /// Attach a custom option for plugins to read
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Store id
    pub fn id(&self) -> &StoreId {
        &self.id
    }

    /// Read a custom option
    pub fn get_option(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// All custom options
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Fresh initial state: the factory's value, or `{}`
    pub fn initial_state(&self) -> StateValue {
        match &self.state {
            Some(f) => f(),
            None => Value::Object(Map::new()),
        }
    }

    pub(crate) fn setup_hook(&self) -> Option<&SetupFn> {
        self.setup.as_ref()
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("id", &self.id)
            .field("state", &self.state.is_some())
            .field("setup", &self.setup.is_some())
            .field("extra", &self.extra)
            .finish()
    }
}

struct StoreInner {
    /// Store id, also the key of its root state entry
    id: StoreId,
    /// Root state of the owning pantry
    root: Signal<StateTree>,
    /// Child of the pantry scope
    scope: EffectScope,
    /// Properties merged in by plugins
    properties: RwLock<StoreProperties>,
}

/// A realized store
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    pub(crate) fn new(id: StoreId, root: Signal<StateTree>, scope: EffectScope) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                id,
                root,
                scope,
                properties: RwLock::new(StoreProperties::new()),
            }),
        }
    }

    /// Store id
    pub fn id(&self) -> &StoreId {
        &self.inner.id
    }

    /// Scope owning this store's subscriptions
    pub fn scope(&self) -> &EffectScope {
        &self.inner.scope
    }

    /// Check if the store's scope is still running
    pub fn is_active(&self) -> bool {
        self.inner.scope.is_active()
    }

    /// Copy of the store's current state (`null` once its pantry is disposed)
    pub fn state(&self) -> StateValue {
        self.inner
            .root
            .with(|tree| tree.get(self.id().name()).cloned())
            .unwrap_or(Value::Null)
    }

    /// Replace the store's state
    pub fn set_state(&self, state: StateValue) -> Result<()> {
        self.ensure_active()?;
        let key = self.id().name().to_string();
        self.inner.root.update(|tree| {
            tree.insert(key, state);
        });
        Ok(())
    }

    /// Mutate a copy of the store's state, then write it back.
    ///
    /// No lock is held while `f` runs. A write made by `f` itself to this
    /// store is overwritten by the patched copy.
    pub fn patch<R>(&self, f: impl FnOnce(&mut StateValue) -> R) -> Result<R> {
        self.ensure_active()?;
        let mut state = match self.state() {
            Value::Null => Value::Object(Map::new()),
            state => state,
        };
        let result = f(&mut state);
        self.set_state(state)?;
        Ok(result)
    }

    /// Call `callback` with the new state whenever this store's state
    /// changes. The subscription is released when the store's scope stops.
    pub fn subscribe<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(&StateValue) + Send + Sync + 'static,
    {
        let key = self.id().name().to_string();
        let last = Mutex::new(self.state());
        let root = self.inner.root.clone();

        self.inner
            .scope
            .run(move || {
                root.subscribe(move |tree: &StateTree| {
                    let current = tree.get(&key).cloned().unwrap_or(Value::Null);
                    {
                        let mut last = last.lock();
                        if *last == current {
                            return;
                        }
                        *last = current.clone();
                    }
                    callback(&current);
                })
            })
            .ok_or_else(|| self.disposed())
    }

    /// Retrieve a property added by a plugin
    pub fn property<T: std::any::Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.inner.properties.read().get(key)
    }

    /// Check if a plugin added `key`
    pub fn has_property(&self, key: &str) -> bool {
        self.inner.properties.read().contains(key)
    }

    /// Names of every plugin-added property
    pub fn property_keys(&self) -> Vec<String> {
        self.inner
            .properties
            .read()
            .keys()
            .map(str::to_string)
            .collect()
    }

    /// Check if two handles refer to the same store
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn merge_properties(&self, properties: StoreProperties) {
        self.inner.properties.write().merge(properties);
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(self.disposed())
        }
    }

    fn disposed(&self) -> PantryError {
        PantryError::StoreDisposed(self.id().clone())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("active", &self.is_active())
            .field("properties", &*self.inner.properties.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bare_store(id: &str) -> (Store, Signal<StateTree>) {
        let root = Signal::new(StateTree::new());
        let store = Store::new(StoreId::new(id), root.clone(), EffectScope::detached());
        (store, root)
    }

    #[test]
    fn test_options_initial_state() {
        let plain = StoreOptions::new("plain");
        assert_eq!(plain.initial_state(), json!({}));

        let counter = StoreOptions::new("counter")
            .state(|| json!({ "count": 0 }))
            .option("persist", true);
        assert_eq!(counter.initial_state(), json!({ "count": 0 }));
        assert_eq!(counter.get_option("persist"), Some(&json!(true)));
        assert!(counter.get_option("missing").is_none());
    }

    #[test]
    fn test_state_lives_in_root() {
        let (store, root) = bare_store("counter");
        assert_eq!(store.state(), Value::Null);

        store.set_state(json!({ "count": 1 })).unwrap();
        assert_eq!(root.get()["counter"], json!({ "count": 1 }));

        let doubled = store
            .patch(|state| {
                state["count"] = json!(2);
                2
            })
            .unwrap();
        assert_eq!(doubled, 2);
        assert_eq!(store.state(), json!({ "count": 2 }));
    }

    #[test]
    fn test_patch_may_read_other_stores() {
        let (store, root) = bare_store("cart");
        let prices = Store::new(StoreId::new("prices"), root, EffectScope::detached());
        prices.set_state(json!({ "apple": 3 })).unwrap();

        store
            .patch(|state| {
                state["total"] = prices.state()["apple"].clone();
                assert_eq!(store.state(), Value::Null);
            })
            .unwrap();

        assert_eq!(store.state(), json!({ "total": 3 }));
    }

    #[test]
    fn test_subscribe_only_sees_own_changes() {
        let (store, root) = bare_store("counter");
        let other = Store::new(StoreId::new("other"), root.clone(), EffectScope::detached());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();

        store.subscribe(move |state| s.lock().push(state.clone())).unwrap();
        store.set_state(json!({ "count": 1 })).unwrap();
        other.set_state(json!({ "count": 9 })).unwrap();
        store.set_state(json!({ "count": 1 })).unwrap();
        store.set_state(json!({ "count": 2 })).unwrap();

        assert_eq!(*seen.lock(), vec![json!({ "count": 1 }), json!({ "count": 2 })]);
    }

    #[test]
    fn test_stopped_store_rejects_writes() {
        let (store, _) = bare_store("counter");
        store.scope().stop();

        assert!(!store.is_active());
        assert!(matches!(
            store.set_state(json!({})),
            Err(PantryError::StoreDisposed(_))
        ));
        assert!(store.patch(|_| ()).is_err());
        assert!(store.subscribe(|_| {}).is_err());
    }

    #[test]
    fn test_subscription_released_with_scope() {
        let (store, root) = bare_store("counter");
        store.subscribe(|_| {}).unwrap();
        assert_eq!(root.subscriber_count(), 1);

        store.scope().stop();
        assert_eq!(root.subscriber_count(), 0);
    }

    #[test]
    fn test_properties_merge() {
        let (store, _) = bare_store("counter");
        store.merge_properties(StoreProperties::new().with("a", 1u8));
        store.merge_properties(StoreProperties::new().with("a", 2u8).with("b", 3u8));

        assert_eq!(store.property::<u8>("a").as_deref(), Some(&2));
        assert!(store.has_property("b"));
        assert_eq!(store.property_keys(), vec!["a".to_string(), "b".to_string()]);
    }
}
