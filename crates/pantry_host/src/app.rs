//! App handles
//!
//! An app is the root of one component tree. Independent apps (one per
//! server-rendered request, say) never share provides or globals.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::inject::{self, InjectionKey};

type Shared = Arc<dyn Any + Send + Sync>;

/// Unique identifier for an app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppId(u64);

impl AppId {
    /// Create a new unique app ID
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for AppId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app#{}", self.0)
    }
}

struct AppInner {
    id: AppId,
    name: String,
    provides: RwLock<HashMap<&'static str, Shared>>,
    globals: RwLock<HashMap<String, Shared>>,
}

/// Host application handle. Clones refer to the same app.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl App {
    /// Create a new app
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(AppInner {
                id: AppId::new(),
                name: name.into(),
                provides: RwLock::new(HashMap::new()),
                globals: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// App ID
    pub fn id(&self) -> AppId {
        self.inner.id
    }

    /// App name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Provide a value to everything running in this app's context.
    /// Returns `true` if a value under the same key was replaced.
    pub fn provide<T: Send + Sync + 'static>(&self, key: &InjectionKey<T>, value: T) -> bool {
        let replaced = self
            .inner
            .provides
            .write()
            .insert(key.name(), Arc::new(value))
            .is_some();
        if replaced {
            log::debug!("{}: provide replaced existing value for {:?}", self.id(), key);
        }
        replaced
    }

    /// Read a value provided under `key`
    pub fn provided<T: Clone + Send + Sync + 'static>(&self, key: &InjectionKey<T>) -> Option<T> {
        self.inner
            .provides
            .read()
            .get(key.name())
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Check if anything is provided under `key`
    pub fn is_provided<T>(&self, key: &InjectionKey<T>) -> bool {
        self.inner.provides.read().contains_key(key.name())
    }

    /// Set a global property
    pub fn set_global_property<T: Send + Sync + 'static>(&self, name: impl Into<String>, value: T) {
        self.inner.globals.write().insert(name.into(), Arc::new(value));
    }

    /// Read a global property
    pub fn global_property<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Option<T> {
        self.inner
            .globals
            .read()
            .get(name)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Remove a global property. Returns `true` if it existed.
    pub fn remove_global_property(&self, name: &str) -> bool {
        self.inner.globals.write().remove(name).is_some()
    }

    /// Run `f` with this app as the injection context
    pub fn run_with_context<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = inject::enter(self.clone());
        f()
    }

    /// Drop every provided value and global property
    pub fn unmount(&self) {
        self.inner.provides.write().clear();
        self.inner.globals.write().clear();
        log::debug!("{} ({}) unmounted", self.id(), self.name());
    }

    /// Check if two handles refer to the same app
    pub fn ptr_eq(&self, other: &App) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}
