//! The root registry
//!
//! A [`Pantry`] owns the root state, the store map, the plugin queues and
//! a detached effect scope. Its phase is explicit:
//!
//! - `Unattached`: plugins are queued in a pending list
//! - `Attached`: the pending list has been flushed into the active list
//! - `Disposed`: everything has been released; further use fails

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use pantry_core::{empty_tree, merge_tree, PantryConfig, PantryId, StateTree, StoreId};
use pantry_host::{App, InjectionKey};
use pantry_reactive::{EffectScope, Signal};
use parking_lot::{Mutex, RwLock};

use crate::active::set_active_pantry;
use crate::devtools::DevtoolsHook;
use crate::plugin::{Plugin, PluginContext, PluginPipeline, PluginResult};
use crate::store::{Store, StoreOptions};
use crate::{PantryError, Result};

/// Key a pantry is provided under when installed into an app
pub static PANTRY_KEY: InjectionKey<Pantry> = InjectionKey::new("pantry");

enum Lifecycle {
    Unattached { pending: Vec<Arc<dyn Plugin>> },
    Attached { host: App, plugins: PluginPipeline },
    Disposed,
}

impl Lifecycle {
    fn name(&self) -> &'static str {
        match self {
            Lifecycle::Unattached { .. } => "unattached",
            Lifecycle::Attached { .. } => "attached",
            Lifecycle::Disposed => "disposed",
        }
    }
}

struct PantryInner {
    /// Pantry ID
    id: PantryId,
    /// Configuration fixed at build time
    config: PantryConfig,
    /// Detached root scope; every store scope is its child
    scope: EffectScope,
    /// Root state, one entry per store id
    state: Signal<StateTree>,
    /// Realized stores
    stores: RwLock<HashMap<StoreId, Store>>,
    /// Phase and plugin queues
    lifecycle: Mutex<Lifecycle>,
    /// Developer tooling, wired only when enabled by config
    devtools: Option<Arc<dyn DevtoolsHook>>,
    /// Created by `create_testing_pantry`
    testing: bool,
}

/// Root store registry. Clones are handles to the same pantry.
#[derive(Clone)]
pub struct Pantry {
    inner: Arc<PantryInner>,
}

/// Builder for a [`Pantry`]
#[derive(Default)]
pub struct PantryBuilder {
    config: PantryConfig,
    devtools: Option<Arc<dyn DevtoolsHook>>,
    initial_state: StateTree,
    testing: bool,
}

impl PantryBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config`
    pub fn config(mut self, config: PantryConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the configuration from a TOML file
    pub fn config_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let config = PantryConfig::load(path)?;
        Ok(self.config(config))
    }

    /// Developer tooling to wire when the configuration enables it
    pub fn devtools(mut self, hook: Arc<dyn DevtoolsHook>) -> Self {
        self.devtools = Some(hook);
        self
    }

    /// Root state to start from (e.g. restored from a server render)
    pub fn initial_state(mut self, state: StateTree) -> Self {
        self.initial_state = state;
        self
    }

    pub(crate) fn testing(mut self) -> Self {
        self.testing = true;
        self
    }

    /// Build the pantry
    pub fn build(self) -> Pantry {
        let initial_state = self.initial_state;
        let (scope, state) = EffectScope::detached_with(move || Signal::new(initial_state));

        let mut pending: Vec<Arc<dyn Plugin>> = Vec::new();
        if self.config.devtools_enabled() {
            if let Some(plugin) = self.devtools.as_ref().and_then(|hook| hook.plugin()) {
                pending.push(plugin);
            }
        }

        let pantry = Pantry {
            inner: Arc::new(PantryInner {
                id: PantryId::next(),
                config: self.config,
                scope,
                state,
                stores: RwLock::new(HashMap::new()),
                lifecycle: Mutex::new(Lifecycle::Unattached { pending }),
                devtools: self.devtools,
                testing: self.testing,
            }),
        };

        log::debug!("{} created", pantry.id());
        pantry
    }
}

impl Pantry {
    /// Create a pantry with the default configuration
    pub fn new() -> Self {
        PantryBuilder::new().build()
    }

    /// Start building a pantry
    pub fn builder() -> PantryBuilder {
        PantryBuilder::new()
    }

    /// Pantry ID
    pub fn id(&self) -> PantryId {
        self.inner.id
    }

    /// Configuration
    pub fn config(&self) -> &PantryConfig {
        &self.inner.config
    }

    /// Root effect scope
    pub fn scope(&self) -> &EffectScope {
        &self.inner.scope
    }

    /// Root state signal (store id -> raw state)
    pub fn state(&self) -> Signal<StateTree> {
        self.inner.state.clone()
    }

    /// Plain copy of the root state, ready to serialize
    pub fn snapshot(&self) -> StateTree {
        self.inner.state.get()
    }

    /// Merge a previously taken snapshot into the root state. Stores
    /// realized afterwards adopt their entry instead of their initial state.
    pub fn hydrate(&self, tree: StateTree) -> Result<()> {
        self.ensure_not_disposed()?;
        let written = self.inner.state.update(|state| merge_tree(state, tree));
        log::debug!("{} hydrated {} store(s)", self.id(), written.len());
        Ok(())
    }

    /// Whether this pantry was created for tests
    pub fn is_testing(&self) -> bool {
        self.inner.testing
    }

    /// Check if installed into an app
    pub fn is_installed(&self) -> bool {
        matches!(*self.inner.lifecycle.lock(), Lifecycle::Attached { .. })
    }

    /// Check if disposed
    pub fn is_disposed(&self) -> bool {
        matches!(*self.inner.lifecycle.lock(), Lifecycle::Disposed)
    }

    /// App this pantry is installed into
    pub fn host(&self) -> Option<App> {
        match &*self.inner.lifecycle.lock() {
            Lifecycle::Attached { host, .. } => Some(host.clone()),
            _ => None,
        }
    }

    /// Add a plugin. Queued until install, active afterwards.
    pub fn use_plugin<P: Plugin + 'static>(&self, plugin: P) -> Result<&Self> {
        self.use_shared(Arc::new(plugin))
    }

    /// Add a closure plugin
    pub fn use_fn<F>(&self, f: F) -> Result<&Self>
    where
        F: Fn(&PluginContext<'_>) -> PluginResult + Send + Sync + 'static,
    {
        self.use_plugin(f)
    }

    /// Add a shared plugin
    pub fn use_shared(&self, plugin: Arc<dyn Plugin>) -> Result<&Self> {
        let mut lifecycle = self.inner.lifecycle.lock();
        match &mut *lifecycle {
            Lifecycle::Unattached { pending } => {
                log::debug!("{} queued plugin '{}' until install", self.id(), plugin.name());
                pending.push(plugin);
            }
            Lifecycle::Attached { plugins, .. } => {
                log::debug!("{} added plugin '{}'", self.id(), plugin.name());
                plugins.push(plugin);
            }
            Lifecycle::Disposed => return Err(PantryError::Disposed(self.id())),
        }
        Ok(self)
    }

    /// Active plugins, in application order
    pub fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        match &*self.inner.lifecycle.lock() {
            Lifecycle::Attached { plugins, .. } => plugins.snapshot(),
            _ => Vec::new(),
        }
    }

    /// Number of plugins waiting for install
    pub fn pending_plugins(&self) -> usize {
        match &*self.inner.lifecycle.lock() {
            Lifecycle::Unattached { pending } => pending.len(),
            _ => 0,
        }
    }

    /// Install into `app`.
    ///
    /// Makes this pantry active, provides it under [`PANTRY_KEY`], publishes
    /// it as the configured global property and flushes queued plugins.
    /// Installing again into the same app only re-provides it.
    pub fn install(&self, app: &App) -> Result<()> {
        let mut lifecycle = self.inner.lifecycle.lock();
        let pending = match &mut *lifecycle {
            Lifecycle::Unattached { pending } => std::mem::take(pending),
            Lifecycle::Attached { host, .. } if host.ptr_eq(app) => {
                log::warn!("{} is already installed into {}", self.id(), app.id());
                self.expose(app);
                return Ok(());
            }
            Lifecycle::Attached { host, .. } => {
                return Err(PantryError::AlreadyInstalled {
                    pantry: self.id(),
                    app: host.id(),
                });
            }
            Lifecycle::Disposed => return Err(PantryError::Disposed(self.id())),
        };

        set_active_pantry(Some(self.clone()));
        self.expose(app);

        let flushed = pending.len();
        let mut plugins = PluginPipeline::new();
        plugins.extend(pending);
        *lifecycle = Lifecycle::Attached {
            host: app.clone(),
            plugins,
        };
        drop(lifecycle);

        log::debug!(
            "{} installed into {} ({}), {} queued plugin(s) flushed",
            self.id(),
            app.id(),
            app.name(),
            flushed
        );

        if self.inner.config.devtools_enabled() {
            if let Some(hook) = &self.inner.devtools {
                hook.register(app, self);
            }
        }

        Ok(())
    }

    fn expose(&self, app: &App) {
        app.provide(&PANTRY_KEY, self.clone());
        app.set_global_property(self.inner.config.global_property.clone(), self.clone());
    }

    /// Get or create the store described by `options`.
    ///
    /// The first request for an id runs the store's setup and every active
    /// plugin; later requests return the same store. A failed realization
    /// leaves no store behind, so it can be retried.
    pub fn realize(&self, options: &StoreOptions) -> Result<Store> {
        self.ensure_not_disposed()?;
        if let Some(store) = self.store(options.id().name()) {
            return Ok(store);
        }

        set_active_pantry(Some(self.clone()));

        let id = options.id().clone();
        let store_scope = self
            .inner
            .scope
            .run(EffectScope::new)
            .ok_or(PantryError::Disposed(self.id()))?;
        let store = Store::new(id.clone(), self.inner.state.clone(), store_scope.clone());

        if let Err(err) = self.build_store(&store, options) {
            store_scope.stop();
            log::debug!("{} failed to realize store '{}': {}", self.id(), id, err);
            return Err(err);
        }

        if self.is_disposed() {
            store_scope.stop();
            return Err(PantryError::Disposed(self.id()));
        }

        let mut stores = self.inner.stores.write();
        if let Some(existing) = stores.get(&id) {
            // A setup hook or plugin realized the same id re-entrantly.
            let existing = existing.clone();
            drop(stores);
            store_scope.stop();
            return Ok(existing);
        }
        stores.insert(id.clone(), store.clone());
        drop(stores);

        log::debug!("{} realized store '{}'", self.id(), id);
        Ok(store)
    }

    fn build_store(&self, store: &Store, options: &StoreOptions) -> Result<()> {
        let id = store.id();

        store
            .scope()
            .run(|| -> Result<()> {
                let hydrated = self.inner.state.with(|tree| tree.contains_key(id.name()));
                if !hydrated {
                    let initial = options.initial_state();
                    self.inner.state.update(|tree| {
                        tree.entry(id.name().to_string()).or_insert(initial);
                    });
                }

                if let Some(setup) = options.setup_hook() {
                    setup(store).map_err(|source| PantryError::Setup {
                        store: id.clone(),
                        source,
                    })?;
                }
                Ok(())
            })
            .ok_or(PantryError::Disposed(self.id()))??;

        let attached = match &*self.inner.lifecycle.lock() {
            Lifecycle::Attached { host, plugins } => Some((host.clone(), plugins.clone())),
            Lifecycle::Unattached { .. } => None,
            Lifecycle::Disposed => return Err(PantryError::Disposed(self.id())),
        };

        match attached {
            Some((host, plugins)) => plugins.apply(self, &host, store, options),
            None => Ok(()),
        }
    }

    /// Look up a realized store
    pub fn store(&self, id: &str) -> Option<Store> {
        self.inner.stores.read().get(id).cloned()
    }

    /// Check if a store is realized
    pub fn has_store(&self, id: &str) -> bool {
        self.inner.stores.read().contains_key(id)
    }

    /// Ids of every realized store
    pub fn store_ids(&self) -> Vec<StoreId> {
        self.inner.stores.read().keys().cloned().collect()
    }

    /// Number of realized stores
    pub fn store_count(&self) -> usize {
        self.inner.stores.read().len()
    }

    /// Release everything this pantry owns.
    ///
    /// Stops the root scope (and with it every store subscription), clears
    /// the store map and the plugin list, resets root state to `{}` and
    /// drops the app relation. Disposing twice does nothing.
    pub fn dispose(&self) {
        let previous = std::mem::replace(&mut *self.inner.lifecycle.lock(), Lifecycle::Disposed);
        if let Lifecycle::Disposed = previous {
            log::warn!("{} is already disposed", self.id());
            return;
        }

        self.inner.scope.stop();

        let stores = std::mem::take(&mut *self.inner.stores.write());
        let released = stores.len();
        drop(stores);

        match previous {
            Lifecycle::Attached { host, mut plugins } => {
                plugins.clear();
                log::debug!("{} detached from {}", self.id(), host.id());
            }
            Lifecycle::Unattached { mut pending } => pending.clear(),
            Lifecycle::Disposed => {}
        }

        self.inner.state.set(empty_tree());
        log::debug!("{} disposed, {} store(s) released", self.id(), released);
    }

    /// Check if two handles refer to the same pantry
    pub fn ptr_eq(&self, other: &Pantry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn ensure_not_disposed(&self) -> Result<()> {
        if self.is_disposed() {
            Err(PantryError::Disposed(self.id()))
        } else {
            Ok(())
        }
    }
}

impl Default for Pantry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Pantry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pantry")
            .field("id", &self.inner.id)
            .field("phase", &self.inner.lifecycle.lock().name())
            .field("stores", &self.store_count())
            .field("testing", &self.inner.testing)
            .finish()
    }
}

/// Create a pantry with the default configuration
pub fn create_pantry() -> Pantry {
    Pantry::new()
}

/// Dispose `pantry`; see [`Pantry::dispose`]
pub fn dispose_pantry(pantry: &Pantry) {
    pantry.dispose();
}
