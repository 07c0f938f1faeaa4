//! Plugin pipeline - extends every store at realization
//!
//! A plugin is called once per store, in registration order, with a
//! [`PluginContext`]. It may hand back [`StoreProperties`] to merge onto
//! the store; later plugins see (and may overwrite) what earlier ones
//! added.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use pantry_host::App;
use thiserror::Error;

use crate::registry::Pantry;
use crate::store::{Store, StoreOptions};
use crate::{PantryError, Result};

/// Error raised by a plugin or a store setup hook
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ExtensionError {
    /// Create an error from a message
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl From<&str> for ExtensionError {
    fn from(s: &str) -> Self {
        Self::Message(s.to_string())
    }
}

impl From<String> for ExtensionError {
    fn from(s: String) -> Self {
        Self::Message(s)
    }
}

/// Result of invoking a plugin
pub type PluginResult = std::result::Result<Option<StoreProperties>, ExtensionError>;

/// Type-erased properties a plugin adds to a store
#[derive(Clone, Default)]
pub struct StoreProperties {
    entries: BTreeMap<String, Arc<dyn Any + Send + Sync>>,
}

impl StoreProperties {
    /// Create an empty property set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a property, replacing any previous value under `key`
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Arc::new(value));
    }

    /// Retrieve a property
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        Arc::clone(self.entries.get(key)?).downcast::<T>().ok()
    }

    /// Check if a property exists
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Property names in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `other` into `self`; entries of `other` win
    pub fn merge(&mut self, other: StoreProperties) {
        self.entries.extend(other.entries);
    }
}

impl fmt::Debug for StoreProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Context provided to plugins for each realized store
pub struct PluginContext<'a> {
    /// Pantry the store belongs to
    pub pantry: &'a Pantry,
    /// App the pantry is installed into
    pub host: &'a App,
    /// Store being extended
    pub store: &'a Store,
    /// Options the store was defined with
    pub options: &'a StoreOptions,
}

/// The plugin trait - one call per realized store
pub trait Plugin: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Extend a store. Return properties to merge, or `None`.
    fn extend(&self, ctx: &PluginContext<'_>) -> PluginResult;
}

impl<F> Plugin for F
where
    F: Fn(&PluginContext<'_>) -> PluginResult + Send + Sync,
{
    fn extend(&self, ctx: &PluginContext<'_>) -> PluginResult {
        self(ctx)
    }
}

/// A closure plugin with a readable name
pub struct NamedPlugin<F> {
    name: String,
    f: F,
}

impl<F> Plugin for NamedPlugin<F>
where
    F: Fn(&PluginContext<'_>) -> PluginResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn extend(&self, ctx: &PluginContext<'_>) -> PluginResult {
        (self.f)(ctx)
    }
}

/// Give a closure plugin a name
pub fn named_plugin<F>(name: impl Into<String>, f: F) -> NamedPlugin<F>
where
    F: Fn(&PluginContext<'_>) -> PluginResult + Send + Sync,
{
    NamedPlugin {
        name: name.into(),
        f,
    }
}

/// Ordered list of active plugins
#[derive(Clone, Default)]
pub struct PluginPipeline {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginPipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin
    pub fn push(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// Append plugins in order
    pub fn extend(&mut self, plugins: impl IntoIterator<Item = Arc<dyn Plugin>>) {
        self.plugins.extend(plugins);
    }

    /// Remove every plugin
    pub fn clear(&mut self) {
        self.plugins.clear();
    }

    /// Copy of the plugin list
    pub fn snapshot(&self) -> Vec<Arc<dyn Plugin>> {
        self.plugins.clone()
    }

    /// Number of plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run every plugin against `store`, in order, inside the store's
    /// scope, merging returned properties as they arrive.
    pub fn apply(
        &self,
        pantry: &Pantry,
        host: &App,
        store: &Store,
        options: &StoreOptions,
    ) -> Result<()> {
        let ctx = PluginContext {
            pantry,
            host,
            store,
            options,
        };

        for plugin in &self.plugins {
            let outcome = store
                .scope()
                .run(|| plugin.extend(&ctx))
                .ok_or(PantryError::Disposed(pantry.id()))?;

            match outcome {
                Ok(Some(properties)) => store.merge_properties(properties),
                Ok(None) => {}
                Err(source) => {
                    return Err(PantryError::Plugin {
                        store: store.id().clone(),
                        plugin: plugin.name().to_string(),
                        source,
                    });
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for PluginPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| p.name()))
            .finish()
    }
}
