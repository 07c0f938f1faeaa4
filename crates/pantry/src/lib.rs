//! # Pantry
//!
//! Root registry for reactive stores.
//!
//! Every store of an application registers itself against one [`Pantry`].
//! The pantry:
//! - Resolves which instance is active at any call site, preferring the
//!   host app's injection context over the process-wide slot
//! - Runs every store through an ordered plugin pipeline at realization
//! - Owns a detached effect scope, so one [`Pantry::dispose`] releases
//!   every subscription its stores created
//!
//! ## Lifecycle
//!
//! ```text
//! Unattached ──install(app)──► Attached ──dispose()──► Disposed
//!     │ use_plugin: queued          │ use_plugin: active
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let pantry = Pantry::new();
//! pantry.use_fn(|ctx| Ok(Some(StoreProperties::new().with("$app", ctx.host.name().to_string()))))?;
//!
//! let app = App::new("shop");
//! pantry.install(&app)?;
//!
//! let use_counter = define_store(StoreOptions::new("counter").state(|| json!({ "count": 0 })));
//! let counter = use_counter.get(None)?;
//! counter.patch(|state| state["count"] = json!(1))?;
//!
//! pantry.dispose();
//! ```

pub mod active;
pub mod define;
pub mod devtools;
pub mod plugin;
pub mod registry;
pub mod store;
pub mod testing;

pub use active::{
    context_pantry, get_active_pantry, global_active_pantry, resolve_pantry, set_active_pantry,
};
pub use define::{define_store, UseStore};
pub use devtools::DevtoolsHook;
pub use registry::{create_pantry, dispose_pantry, Pantry, PantryBuilder, PANTRY_KEY};
pub use plugin::{
    named_plugin, ExtensionError, NamedPlugin, Plugin, PluginContext, PluginPipeline, PluginResult,
    StoreProperties,
};
pub use store::{SetupFn, StateFn, Store, StoreOptions};
pub use testing::{create_testing_pantry, TestingOptions};

pub use pantry_core::{
    ConfigError, Environment, PantryConfig, PantryId, StateTree, StateValue, StoreId,
    DEFAULT_GLOBAL_PROPERTY,
};
pub use pantry_host::{App, AppId, InjectionKey};
pub use pantry_reactive::{EffectScope, Signal, Subscription};

use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum PantryError {
    #[error("no active pantry: install one into an app or pass it explicitly")]
    NoActivePantry,

    #[error("{0} has been disposed")]
    Disposed(PantryId),

    #[error("store '{0}' belongs to a disposed pantry")]
    StoreDisposed(StoreId),

    #[error("{pantry} is already installed into {app}")]
    AlreadyInstalled { pantry: PantryId, app: AppId },

    #[error("plugin '{plugin}' failed while extending store '{store}': {source}")]
    Plugin {
        store: StoreId,
        plugin: String,
        #[source]
        source: ExtensionError,
    },

    #[error("setup of store '{store}' failed: {source}")]
    Setup {
        store: StoreId,
        #[source]
        source: ExtensionError,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, PantryError>;

/// Prelude
pub mod prelude {
    pub use crate::{
        create_pantry, define_store, dispose_pantry, get_active_pantry, set_active_pantry, App,
        ExtensionError, Pantry, PantryError, Plugin, PluginContext, PluginResult, Store,
        StoreOptions, StoreProperties,
    };
}
