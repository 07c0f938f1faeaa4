//! Developer tooling boundary
//!
//! Tooling is wired only when [`PantryConfig::devtools_enabled`] is true
//! (development build running on the client):
//!
//! - at construction, [`DevtoolsHook::plugin`] is queued like any plugin
//! - at install, [`DevtoolsHook::register`] receives the app and pantry
//!
//! [`PantryConfig::devtools_enabled`]: pantry_core::PantryConfig::devtools_enabled

use std::sync::Arc;

use pantry_host::App;

use crate::plugin::Plugin;
use crate::registry::Pantry;

/// Connects a pantry to developer tooling
pub trait DevtoolsHook: Send + Sync {
    /// Called once the pantry is installed into `app`
    fn register(&self, app: &App, pantry: &Pantry);

    /// Plugin that observes every store, if the tooling needs one
    fn plugin(&self) -> Option<Arc<dyn Plugin>> {
        None
    }
}
