//! Pantries for tests
//!
//! A testing pantry is installed into a throwaway app and made active.
//! While it is the active pantry, store accessors use it even when another
//! pantry is passed explicitly, so code under test cannot escape it.

use std::sync::Arc;

use pantry_core::{PantryConfig, StateTree};
use pantry_host::App;

use crate::plugin::Plugin;
use crate::registry::{Pantry, PantryBuilder};
use crate::Result;

/// Options for [`create_testing_pantry`]
#[derive(Default)]
pub struct TestingOptions {
    /// Root state to start from
    pub initial_state: StateTree,
    /// Plugins to add before install
    pub plugins: Vec<Arc<dyn Plugin>>,
    /// App to install into; a fresh app named `"testing"` by default
    pub app: Option<App>,
    /// Configuration; the default one when `None`
    pub config: Option<PantryConfig>,
}

/// Create, install and activate a testing pantry
pub fn create_testing_pantry(options: TestingOptions) -> Result<Pantry> {
    let TestingOptions {
        initial_state,
        plugins,
        app,
        config,
    } = options;

    let pantry = PantryBuilder::new()
        .config(config.unwrap_or_default())
        .initial_state(initial_state)
        .testing()
        .build();

    for plugin in plugins {
        pantry.use_shared(plugin)?;
    }

    let app = app.unwrap_or_else(|| App::new("testing"));
    pantry.install(&app)?;

    log::debug!("{} ready for testing", pantry.id());
    Ok(pantry)
}
