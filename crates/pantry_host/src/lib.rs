//! # Pantry Host
//!
//! The host application a pantry installs into.
//!
//! An [`App`] carries two tables:
//! - **Provides**: values keyed by an [`InjectionKey`], readable with
//!   [`inject`] from code running inside the app's context
//! - **Global properties**: named values any code holding the app can read
//!
//! ## Usage
//!
//! ```ignore
//! static THEME: InjectionKey<String> = InjectionKey::new("theme");
//!
//! let app = App::new("shop");
//! app.provide(&THEME, "dark".to_string());
//!
//! app.run_with_context(|| {
//!     assert_eq!(inject(&THEME).as_deref(), Some("dark"));
//! });
//! ```

pub mod app;
pub mod inject;

pub use app::{App, AppId};
pub use inject::{current_app, has_injection_context, inject, InjectionKey};
