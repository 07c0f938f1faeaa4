//! Server rendering with one pantry per request
//!
//! Each request thread builds its own pantry and app, realizes stores
//! inside the app's context, and ships the root state as JSON. A client
//! pantry then hydrates from that payload.

use std::thread;

use pantry::prelude::*;
use pantry::{named_plugin, PantryConfig, StateTree};
use pantry_core::{tree_from_json, tree_to_json};
use serde_json::json;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let use_cart = define_store(StoreOptions::new("cart").state(|| json!({ "items": [] })));

    let handles: Vec<_> = ["apples", "pears", "plums"]
        .into_iter()
        .enumerate()
        .map(|(request, item)| {
            let use_cart = use_cart.clone();
            thread::spawn(move || -> pantry::Result<StateTree> {
                let server = Pantry::builder().config(PantryConfig::server()).build();
                server.use_plugin(named_plugin("request-tag", move |_ctx: &PluginContext<'_>| {
                    Ok(Some(StoreProperties::new().with("$request", request)))
                }))?;

                let app = App::new(format!("request-{request}"));
                server.install(&app)?;

                app.run_with_context(|| -> pantry::Result<()> {
                    let cart = use_cart.get(None)?;
                    cart.patch(|state| state["items"] = json!([item]))?;
                    Ok(())
                })?;

                let state = server.snapshot();
                dispose_pantry(&server);
                Ok(state)
            })
        })
        .collect();

    for handle in handles {
        let state = match handle.join() {
            Ok(Ok(state)) => state,
            Ok(Err(err)) => {
                log::error!("request failed: {err}");
                continue;
            }
            Err(_) => {
                log::error!("request thread panicked");
                continue;
            }
        };
        let payload = match tree_to_json(&state) {
            Ok(payload) => payload,
            Err(err) => {
                log::error!("cannot serialize state: {err}");
                continue;
            }
        };
        log::info!("rendered state: {payload}");

        let tree = match tree_from_json(&payload) {
            Ok(tree) => tree,
            Err(err) => {
                log::error!("bad payload: {err}");
                continue;
            }
        };
        let client = Pantry::builder().initial_state(tree).build();
        match use_cart.get(Some(&client)) {
            Ok(cart) => log::info!("{} hydrated cart: {}", client.id(), cart.state()),
            Err(err) => log::error!("hydration failed: {err}"),
        }
        client.dispose();
    }
}
