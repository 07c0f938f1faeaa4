//! Integration tests for pantry

use std::sync::Arc;
use std::thread;

use pantry::*;
use parking_lot::Mutex;
use serde_json::json;
use serial_test::serial;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn prop(
    key: &'static str,
    value: &'static str,
) -> NamedPlugin<impl Fn(&PluginContext<'_>) -> PluginResult + Send + Sync> {
    named_plugin(key, move |_ctx: &PluginContext<'_>| {
        Ok(Some(StoreProperties::new().with(key, value.to_string())))
    })
}

fn text(store: &Store, key: &str) -> Option<String> {
    store.property::<String>(key).map(|value| value.as_ref().clone())
}

#[test]
#[serial]
fn test_end_to_end() {
    init_logger();
    let pantry = create_pantry();
    pantry.use_plugin(prop("ext_a", "a")).unwrap();

    let app = App::new("shop");
    pantry.install(&app).unwrap();
    pantry.use_plugin(prop("ext_b", "b")).unwrap();

    let use_counter = define_store(StoreOptions::new("counter").state(|| json!({ "count": 0 })));
    let counter = use_counter.get(None).unwrap();

    assert_eq!(text(&counter, "ext_a").as_deref(), Some("a"));
    assert_eq!(text(&counter, "ext_b").as_deref(), Some("b"));
    assert!(pantry.snapshot().contains_key("counter"));
    assert!(pantry.store("counter").unwrap().ptr_eq(&counter));

    dispose_pantry(&pantry);
    assert_eq!(pantry.store_count(), 0);
    assert!(pantry.snapshot().is_empty());
    assert!(pantry.plugins().is_empty());
    assert!(pantry.host().is_none());
}

#[test]
#[serial]
fn test_singleton_per_id() {
    let pantry = Pantry::new();
    let options = StoreOptions::new("user");

    let stores: Vec<Store> = (0..5).map(|_| pantry.realize(&options).unwrap()).collect();

    assert!(stores.iter().all(|store| store.ptr_eq(&stores[0])));
    assert_eq!(pantry.store_ids(), vec![StoreId::new("user")]);
}

#[test]
#[serial]
fn test_later_plugin_overwrites() {
    let pantry = Pantry::new();
    pantry.install(&App::new("app")).unwrap();
    pantry.use_plugin(prop("shared", "first")).unwrap();
    pantry.use_plugin(prop("shared", "second")).unwrap();

    let store = pantry.realize(&StoreOptions::new("s")).unwrap();
    assert_eq!(text(&store, "shared").as_deref(), Some("second"));
}

#[test]
#[serial]
fn test_plugins_see_earlier_merges() {
    let pantry = Pantry::new();
    pantry.install(&App::new("app")).unwrap();
    pantry.use_plugin(prop("base", "1")).unwrap();
    pantry
        .use_fn(|ctx| {
            let seen = ctx.store.has_property("base");
            Ok(Some(StoreProperties::new().with("saw_base", seen)))
        })
        .unwrap();

    let store = pantry.realize(&StoreOptions::new("s")).unwrap();
    assert_eq!(store.property::<bool>("saw_base").as_deref(), Some(&true));
}

#[test]
#[serial]
fn test_pending_flush_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let recorder = |name: &'static str| {
        let order = order.clone();
        named_plugin(name, move |_ctx: &PluginContext<'_>| {
            order.lock().push(name);
            Ok(None)
        })
    };

    let pantry = Pantry::new();
    pantry.use_plugin(recorder("a")).unwrap();
    pantry.use_plugin(recorder("b")).unwrap();
    pantry.install(&App::new("app")).unwrap();
    pantry.use_plugin(recorder("c")).unwrap();

    let names: Vec<String> = pantry.plugins().iter().map(|p| p.name().to_string()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);

    pantry.realize(&StoreOptions::new("s")).unwrap();
    assert_eq!(*order.lock(), vec!["a", "b", "c"]);
}

#[test]
#[serial]
fn test_plugin_context_fields() {
    let pantry = Pantry::new();
    let app = App::new("ctx");
    pantry.install(&app).unwrap();

    let seen = Arc::new(Mutex::new(None));
    let s = seen.clone();
    pantry
        .use_fn(move |ctx| {
            *s.lock() = Some((
                ctx.pantry.id(),
                ctx.host.name().to_string(),
                ctx.store.id().to_string(),
                ctx.options.get_option("persist").cloned(),
            ));
            Ok(None)
        })
        .unwrap();

    pantry
        .realize(&StoreOptions::new("prefs").option("persist", true))
        .unwrap();

    let (pantry_id, host, store, persist) = seen.lock().take().unwrap();
    assert_eq!(pantry_id, pantry.id());
    assert_eq!(host, "ctx");
    assert_eq!(store, "prefs");
    assert_eq!(persist, Some(json!(true)));
}

#[test]
#[serial]
fn test_failed_plugin_does_not_poison_registry() {
    let pantry = Pantry::new();
    pantry.install(&App::new("app")).unwrap();

    let fail = Arc::new(Mutex::new(true));
    let f = fail.clone();
    pantry
        .use_plugin(named_plugin("flaky", move |ctx: &PluginContext<'_>| {
            if *f.lock() && ctx.store.id().name() == "cart" {
                Err(ExtensionError::msg("storage unavailable"))
            } else {
                Ok(None)
            }
        }))
        .unwrap();

    let options = StoreOptions::new("cart").state(|| json!({ "items": [] }));
    match pantry.realize(&options) {
        Err(PantryError::Plugin { store, plugin, .. }) => {
            assert_eq!(store.name(), "cart");
            assert_eq!(plugin, "flaky");
        }
        other => panic!("expected plugin error, got {other:?}"),
    }
    assert!(!pantry.has_store("cart"));
    assert!(pantry.realize(&StoreOptions::new("unrelated")).is_ok());

    *fail.lock() = false;
    let cart = pantry.realize(&options).unwrap();
    assert!(pantry.store("cart").unwrap().ptr_eq(&cart));
    assert_eq!(cart.state(), json!({ "items": [] }));
    assert!(cart.is_active());
}

#[test]
#[serial]
fn test_dispose_stops_store_subscriptions() {
    let pantry = Pantry::new();
    let store = pantry.realize(&StoreOptions::new("counter")).unwrap();

    let calls = Arc::new(Mutex::new(0));
    let c = calls.clone();
    store.subscribe(move |_| *c.lock() += 1).unwrap();
    store.set_state(json!({ "count": 1 })).unwrap();
    assert_eq!(*calls.lock(), 1);

    pantry.dispose();

    assert!(!store.is_active());
    assert!(!pantry.scope().is_active());
    assert_eq!(pantry.state().subscriber_count(), 0);
    assert!(matches!(store.set_state(json!({})), Err(PantryError::StoreDisposed(_))));
    assert_eq!(*calls.lock(), 1);
}

#[test]
#[serial]
fn test_context_precedence() {
    let x = Pantry::new();
    let app = App::new("x");
    x.install(&app).unwrap();

    let y = Pantry::new();
    set_active_pantry(Some(y.clone()));

    app.run_with_context(|| {
        assert!(get_active_pantry().unwrap().ptr_eq(&x));
    });
    assert!(get_active_pantry().unwrap().ptr_eq(&y));
}

#[test]
#[serial]
fn test_reinstall_and_second_host() {
    let pantry = Pantry::new();
    let first = App::new("first");
    pantry.install(&first).unwrap();
    pantry.install(&first).unwrap();

    let second = App::new("second");
    let err = pantry.install(&second).unwrap_err();
    assert!(matches!(err, PantryError::AlreadyInstalled { .. }));
    assert!(pantry.host().unwrap().ptr_eq(&first));
}

#[test]
#[serial]
fn test_custom_global_property() {
    let config = PantryConfig::from_toml_str("global_property = \"$store\"").unwrap();
    let pantry = Pantry::builder().config(config).build();
    let app = App::new("app");
    pantry.install(&app).unwrap();

    assert!(app.global_property::<Pantry>("$store").is_some());
    assert!(app.global_property::<Pantry>(DEFAULT_GLOBAL_PROPERTY).is_none());
}

#[test]
#[serial]
fn test_server_snapshot_hydrates_client() {
    let use_counter = define_store(StoreOptions::new("counter").state(|| json!({ "count": 0 })));

    let server = Pantry::builder().config(PantryConfig::server()).build();
    let counter = use_counter.get(Some(&server)).unwrap();
    counter.patch(|state| state["count"] = json!(5)).unwrap();
    let payload = pantry_core::tree_to_json(&server.snapshot()).unwrap();
    server.dispose();

    let client = Pantry::builder()
        .initial_state(pantry_core::tree_from_json(&payload).unwrap())
        .build();
    let counter = use_counter.get(Some(&client)).unwrap();
    assert_eq!(counter.state(), json!({ "count": 5 }));
}

#[test]
#[serial]
fn test_concurrent_requests_are_isolated() {
    init_logger();
    let use_session = define_store(StoreOptions::new("session").state(|| json!({ "user": null })));

    let handles: Vec<_> = (0..8)
        .map(|request| {
            let use_session = use_session.clone();
            thread::spawn(move || {
                let pantry = Pantry::builder().config(PantryConfig::server()).build();
                let app = App::new(format!("request-{request}"));
                pantry.install(&app).unwrap();

                let user = app.run_with_context(|| {
                    let session = use_session.get(None).unwrap();
                    session.patch(|state| state["user"] = json!(request)).unwrap();
                    let resolved = get_active_pantry().unwrap();
                    assert!(resolved.ptr_eq(&pantry));
                    session.state()["user"].clone()
                });

                pantry.dispose();
                user
            })
        })
        .collect();

    for (request, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), json!(request));
    }
}
