//! Route tables read from TOML, driven through a router.

use std::fs;
use std::sync::Arc;

use navigation_engine::config::{load_config, OnSameUrlNavigation, UrlUpdateStrategy};
use navigation_engine::guards::{CanActivateGuard, Injector, Resolver};
use navigation_engine::navigation::location::Location;
use navigation_engine::navigation::{MemoryLocation, NavigationBehaviorOptions, Router};
use serde_json::json;

mod common;

use common::RecordingHost;

const MAIN: &str = r#"
[router]
url_update_strategy = "eager"
on_same_url_navigation = "reload"

[observability]
log_level = "debug"

[[routes]]
path = ""
path_match = "full"
redirect_to = "home"

[[routes]]
path = "home"
component = "Home"

[[routes]]
path = "vault"
component = "Vault"
can_activate = ["deny"]

[[routes]]
path = "shop"
load_children = "shop.toml"
"#;

const SHOP: &str = r#"
[[routes]]
path = ":item"
component = "Item"
resolve = { item = "echo" }
"#;

fn injector() -> Arc<Injector> {
    Injector::builder("test")
        .can_activate("deny", CanActivateGuard::from_sync(|_, _| false))
        .resolver("echo", Resolver::value(|route| json!(route.param("item"))))
        .build()
}

#[tokio::test]
async fn test_route_file_drives_navigation() {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("routes.toml");
    fs::write(&main, MAIN).unwrap();
    fs::write(dir.path().join("shop.toml"), SHOP).unwrap();

    let config = load_config(&main).unwrap();
    assert_eq!(config.router.url_update_strategy, UrlUpdateStrategy::Eager);
    assert_eq!(config.router.on_same_url_navigation, OnSameUrlNavigation::Reload);
    assert_eq!(config.observability.log_level, "debug");

    let injector = injector();
    let routes = config.build_routes(&injector, dir.path()).unwrap();
    let host = RecordingHost::new();
    let location = Arc::new(MemoryLocation::default());
    let router = Router::builder(routes)
        .options(config.router.clone())
        .injector(injector)
        .host(host.clone())
        .location(Arc::clone(&location) as Arc<dyn Location>)
        .build()
        .unwrap();

    assert!(router.initial_navigation().await.unwrap());
    assert_eq!(router.url(), "/home");

    assert!(!router.navigate_by_url("/vault", NavigationBehaviorOptions::default()).await.unwrap());
    assert_eq!(router.url(), "/home");
    assert_eq!(location.path(), "/home");

    assert!(router.navigate_by_url("/shop/lamp", NavigationBehaviorOptions::default()).await.unwrap());
    assert_eq!(router.snapshot().primary_leaf().data.get("item"), Some(&json!("lamp")));

    // Reload mode re-runs the same URL instead of skipping it.
    assert!(router.navigate_by_url("/shop/lamp", NavigationBehaviorOptions::default()).await.unwrap());
    assert_eq!(host.log.entries(), vec!["create:Home@test", "destroy:Home", "create:Item@test"]);
}

#[test]
fn test_invalid_options_are_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("routes.toml");
    fs::write(&main, "[router]\nmax_redirects = 0\n\n[observability]\nlog_level = \"loud\"\n").unwrap();

    let message = load_config(&main).unwrap_err().to_string();
    assert!(message.contains("router.max_redirects"), "{message}");
    assert!(message.contains("observability.log_level"), "{message}");
}

#[test]
fn test_invalid_route_table_reports_every_problem() {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("routes.toml");
    fs::write(
        &main,
        r#"
[[routes]]
path = "/absolute"
component = "A"

[[routes]]
path = "empty"
"#,
    )
    .unwrap();

    let config = load_config(&main).unwrap();
    let routes = config.build_routes(&Injector::empty(), dir.path()).unwrap();
    let message = Router::builder(routes).build().err().unwrap().to_string();
    assert!(message.contains("/absolute"), "{message}");
    assert!(message.contains("empty"), "{message}");
}
