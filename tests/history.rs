//! Location and history integration.

use std::sync::Arc;
use std::time::Duration;

use navigation_engine::config::{RouterOptions, UrlUpdateStrategy};
use navigation_engine::navigation::location::Location;
use navigation_engine::navigation::{
    MemoryLocation, NavigationBehaviorOptions, NavigationTrigger, Router, RouterEvent,
};
use navigation_engine::routing::{PathMatch, Route};
use serde_json::json;

mod common;

use common::{kinds, recording_guard, wait_for_terminal, CallLog};

fn routes() -> Vec<Route> {
    vec![
        Route::new("").with_path_match(PathMatch::Full).with_component("Home"),
        Route::new("a").with_component("A"),
        Route::new("b").with_component("B"),
    ]
}

fn router_at(location: &Arc<MemoryLocation>, options: RouterOptions) -> Router {
    Router::builder(routes())
        .options(options)
        .location(Arc::clone(location) as Arc<dyn Location>)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_initial_navigation_uses_location_path() {
    let location = Arc::new(MemoryLocation::new("/b"));
    let router = router_at(&location, RouterOptions::default());

    assert!(router.initial_navigation().await.unwrap());
    assert_eq!(router.url(), "/b");
    assert_eq!(location.entries(), vec!["/b"]);
    assert_eq!(location.state().map(|s| s.navigation_id), Some(1));
}

#[tokio::test]
async fn test_navigations_push_and_replace_entries() {
    let location = Arc::new(MemoryLocation::default());
    let router = router_at(&location, RouterOptions::default());

    router.navigate_by_url("/a", NavigationBehaviorOptions::default()).await.unwrap();
    router.navigate_by_url("/b", NavigationBehaviorOptions::default()).await.unwrap();
    assert_eq!(location.entries(), vec!["/", "/a", "/b"]);

    let replace = NavigationBehaviorOptions {
        replace_url: true,
        state: Some(json!({ "scroll": 120 })),
        ..NavigationBehaviorOptions::default()
    };
    router.navigate_by_url("/a", replace).await.unwrap();
    assert_eq!(location.entries(), vec!["/", "/a", "/a"]);
    assert_eq!(location.state().and_then(|s| s.extra), Some(json!({ "scroll": 120 })));
}

#[tokio::test]
async fn test_back_button_triggers_popstate_navigation() {
    let location = Arc::new(MemoryLocation::default());
    let router = router_at(&location, RouterOptions::default());
    router.start_location_listener();

    let extras = NavigationBehaviorOptions {
        state: Some(json!("from-a")),
        ..NavigationBehaviorOptions::default()
    };
    router.navigate_by_url("/a", extras).await.unwrap();
    router.navigate_by_url("/b", NavigationBehaviorOptions::default()).await.unwrap();

    let mut rx = router.events();
    assert!(location.back());
    let events = wait_for_terminal(&mut rx, 3).await;

    assert_eq!(kinds(&events).last(), Some(&"NavigationEnd"));
    match &events[0] {
        RouterEvent::NavigationStart {
            trigger, restored_state, ..
        } => {
            assert_eq!(*trigger, NavigationTrigger::Popstate);
            let restored = restored_state.clone().unwrap();
            assert_eq!(restored.navigation_id, 1);
            assert_eq!(restored.extra, Some(json!("from-a")));
        }
        other => panic!("unexpected first event {other}"),
    }
    assert_eq!(router.url(), "/a");
    // Popstate navigations replace rather than push.
    assert_eq!(location.entries(), vec!["/", "/a", "/b"]);
    assert_eq!(location.index(), 1);

    router.dispose();
}

#[tokio::test]
async fn test_disposed_router_ignores_popstate() {
    let location = Arc::new(MemoryLocation::default());
    let router = router_at(&location, RouterOptions::default());
    router.start_location_listener();
    router.navigate_by_url("/a", NavigationBehaviorOptions::default()).await.unwrap();

    router.dispose();
    let mut rx = router.events();
    assert!(location.back());
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(rx.try_recv().is_err());
    assert_eq!(router.url(), "/a");
}

#[tokio::test]
async fn test_deferred_update_happens_only_on_commit() {
    let log = CallLog::new();
    let location = Arc::new(MemoryLocation::default());
    let router = Router::builder(vec![Route::new("locked")
        .with_component("Locked")
        .with_can_activate(recording_guard(&log, "lock", false))])
    .location(Arc::clone(&location) as Arc<dyn Location>)
    .build()
    .unwrap();

    assert!(!router.navigate_by_url("/locked", NavigationBehaviorOptions::default()).await.unwrap());
    assert_eq!(location.entries(), vec!["/"]);
}

#[tokio::test]
async fn test_eager_update_happens_before_guards() {
    let location = Arc::new(MemoryLocation::default());
    let seen = Arc::new(std::sync::Mutex::new(None));
    let probe = {
        let location = Arc::clone(&location);
        let seen = Arc::clone(&seen);
        navigation_engine::guards::CanActivateGuard::from_sync(move |_, _| {
            *seen.lock().unwrap() = Some(location.path());
            true
        })
    };
    let router = Router::builder(vec![Route::new("a").with_component("A").with_can_activate(probe)])
        .options(RouterOptions {
            url_update_strategy: UrlUpdateStrategy::Eager,
            ..RouterOptions::default()
        })
        .location(Arc::clone(&location) as Arc<dyn Location>)
        .build()
        .unwrap();

    assert!(router.navigate_by_url("/a", NavigationBehaviorOptions::default()).await.unwrap());
    assert_eq!(seen.lock().unwrap().as_deref(), Some("/a"));
    assert_eq!(location.entries(), vec!["/", "/a"]);
}
