//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use navigation_engine::activation::{ComponentHandle, ComponentHost};
use navigation_engine::guards::{CanActivateGuard, GuardResult, Injector};
use navigation_engine::navigation::RouterEvent;
use navigation_engine::routing::ComponentRef;
use navigation_engine::state::ActivatedRoute;
use tokio::sync::broadcast;

/// Ordered log shared between guards, hosts and assertions.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// A `can_activate` guard that records its name and returns `result`.
pub fn recording_guard(log: &CallLog, name: &'static str, result: impl Into<GuardResult>) -> CanActivateGuard {
    let log = log.clone();
    let result = result.into();
    CanActivateGuard::from_sync(move |_, _| {
        log.push(name);
        result.clone()
    })
}

/// Like [`recording_guard`], but only decides after `delay`.
pub fn slow_guard(log: &CallLog, name: &'static str, delay: Duration, result: bool) -> CanActivateGuard {
    let log = log.clone();
    CanActivateGuard::from_fn(move |_, _| {
        let log = log.clone();
        log.push(format!("{name}:start"));
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            log.push(format!("{name}:end"));
            Ok(GuardResult::from(result))
        })
    })
}

/// Host that logs `create:Name`, `destroy:Name`, `attach:Name`, `detach:Name`.
#[derive(Default)]
pub struct RecordingHost {
    next_id: AtomicU64,
    pub log: CallLog,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl ComponentHost for RecordingHost {
    fn create(&self, component: &ComponentRef, _route: &Arc<ActivatedRoute>, injector: &Arc<Injector>) -> ComponentHandle {
        self.log.push(format!("create:{}@{}", component.name(), injector.name()));
        ComponentHandle::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1, component.clone())
    }

    fn destroy(&self, handle: &ComponentHandle) {
        self.log.push(format!("destroy:{}", handle.component().name()));
    }

    fn attach(&self, handle: &ComponentHandle, _route: &Arc<ActivatedRoute>) {
        self.log.push(format!("attach:{}", handle.component().name()));
    }

    fn detach(&self, handle: &ComponentHandle) {
        self.log.push(format!("detach:{}", handle.component().name()));
    }
}

/// Everything already sitting in the receiver.
pub fn drain(rx: &mut broadcast::Receiver<RouterEvent>) -> Vec<RouterEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn kinds(events: &[RouterEvent]) -> Vec<&'static str> {
    events.iter().map(RouterEvent::kind).collect()
}

/// Receive until a terminal event for navigation `id` arrives, or give up after a second.
pub async fn wait_for_terminal(rx: &mut broadcast::Receiver<RouterEvent>, id: u64) -> Vec<RouterEvent> {
    let mut events = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(1), async {
        while let Ok(event) = rx.recv().await {
            let done = event.is_terminal() && event.id() == Some(id);
            events.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    events
}
