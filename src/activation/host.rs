//! Component host seam.
//!
//! The router never renders anything itself. It asks a `ComponentHost` to create,
//! destroy, detach and re-attach component instances and keeps the returned handles
//! in outlet contexts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::guards::injector::Injector;
use crate::routing::route::ComponentRef;
use crate::state::activated::ActivatedRoute;

/// Identifies one live component instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentHandle {
    id: u64,
    component: ComponentRef,
}

impl ComponentHandle {
    pub fn new(id: u64, component: ComponentRef) -> Self {
        Self { id, component }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn component(&self) -> &ComponentRef {
        &self.component
    }
}

/// Creates and destroys component instances for activated routes.
pub trait ComponentHost: Send + Sync {
    /// Instantiate `component` for `route`, constructed against `injector`.
    fn create(&self, component: &ComponentRef, route: &Arc<ActivatedRoute>, injector: &Arc<Injector>) -> ComponentHandle;

    fn destroy(&self, handle: &ComponentHandle);

    /// A stored instance is put back into an outlet.
    fn attach(&self, _handle: &ComponentHandle, _route: &Arc<ActivatedRoute>) {}

    /// An instance is taken out of its outlet but kept alive.
    fn detach(&self, _handle: &ComponentHandle) {}
}

/// Host that only logs and tracks live instances.
#[derive(Debug, Default)]
pub struct TracingHost {
    next_id: AtomicU64,
    live: DashMap<u64, ComponentRef>,
}

impl TracingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of live components, ordered by creation.
    pub fn live(&self) -> Vec<String> {
        let mut live: Vec<(u64, String)> = self
            .live
            .iter()
            .map(|entry| (*entry.key(), entry.value().name().to_string()))
            .collect();
        live.sort();
        live.into_iter().map(|(_, name)| name).collect()
    }
}

impl ComponentHost for TracingHost {
    fn create(&self, component: &ComponentRef, route: &Arc<ActivatedRoute>, injector: &Arc<Injector>) -> ComponentHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.live.insert(id, component.clone());
        tracing::info!(
            component = %component,
            instance = id,
            outlet = route.outlet(),
            injector = injector.name(),
            "Component created"
        );
        ComponentHandle::new(id, component.clone())
    }

    fn destroy(&self, handle: &ComponentHandle) {
        self.live.remove(&handle.id);
        tracing::info!(component = %handle.component, instance = handle.id, "Component destroyed");
    }

    fn attach(&self, handle: &ComponentHandle, route: &Arc<ActivatedRoute>) {
        tracing::info!(component = %handle.component, instance = handle.id, outlet = route.outlet(), "Component attached");
    }

    fn detach(&self, handle: &ComponentHandle) {
        tracing::info!(component = %handle.component, instance = handle.id, "Component detached");
    }
}
