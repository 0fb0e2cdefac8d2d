//! Outlet contexts.
//!
//! # Responsibilities
//! - Track, per outlet name, which route and component instance currently fill it
//! - Nest: every outlet context owns the contexts of the outlets inside its component
//! - Hand a whole subtree of contexts over when a route is detached, and take it back
//!
//! # Design Decisions
//! - Locks are held only to read or swap a slot, never across host calls or recursion
//! - Contexts are created on demand; an outlet nobody activated simply has an empty slot

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::activation::host::ComponentHandle;
use crate::guards::injector::Injector;
use crate::routing::route::ComponentRef;
use crate::state::activated::ActivatedRoute;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What currently fills one outlet.
#[derive(Debug, Clone, Default)]
pub struct OutletSlot {
    pub route: Option<Arc<ActivatedRoute>>,
    pub component: Option<ComponentHandle>,
    pub injector: Option<Arc<Injector>>,
}

/// State of one named outlet.
#[derive(Debug, Default)]
pub struct OutletContext {
    slot: Mutex<OutletSlot>,
    children: Arc<ChildrenOutletContexts>,
}

impl OutletContext {
    pub fn slot(&self) -> OutletSlot {
        lock(&self.slot).clone()
    }

    pub fn component(&self) -> Option<ComponentHandle> {
        lock(&self.slot).component.clone()
    }

    pub fn route(&self) -> Option<Arc<ActivatedRoute>> {
        lock(&self.slot).route.clone()
    }

    pub fn children(&self) -> &Arc<ChildrenOutletContexts> {
        &self.children
    }

    pub(crate) fn set_route(&self, route: Arc<ActivatedRoute>, injector: Arc<Injector>) {
        let mut slot = lock(&self.slot);
        slot.route = Some(route);
        slot.injector = Some(injector);
    }

    pub(crate) fn set_component(&self, component: Option<ComponentHandle>) {
        lock(&self.slot).component = component;
    }

    /// Empty the slot, returning what was in it.
    pub(crate) fn clear(&self) -> OutletSlot {
        std::mem::take(&mut *lock(&self.slot))
    }
}

/// The outlets directly inside one component (or the root).
#[derive(Debug, Default)]
pub struct ChildrenOutletContexts {
    contexts: Mutex<HashMap<String, Arc<OutletContext>>>,
}

impl ChildrenOutletContexts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_context(&self, outlet: &str) -> Option<Arc<OutletContext>> {
        lock(&self.contexts).get(outlet).cloned()
    }

    pub fn get_or_create_context(&self, outlet: &str) -> Arc<OutletContext> {
        Arc::clone(lock(&self.contexts).entry(outlet.to_string()).or_default())
    }

    /// The outlet element itself went away; forget its context.
    pub fn on_child_outlet_destroyed(&self, outlet: &str) {
        if let Some(context) = self.get_context(outlet) {
            context.clear();
        }
    }

    /// Take every context out, for storing with a detached route.
    pub(crate) fn on_outlet_deactivated(&self) -> HashMap<String, Arc<OutletContext>> {
        std::mem::take(&mut *lock(&self.contexts))
    }

    /// Put contexts of a re-attached route back.
    pub(crate) fn on_outlet_reattached(&self, contexts: HashMap<String, Arc<OutletContext>>) {
        *lock(&self.contexts) = contexts;
    }

    /// Every filled outlet below this one, as `outlet/path -> component`, depth first.
    pub fn describe(&self) -> Vec<(String, ComponentRef)> {
        let mut out = Vec::new();
        self.describe_into("", &mut out);
        out
    }

    fn describe_into(&self, prefix: &str, out: &mut Vec<(String, ComponentRef)>) {
        let mut contexts: Vec<(String, Arc<OutletContext>)> = lock(&self.contexts)
            .iter()
            .map(|(name, ctx)| (name.clone(), Arc::clone(ctx)))
            .collect();
        contexts.sort_by_key(|(name, _)| (name != crate::url::PRIMARY_OUTLET, name.clone()));

        for (name, context) in contexts {
            let path = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
            if let Some(component) = context.component() {
                out.push((path.clone(), component.component().clone()));
            }
            context.children.describe_into(&path, out);
        }
    }
}
