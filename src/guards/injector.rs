//! Named capability registry.
//!
//! # Responsibilities
//! - Map string tokens (as written in route tables) to guards and resolvers
//! - Chain child scopes to a parent so lazily loaded modules can add providers
//! - Serve as the construction scope handed to the component host
//!
//! # Design Decisions
//! - Lookups walk the parent chain; the closest scope wins
//! - Built once through `InjectorBuilder`, immutable afterwards

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::guards::types::{CanActivateGuard, CanDeactivateGuard, CanMatchGuard, Resolver};

/// A scope of named guards and resolvers.
pub struct Injector {
    name: String,
    parent: Option<Arc<Injector>>,
    can_activate: HashMap<String, CanActivateGuard>,
    can_deactivate: HashMap<String, CanDeactivateGuard>,
    can_match: HashMap<String, CanMatchGuard>,
    resolvers: HashMap<String, Resolver>,
}

impl Injector {
    /// Start a root scope.
    pub fn builder(name: impl Into<String>) -> InjectorBuilder {
        InjectorBuilder::new(name.into(), None)
    }

    /// Start a scope whose lookups fall back to `parent`.
    pub fn child(parent: &Arc<Injector>, name: impl Into<String>) -> InjectorBuilder {
        InjectorBuilder::new(name.into(), Some(Arc::clone(parent)))
    }

    /// An empty root scope.
    pub fn empty() -> Arc<Injector> {
        Self::builder("root").build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<Injector>> {
        self.parent.as_ref()
    }

    fn lookup<'a, T>(&'a self, pick: impl Fn(&'a Injector) -> Option<&'a T>) -> Option<&'a T> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(found) = pick(current) {
                return Some(found);
            }
            scope = current.parent.as_deref();
        }
        None
    }

    pub fn can_activate(&self, token: &str) -> Option<CanActivateGuard> {
        self.lookup(|s| s.can_activate.get(token)).cloned()
    }

    pub fn can_deactivate(&self, token: &str) -> Option<CanDeactivateGuard> {
        self.lookup(|s| s.can_deactivate.get(token)).cloned()
    }

    pub fn can_match(&self, token: &str) -> Option<CanMatchGuard> {
        self.lookup(|s| s.can_match.get(token)).cloned()
    }

    pub fn resolver(&self, token: &str) -> Option<Resolver> {
        self.lookup(|s| s.resolvers.get(token)).cloned()
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.clone()))
            .finish()
    }
}

/// Builder for `Injector`.
pub struct InjectorBuilder {
    inner: Injector,
}

impl InjectorBuilder {
    fn new(name: String, parent: Option<Arc<Injector>>) -> Self {
        Self {
            inner: Injector {
                name,
                parent,
                can_activate: HashMap::new(),
                can_deactivate: HashMap::new(),
                can_match: HashMap::new(),
                resolvers: HashMap::new(),
            },
        }
    }

    pub fn can_activate(mut self, token: impl Into<String>, guard: CanActivateGuard) -> Self {
        self.inner.can_activate.insert(token.into(), guard);
        self
    }

    pub fn can_deactivate(mut self, token: impl Into<String>, guard: CanDeactivateGuard) -> Self {
        self.inner.can_deactivate.insert(token.into(), guard);
        self
    }

    pub fn can_match(mut self, token: impl Into<String>, guard: CanMatchGuard) -> Self {
        self.inner.can_match.insert(token.into(), guard);
        self
    }

    pub fn resolver(mut self, token: impl Into<String>, resolver: Resolver) -> Self {
        self.inner.resolvers.insert(token.into(), resolver);
        self
    }

    pub fn build(self) -> Arc<Injector> {
        Arc::new(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_scope_falls_back_to_parent() {
        let root = Injector::builder("root")
            .can_activate("auth", CanActivateGuard::from_sync(|_, _| true))
            .build();
        let child = Injector::child(&root, "admin")
            .can_match("feature", CanMatchGuard::from_sync(|_, _| false))
            .build();

        assert!(child.can_activate("auth").is_some());
        assert!(child.can_match("feature").is_some());
        assert!(root.can_match("feature").is_none());
        assert!(child.resolver("missing").is_none());
    }
}
