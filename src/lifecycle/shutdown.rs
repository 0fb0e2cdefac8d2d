//! Teardown coordination for a router and its background tasks.
//!
//! A [`Shutdown`] is shared by the router, its location listener and whatever
//! outer task (Ctrl-C handler, REPL loop) may end the session. Firing it once
//! records who asked, cancels every navigation token derived from it and wakes
//! every waiter.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    cause: Arc<OnceLock<&'static str>>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for one unit of work; cancelled when this coordinator fires, but
    /// cancelling it never fires the coordinator.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Fire, recording `cause`. Returns `false` if an earlier call already fired.
    pub fn trigger(&self, cause: &'static str) -> bool {
        if self.cause.set(cause).is_err() {
            return false;
        }
        tracing::debug!(cause, "shutdown triggered");
        self.token.cancel();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// What fired the coordinator, if anything has.
    pub fn cause(&self) -> Option<&'static str> {
        self.cause.get().copied()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called.
    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_trigger_wins() {
        let shutdown = Shutdown::new();
        let work = shutdown.child_token();
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.triggered().await })
        };

        assert!(shutdown.trigger("dispose"));
        assert!(!shutdown.trigger("ctrl-c"));

        waiter.await.unwrap();
        assert!(work.is_cancelled());
        assert_eq!(shutdown.cause(), Some("dispose"));
    }

    #[test]
    fn test_cancelling_child_leaves_parent_running() {
        let shutdown = Shutdown::new();
        shutdown.child_token().cancel();
        assert!(!shutdown.is_triggered());
        assert_eq!(shutdown.cause(), None);
    }
}
