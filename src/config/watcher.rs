//! Hot reload of route files.
//!
//! The watcher observes the directory holding the main route file, since lazily
//! loaded children live in sibling `.toml` files and editing one of those must
//! reload the table too. Editors tend to emit several events per save, so raw
//! events are coalesced for [`ConfigWatcher::DEBOUNCE`] before the main file is
//! re-read.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::NavigationConfig;

pub struct ConfigWatcher {
    main: PathBuf,
    reloads: mpsc::UnboundedSender<NavigationConfig>,
}

impl ConfigWatcher {
    pub const DEBOUNCE: Duration = Duration::from_millis(150);

    /// Watcher for `main`, plus the stream of successfully reloaded configs.
    pub fn new(main: &Path) -> (Self, mpsc::UnboundedReceiver<NavigationConfig>) {
        let (reloads, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            main: main.to_path_buf(),
            reloads,
        };
        (watcher, rx)
    }

    /// Start watching. Must be called inside a tokio runtime; the returned
    /// handle stops the watch when dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let (touched_tx, touched_rx) = mpsc::unbounded_channel::<PathBuf>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_route_file_change(&event) => {
                    for path in event.paths {
                        let _ = touched_tx.send(path);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "route file watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = match self.main.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(dir = %dir.display(), main = %self.main.display(), "watching route files");

        tokio::spawn(reload_loop(self.main, touched_rx, self.reloads));
        Ok(watcher)
    }
}

fn is_route_file_change(event: &Event) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event.paths.iter().any(|p| p.extension().is_some_and(|ext| ext == "toml"))
}

async fn reload_loop(
    main: PathBuf,
    mut touched: mpsc::UnboundedReceiver<PathBuf>,
    reloads: mpsc::UnboundedSender<NavigationConfig>,
) {
    while let Some(first) = touched.recv().await {
        let mut changed = vec![first];
        // Collapse the burst a single save produces.
        while let Ok(Some(path)) = tokio::time::timeout(ConfigWatcher::DEBOUNCE, touched.recv()).await {
            changed.push(path);
        }
        changed.sort();
        changed.dedup();
        tracing::info!(files = ?changed, "route files changed");

        match load_config(&main) {
            Ok(config) => {
                if reloads.send(config).is_err() {
                    break;
                }
            }
            Err(e) => tracing::error!(error = %e, "reload rejected, current route table stays active"),
        }
    }
    tracing::debug!("route file watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_only_toml_writes_count() {
        assert!(is_route_file_change(&event(EventKind::Modify(ModifyKind::Any), "/app/routes.toml")));
        assert!(is_route_file_change(&event(EventKind::Create(CreateKind::File), "/app/shop.toml")));
        assert!(!is_route_file_change(&event(EventKind::Modify(ModifyKind::Any), "/app/routes.toml.swp")));
        assert!(!is_route_file_change(&event(EventKind::Remove(RemoveKind::File), "/app/routes.toml")));
    }

    #[tokio::test]
    async fn test_burst_produces_one_reload() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("routes.toml");
        std::fs::write(&main, "[[routes]]\npath = \"a\"\ncomponent = \"A\"\n").unwrap();

        let (touched_tx, touched_rx) = mpsc::unbounded_channel();
        let (reload_tx, mut reload_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(reload_loop(main.clone(), touched_rx, reload_tx));

        for _ in 0..3 {
            touched_tx.send(main.clone()).unwrap();
        }
        let config = reload_rx.recv().await.unwrap();
        assert_eq!(config.routes.len(), 1);

        drop(touched_tx);
        task.await.unwrap();
        assert!(reload_rx.try_recv().is_err());
    }
}
