//! navigation-engine CLI
//!
//! Drives a TOML route table through navigations from the command line.
//!
//! # Architecture Overview
//!
//! ```text
//!   routes.toml ──▶ config (load + validate) ──▶ build_routes (injector tokens)
//!                                                     │
//!                                                     ▼
//!   urls / stdin ──────────────────────────────▶   Router ──▶ MemoryLocation
//!                                                     │
//!                                                     ▼
//!                                      lifecycle events as JSON lines (stdout)
//! ```
//!
//! Logs go to stderr; stdout carries only JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use navigation_engine::config::watcher::ConfigWatcher;
use navigation_engine::config::{load_config, NavigationConfig};
use navigation_engine::guards::{CanActivateGuard, CanDeactivateGuard, CanMatchGuard, Injector, Resolver};
use navigation_engine::lifecycle::shutdown::Shutdown;
use navigation_engine::lifecycle::signals::shutdown_on_ctrl_c;
use navigation_engine::navigation::location::Location;
use navigation_engine::navigation::{MemoryLocation, NavigationBehaviorOptions, NavigationResult, Router, RouterEvent};
use navigation_engine::observability::logging::{self, LogFormat};
use navigation_engine::url::UrlTree;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "navigation-engine")]
#[command(about = "Run navigations against a route table", long_about = None)]
struct Cli {
    /// Overrides `observability.log_level`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Overrides `observability.log_format`.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a URL and print its tree
    Parse { url: String },
    /// Validate a route table
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Navigate to each URL in turn and print every event
    Navigate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Read URLs, `back` and `forward` from stdin
    Repl {
        #[arg(short, long)]
        config: PathBuf,
        /// Reload the route table when the file changes
        #[arg(long)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { url } => {
            init_logging(&cli.log_level, cli.log_format, None);
            let tree = UrlTree::parse(&url)?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
            println!("{tree}");
        }
        Commands::Check { config: path } => {
            let config = load_config(&path)?;
            init_logging(&cli.log_level, cli.log_format, Some(&config));
            let routes = config.build_routes(&cli_injector(), base_dir(&path))?;
            Router::builder(routes).options(config.router.clone()).build()?;
            tracing::info!(path = %path.display(), routes = config.routes.len(), "Route table is valid");
        }
        Commands::Navigate { config: path, urls } => {
            let config = load_config(&path)?;
            init_logging(&cli.log_level, cli.log_format, Some(&config));
            let router = build_router(&config, &path, Arc::new(MemoryLocation::default()), Shutdown::new())?;
            let mut events = router.events();

            for url in urls {
                let result = router.navigate_by_url(&url, NavigationBehaviorOptions::default()).await;
                while let Ok(event) = events.try_recv() {
                    println!("{}", event.to_json());
                }
                print_result(&url, &router, result);
            }
            router.dispose();
        }
        Commands::Repl { config: path, watch } => {
            let config = load_config(&path)?;
            init_logging(&cli.log_level, cli.log_format, Some(&config));
            repl(config, path, watch).await?;
        }
    }

    Ok(())
}

fn init_logging(level: &Option<String>, format: Option<LogFormat>, config: Option<&NavigationConfig>) {
    let observability = config.map(|c| c.observability.clone()).unwrap_or_default();
    let level = level.clone().unwrap_or(observability.log_level);
    logging::init(&level, format.unwrap_or(observability.log_format));
}

fn base_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

/// Tokens route files may reference.
fn cli_injector() -> Arc<Injector> {
    Injector::builder("cli")
        .can_activate("allow", CanActivateGuard::from_sync(|_, _| true))
        .can_activate("deny", CanActivateGuard::from_sync(|_, _| false))
        .can_deactivate("allow", CanDeactivateGuard::from_sync(|_, _| true))
        .can_deactivate("deny", CanDeactivateGuard::from_sync(|_, _| false))
        .can_match("allow", CanMatchGuard::from_sync(|_, _| true))
        .can_match("deny", CanMatchGuard::from_sync(|_, _| false))
        .resolver(
            "params",
            Resolver::value(|route| serde_json::to_value(&route.params).unwrap_or_default()),
        )
        .build()
}

fn build_router(config: &NavigationConfig, path: &Path, location: Arc<MemoryLocation>, shutdown: Shutdown) -> CliResult<Router> {
    let injector = cli_injector();
    let routes = config.build_routes(&injector, base_dir(path))?;
    let router = Router::builder(routes)
        .options(config.router.clone())
        .injector(injector)
        .location(location)
        .shutdown(shutdown)
        .build()?;
    Ok(router)
}

fn print_result(url: &str, router: &Router, result: NavigationResult<bool>) {
    let line = match result {
        Ok(committed) => serde_json::json!({ "type": "Result", "url": url, "committed": committed, "current": router.url() }),
        Err(e) => serde_json::json!({ "type": "Result", "url": url, "error": e.to_string(), "current": router.url() }),
    };
    println!("{line}");
}

async fn repl(config: NavigationConfig, path: PathBuf, watch: bool) -> CliResult<()> {
    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_ctrl_c(shutdown.clone()));

    let location = Arc::new(MemoryLocation::default());
    let router = build_router(&config, &path, Arc::clone(&location), shutdown.clone())?;
    tokio::spawn(print_events(router.events()));

    // The sender drops with the unused watcher, which disables the reload arm below.
    let (watcher, mut updates) = ConfigWatcher::new(&path);
    let _watching = if watch { Some(watcher.run()?) } else { None };

    router.start_location_listener();
    let initial = router.initial_navigation().await;
    print_result(&location.path(), &router, initial);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = shutdown.triggered() => break,
            Some(updated) = updates.recv() => {
                match updated.build_routes(&cli_injector(), base_dir(&path)) {
                    Ok(routes) => match router.reset_config(routes) {
                        Ok(()) => tracing::info!("Route table reloaded"),
                        Err(e) => tracing::error!(error = %e, "Reloaded route table rejected"),
                    },
                    Err(e) => tracing::error!(error = %e, "Reloaded route table rejected"),
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => {}
                    "quit" | "exit" => break,
                    "back" => {
                        if !location.back() {
                            tracing::warn!("Already at the oldest entry");
                        }
                    }
                    "forward" => {
                        if !location.forward() {
                            tracing::warn!("Already at the newest entry");
                        }
                    }
                    "url" => println!("{}", serde_json::json!({ "type": "Url", "url": router.url() })),
                    url => {
                        let result = router.navigate_by_url(url, NavigationBehaviorOptions::default()).await;
                        print_result(url, &router, result);
                    }
                }
            }
        }
    }

    router.dispose();
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<RouterEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => println!("{}", event.to_json()),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event printer lagged behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
