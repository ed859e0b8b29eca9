//! Command-line front end for Block Canvas
//!
//! Browses a collection on a headless canvas: loads it through the
//! navigation controller, waits for progressive loading to settle and
//! reports what ended up on screen. Also lists visit history and runs the
//! cache maintenance pass that happens at every start.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use blockcanvas_core::{CollectionKey, SystemClock, VisitRecord};
use blockcanvas_engine::{
    CanvasConfig, CanvasStatus, HeadlessSurface, NavigationController, NavigationObserver,
    NavigationOutcome,
};
use blockcanvas_fetch::CollectionApi;
use blockcanvas_storage::{RedbSnapshotStore, RedbStorageConfig, SnapshotStore};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(
    name = "blockcanvas",
    about = "Browse collections on a block canvas",
    version
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load a collection and report what was rendered
    Browse {
        /// Collection slug; defaults to the configured collection
        key: Option<String>,

        /// Skip the local snapshot and fetch again
        #[arg(short, long)]
        refresh: bool,

        /// Seconds to wait for progressive loading to settle
        #[arg(long, default_value = "10")]
        settle_secs: u64,
    },

    /// List recent visits
    History {
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Only visits of this collection
        #[arg(long)]
        collection: Option<String>,
    },

    /// Remove expired snapshots and visits
    Evict,
}

/// Configuration from `path`, or defaults plus environment overrides
pub fn load_config(path: Option<&Path>) -> Result<CanvasConfig> {
    match path {
        Some(path) => {
            CanvasConfig::load(path).with_context(|| format!("loading {}", path.display()))
        }
        None => {
            let mut config = CanvasConfig::new();
            config.apply_env();
            config.validate()?;
            Ok(config)
        }
    }
}

pub fn open_store(config: &CanvasConfig) -> Result<Arc<RedbSnapshotStore>> {
    let storage = RedbStorageConfig {
        db_path: config.store.path.clone(),
        cache_size: config.store.cache_size_mb * 1024 * 1024,
    };
    let store = RedbSnapshotStore::open(storage, Arc::new(SystemClock), config.cache.max_age())
        .with_context(|| format!("opening {}", config.store.path.display()))?;
    Ok(Arc::new(store))
}

/// Startup maintenance: drop snapshots and visits older than `max_age`
pub async fn run_maintenance(store: &dyn SnapshotStore, max_age: Duration) -> Result<usize> {
    let removed = store.evict_older_than(max_age).await?;
    if removed > 0 {
        info!(removed, "Evicted expired records");
    }
    Ok(removed)
}

/// What a browse ended with
#[derive(Debug, Clone)]
pub struct BrowseReport {
    pub key: CollectionKey,
    pub outcome: NavigationOutcome,
    pub status: CanvasStatus,
    /// Loading stopped before the settle timeout
    pub settled: bool,
}

impl BrowseReport {
    pub fn lines(&self) -> Vec<String> {
        let title = self.status.title.as_deref().unwrap_or(self.key.as_str());
        let source = match &self.outcome {
            NavigationOutcome::Restored { .. } => "restored from cache".to_string(),
            NavigationOutcome::Fetched { failed_pages, .. } if failed_pages.is_empty() => {
                "fetched".to_string()
            }
            NavigationOutcome::Fetched { failed_pages, .. } => {
                format!("fetched, pages {:?} failed", failed_pages)
            }
            NavigationOutcome::AlreadyCurrent => "already current".to_string(),
            NavigationOutcome::Superseded => "superseded".to_string(),
        };

        let mut lines = vec![
            format!("{} ({})", title, source),
            format!(
                "  {} of {} items on canvas, {} displayed, {} evicted",
                self.status.visible, self.status.total, self.status.displayed, self.status.evicted
            ),
        ];
        if let Some(ceiling) = self.status.ceiling {
            lines.push(format!("  render limit {}", ceiling));
        }
        if !self.settled {
            lines.push("  still loading when the settle timeout expired".to_string());
        }
        lines
    }
}

/// Writes fetch progress to stderr
struct ProgressPrinter;

impl NavigationObserver for ProgressPrinter {
    fn on_progress(&self, _key: &CollectionKey, loaded: usize, total: usize) {
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\rLoading {}/{}", loaded, total);
        let _ = stderr.flush();
    }

    fn on_navigated(&self, _key: &CollectionKey, outcome: &NavigationOutcome) {
        if matches!(outcome, NavigationOutcome::Fetched { .. }) {
            eprintln!();
        }
    }
}

/// Navigate to `key` on a headless canvas and wait up to `settle` for
/// batches to finish
pub async fn browse<A: CollectionApi>(
    config: CanvasConfig,
    store: Arc<dyn SnapshotStore>,
    api: A,
    key: &CollectionKey,
    refresh: bool,
    settle: Duration,
) -> Result<BrowseReport> {
    let poll = config.scheduler.tick_interval();
    let controller =
        NavigationController::new(config, store, api, Box::new(HeadlessSurface::new()))
            .with_observer(Arc::new(ProgressPrinter));

    let outcome = controller.navigate(key, refresh).await?;
    let settled = wait_for_settle(&controller, poll, settle).await;
    controller.flush().await;
    let status = controller.status();
    debug!(visible = status.visible, settled, "Browse finished");
    controller.close();

    Ok(BrowseReport {
        key: key.clone(),
        outcome,
        status,
        settled,
    })
}

async fn wait_for_settle<A: CollectionApi>(
    controller: &NavigationController<A>,
    poll: Duration,
    limit: Duration,
) -> bool {
    let settled = async {
        while controller.status().ticking {
            tokio::time::sleep(poll).await;
        }
    };
    tokio::time::timeout(limit, settled).await.is_ok()
}

/// Recent visits, optionally of one collection only
pub async fn history(
    store: &dyn SnapshotStore,
    limit: usize,
    collection: Option<&CollectionKey>,
) -> Result<Vec<VisitRecord>> {
    let visits = match collection {
        Some(key) => store.list_visits_for(key, limit).await?,
        None => store.list_recent_visits(limit).await?,
    };
    Ok(visits)
}

pub fn format_visit(visit: &VisitRecord) -> String {
    let when = DateTime::<Utc>::from_timestamp_millis(visit.timestamp_millis)
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| visit.timestamp_millis.to_string());
    format!(
        "{}  {:<32} {}",
        when,
        visit.collection_key.as_str(),
        visit.title
    )
}
