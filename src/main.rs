use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use feedsync::config::Config;
use feedsync::feed::{FeedPurger, FeedSyncCoordinator, FeedSyncHandle, RssParser, SyncEvent};
use feedsync::fetch::{download_enclosure, ResourceFetcher};
use feedsync::images::{
    ImagePrefetcher, PrefetchContext, PrefetchController, PrefetchEvent, PrefetchHandle,
    PrefetchSession, SharedImageCache,
};
use feedsync::storage::{Database, DatabaseError};

#[derive(Parser, Debug)]
#[command(
    name = "feedsync",
    about = "Sequential feed sync with windowed image prefetching"
)]
struct Args {
    /// Config file (default: ~/.config/feedsync/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database file (default: ~/.config/feedsync/feeds.db)
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe to a feed
    Add {
        url: String,
        #[arg(long)]
        title: Option<String>,
    },
    /// List subscribed feeds with item counts
    List,
    /// Fetch feeds one at a time and store new items
    Sync {
        /// Repeat every `refresh_interval_minutes`
        #[arg(long)]
        watch: bool,
        /// Feeds to sync (default: all)
        #[arg(value_name = "FEED_ID")]
        feed_ids: Vec<i64>,
    },
    /// Delete old items
    Purge {
        /// Age in days (default: `purge_after_days` from config)
        #[arg(long)]
        days: Option<u32>,
        /// Also delete unread items
        #[arg(long)]
        unread: bool,
    },
    /// Walk a feed's items and prefetch their images
    Prefetch {
        #[arg(value_name = "FEED_ID")]
        feed_id: i64,
    },
    /// Download an enclosure into `enclosure_dir`
    Enclosure { url: String },
}

/// Get the config directory path (~/.config/feedsync/)
fn get_config_dir() -> Result<PathBuf> {
    Config::default_dir().context("HOME environment variable not set")
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    // SEC-007: Set directory permissions on Unix (user-only access)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)) {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }
    Ok(())
}

async fn open_database(path: &Path) -> Result<Database> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    match Database::open(path_str).await {
        Ok(db) => Ok(db),
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of feedsync appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database: {}", e)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;

    let db_path = match &args.db {
        Some(path) => path.clone(),
        None => {
            ensure_dir(&config_dir)?;
            config_dir.join("feeds.db")
        }
    };
    let db = open_database(&db_path).await?;
    let fetcher = Arc::new(ResourceFetcher::new(config.fetch_settings()));

    match args.command {
        Command::Add { url, title } => {
            let id = db
                .add_feed(&url, title.as_deref(), None)
                .await
                .context("Failed to add feed")?;
            println!("Added feed {id}: {url}");
        }
        Command::List => list_feeds(&db).await?,
        Command::Sync { watch, feed_ids } => {
            run_sync(&config, db, fetcher, feed_ids, watch).await?;
        }
        Command::Purge { days, unread } => {
            let days = days.unwrap_or(config.purge_after_days);
            let purged = FeedPurger::new(db)
                .purge_all(days, unread)
                .await
                .context("Failed to purge feeds")?;
            for feed in &purged {
                println!(
                    "Feed {}: deleted {} items published before {}",
                    feed.feed_id,
                    feed.deleted,
                    feed.cutoff.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::Prefetch { feed_id } => run_prefetch(&config, &db, fetcher, feed_id).await?,
        Command::Enclosure { url } => {
            let dir = config
                .enclosure_dir
                .clone()
                .context("enclosure_dir is not set in the config file")?;
            let download = download_enclosure(fetcher.as_ref(), &config.proxy, &url, &dir)
                .await
                .with_context(|| format!("Failed to download enclosure: {url}"))?;
            println!(
                "Saved {} ({} bytes) to {}",
                download.file_name,
                download.size,
                download.path.display()
            );
        }
    }

    Ok(())
}

async fn list_feeds(db: &Database) -> Result<()> {
    let feeds = db.feeds().await.context("Failed to load feeds")?;
    if feeds.is_empty() {
        println!("No feeds. Add one with: feedsync add <URL>");
        return Ok(());
    }
    for feed in &feeds {
        let updated = feed
            .last_updated
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:>4}  {}  ({} items, {} unread, updated {})\n      {}",
            feed.id, feed.title, feed.item_count, feed.unread_count, updated, feed.url
        );
    }
    Ok(())
}

// ============================================================================
// Sync
// ============================================================================

async fn run_sync(
    config: &Config,
    db: Database,
    fetcher: Arc<ResourceFetcher>,
    feed_ids: Vec<i64>,
    watch: bool,
) -> Result<()> {
    if watch && config.refresh_interval_minutes == 0 {
        anyhow::bail!("sync --watch needs refresh_interval_minutes > 0 in the config file");
    }

    let store = Arc::new(db);
    let (handle, mut events) = FeedSyncCoordinator::new(store.clone(), Arc::new(RssParser), fetcher)
        .with_proxy(config.proxy.clone())
        .spawn();

    if !watch {
        let ids = sync_targets(&store, &feed_ids).await?;
        return sync_once(&handle, &mut events, ids).await;
    }

    let mut ticker =
        tokio::time::interval(Duration::from_secs(config.refresh_interval_minutes * 60));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let ids = sync_targets(&store, &feed_ids).await?;
                sync_once(&handle, &mut events, ids).await?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping watch");
                return Ok(());
            }
        }
    }
}

async fn sync_targets(db: &Database, requested: &[i64]) -> Result<Vec<i64>> {
    if requested.is_empty() {
        db.feed_ids().await.context("Failed to load feeds")
    } else {
        Ok(requested.to_vec())
    }
}

async fn sync_once(
    handle: &FeedSyncHandle,
    events: &mut mpsc::Receiver<SyncEvent>,
    feed_ids: Vec<i64>,
) -> Result<()> {
    if feed_ids.is_empty() {
        println!("Nothing to sync.");
        return Ok(());
    }

    handle.request_feed_sync(feed_ids).await?;

    let mut total_new = 0;
    while let Some(event) = events.recv().await {
        match event {
            SyncEvent::Started {
                feed_id,
                position,
                total,
            } => println!("[{position}/{total}] Syncing feed {feed_id}..."),
            SyncEvent::Progress(result) => {
                total_new += result.new_items.len();
                println!("      feed {}: {} new items", result.feed_id, result.new_items.len());
            }
            SyncEvent::TaskPanicked { feed_id, error } => {
                eprintln!("      feed {feed_id}: sync task panicked: {error}");
            }
            SyncEvent::Complete => break,
        }
    }
    println!("Sync complete: {total_new} new items.");
    Ok(())
}

// ============================================================================
// Prefetch
// ============================================================================

async fn run_prefetch(
    config: &Config,
    db: &Database,
    fetcher: Arc<ResourceFetcher>,
    feed_id: i64,
) -> Result<()> {
    let feed = db
        .feed(feed_id)
        .await
        .context("Failed to load feed")?
        .with_context(|| format!("No feed with id {feed_id}"))?;
    let items: Vec<_> = db
        .items_for_feed(feed_id)
        .await
        .context("Failed to load items")?
        .into_iter()
        .map(|stored| stored.item)
        .collect();

    let cache = SharedImageCache::new(config.image_cache_capacity);
    let (handle, mut events) = ImagePrefetcher::new(fetcher, cache.clone())
        .with_proxy(config.proxy.clone())
        .spawn();
    let mut session = PrefetchSession::new(
        handle.clone(),
        PrefetchController::new(config.prefetch_range),
    );

    println!("Prefetching images for {} ({} items)", feed.title, items.len());
    let rows = items.len();
    session
        .show_items(items, PrefetchContext::new(feed.base_link()))
        .await?;
    wait_for_prefetch(&handle, &mut events).await?;

    for row in 0..rows {
        session.row_selected(row).await?;
        wait_for_prefetch(&handle, &mut events).await?;
    }

    println!(
        "Cache holds {} of {} images.",
        cache.len(),
        cache.capacity()
    );
    Ok(())
}

/// Print prefetch events until the prefetcher has nothing running or queued.
///
/// Events are read while waiting for the busy check so the actor never
/// blocks on a full event channel.
async fn wait_for_prefetch(
    handle: &PrefetchHandle,
    events: &mut mpsc::Receiver<PrefetchEvent>,
) -> Result<()> {
    loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(event) => report_prefetch(event),
                None => break,
            },
            busy = handle.is_busy() => {
                if !busy? {
                    break;
                }
            }
        }
    }
    while let Ok(event) = events.try_recv() {
        report_prefetch(event);
    }
    Ok(())
}

fn report_prefetch(event: PrefetchEvent) {
    match event {
        PrefetchEvent::ImageReady { url } => println!("  cached {url}"),
        PrefetchEvent::TaskPanicked { error } => eprintln!("  prefetch task panicked: {error}"),
        PrefetchEvent::Started | PrefetchEvent::Finished => {}
    }
}
