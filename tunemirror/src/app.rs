use anyhow::{Context, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tunemirror_cache::LocalCache;
use tunemirror_core::config::Config;
use tunemirror_core::event::{Event, EventBus};
use tunemirror_core::model::{Id, Song};
use tunemirror_core::player::{Player, QueuePlayer};
use tunemirror_core::queue::QueueController;
use tunemirror_task::{default_fatal_hook, Task, TaskFailure};

/// State key holding the queued song ids, one per line.
const QUEUE_STATE_KEY: &str = "queue";

fn open_cache(config: &Config) -> Result<LocalCache> {
    match LocalCache::open(&config.cache.directory, &config.cache.instance_id) {
        Err(e) if e.is_schema_mismatch() => {
            Err(e).context("cache was written by another version, run `tunemirror reset`")
        }
        other => other.context("failed to open cache"),
    }
}

fn lock(cache: &Mutex<LocalCache>) -> MutexGuard<'_, LocalCache> {
    cache.lock().unwrap_or_else(|e| e.into_inner())
}

pub fn check(config: &Config) -> Result<()> {
    let cache = open_cache(config)?;
    println!("{}: schema level {}", config.cache_file(), cache.schema_level()?);
    Ok(())
}

pub fn stats(config: &Config) -> Result<()> {
    let cache = open_cache(config)?;
    let stats = cache.stats()?;
    println!("artists:   {}", stats.artists);
    println!("albums:    {}", stats.albums);
    println!("songs:     {}", stats.songs);
    println!("playlists: {}", stats.playlists);
    println!("genres:    {}", stats.genres);
    println!("downloads: {}", stats.downloads);
    Ok(())
}

pub fn reset(config: &Config) -> Result<()> {
    let cache = LocalCache::recreate(&config.cache.directory, &config.cache.instance_id)
        .context("failed to recreate cache")?;
    info!("Cache recreated at schema level {}", cache.schema_level()?);
    Ok(())
}

pub async fn run(config: Config) -> Result<()> {
    let cache = Arc::new(Mutex::new(open_cache(&config)?));
    let events = EventBus::new();

    let queue = Arc::new(QueueController::with_history_limit(config.queue.history_limit));
    publish_queue_events(&queue, &events);
    restore_queue(&lock(&cache), &queue);
    let player = QueuePlayer::new(Arc::clone(&queue), events.clone());

    let logger = tokio::spawn(log_events(events.clone()));

    let housekeeping = housekeeping_task(Arc::clone(&cache), config.sync.interval());
    let failed = events.clone();
    housekeeping.set_fatal_hook(move |message| {
        failed.emit(Event::TaskFailed(message.to_owned()));
        default_fatal_hook(message);
    });
    housekeeping.start()?;

    match signal::ctrl_c().await {
        Ok(()) => info!("Received SIGINT, shutting down..."),
        Err(err) => error!("Unable to listen for shutdown signal: {}", err),
    }

    if let Err(e) = housekeeping.stop() {
        warn!("Housekeeping task: {}", e);
    }
    if let Err(e) = player.stop() {
        warn!("Failed to stop player: {}", e);
    }
    save_queue(&lock(&cache), &queue);
    logger.abort();

    Ok(())
}

fn publish_queue_events(queue: &QueueController, events: &EventBus) {
    let bus = events.clone();
    queue.subscribe_queue_changed(move |songs| {
        bus.emit(Event::QueueChanged {
            length: songs.len(),
        });
    });
    let bus = events.clone();
    queue.set_history_changed_callback(move |history| {
        bus.emit(Event::HistoryChanged {
            length: history.len(),
        });
    });
}

fn restore_queue(cache: &LocalCache, queue: &QueueController) {
    let saved = match cache.get_state(QUEUE_STATE_KEY) {
        Ok(Some(saved)) => saved,
        Ok(None) => return,
        Err(e) => {
            warn!("Failed to read saved queue: {}", e);
            return;
        }
    };

    let mut songs: Vec<Song> = Vec::new();
    for id in saved.lines().filter(|l| !l.is_empty()) {
        match cache.get_song(&Id::new(id)) {
            Ok(Some(song)) => songs.push(song),
            Ok(None) => warn!("Queued song not in cache: {}", id),
            Err(e) => warn!("Failed to load queued song {}: {}", id, e),
        }
    }

    info!("Restoring queue with {} songs", songs.len());
    queue.add_songs(songs);
}

fn save_queue(cache: &LocalCache, queue: &QueueController) {
    let ids: Vec<String> = queue.queue().iter().map(|s| s.id.to_string()).collect();
    if let Err(e) = cache.set_state(QUEUE_STATE_KEY, &ids.join("\n")) {
        error!("Failed to save queue: {}", e);
    }
}

/// Periodically logs cache row counts. A failing cache ends the loop.
fn housekeeping_task(cache: Arc<Mutex<LocalCache>>, interval: Duration) -> Task {
    let task = Task::new("housekeeping");
    task.set_loop(move |mut stop| {
        let cache = Arc::clone(&cache);
        async move {
            loop {
                let stats = lock(&cache).stats().map_err(TaskFailure::from_error)?;
                info!(
                    "Cache holds {} artists, {} albums, {} songs, {} playlists",
                    stats.artists, stats.albums, stats.songs, stats.playlists
                );

                tokio::select! {
                    _ = stop.stopped() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            Ok::<(), TaskFailure>(())
        }
    });
    task
}

async fn log_events(events: EventBus) {
    let mut rx = events.subscribe();
    loop {
        match rx.recv().await {
            Ok(Event::TaskFailed(message)) => error!("{}", message),
            Ok(event) => debug!("Event: {:?}", event),
            Err(RecvError::Lagged(skipped)) => warn!("Event log skipped {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}
