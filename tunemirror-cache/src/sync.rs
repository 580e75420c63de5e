//! Pulls the remote catalog page by page into the local cache.

use crate::cache::{now_secs, LocalCache};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};
use tunemirror_core::error::{MirrorError, Result};
use tunemirror_core::event::{Event, EventBus};
use tunemirror_core::model::{Album, Artist, ItemType, Playlist, Song};
use tunemirror_core::query::Paging;
use tunemirror_core::remote::RemoteCatalog;
use tunemirror_task::{Task, TaskFailure};

/// State key holding the unix time of the last completed sync.
pub const LAST_SYNC_KEY: &str = "last_sync";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub artists: usize,
    pub albums: usize,
    pub songs: usize,
    pub playlists: usize,
}

impl SyncStats {
    pub fn total(&self) -> usize {
        self.artists + self.albums + self.songs + self.playlists
    }
}

/// One entity type that can be fetched remotely and stored locally.
trait Mirrored: Sized + Send + Sync {
    const ITEM_TYPE: ItemType;

    fn fetch<R: RemoteCatalog>(
        remote: &R,
        paging: &Paging,
    ) -> impl Future<Output = Result<(Vec<Self>, u64)>> + Send;

    fn store(cache: &LocalCache, items: &[Self]) -> Result<()>;
}

impl Mirrored for Artist {
    const ITEM_TYPE: ItemType = ItemType::Artist;

    fn fetch<R: RemoteCatalog>(
        remote: &R,
        paging: &Paging,
    ) -> impl Future<Output = Result<(Vec<Self>, u64)>> + Send {
        remote.fetch_artists(paging)
    }

    fn store(cache: &LocalCache, items: &[Self]) -> Result<()> {
        cache.update_artists(items)
    }
}

impl Mirrored for Album {
    const ITEM_TYPE: ItemType = ItemType::Album;

    fn fetch<R: RemoteCatalog>(
        remote: &R,
        paging: &Paging,
    ) -> impl Future<Output = Result<(Vec<Self>, u64)>> + Send {
        remote.fetch_albums(paging)
    }

    fn store(cache: &LocalCache, items: &[Self]) -> Result<()> {
        cache.update_albums(items)
    }
}

impl Mirrored for Song {
    const ITEM_TYPE: ItemType = ItemType::Song;

    fn fetch<R: RemoteCatalog>(
        remote: &R,
        paging: &Paging,
    ) -> impl Future<Output = Result<(Vec<Self>, u64)>> + Send {
        remote.fetch_songs(paging)
    }

    fn store(cache: &LocalCache, items: &[Self]) -> Result<()> {
        cache.update_songs(items)
    }
}

impl Mirrored for Playlist {
    const ITEM_TYPE: ItemType = ItemType::Playlist;

    fn fetch<R: RemoteCatalog>(
        remote: &R,
        paging: &Paging,
    ) -> impl Future<Output = Result<(Vec<Self>, u64)>> + Send {
        remote.fetch_playlists(paging)
    }

    fn store(cache: &LocalCache, items: &[Self]) -> Result<()> {
        cache.update_playlists(items)
    }
}

pub struct CatalogSync<R> {
    remote: R,
    cache: Arc<Mutex<LocalCache>>,
    page_size: u64,
    events: Option<EventBus>,
}

impl<R: RemoteCatalog> CatalogSync<R> {
    pub fn new(remote: R, cache: Arc<Mutex<LocalCache>>, page_size: u64) -> Self {
        Self {
            remote,
            cache,
            page_size: page_size.max(1),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn cache(&self) -> &Arc<Mutex<LocalCache>> {
        &self.cache
    }

    /// Pull every entity type. Artists first so albums find their owners.
    pub async fn sync_all(&self) -> Result<SyncStats> {
        info!("Starting catalog sync");

        let stats = SyncStats {
            artists: self.pull::<Artist>().await?,
            albums: self.pull::<Album>().await?,
            songs: self.pull::<Song>().await?,
            playlists: self.pull::<Playlist>().await?,
        };

        self.lock_cache()
            .set_state(LAST_SYNC_KEY, &now_secs().to_string())?;

        info!("Catalog sync finished: {} items", stats.total());
        if let Some(events) = &self.events {
            events.emit(Event::SyncFinished);
        }
        Ok(stats)
    }

    async fn pull<T: Mirrored>(&self) -> Result<usize> {
        let mut paging = Paging::new(0, self.page_size);
        let mut count = 0;

        loop {
            let (items, total) = T::fetch(&self.remote, &paging).await?;
            paging.set_total_items(total);
            if items.is_empty() {
                break;
            }

            T::store(&self.lock_cache(), &items)?;
            count += items.len();
            debug!(
                "Stored page {}/{} of {}s",
                paging.current_page + 1,
                paging.total_pages,
                T::ITEM_TYPE.as_str()
            );

            if !paging.has_next() {
                break;
            }
            paging = paging.next_page();
        }

        if let Some(events) = &self.events {
            events.emit(Event::CacheUpdated {
                item_type: T::ITEM_TYPE,
                count,
            });
        }
        Ok(count)
    }

    fn lock_cache(&self) -> MutexGuard<'_, LocalCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Supervised loop that syncs, then sleeps for `interval` or until stopped.
///
/// Remote errors are retried on the next round. Anything else (a broken
/// cache) ends the loop through the fatal hook.
pub fn sync_task<R>(sync: Arc<CatalogSync<R>>, interval: Duration) -> Task
where
    R: RemoteCatalog + 'static,
{
    let task = Task::new("catalog-sync");
    task.set_loop(move |mut stop| {
        let sync = Arc::clone(&sync);
        async move {
            loop {
                match sync.sync_all().await {
                    Ok(stats) => debug!("Sync round stored {} items", stats.total()),
                    Err(MirrorError::Remote(e)) => {
                        warn!("Catalog sync failed, retrying in {:?}: {}", interval, e);
                    }
                    Err(e) => return Err(TaskFailure::from_error(e)),
                }

                tokio::select! {
                    _ = stop.stopped() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            Ok(())
        }
    });
    task
}
