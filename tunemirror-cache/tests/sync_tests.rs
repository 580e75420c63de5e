//! Catalog sync against an in-process fake remote

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;
use tunemirror_cache::sync::LAST_SYNC_KEY;
use tunemirror_cache::{sync_task, CatalogSync, LocalCache};
use tunemirror_core::error::{MirrorError, Result};
use tunemirror_core::event::{Event, EventBus};
use tunemirror_core::model::{Album, Artist, ItemType, Playlist, Song};
use tunemirror_core::query::Paging;
use tunemirror_core::remote::RemoteCatalog;
use tunemirror_core::test_utils::{
    create_test_album, create_test_artist, create_test_playlist, create_test_songs,
};

#[derive(Default)]
struct FakeRemote {
    artists: Vec<Artist>,
    albums: Vec<Album>,
    songs: Vec<Song>,
    playlists: Vec<Playlist>,
    offline: AtomicBool,
    requests: AtomicUsize,
}

impl FakeRemote {
    fn catalog() -> Self {
        Self {
            artists: (0..5)
                .map(|i| create_test_artist(&format!("ar{i}"), &format!("Artist {i}")))
                .collect(),
            albums: vec![
                create_test_album("al1", "One", "ar0"),
                create_test_album("al2", "Two", "ar1"),
            ],
            songs: create_test_songs("s", "al1", 11),
            playlists: vec![create_test_playlist("p1", "Mix", &["s3", "s1"])],
            ..Default::default()
        }
    }

    fn page<T: Clone>(&self, items: &[T], paging: &Paging) -> Result<(Vec<T>, u64)> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(MirrorError::Remote("connection refused".into()));
        }
        let page = items
            .iter()
            .skip(paging.offset() as usize)
            .take(paging.page_size as usize)
            .cloned()
            .collect();
        Ok((page, items.len() as u64))
    }
}

impl RemoteCatalog for FakeRemote {
    async fn fetch_artists(&self, paging: &Paging) -> Result<(Vec<Artist>, u64)> {
        self.page(&self.artists, paging)
    }

    async fn fetch_albums(&self, paging: &Paging) -> Result<(Vec<Album>, u64)> {
        self.page(&self.albums, paging)
    }

    async fn fetch_songs(&self, paging: &Paging) -> Result<(Vec<Song>, u64)> {
        self.page(&self.songs, paging)
    }

    async fn fetch_playlists(&self, paging: &Paging) -> Result<(Vec<Playlist>, u64)> {
        self.page(&self.playlists, paging)
    }
}

fn shared_cache() -> Arc<Mutex<LocalCache>> {
    Arc::new(Mutex::new(LocalCache::open_in_memory().unwrap()))
}

#[tokio::test]
async fn test_sync_all_pulls_every_page() {
    let cache = shared_cache();
    let sync = CatalogSync::new(FakeRemote::catalog(), Arc::clone(&cache), 3);

    let stats = sync.sync_all().await.unwrap();
    assert_eq!(stats.artists, 5);
    assert_eq!(stats.albums, 2);
    assert_eq!(stats.songs, 11);
    assert_eq!(stats.playlists, 1);
    assert_eq!(stats.total(), 19);

    let cache = cache.lock().unwrap();
    let counts = cache.stats().unwrap();
    assert_eq!(counts.songs, 11);
    assert_eq!(counts.artists, 5);
    assert!(cache.get_state(LAST_SYNC_KEY).unwrap().is_some());

    let playlist = cache.get_playlists(&Default::default()).unwrap();
    assert_eq!(playlist.items[0].songs.len(), 2);
}

#[tokio::test]
async fn test_sync_twice_is_idempotent() {
    let cache = shared_cache();
    let sync = CatalogSync::new(FakeRemote::catalog(), Arc::clone(&cache), 4);

    sync.sync_all().await.unwrap();
    sync.sync_all().await.unwrap();

    let counts = cache.lock().unwrap().stats().unwrap();
    assert_eq!(counts.artists, 5);
    assert_eq!(counts.songs, 11);
}

#[tokio::test]
async fn test_sync_emits_events() {
    let events = EventBus::new();
    let mut rx = events.subscribe();
    let sync = CatalogSync::new(FakeRemote::catalog(), shared_cache(), 100).with_events(events);

    sync.sync_all().await.unwrap();

    let mut updated = Vec::new();
    loop {
        match rx.recv().await.unwrap() {
            Event::CacheUpdated { item_type, count } => updated.push((item_type, count)),
            Event::SyncFinished => break,
            _ => {}
        }
    }
    assert_eq!(
        updated,
        vec![
            (ItemType::Artist, 5),
            (ItemType::Album, 2),
            (ItemType::Song, 11),
            (ItemType::Playlist, 1),
        ]
    );
}

#[tokio::test]
async fn test_sync_remote_error_leaves_cache_untouched() {
    let remote = FakeRemote::catalog();
    remote.offline.store(true, Ordering::SeqCst);
    let cache = shared_cache();
    let sync = CatalogSync::new(remote, Arc::clone(&cache), 10);

    let err = sync.sync_all().await.unwrap_err();
    assert!(matches!(err, MirrorError::Remote(_)));
    assert_eq!(cache.lock().unwrap().stats().unwrap().artists, 0);
}

#[tokio::test]
async fn test_sync_task_runs_until_stopped() {
    let cache = shared_cache();
    let sync = Arc::new(CatalogSync::new(FakeRemote::catalog(), Arc::clone(&cache), 2));
    let task = sync_task(sync, Duration::from_secs(3600));

    task.start().unwrap();
    timeout(Duration::from_secs(5), async {
        while cache.lock().unwrap().get_state(LAST_SYNC_KEY).unwrap().is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert!(task.is_running());
    task.stop().unwrap();
    assert_eq!(cache.lock().unwrap().stats().unwrap().songs, 11);
}

#[tokio::test]
async fn test_sync_task_survives_remote_errors() {
    let remote = FakeRemote::catalog();
    remote.offline.store(true, Ordering::SeqCst);
    let sync = Arc::new(CatalogSync::new(remote, shared_cache(), 10));

    let task = sync_task(Arc::clone(&sync), Duration::from_millis(10));
    let fatal = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fatal);
    task.set_fatal_hook(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    task.start().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(task.is_running());
    assert_eq!(fatal.load(Ordering::SeqCst), 0);
    task.stop().unwrap();
}
