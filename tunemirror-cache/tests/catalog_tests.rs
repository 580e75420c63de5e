//! Upsert and paged read tests against an in-memory cache

use std::collections::HashSet;
use tunemirror_cache::{CacheStats, LocalCache};
use tunemirror_core::error::MirrorError;
use tunemirror_core::model::{Album, Artist, Genre, Id, IdName, Playlist, Song};
use tunemirror_core::query::{Filter, Page, QueryOpts, Sort, SortDirection};
use tunemirror_core::test_utils::{
    create_test_album, create_test_artist, create_test_playlist, create_test_song,
    create_test_songs,
};

fn artists(count: usize) -> Vec<Artist> {
    (0..count)
        .map(|i| create_test_artist(&format!("ar{:03}", i), &format!("Artist {:03}", i)))
        .collect()
}

fn ids<'a>(items: impl IntoIterator<Item = &'a Id>) -> Vec<String> {
    items.into_iter().map(|id| id.as_str().to_owned()).collect()
}

/// Walk every page from the first one and collect the items in delivered order
fn read_all<T>(page_size: u64, sort: Sort, mut fetch: impl FnMut(&QueryOpts) -> Page<T>) -> Vec<T> {
    let mut opts = QueryOpts::page(0, page_size).with_sort(sort);
    let mut seen = Vec::new();
    loop {
        let page = fetch(&opts);
        seen.extend(page.items);
        if page.paging.total_pages == 0 || !page.paging.has_next() {
            break;
        }
        opts.paging = page.paging.next_page();
    }
    seen
}

fn read_all_artists(cache: &LocalCache, page_size: u64, sort: Sort) -> Vec<String> {
    let artists = read_all(page_size, sort, |opts| cache.get_artists(opts).unwrap());
    ids(artists.iter().map(|a| &a.id))
}

/// Store `input` in both orders, then page through it at several sizes and
/// compare every field against the input sorted by id.
fn assert_paged_round_trip<T>(
    mut input: Vec<T>,
    id: impl Fn(&T) -> &Id,
    store: impl Fn(&LocalCache, &[T]),
    fetch: impl Fn(&LocalCache, &QueryOpts) -> Page<T>,
) where
    T: Clone + PartialEq + std::fmt::Debug,
{
    let mut expected = input.clone();
    expected.sort_by(|a, b| id(a).cmp(id(b)));

    for reversed in [false, true] {
        if reversed {
            input.reverse();
        }
        let cache = LocalCache::open_in_memory().unwrap();
        store(&cache, &input);

        for page_size in [1u64, 2, 3, 100] {
            let seen = read_all(page_size, Sort::default(), |opts| fetch(&cache, opts));
            assert_eq!(seen, expected, "reversed {reversed}, page size {page_size}");
        }
    }
}

#[test]
fn test_paging_round_trip() {
    for count in [1usize, 2, 3, 7, 250] {
        for reversed in [false, true] {
            let cache = LocalCache::open_in_memory().unwrap();
            let mut input = artists(count);
            if reversed {
                input.reverse();
            }
            cache.update_artists(&input).unwrap();

            let mut expected: Vec<String> = ids(input.iter().map(|a| &a.id));
            expected.sort();

            for page_size in [1u64, 2, 3, 100] {
                let seen = read_all_artists(&cache, page_size, Sort::default());
                assert_eq!(seen, expected, "count {count}, page size {page_size}");
            }
        }
    }
}

#[test]
fn test_artists_paged_round_trip() {
    let input: Vec<Artist> = (0..7)
        .map(|i| Artist {
            albums: vec![Id::new(format!("al{i}-b")), Id::new(format!("al{i}-a"))],
            album_count: 2,
            total_duration: 1000 + i,
            favorite: i % 2 == 0,
            ..create_test_artist(&format!("ar{i}"), &format!("Artist {i}"))
        })
        .collect();

    assert_paged_round_trip(
        input,
        |a| &a.id,
        |cache, items| cache.update_artists(items).unwrap(),
        |cache, opts| cache.get_artists(opts).unwrap(),
    );
}

#[test]
fn test_albums_paged_round_trip() {
    let input: Vec<Album> = (0..7)
        .map(|i| {
            let songs: Vec<Id> = (0..=i).rev().map(|n| Id::new(format!("s{i}-{n}"))).collect();
            Album {
                additional_artists: vec![IdName::new(format!("guest{i}"), "Guest")],
                song_count: songs.len() as i32,
                songs,
                year: 1990 + i as i32,
                favorite: i % 3 == 0,
                ..create_test_album(&format!("al{i}"), &format!("Album {i}"), "ar1")
            }
        })
        .collect();

    assert_paged_round_trip(
        input,
        |a| &a.id,
        |cache, items| cache.update_albums(items).unwrap(),
        |cache, opts| cache.get_albums(opts).unwrap(),
    );
}

#[test]
fn test_songs_paged_round_trip() {
    let input: Vec<Song> = create_test_songs("s", "al1", 7)
        .into_iter()
        .enumerate()
        .map(|(i, song)| Song {
            artists: vec![
                IdName::new(format!("ar{i}"), format!("Artist {i}")),
                IdName::new("ar-test", "Test Artist"),
            ],
            disc_number: 1 + i as u32 % 2,
            favorite: i == 3,
            ..song
        })
        .collect();

    assert_paged_round_trip(
        input,
        |s| &s.id,
        |cache, items| cache.update_songs(items).unwrap(),
        |cache, opts| cache.get_songs(opts).unwrap(),
    );
}

#[test]
fn test_playlists_paged_round_trip() {
    let input: Vec<Playlist> = ["p0", "p1", "p2", "p3", "p4"]
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let members: Vec<String> = (0..i).map(|n| format!("{id}-s{n}")).rev().collect();
            let members: Vec<&str> = members.iter().map(String::as_str).collect();
            create_test_playlist(id, &format!("Playlist {i}"), &members)
        })
        .collect();

    assert_paged_round_trip(
        input,
        |p| &p.id,
        |cache, items| cache.update_playlists(items).unwrap(),
        |cache, opts| cache.get_playlists(opts).unwrap(),
    );
}

#[test]
fn test_page_far_past_the_end() {
    let cache = LocalCache::open_in_memory().unwrap();
    cache.update_artists(&artists(5)).unwrap();

    let page = cache.get_artists(&QueryOpts::page(u64::MAX / 2, 4)).unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_items(), 5);
    assert!(page.is_last());

    let page = cache.get_artists(&QueryOpts::page(u64::MAX, u64::MAX)).unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_items(), 5);

    // One page as large as the type allows still holds everything
    let page = cache.get_artists(&QueryOpts::page(0, u64::MAX)).unwrap();
    assert_eq!(page.items.len(), 5);
    let page = cache.get_artists(&QueryOpts::page(1, u64::MAX)).unwrap();
    assert!(page.items.is_empty());
}

#[test]
fn test_page_totals() {
    let cache = LocalCache::open_in_memory().unwrap();
    cache.update_artists(&artists(57)).unwrap();

    let page = cache.get_artists(&QueryOpts::page(2, 20)).unwrap();
    assert_eq!(page.total_items(), 57);
    assert_eq!(page.paging.total_pages, 3);
    assert_eq!(page.items.len(), 17);
    assert!(page.is_last());

    let beyond = cache.get_artists(&QueryOpts::page(5, 20)).unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total_items(), 57);
}

#[test]
fn test_zero_page_size_reads_everything() {
    let cache = LocalCache::open_in_memory().unwrap();
    cache.update_artists(&artists(12)).unwrap();

    let page = cache.get_artists(&QueryOpts::page(0, 0)).unwrap();
    assert_eq!(page.items.len(), 12);
}

#[test]
fn test_upsert_is_idempotent() {
    let cache = LocalCache::open_in_memory().unwrap();
    let input = artists(5);

    cache.update_artists(&input).unwrap();
    cache.update_artists(&input).unwrap();
    assert_eq!(cache.stats().unwrap().artists, 5);

    let mut renamed = input[0].clone();
    renamed.name = "Renamed".to_string();
    renamed.favorite = true;
    cache.update_artists(&[renamed]).unwrap();

    let stored = cache.get_artist(&input[0].id).unwrap().unwrap();
    assert_eq!(stored.name, "Renamed");
    assert!(stored.favorite);
    assert_eq!(cache.stats().unwrap().artists, 5);
}

#[test]
fn test_empty_input_is_noop() {
    let cache = LocalCache::open_in_memory().unwrap();
    cache.update_artists(&[]).unwrap();
    cache.update_albums(&[]).unwrap();
    cache.update_songs(&[]).unwrap();
    cache.update_playlists(&[]).unwrap();
    assert_eq!(cache.stats().unwrap(), CacheStats::default());
}

#[test]
fn test_empty_id_rejected_without_writes() {
    let cache = LocalCache::open_in_memory().unwrap();
    let mut input = artists(3);
    input.push(create_test_artist("", "Nameless"));

    let err = cache.update_artists(&input).unwrap_err();
    assert!(matches!(err, MirrorError::InvalidInput(_)));
    assert_eq!(cache.stats().unwrap().artists, 0);
}

#[test]
fn test_favorites_filter() {
    let cache = LocalCache::open_in_memory().unwrap();
    let mut input = artists(6);
    input[1].favorite = true;
    input[4].favorite = true;
    cache.update_artists(&input).unwrap();

    let opts = QueryOpts::page(0, 10).with_filter(Filter::favorites());
    let page = cache.get_artists(&opts).unwrap();
    assert_eq!(page.total_items(), 2);
    assert_eq!(ids(page.items.iter().map(|a| &a.id)), vec!["ar001", "ar004"]);
}

#[test]
fn test_name_sort_directions() {
    let cache = LocalCache::open_in_memory().unwrap();
    cache
        .update_artists(&[
            create_test_artist("1", "beta"),
            create_test_artist("2", "Alpha"),
            create_test_artist("3", "gamma"),
        ])
        .unwrap();

    let asc = read_all_artists(&cache, 2, Sort::by_name(SortDirection::Asc));
    assert_eq!(asc, vec!["2", "1", "3"]);

    let desc = read_all_artists(&cache, 2, Sort::by_name(SortDirection::Desc));
    assert_eq!(desc, vec!["3", "1", "2"]);
}

#[test]
fn test_random_sort_returns_full_set() {
    let cache = LocalCache::open_in_memory().unwrap();
    cache.update_artists(&artists(20)).unwrap();

    let page = cache
        .get_artists(&QueryOpts::page(0, 0).with_sort(Sort::random()))
        .unwrap();
    let seen: HashSet<_> = page.items.iter().map(|a| a.id.clone()).collect();
    assert_eq!(seen.len(), 20);
}

#[test]
fn test_relationship_fill() {
    let cache = LocalCache::open_in_memory().unwrap();
    cache.update_artists(&[create_test_artist("ar1", "Band")]).unwrap();

    let mut late = create_test_album("al2", "Later", "ar1");
    late.year = 2010;
    let mut early = create_test_album("al1", "Debut", "ar1");
    early.year = 1999;
    early.additional_artists = vec![IdName::new("ar9", "Guest"), IdName::new("ar8", "Producer")];
    cache.update_albums(&[late, early]).unwrap();

    let mut songs = create_test_songs("t", "al1", 3);
    songs[0].disc_number = 2;
    songs[0].artists = vec![IdName::new("ar1", "Band"), IdName::new("ar9", "Guest")];
    cache.update_songs(&songs).unwrap();

    let artist = cache.get_artist(&Id::new("ar1")).unwrap().unwrap();
    assert_eq!(ids(&artist.albums), vec!["al1", "al2"]);

    let album = cache.get_album(&Id::new("al1")).unwrap().unwrap();
    assert_eq!(ids(&album.songs), vec!["t1", "t2", "t0"]);
    assert_eq!(album.additional_artists[0].name, "Guest");
    assert_eq!(album.additional_artists[1].name, "Producer");

    let album_songs = cache.get_album_songs(&Id::new("al1")).unwrap();
    assert_eq!(ids(album_songs.iter().map(|s| &s.id)), vec!["t1", "t2", "t0"]);
    assert_eq!(album_songs[2].artists.len(), 2);

    let albums = cache.get_artist_albums(&Id::new("ar1")).unwrap();
    assert_eq!(albums[0].name, "Debut");
    assert_eq!(albums[0].songs.len(), 3);
}

#[test]
fn test_stored_relationship_lists() {
    let cache = LocalCache::open_in_memory().unwrap();
    let mut artist = create_test_artist("ar1", "Band");
    artist.albums = vec![Id::new("al9"), Id::new("al3")];
    artist.album_count = 2;
    cache.update_artists(&[artist]).unwrap();

    let mut album = create_test_album("al3", "Third", "ar1");
    album.songs = vec![Id::new("t2"), Id::new("t0"), Id::new("t1")];
    album.song_count = 3;
    cache.update_albums(&[album]).unwrap();
    cache.update_songs(&create_test_songs("t", "al3", 3)).unwrap();

    // Listed order wins over what the cached rows would give
    let stored = cache.get_artist(&Id::new("ar1")).unwrap().unwrap();
    assert_eq!(ids(&stored.albums), vec!["al9", "al3"]);
    let stored = cache.get_album(&Id::new("al3")).unwrap().unwrap();
    assert_eq!(ids(&stored.songs), vec!["t2", "t0", "t1"]);

    // Summaries without lists keep them
    let mut summary = create_test_artist("ar1", "Band renamed");
    summary.album_count = 2;
    cache.update_artists(&[summary]).unwrap();
    cache
        .update_albums(&[create_test_album("al3", "Third renamed", "ar1")])
        .unwrap();
    let stored = cache.get_artist(&Id::new("ar1")).unwrap().unwrap();
    assert_eq!(stored.name, "Band renamed");
    assert_eq!(ids(&stored.albums), vec!["al9", "al3"]);
    let stored = cache.get_album(&Id::new("al3")).unwrap().unwrap();
    assert_eq!(stored.name, "Third renamed");
    assert_eq!(ids(&stored.songs), vec!["t2", "t0", "t1"]);

    // A known empty list drops the stored one, the cached rows remain
    cache
        .update_artists(&[create_test_artist("ar1", "Band")])
        .unwrap();
    let stored = cache.get_artist(&Id::new("ar1")).unwrap().unwrap();
    assert_eq!(ids(&stored.albums), vec!["al3"]);
}

#[test]
fn test_credits_replaced_on_update() {
    let cache = LocalCache::open_in_memory().unwrap();
    let mut song = create_test_song("s1", "al1");
    song.artists = vec![IdName::new("a", "A"), IdName::new("b", "B")];
    cache.update_songs(&[song.clone()]).unwrap();

    song.artists = vec![IdName::new("c", "C")];
    cache.update_songs(&[song]).unwrap();

    let stored = cache.get_song(&Id::new("s1")).unwrap().unwrap();
    assert_eq!(stored.artists, vec![IdName::new("c", "C")]);
}

#[test]
fn test_song_round_trip() {
    let cache = LocalCache::open_in_memory().unwrap();
    let mut song = create_test_song("s1", "al1");
    song.favorite = true;
    song.index = 7;
    cache.update_songs(&[song.clone()]).unwrap();

    assert_eq!(cache.get_song(&song.id).unwrap(), Some(song));
    assert_eq!(cache.get_song(&Id::new("missing")).unwrap(), None);
}

#[test]
fn test_playlist_rank_order() {
    let cache = LocalCache::open_in_memory().unwrap();
    cache
        .update_songs(&[
            create_test_song("x", "al"),
            create_test_song("y", "al"),
            create_test_song("z", "al"),
        ])
        .unwrap();
    cache
        .update_playlists(&[create_test_playlist("p1", "Mix", &["z", "x", "y", "x"])])
        .unwrap();

    let playlist = cache.get_playlist(&Id::new("p1")).unwrap().unwrap();
    assert_eq!(ids(&playlist.songs), vec!["z", "x", "y", "x"]);

    let songs = cache.get_playlist_songs(&Id::new("p1")).unwrap();
    assert_eq!(ids(songs.iter().map(|s| &s.id)), vec!["z", "x", "y", "x"]);
}

#[test]
fn test_playlist_membership_replacement() {
    let cache = LocalCache::open_in_memory().unwrap();
    cache
        .update_playlists(&[create_test_playlist("p1", "Mix", &["a", "b", "c"])])
        .unwrap();

    // A listing summary without songs keeps the stored membership
    let mut summary = create_test_playlist("p1", "Mix renamed", &[]);
    summary.song_count = 3;
    cache.update_playlists(&[summary]).unwrap();
    let playlist = cache.get_playlist(&Id::new("p1")).unwrap().unwrap();
    assert_eq!(playlist.name, "Mix renamed");
    assert_eq!(ids(&playlist.songs), vec!["a", "b", "c"]);

    cache
        .update_playlists(&[create_test_playlist("p1", "Mix", &["c", "d"])])
        .unwrap();
    let playlist = cache.get_playlist(&Id::new("p1")).unwrap().unwrap();
    assert_eq!(ids(&playlist.songs), vec!["c", "d"]);

    // Known empty clears it
    cache
        .update_playlists(&[create_test_playlist("p1", "Mix", &[])])
        .unwrap();
    let playlist = cache.get_playlist(&Id::new("p1")).unwrap().unwrap();
    assert!(playlist.songs.is_empty());
}

#[test]
fn test_playlists_page_ignores_favorites_filter() {
    let cache = LocalCache::open_in_memory().unwrap();
    cache
        .update_playlists(&[
            create_test_playlist("p1", "One", &["a"]),
            create_test_playlist("p2", "Two", &["b", "c"]),
        ])
        .unwrap();

    let opts = QueryOpts::page(0, 10).with_filter(Filter::favorites());
    let page = cache.get_playlists(&opts).unwrap();
    assert_eq!(page.total_items(), 2);
    assert_eq!(ids(&page.items[1].songs), vec!["b", "c"]);
}

#[test]
fn test_albums_and_songs_pages() {
    let cache = LocalCache::open_in_memory().unwrap();
    cache
        .update_albums(&[
            create_test_album("al1", "Zeta", "ar1"),
            create_test_album("al2", "alpha", "ar1"),
        ])
        .unwrap();
    cache.update_songs(&create_test_songs("s", "al2", 4)).unwrap();

    let albums = cache.get_albums(&QueryOpts::page(0, 10)).unwrap();
    assert_eq!(ids(albums.items.iter().map(|a| &a.id)), vec!["al2", "al1"]);
    assert_eq!(albums.items[0].songs.len(), 4);

    let songs = cache.get_songs(&QueryOpts::page(1, 3)).unwrap();
    assert_eq!(songs.total_items(), 4);
    assert_eq!(songs.items.len(), 1);
    assert_eq!(songs.items[0].artists[0].name, "Test Artist");
}

#[test]
fn test_genres() {
    let cache = LocalCache::open_in_memory().unwrap();
    cache
        .update_genres(&[
            Genre { id: Id::new("g2"), name: "rock".into() },
            Genre { id: Id::new("g1"), name: "Jazz".into() },
        ])
        .unwrap();
    cache
        .update_genres(&[Genre { id: Id::new("g2"), name: "Rock".into() }])
        .unwrap();

    let genres = cache.get_genres().unwrap();
    assert_eq!(genres.len(), 2);
    assert_eq!(genres[0].name, "Jazz");
    assert_eq!(genres[1].name, "Rock");
}
