//! Shared test utilities for the tunemirror workspace
//!
//! Fixtures for catalog entities used across the test suites of several
//! crates. Only available when the "test-utils" feature is enabled.

use crate::model::{Album, Artist, Id, IdName, Playlist, Song};

/// Create a test song belonging to `album`
///
/// # Examples
///
/// ```
/// # use tunemirror_core::test_utils::create_test_song;
/// let song = create_test_song("s1", "alb1");
/// assert_eq!(song.id.as_str(), "s1");
/// assert_eq!(song.name, "Song s1");
/// ```
pub fn create_test_song(id: &str, album: &str) -> Song {
    Song {
        id: Id::new(id),
        name: format!("Song {}", id),
        duration: 180,
        index: 1,
        album: Id::new(album),
        disc_number: 1,
        artists: vec![IdName::new("ar-test", "Test Artist")],
        album_artist: Id::new("ar-test"),
        favorite: false,
    }
}

/// Create `count` songs named `<prefix>0..` on one album, numbered in order
pub fn create_test_songs(prefix: &str, album: &str, count: usize) -> Vec<Song> {
    (0..count)
        .map(|i| Song {
            index: i as u32 + 1,
            ..create_test_song(&format!("{}{}", prefix, i), album)
        })
        .collect()
}

/// Create a test artist without album links
pub fn create_test_artist(id: &str, name: &str) -> Artist {
    Artist {
        id: Id::new(id),
        name: name.to_owned(),
        albums: Vec::new(),
        album_count: 0,
        total_duration: 0,
        favorite: false,
    }
}

/// Create a test album by `artist` whose songs have not been fetched yet
pub fn create_test_album(id: &str, name: &str, artist: &str) -> Album {
    Album {
        id: Id::new(id),
        name: name.to_owned(),
        year: 2001,
        duration: 2400,
        artist: Id::new(artist),
        additional_artists: Vec::new(),
        songs: Vec::new(),
        song_count: crate::model::SONG_COUNT_UNKNOWN,
        image_id: format!("img-{}", id),
        disc_count: 1,
        favorite: false,
    }
}

/// Create a test playlist holding `songs` in the given order
pub fn create_test_playlist(id: &str, name: &str, songs: &[&str]) -> Playlist {
    Playlist {
        id: Id::new(id),
        name: name.to_owned(),
        duration: 180 * songs.len() as u32,
        songs: songs.iter().map(|s| Id::new(*s)).collect(),
        song_count: songs.len() as u32,
    }
}
