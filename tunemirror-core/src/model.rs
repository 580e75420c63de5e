//! Catalog entities mirrored from the remote server.
//!
//! Artists own albums, albums own songs, and playlists reference songs
//! independently of that tree. [`Item`] is the tagged view over all four.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Album song count reported before the album's songs have been fetched.
pub const SONG_COUNT_UNKNOWN: i32 = -1;

/// Opaque server-side key, unique within its entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Artist,
    Album,
    Song,
    Playlist,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Artist => "artist",
            ItemType::Album => "album",
            ItemType::Song => "song",
            ItemType::Playlist => "playlist",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "artist" => Some(ItemType::Artist),
            "album" => Some(ItemType::Album),
            "song" => Some(ItemType::Song),
            "playlist" => Some(ItemType::Playlist),
            _ => None,
        }
    }
}

/// An (id, name) pair used for secondary artist credits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdName {
    pub id: Id,
    pub name: String,
}

impl IdName {
    pub fn new(id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: Id,
    pub name: String,
    /// Album ids, filled lazily. May be shorter than `album_count`.
    pub albums: Vec<Id>,
    pub album_count: u32,
    /// Seconds.
    pub total_duration: u32,
    pub favorite: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: Id,
    pub name: String,
    pub year: i32,
    pub duration: u32,
    /// Primary artist.
    pub artist: Id,
    pub additional_artists: Vec<IdName>,
    pub songs: Vec<Id>,
    /// 0 for an empty album, [`SONG_COUNT_UNKNOWN`] when not fetched yet.
    pub song_count: i32,
    pub image_id: String,
    pub disc_count: u32,
    pub favorite: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: Id,
    pub name: String,
    pub duration: u32,
    /// Track number on its disc.
    pub index: u32,
    pub album: Id,
    pub disc_number: u32,
    pub artists: Vec<IdName>,
    pub album_artist: Id,
    pub favorite: bool,
}

impl Song {
    pub fn display_artist(&self) -> &str {
        self.artists
            .first()
            .map(|a| a.name.as_str())
            .unwrap_or("Unknown Artist")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: Id,
    pub name: String,
    pub duration: u32,
    /// Song ids in playlist rank order.
    pub songs: Vec<Id>,
    pub song_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: Id,
    pub name: String,
}

/// Any catalog entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Item {
    Artist(Artist),
    Album(Album),
    Song(Song),
    Playlist(Playlist),
}

impl Item {
    pub fn id(&self) -> &Id {
        match self {
            Item::Artist(a) => &a.id,
            Item::Album(a) => &a.id,
            Item::Song(s) => &s.id,
            Item::Playlist(p) => &p.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Item::Artist(a) => &a.name,
            Item::Album(a) => &a.name,
            Item::Song(s) => &s.name,
            Item::Playlist(p) => &p.name,
        }
    }

    pub fn item_type(&self) -> ItemType {
        match self {
            Item::Artist(_) => ItemType::Artist,
            Item::Album(_) => ItemType::Album,
            Item::Song(_) => ItemType::Song,
            Item::Playlist(_) => ItemType::Playlist,
        }
    }

    /// Artists trust `album_count` over the (possibly unfetched) album list.
    pub fn has_children(&self) -> bool {
        match self {
            Item::Artist(a) => a.album_count > 0,
            Item::Album(a) => a.song_count != 0,
            Item::Song(_) => false,
            Item::Playlist(p) => p.song_count > 0,
        }
    }

    pub fn children(&self) -> &[Id] {
        match self {
            Item::Artist(a) => &a.albums,
            Item::Album(a) => &a.songs,
            Item::Song(_) => &[],
            Item::Playlist(p) => &p.songs,
        }
    }

    pub fn parent(&self) -> Option<&Id> {
        let parent = match self {
            Item::Album(a) => &a.artist,
            Item::Song(s) => &s.album,
            Item::Artist(_) | Item::Playlist(_) => return None,
        };
        (!parent.is_empty()).then_some(parent)
    }
}

impl From<Artist> for Item {
    fn from(value: Artist) -> Self {
        Item::Artist(value)
    }
}

impl From<Album> for Item {
    fn from(value: Album) -> Self {
        Item::Album(value)
    }
}

impl From<Song> for Item {
    fn from(value: Song) -> Self {
        Item::Song(value)
    }
}

impl From<Playlist> for Item {
    fn from(value: Playlist) -> Self {
        Item::Playlist(value)
    }
}
