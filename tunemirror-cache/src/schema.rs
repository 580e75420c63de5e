//! On-disk layout of the cache and the schema level guard.
//!
//! There is no migration path. A file written at another level is reported
//! as a mismatch and has to be recreated; the remote catalog refills it.

use rusqlite::{Connection, OptionalExtension};
use tunemirror_core::error::Result;

/// Bump whenever [`DDL`] changes.
pub const SCHEMA_LEVEL: i64 = 2;

pub(crate) const DDL: &str = "
CREATE TABLE schema_level (
    level INTEGER NOT NULL
);

CREATE TABLE genres (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL
);

CREATE TABLE artists (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    album_count INTEGER NOT NULL DEFAULT 0,
    total_duration INTEGER NOT NULL DEFAULT 0,
    favorite INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

-- album_id is not a foreign key: an artist may list albums not cached yet
CREATE TABLE artist_albums (
    artist_id TEXT NOT NULL,
    album_id TEXT NOT NULL,
    rank INTEGER NOT NULL,

    PRIMARY KEY (artist_id, rank),
    FOREIGN KEY (artist_id) REFERENCES artists(id) ON DELETE CASCADE
);

-- artist_id is not a foreign key: albums may arrive before their artist
CREATE TABLE albums (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    year INTEGER NOT NULL DEFAULT 0,
    duration INTEGER NOT NULL DEFAULT 0,
    artist_id TEXT NOT NULL,
    song_count INTEGER NOT NULL DEFAULT -1,
    image_id TEXT NOT NULL DEFAULT '',
    disc_count INTEGER NOT NULL DEFAULT 1,
    favorite INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE album_artists (
    album_id TEXT NOT NULL,
    rank INTEGER NOT NULL,
    artist_id TEXT NOT NULL,
    name TEXT NOT NULL,

    PRIMARY KEY (album_id, rank),
    FOREIGN KEY (album_id) REFERENCES albums(id) ON DELETE CASCADE
);

CREATE TABLE album_songs (
    album_id TEXT NOT NULL,
    song_id TEXT NOT NULL,
    rank INTEGER NOT NULL,

    PRIMARY KEY (album_id, rank),
    FOREIGN KEY (album_id) REFERENCES albums(id) ON DELETE CASCADE
);

CREATE TABLE songs (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    duration INTEGER NOT NULL DEFAULT 0,
    track_index INTEGER NOT NULL DEFAULT 0,
    album_id TEXT NOT NULL,
    disc_number INTEGER NOT NULL DEFAULT 1,
    album_artist TEXT NOT NULL DEFAULT '',
    favorite INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE song_artists (
    song_id TEXT NOT NULL,
    rank INTEGER NOT NULL,
    artist_id TEXT NOT NULL,
    name TEXT NOT NULL,

    PRIMARY KEY (song_id, rank),
    FOREIGN KEY (song_id) REFERENCES songs(id) ON DELETE CASCADE
);

CREATE TABLE playlists (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    duration INTEGER NOT NULL DEFAULT 0,
    song_count INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

-- song_id is not a foreign key: membership may reference songs not cached yet
CREATE TABLE playlist_songs (
    playlist_id TEXT NOT NULL,
    song_id TEXT NOT NULL,
    rank INTEGER NOT NULL,

    UNIQUE (rank, playlist_id),
    FOREIGN KEY (playlist_id) REFERENCES playlists(id) ON DELETE CASCADE
);

CREATE TABLE state (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);

CREATE TABLE settings (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);

CREATE TABLE downloads (
    id TEXT PRIMARY KEY NOT NULL,
    type TEXT NOT NULL,
    path TEXT NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    last_played INTEGER,
    play_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX idx_albums_artist ON albums(artist_id);
CREATE INDEX idx_songs_album ON songs(album_id);
CREATE INDEX idx_playlist_songs_playlist ON playlist_songs(playlist_id);
";

/// What the version check found in an opened file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// No schema table: a new or empty file.
    Uninitialized,
    Current,
    /// Schema table present with another level, or with no row at all.
    Mismatch(Option<i64>),
}

pub(crate) fn schema_state(conn: &Connection) -> Result<SchemaState> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_level')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(SchemaState::Uninitialized);
    }

    let level: Option<i64> = conn
        .query_row("SELECT level FROM schema_level LIMIT 1", [], |row| row.get(0))
        .optional()?;

    Ok(match level {
        Some(level) if level == SCHEMA_LEVEL => SchemaState::Current,
        other => SchemaState::Mismatch(other),
    })
}

/// Runs the full DDL and records [`SCHEMA_LEVEL`]. Expects an open transaction.
pub(crate) fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(DDL)?;
    conn.execute(
        "INSERT INTO schema_level (level) VALUES (?1)",
        [SCHEMA_LEVEL],
    )?;
    Ok(())
}
