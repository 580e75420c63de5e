//! Catalog upserts and paged reads.
//!
//! Every write is one transaction per call. Every paged read takes its count
//! and its rows inside one transaction so both come from the same snapshot.

use crate::cache::{now_secs, LocalCache};
use crate::tx::TxGuard;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;
use tunemirror_core::error::{MirrorError, Result};
use tunemirror_core::model::{Album, Artist, Genre, Id, IdName, Playlist, Song};
use tunemirror_core::query::{Page, Paging, QueryOpts};

const ARTIST_COLUMNS: &str = "id, name, album_count, total_duration, favorite";
const ALBUM_COLUMNS: &str =
    "id, name, year, duration, artist_id, song_count, image_id, disc_count, favorite";
const SONG_COLUMNS: &str =
    "id, name, duration, track_index, album_id, disc_number, album_artist, favorite";
const PLAYLIST_COLUMNS: &str = "id, name, duration, song_count";

impl LocalCache {
    /// The album list is only rewritten when the artist carries it (or is
    /// known to have none).
    pub fn update_artists(&self, artists: &[Artist]) -> Result<()> {
        if artists.is_empty() {
            return Ok(());
        }
        require_ids(artists.iter().map(|a| &a.id), "artist")?;

        let now = now_secs();
        let mut tx = TxGuard::begin(&self.conn)?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO artists (id, name, album_count, total_duration, favorite, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    album_count = excluded.album_count,
                    total_duration = excluded.total_duration,
                    favorite = excluded.favorite,
                    updated_at = excluded.updated_at",
            )?;
            for artist in artists {
                stmt.execute(params![
                    artist.id.as_str(),
                    artist.name,
                    artist.album_count,
                    artist.total_duration,
                    artist.favorite,
                    now,
                ])?;
                if !artist.albums.is_empty() || artist.album_count == 0 {
                    replace_links(
                        &tx,
                        "artist_albums",
                        "artist_id",
                        "album_id",
                        &artist.id,
                        &artist.albums,
                    )?;
                }
            }
        }
        tx.set_ok();
        tx.finish()?;

        debug!("Upserted {} artists", artists.len());
        Ok(())
    }

    /// Same rule as artists for the song list, keyed on `song_count`.
    pub fn update_albums(&self, albums: &[Album]) -> Result<()> {
        if albums.is_empty() {
            return Ok(());
        }
        require_ids(albums.iter().map(|a| &a.id), "album")?;

        let now = now_secs();
        let mut tx = TxGuard::begin(&self.conn)?;
        {
            let mut upsert = tx.prepare_cached(
                "INSERT INTO albums (id, name, year, duration, artist_id, song_count,
                                     image_id, disc_count, favorite, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    year = excluded.year,
                    duration = excluded.duration,
                    artist_id = excluded.artist_id,
                    song_count = excluded.song_count,
                    image_id = excluded.image_id,
                    disc_count = excluded.disc_count,
                    favorite = excluded.favorite,
                    updated_at = excluded.updated_at",
            )?;
            for album in albums {
                upsert.execute(params![
                    album.id.as_str(),
                    album.name,
                    album.year,
                    album.duration,
                    album.artist.as_str(),
                    album.song_count,
                    album.image_id,
                    album.disc_count,
                    album.favorite,
                    now,
                ])?;
                replace_credits(&tx, "album_artists", "album_id", &album.id, &album.additional_artists)?;
                if !album.songs.is_empty() || album.song_count == 0 {
                    replace_links(
                        &tx,
                        "album_songs",
                        "album_id",
                        "song_id",
                        &album.id,
                        &album.songs,
                    )?;
                }
            }
        }
        tx.set_ok();
        tx.finish()?;

        debug!("Upserted {} albums", albums.len());
        Ok(())
    }

    pub fn update_songs(&self, songs: &[Song]) -> Result<()> {
        if songs.is_empty() {
            return Ok(());
        }
        require_ids(songs.iter().map(|s| &s.id), "song")?;

        let now = now_secs();
        let mut tx = TxGuard::begin(&self.conn)?;
        {
            let mut upsert = tx.prepare_cached(
                "INSERT INTO songs (id, name, duration, track_index, album_id, disc_number,
                                    album_artist, favorite, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    duration = excluded.duration,
                    track_index = excluded.track_index,
                    album_id = excluded.album_id,
                    disc_number = excluded.disc_number,
                    album_artist = excluded.album_artist,
                    favorite = excluded.favorite,
                    updated_at = excluded.updated_at",
            )?;
            for song in songs {
                upsert.execute(params![
                    song.id.as_str(),
                    song.name,
                    song.duration,
                    song.index,
                    song.album.as_str(),
                    song.disc_number,
                    song.album_artist.as_str(),
                    song.favorite,
                    now,
                ])?;
                replace_credits(&tx, "song_artists", "song_id", &song.id, &song.artists)?;
            }
        }
        tx.set_ok();
        tx.finish()?;

        debug!("Upserted {} songs", songs.len());
        Ok(())
    }

    /// Membership is only rewritten when the playlist carries its song list
    /// (or is known to be empty). Summaries from a listing keep what is stored.
    pub fn update_playlists(&self, playlists: &[Playlist]) -> Result<()> {
        if playlists.is_empty() {
            return Ok(());
        }
        require_ids(playlists.iter().map(|p| &p.id), "playlist")?;

        let now = now_secs();
        let mut tx = TxGuard::begin(&self.conn)?;
        {
            let mut upsert = tx.prepare_cached(
                "INSERT INTO playlists (id, name, duration, song_count, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    duration = excluded.duration,
                    song_count = excluded.song_count,
                    updated_at = excluded.updated_at",
            )?;
            let mut clear = tx.prepare_cached("DELETE FROM playlist_songs WHERE playlist_id = ?1")?;
            let mut insert = tx.prepare_cached(
                "INSERT INTO playlist_songs (playlist_id, song_id, rank) VALUES (?1, ?2, ?3)",
            )?;

            for playlist in playlists {
                upsert.execute(params![
                    playlist.id.as_str(),
                    playlist.name,
                    playlist.duration,
                    playlist.song_count,
                    now,
                ])?;

                if playlist.songs.is_empty() && playlist.song_count != 0 {
                    continue;
                }
                clear.execute(params![playlist.id.as_str()])?;
                for (rank, song_id) in playlist.songs.iter().enumerate() {
                    insert.execute(params![playlist.id.as_str(), song_id.as_str(), rank as i64])?;
                }
            }
        }
        tx.set_ok();
        tx.finish()?;

        debug!("Upserted {} playlists", playlists.len());
        Ok(())
    }

    pub fn update_genres(&self, genres: &[Genre]) -> Result<()> {
        if genres.is_empty() {
            return Ok(());
        }
        require_ids(genres.iter().map(|g| &g.id), "genre")?;

        let mut tx = TxGuard::begin(&self.conn)?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO genres (id, name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            )?;
            for genre in genres {
                stmt.execute(params![genre.id.as_str(), genre.name])?;
            }
        }
        tx.set_ok();
        tx.finish()?;
        Ok(())
    }

    pub fn get_artists(&self, opts: &QueryOpts) -> Result<Page<Artist>> {
        let mut tx = TxGuard::begin(&self.conn)?;
        let (mut items, paging) = read_page(
            &tx,
            "artists",
            ARTIST_COLUMNS,
            opts.filter.to_sql(),
            opts,
            artist_from_row,
        )?;
        for artist in &mut items {
            artist.albums = artist_album_ids(&tx, &artist.id)?;
        }
        tx.set_ok();
        tx.finish()?;
        Ok(Page { items, paging })
    }

    pub fn get_albums(&self, opts: &QueryOpts) -> Result<Page<Album>> {
        let mut tx = TxGuard::begin(&self.conn)?;
        let (mut items, paging) = read_page(
            &tx,
            "albums",
            ALBUM_COLUMNS,
            opts.filter.to_sql(),
            opts,
            album_from_row,
        )?;
        for album in &mut items {
            fill_album(&tx, album)?;
        }
        tx.set_ok();
        tx.finish()?;
        Ok(Page { items, paging })
    }

    pub fn get_songs(&self, opts: &QueryOpts) -> Result<Page<Song>> {
        let mut tx = TxGuard::begin(&self.conn)?;
        let (mut items, paging) = read_page(
            &tx,
            "songs",
            SONG_COLUMNS,
            opts.filter.to_sql(),
            opts,
            song_from_row,
        )?;
        for song in &mut items {
            song.artists = credits(&tx, "song_artists", "song_id", &song.id)?;
        }
        tx.set_ok();
        tx.finish()?;
        Ok(Page { items, paging })
    }

    /// Playlists carry no favorite flag, so the filter is ignored here.
    pub fn get_playlists(&self, opts: &QueryOpts) -> Result<Page<Playlist>> {
        let mut tx = TxGuard::begin(&self.conn)?;
        let (mut items, paging) =
            read_page(&tx, "playlists", PLAYLIST_COLUMNS, "", opts, playlist_from_row)?;
        for playlist in &mut items {
            playlist.songs = playlist_song_ids(&tx, &playlist.id)?;
        }
        tx.set_ok();
        tx.finish()?;
        Ok(Page { items, paging })
    }

    pub fn get_artist(&self, id: &Id) -> Result<Option<Artist>> {
        let artist = self
            .conn
            .query_row(
                &format!("SELECT {ARTIST_COLUMNS} FROM artists WHERE id = ?1"),
                params![id.as_str()],
                artist_from_row,
            )
            .optional()?;

        match artist {
            Some(mut artist) => {
                artist.albums = artist_album_ids(&self.conn, &artist.id)?;
                Ok(Some(artist))
            }
            None => Ok(None),
        }
    }

    pub fn get_album(&self, id: &Id) -> Result<Option<Album>> {
        let album = self
            .conn
            .query_row(
                &format!("SELECT {ALBUM_COLUMNS} FROM albums WHERE id = ?1"),
                params![id.as_str()],
                album_from_row,
            )
            .optional()?;

        match album {
            Some(mut album) => {
                fill_album(&self.conn, &mut album)?;
                Ok(Some(album))
            }
            None => Ok(None),
        }
    }

    pub fn get_song(&self, id: &Id) -> Result<Option<Song>> {
        let song = self
            .conn
            .query_row(
                &format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = ?1"),
                params![id.as_str()],
                song_from_row,
            )
            .optional()?;

        match song {
            Some(mut song) => {
                song.artists = credits(&self.conn, "song_artists", "song_id", &song.id)?;
                Ok(Some(song))
            }
            None => Ok(None),
        }
    }

    pub fn get_playlist(&self, id: &Id) -> Result<Option<Playlist>> {
        let playlist = self
            .conn
            .query_row(
                &format!("SELECT {PLAYLIST_COLUMNS} FROM playlists WHERE id = ?1"),
                params![id.as_str()],
                playlist_from_row,
            )
            .optional()?;

        match playlist {
            Some(mut playlist) => {
                playlist.songs = playlist_song_ids(&self.conn, &playlist.id)?;
                Ok(Some(playlist))
            }
            None => Ok(None),
        }
    }

    /// Albums of an artist, oldest first.
    pub fn get_artist_albums(&self, artist_id: &Id) -> Result<Vec<Album>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALBUM_COLUMNS} FROM albums WHERE artist_id = ?1
             ORDER BY year, name COLLATE NOCASE, id"
        ))?;
        let mut albums = stmt
            .query_map(params![artist_id.as_str()], album_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for album in &mut albums {
            fill_album(&self.conn, album)?;
        }
        Ok(albums)
    }

    /// Songs of an album in disc and track order.
    pub fn get_album_songs(&self, album_id: &Id) -> Result<Vec<Song>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SONG_COLUMNS} FROM songs WHERE album_id = ?1
             ORDER BY disc_number, track_index, id"
        ))?;
        let songs = stmt
            .query_map(params![album_id.as_str()], song_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        with_song_artists(&self.conn, songs)
    }

    /// Cached songs of a playlist in rank order. Members not cached yet are skipped.
    pub fn get_playlist_songs(&self, playlist_id: &Id) -> Result<Vec<Song>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.name, s.duration, s.track_index, s.album_id, s.disc_number,
                    s.album_artist, s.favorite
             FROM playlist_songs ps
             JOIN songs s ON s.id = ps.song_id
             WHERE ps.playlist_id = ?1
             ORDER BY ps.rank",
        )?;
        let songs = stmt
            .query_map(params![playlist_id.as_str()], song_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        with_song_artists(&self.conn, songs)
    }

    pub fn get_genres(&self) -> Result<Vec<Genre>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM genres ORDER BY name COLLATE NOCASE, id")?;
        let genres = stmt
            .query_map([], |row| {
                Ok(Genre {
                    id: Id::new(row.get::<_, String>(0)?),
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(genres)
    }
}

fn require_ids<'a>(mut ids: impl Iterator<Item = &'a Id>, kind: &str) -> Result<()> {
    if ids.any(Id::is_empty) {
        return Err(MirrorError::InvalidInput(format!("{kind} with empty id")));
    }
    Ok(())
}

/// Count plus one page of rows. `filter` and the sort clause are fixed SQL
/// fragments; limit and offset are bound.
fn read_page<T, F>(
    conn: &Connection,
    table: &str,
    columns: &str,
    filter: &str,
    opts: &QueryOpts,
    map: F,
) -> Result<(Vec<T>, Paging)>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {table}{filter}"),
        [],
        |row| row.get(0),
    )?;

    let mut paging = opts.paging;
    paging.set_total_items(total as u64);

    // A page size of zero means everything
    let limit = if paging.page_size == 0 {
        -1
    } else {
        i64::try_from(paging.page_size).unwrap_or(i64::MAX)
    };
    // Past anything SQLite can address, so past the last row
    let Some(offset) = paging.checked_offset().and_then(|o| i64::try_from(o).ok()) else {
        return Ok((Vec::new(), paging));
    };

    let sql = format!(
        "SELECT {columns} FROM {table}{filter}{} LIMIT ?1 OFFSET ?2",
        opts.sort.to_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params![limit, offset], map)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((items, paging))
}

fn replace_credits(
    conn: &Connection,
    table: &str,
    owner_column: &str,
    owner: &Id,
    artists: &[IdName],
) -> Result<()> {
    conn.prepare_cached(&format!("DELETE FROM {table} WHERE {owner_column} = ?1"))?
        .execute(params![owner.as_str()])?;

    let mut insert = conn.prepare_cached(&format!(
        "INSERT INTO {table} ({owner_column}, rank, artist_id, name) VALUES (?1, ?2, ?3, ?4)"
    ))?;
    for (rank, artist) in artists.iter().enumerate() {
        insert.execute(params![owner.as_str(), rank as i64, artist.id.as_str(), artist.name])?;
    }
    Ok(())
}

fn replace_links(
    conn: &Connection,
    table: &str,
    owner_column: &str,
    member_column: &str,
    owner: &Id,
    members: &[Id],
) -> Result<()> {
    conn.prepare_cached(&format!("DELETE FROM {table} WHERE {owner_column} = ?1"))?
        .execute(params![owner.as_str()])?;

    let mut insert = conn.prepare_cached(&format!(
        "INSERT INTO {table} ({owner_column}, {member_column}, rank) VALUES (?1, ?2, ?3)"
    ))?;
    for (rank, member) in members.iter().enumerate() {
        insert.execute(params![owner.as_str(), member.as_str(), rank as i64])?;
    }
    Ok(())
}

fn credits(conn: &Connection, table: &str, owner_column: &str, owner: &Id) -> Result<Vec<IdName>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT artist_id, name FROM {table} WHERE {owner_column} = ?1 ORDER BY rank"
    ))?;
    let artists = stmt
        .query_map(params![owner.as_str()], |row| {
            Ok(IdName::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(artists)
}

fn ids(conn: &Connection, sql: &str, owner: &Id) -> Result<Vec<Id>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let ids = stmt
        .query_map(params![owner.as_str()], |row| row.get::<_, String>(0))?
        .map(|id| id.map(Id::new))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// The stored album list, or the cached albums of the artist when none was stored.
fn artist_album_ids(conn: &Connection, artist_id: &Id) -> Result<Vec<Id>> {
    let stored = ids(
        conn,
        "SELECT album_id FROM artist_albums WHERE artist_id = ?1 ORDER BY rank",
        artist_id,
    )?;
    if !stored.is_empty() {
        return Ok(stored);
    }
    ids(
        conn,
        "SELECT id FROM albums WHERE artist_id = ?1 ORDER BY year, name COLLATE NOCASE, id",
        artist_id,
    )
}

fn playlist_song_ids(conn: &Connection, playlist_id: &Id) -> Result<Vec<Id>> {
    ids(
        conn,
        "SELECT song_id FROM playlist_songs WHERE playlist_id = ?1 ORDER BY rank",
        playlist_id,
    )
}

fn fill_album(conn: &Connection, album: &mut Album) -> Result<()> {
    album.additional_artists = credits(conn, "album_artists", "album_id", &album.id)?;
    album.songs = ids(
        conn,
        "SELECT song_id FROM album_songs WHERE album_id = ?1 ORDER BY rank",
        &album.id,
    )?;
    if album.songs.is_empty() {
        album.songs = ids(
            conn,
            "SELECT id FROM songs WHERE album_id = ?1 ORDER BY disc_number, track_index, id",
            &album.id,
        )?;
    }
    Ok(())
}

fn with_song_artists(conn: &Connection, mut songs: Vec<Song>) -> Result<Vec<Song>> {
    for song in &mut songs {
        song.artists = credits(conn, "song_artists", "song_id", &song.id)?;
    }
    Ok(songs)
}

fn artist_from_row(row: &Row<'_>) -> rusqlite::Result<Artist> {
    Ok(Artist {
        id: Id::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        albums: Vec::new(),
        album_count: row.get(2)?,
        total_duration: row.get(3)?,
        favorite: row.get(4)?,
    })
}

fn album_from_row(row: &Row<'_>) -> rusqlite::Result<Album> {
    Ok(Album {
        id: Id::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        year: row.get(2)?,
        duration: row.get(3)?,
        artist: Id::new(row.get::<_, String>(4)?),
        additional_artists: Vec::new(),
        songs: Vec::new(),
        song_count: row.get(5)?,
        image_id: row.get(6)?,
        disc_count: row.get(7)?,
        favorite: row.get(8)?,
    })
}

fn song_from_row(row: &Row<'_>) -> rusqlite::Result<Song> {
    Ok(Song {
        id: Id::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        duration: row.get(2)?,
        index: row.get(3)?,
        album: Id::new(row.get::<_, String>(4)?),
        disc_number: row.get(5)?,
        artists: Vec::new(),
        album_artist: Id::new(row.get::<_, String>(6)?),
        favorite: row.get(7)?,
    })
}

fn playlist_from_row(row: &Row<'_>) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: Id::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        duration: row.get(2)?,
        songs: Vec::new(),
        song_count: row.get(3)?,
    })
}
