use crate::schema::{self, SchemaState, SCHEMA_LEVEL};
use crate::tx::TxGuard;
use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use tunemirror_core::error::{MirrorError, Result};
use tunemirror_core::model::{Id, ItemType};

/// Local SQLite mirror of the remote catalog.
///
/// One connection per cache. Share it between threads as
/// `Arc<Mutex<LocalCache>>`.
#[derive(Debug)]
pub struct LocalCache {
    pub(crate) conn: Connection,
    path: Option<Utf8PathBuf>,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub artists: u64,
    pub albums: u64,
    pub songs: u64,
    pub playlists: u64,
    pub genres: u64,
    pub downloads: u64,
}

/// A locally stored copy of a remote item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub id: Id,
    pub item_type: ItemType,
    pub path: Utf8PathBuf,
    pub size: u64,
    pub created_at: i64,
    pub last_played: Option<i64>,
    pub play_count: u32,
}

pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| {
            warn!("System time before UNIX_EPOCH, using 0");
            Duration::ZERO
        })
        .as_secs() as i64
}

impl LocalCache {
    /// Open (or create) `<dir>/<instance_id>.db`.
    pub fn open(dir: &Utf8Path, instance_id: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Self::open_path(&cache_file(dir, instance_id))
    }

    pub fn open_path(path: &Utf8Path) -> Result<Self> {
        debug!("Opening cache at {}", path);
        let conn = Connection::open(path)?;
        Self::init(conn, Some(path.to_owned()))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    /// Discard the cache file for `instance_id` and start from an empty one.
    pub fn recreate(dir: &Utf8Path, instance_id: &str) -> Result<Self> {
        let path = cache_file(dir, instance_id);
        match std::fs::remove_file(&path) {
            Ok(()) => info!("Removed cache file {}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Self::open(dir, instance_id)
    }

    fn init(conn: Connection, path: Option<Utf8PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        match schema::schema_state(&conn)? {
            SchemaState::Current => {}
            SchemaState::Uninitialized => {
                let mut tx = TxGuard::begin(&conn)?;
                schema::create_schema(&tx)?;
                tx.set_ok();
                tx.finish()?;
                info!("Initialized cache schema at level {}", SCHEMA_LEVEL);
            }
            SchemaState::Mismatch(found) => {
                warn!(
                    "Cache schema mismatch: expected level {}, found {:?}",
                    SCHEMA_LEVEL, found
                );
                return Err(MirrorError::SchemaMismatch {
                    expected: SCHEMA_LEVEL,
                    found,
                });
            }
        }

        Ok(Self { conn, path })
    }

    /// `None` for in-memory caches.
    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }

    pub fn schema_level(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT level FROM schema_level LIMIT 1", [], |row| row.get(0))?)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let count = |table: &str| -> Result<u64> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as u64)
        };

        Ok(CacheStats {
            artists: count("artists")?,
            albums: count("albums")?,
            songs: count("songs")?,
            playlists: count("playlists")?,
            genres: count("genres")?,
            downloads: count("downloads")?,
        })
    }

    pub fn get_state(&self, key: &str) -> Result<Option<String>> {
        get_value(&self.conn, "state", key)
    }

    pub fn set_state(&self, key: &str, value: &str) -> Result<()> {
        set_value(&self.conn, "state", key, value)
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        get_value(&self.conn, "settings", key)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        set_value(&self.conn, "settings", key, value)
    }

    /// Insert or replace the bookkeeping row for a downloaded item.
    /// Play statistics of an existing row are kept.
    pub fn record_download(
        &self,
        id: &Id,
        item_type: ItemType,
        path: &Utf8Path,
        size: u64,
    ) -> Result<()> {
        if id.is_empty() {
            return Err(MirrorError::InvalidInput("download without id".into()));
        }
        self.conn.execute(
            "INSERT INTO downloads (id, type, path, size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                type = excluded.type,
                path = excluded.path,
                size = excluded.size",
            params![id.as_str(), item_type.as_str(), path.as_str(), size as i64, now_secs()],
        )?;
        Ok(())
    }

    pub fn get_download(&self, id: &Id) -> Result<Option<Download>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, type, path, size, created_at, last_played, play_count
                 FROM downloads WHERE id = ?1",
                params![id.as_str()],
                download_from_row,
            )
            .optional()?)
    }

    /// Most recently played first, never-played last.
    pub fn list_downloads(&self) -> Result<Vec<Download>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, type, path, size, created_at, last_played, play_count
             FROM downloads
             ORDER BY last_played IS NULL, last_played DESC, id",
        )?;
        let downloads = stmt
            .query_map([], download_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(downloads)
    }

    pub fn mark_played(&self, id: &Id) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE downloads SET play_count = play_count + 1, last_played = ?2 WHERE id = ?1",
            params![id.as_str(), now_secs()],
        )?;
        if changed == 0 {
            return Err(MirrorError::NotFound(format!("download {id}")));
        }
        Ok(())
    }
}

fn cache_file(dir: &Utf8Path, instance_id: &str) -> Utf8PathBuf {
    dir.join(format!("{instance_id}.db"))
}

// Table names are fixed by the callers above
fn get_value(conn: &Connection, table: &str, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            &format!("SELECT value FROM {table} WHERE key = ?1"),
            params![key],
            |row| row.get(0),
        )
        .optional()?)
}

fn set_value(conn: &Connection, table: &str, key: &str, value: &str) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {table} (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value"
        ),
        params![key, value],
    )?;
    Ok(())
}

fn download_from_row(row: &Row<'_>) -> rusqlite::Result<Download> {
    let kind: String = row.get(1)?;
    let item_type = ItemType::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown item type '{kind}'").into(),
        )
    })?;
    let path: String = row.get(2)?;
    let size: i64 = row.get(3)?;
    let play_count: i64 = row.get(6)?;

    Ok(Download {
        id: Id::new(row.get::<_, String>(0)?),
        item_type,
        path: Utf8PathBuf::from(path),
        size: size as u64,
        created_at: row.get(4)?,
        last_played: row.get(5)?,
        play_count: play_count as u32,
    })
}
