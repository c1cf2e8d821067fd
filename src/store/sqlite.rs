//! SQLite implementation of the offline store.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::OfflineError;

/// Current schema version, stamped into `PRAGMA user_version`.
/// Creation/upgrade runs exactly once per version; re-opening an
/// already-initialized store at the same version changes nothing.
const SCHEMA_VERSION: i64 = 1;

/// One trip snapshot row. `body` is the serialized snapshot JSON;
/// `saved_at` is epoch milliseconds, indexed for most-recent-first
/// listing.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRow {
    pub id: String,
    pub body: String,
    pub saved_at: i64,
}

/// One cached tile row, keyed by the `z/x/y` tile address. `saved_at` is
/// epoch milliseconds, indexed for age-based eviction scans.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRow {
    pub key: String,
    pub image: Vec<u8>,
    pub source_url: String,
    pub saved_at: i64,
}

/// The versioned local durable store.
///
/// Holds a single SQLite connection behind an async mutex; every
/// primitive is individually atomic (single key read/write) and there are
/// no multi-key transactions.
pub struct OfflineStore {
    conn: Mutex<Connection>,
}

impl OfflineStore {
    /// Open (creating on first use) the store at the given path.
    pub fn open(path: &Path) -> Result<Self, OfflineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::migrate(&conn)?;
        debug!(path = %path.display(), "Offline store opened");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open a private in-memory store. Used by tests and by hosts that
    /// want cache behavior without durability.
    pub fn open_in_memory() -> Result<Self, OfflineError> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Create or upgrade the schema. Idempotent: safe to run on every
    /// open, destructive on none.
    fn migrate(conn: &Connection) -> Result<(), OfflineError> {
        let found: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if found > SCHEMA_VERSION {
            return Err(OfflineError::SchemaVersion {
                found,
                supported: SCHEMA_VERSION,
            });
        }

        if found < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS trips (
                    id        TEXT PRIMARY KEY,
                    body      TEXT NOT NULL,
                    saved_at  INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_trips_saved_at ON trips(saved_at);

                CREATE TABLE IF NOT EXISTS tiles (
                    key         TEXT PRIMARY KEY,
                    image       BLOB NOT NULL,
                    source_url  TEXT NOT NULL,
                    saved_at    INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_tiles_saved_at ON tiles(saved_at);

                CREATE TABLE IF NOT EXISTS meta (
                    key    TEXT PRIMARY KEY,
                    value  TEXT NOT NULL
                );",
            )?;
        }

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    // ===== Trip rows =====

    /// Upsert one trip row by id.
    pub async fn put_trip(&self, row: &TripRow) -> Result<(), OfflineError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO trips (id, body, saved_at) VALUES (?1, ?2, ?3)",
            params![row.id, row.body, row.saved_at],
        )?;
        Ok(())
    }

    pub async fn get_trip(&self, id: &str) -> Result<Option<TripRow>, OfflineError> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT id, body, saved_at FROM trips WHERE id = ?1",
                params![id],
                |row| {
                    Ok(TripRow {
                        id: row.get(0)?,
                        body: row.get(1)?,
                        saved_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Delete one trip row. Deleting an absent id is a no-op.
    pub async fn delete_trip(&self, id: &str) -> Result<(), OfflineError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM trips WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// All trip rows, most recently saved first (save-timestamp index,
    /// reversed traversal).
    pub async fn list_trips_newest_first(&self) -> Result<Vec<TripRow>, OfflineError> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT id, body, saved_at FROM trips ORDER BY saved_at DESC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TripRow {
                    id: row.get(0)?,
                    body: row.get(1)?,
                    saved_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn count_trips(&self) -> Result<u64, OfflineError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM trips", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Total serialized bytes across all trip rows.
    pub async fn sum_trip_bytes(&self) -> Result<u64, OfflineError> {
        let conn = self.conn.lock().await;
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(body)), 0) FROM trips",
            [],
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }

    // ===== Tile rows =====

    /// Upsert one tile row by its `z/x/y` key (replace-only, never
    /// merges).
    pub async fn put_tile(&self, row: &TileRow) -> Result<(), OfflineError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO tiles (key, image, source_url, saved_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![row.key, row.image, row.source_url, row.saved_at],
        )?;
        Ok(())
    }

    pub async fn get_tile(&self, key: &str) -> Result<Option<TileRow>, OfflineError> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT key, image, source_url, saved_at FROM tiles WHERE key = ?1",
                params![key],
                |row| {
                    Ok(TileRow {
                        key: row.get(0)?,
                        image: row.get(1)?,
                        source_url: row.get(2)?,
                        saved_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub async fn delete_tile(&self, key: &str) -> Result<(), OfflineError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM tiles WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub async fn count_tiles(&self) -> Result<u64, OfflineError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tiles", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Total payload bytes across all tile rows.
    pub async fn sum_tile_bytes(&self) -> Result<u64, OfflineError> {
        let conn = self.conn.lock().await;
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(image)), 0) FROM tiles",
            [],
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }

    /// (key, saved_at) pairs for every tile, oldest first. Backs the
    /// eviction scan without pulling payloads into memory.
    pub async fn list_tile_ages(&self) -> Result<Vec<(String, i64)>, OfflineError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT key, saved_at FROM tiles ORDER BY saved_at ASC")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ===== Meta rows =====

    /// Upsert one metadata value (serialized JSON) by key.
    pub async fn put_meta(&self, key: &str, value: &str) -> Result<(), OfflineError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub async fn get_meta(&self, key: &str) -> Result<Option<String>, OfflineError> {
        let conn = self.conn.lock().await;
        let value = conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    // ===== Bulk =====

    /// Empty all three collections.
    pub async fn clear_all(&self) -> Result<(), OfflineError> {
        let conn = self.conn.lock().await;
        conn.execute_batch("DELETE FROM trips; DELETE FROM tiles; DELETE FROM meta;")?;
        Ok(())
    }
}
