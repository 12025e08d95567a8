//! SQLite-backed overlay store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection};

use super::{OverlayError, OverlayStore};
use crate::clock::{Clock, SystemClock};

/// SQLite-backed overlay store.
pub struct SqliteOverlayStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteOverlayStore {
    /// Open (or create) the overlay database at `path`.
    pub fn new(path: &Path) -> Result<Self, OverlayError> {
        Self::with_clock(Connection::open(path)?, Arc::new(SystemClock))
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, OverlayError> {
        Self::with_clock(Connection::open_in_memory()?, Arc::new(SystemClock))
    }

    /// Wrap an open connection, stamping writes with `clock`.
    pub fn with_clock(conn: Connection, clock: Arc<dyn Clock>) -> Result<Self, OverlayError> {
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), OverlayError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS watchlist (
                movie_id INTEGER PRIMARY KEY,
                added_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS watched (
                movie_id INTEGER PRIMARY KEY,
                added_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS resume_positions (
                movie_id INTEGER PRIMARY KEY,
                minutes INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, OverlayError> {
        self.conn
            .lock()
            .map_err(|_| OverlayError::Database("connection lock poisoned".to_string()))
    }

    fn insert_id(&self, table: &str, id: i64) -> Result<(), OverlayError> {
        let now = self.clock.now().to_rfc3339();
        self.conn()?.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (movie_id, added_at) VALUES (?, ?)",
                table
            ),
            params![id, now],
        )?;
        Ok(())
    }

    fn delete_id(&self, table: &str, id: i64) -> Result<(), OverlayError> {
        self.conn()?.execute(
            &format!("DELETE FROM {} WHERE movie_id = ?", table),
            params![id],
        )?;
        Ok(())
    }

    fn list_ids(&self, table: &str) -> Result<Vec<i64>, OverlayError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT movie_id FROM {} ORDER BY added_at, rowid",
            table
        ))?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}

impl OverlayStore for SqliteOverlayStore {
    fn add_watchlist(&self, id: i64) -> Result<(), OverlayError> {
        self.insert_id("watchlist", id)
    }

    fn remove_watchlist(&self, id: i64) -> Result<(), OverlayError> {
        self.delete_id("watchlist", id)
    }

    fn list_watchlist_ids(&self) -> Result<Vec<i64>, OverlayError> {
        self.list_ids("watchlist")
    }

    fn add_watched(&self, id: i64) -> Result<(), OverlayError> {
        self.insert_id("watched", id)
    }

    fn remove_watched(&self, id: i64) -> Result<(), OverlayError> {
        self.delete_id("watched", id)
    }

    fn list_watched_ids(&self) -> Result<Vec<i64>, OverlayError> {
        self.list_ids("watched")
    }

    fn set_resume(&self, id: i64, minutes: u32) -> Result<(), OverlayError> {
        let now = self.clock.now().to_rfc3339();
        self.conn()?.execute(
            "INSERT INTO resume_positions (movie_id, minutes, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(movie_id) DO UPDATE SET
                minutes = excluded.minutes,
                updated_at = excluded.updated_at",
            params![id, minutes, now],
        )?;
        Ok(())
    }

    fn list_resume_positions(&self) -> Result<HashMap<i64, u32>, OverlayError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT movie_id, minutes FROM resume_positions")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, u32>(1)?)))?;

        let mut positions = HashMap::new();
        for row in rows {
            let (id, minutes) = row?;
            positions.insert(id, minutes);
        }
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn create_test_store() -> SqliteOverlayStore {
        SqliteOverlayStore::in_memory().unwrap()
    }

    #[test]
    fn test_watchlist_add_is_idempotent() {
        let store = create_test_store();
        store.add_watchlist(10).unwrap();
        store.add_watchlist(10).unwrap();
        store.add_watchlist(3).unwrap();

        assert_eq!(store.list_watchlist_ids().unwrap(), vec![10, 3]);
    }

    #[test]
    fn test_watchlist_remove() {
        let store = create_test_store();
        store.add_watchlist(10).unwrap();
        store.remove_watchlist(10).unwrap();
        store.remove_watchlist(99).unwrap();

        assert!(store.list_watchlist_ids().unwrap().is_empty());
    }

    #[test]
    fn test_watched_independent_of_watchlist() {
        let store = create_test_store();
        store.add_watched(1).unwrap();
        store.add_watchlist(2).unwrap();

        assert_eq!(store.list_watched_ids().unwrap(), vec![1]);
        assert_eq!(store.list_watchlist_ids().unwrap(), vec![2]);

        store.remove_watched(1).unwrap();
        assert!(store.list_watched_ids().unwrap().is_empty());
        assert_eq!(store.list_watchlist_ids().unwrap(), vec![2]);
    }

    #[test]
    fn test_resume_last_write_wins() {
        let store = create_test_store();
        store.set_resume(7, 12).unwrap();
        store.set_resume(7, 48).unwrap();
        store.set_resume(8, 5).unwrap();

        let positions = store.list_resume_positions().unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[&7], 48);
        assert_eq!(positions[&8], 5);
    }

    #[test]
    fn test_snapshot() {
        let store = create_test_store();
        store.add_watchlist(1).unwrap();
        store.add_watched(2).unwrap();
        store.set_resume(3, 20).unwrap();

        let snapshot = store.snapshot().unwrap();
        assert!(snapshot.in_watchlist(1));
        assert!(snapshot.is_watched(2));
        assert_eq!(snapshot.resume_minutes(3), 20);
        assert_eq!(snapshot.resume_minutes(1), 0);
    }

    #[test]
    fn test_timestamps_come_from_clock() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let store = SqliteOverlayStore::with_clock(
            Connection::open_in_memory().unwrap(),
            Arc::new(FixedClock(instant)),
        )
        .unwrap();
        store.add_watchlist(1).unwrap();

        let added_at: String = store
            .conn()
            .unwrap()
            .query_row("SELECT added_at FROM watchlist WHERE movie_id = 1", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(added_at, instant.to_rfc3339());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("overlay.db");

        {
            let store = SqliteOverlayStore::new(&path).unwrap();
            store.add_watchlist(42).unwrap();
            store.set_resume(42, 15).unwrap();
        }

        let store = SqliteOverlayStore::new(&path).unwrap();
        assert_eq!(store.list_watchlist_ids().unwrap(), vec![42]);
        assert_eq!(store.list_resume_positions().unwrap()[&42], 15);
    }
}
