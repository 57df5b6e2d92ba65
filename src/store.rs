//! Claim/settings rows in sqlite. Consulted by the promo flow; never on the
//! relay hot path, and failures here are logged rather than propagated into
//! user-visible behavior.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRow {
    pub key: String,
    pub status: String,
    pub payload: String,
    pub updated_at: String,
}

pub struct ClaimStore {
    conn: Mutex<Connection>,
}

impl ClaimStore {
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> rusqlite::Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS claims (
                key TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                payload TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or overwrite a row by key.
    pub fn upsert(&self, key: &str, status: &str, payload: &str) -> rusqlite::Result<()> {
        self.conn.lock().execute(
            "INSERT INTO claims (key, status, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                status = excluded.status,
                payload = excluded.payload,
                updated_at = excluded.updated_at",
            params![key, status, payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_by_status(&self, status: &str) -> rusqlite::Result<Vec<ClaimRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT key, status, payload, updated_at FROM claims
             WHERE status = ?1 ORDER BY updated_at",
        )?;
        let rows = stmt
            .query_map(params![status], |row| {
                Ok(ClaimRow {
                    key: row.get(0)?,
                    status: row.get(1)?,
                    payload: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
