//! Append-only SQLite chat-history sink.
//!
//! Implements the `HistoryStore` port. Inserts are small and indexed, so the
//! connection sits behind a plain `std::sync::Mutex` and is used directly
//! from async context.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::info;

use vakil_core::domain::{Direction, SenderId};
use vakil_core::ports::HistoryStore;
use vakil_core::{Error, Result};

pub struct SqliteHistory {
    conn: Mutex<Connection>,
}

impl SqliteHistory {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(sql_err)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        info!(path = %path.display(), messages = db.message_count()?, "chat history opened");
        Ok(db)
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().expect("history mutex poisoned");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phone TEXT NOT NULL,
                direction TEXT NOT NULL,
                message TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chats_phone ON chats(phone);
            CREATE INDEX IF NOT EXISTS idx_chats_timestamp ON chats(timestamp);
            "#,
        )
        .map_err(sql_err)?;
        Ok(())
    }

    pub fn message_count(&self) -> Result<u64> {
        let conn = self.conn.lock().expect("history mutex poisoned");
        conn.query_row("SELECT COUNT(*) FROM chats", [], |row| row.get::<_, i64>(0))
            .map(|n| n as u64)
            .map_err(sql_err)
    }

    /// Most recent rows for one sender, newest first. Operator tooling; the
    /// pipeline itself never reads history.
    pub fn recent_for(&self, sender: &SenderId, limit: u32) -> Result<Vec<HistoryRow>> {
        let conn = self.conn.lock().expect("history mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT phone, direction, message, timestamp FROM chats
                 WHERE phone = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![sender.as_str(), limit], |row| {
                Ok(HistoryRow {
                    phone: row.get(0)?,
                    direction: row.get(1)?,
                    message: row.get(2)?,
                    timestamp: row.get(3)?,
                })
            })
            .map_err(sql_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(sql_err)?;
        Ok(rows)
    }
}

#[derive(Clone, Debug)]
pub struct HistoryRow {
    pub phone: String,
    pub direction: String,
    pub message: String,
    pub timestamp: String,
}

#[async_trait]
impl HistoryStore for SqliteHistory {
    async fn append(
        &self,
        sender: &SenderId,
        direction: Direction,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock().expect("history mutex poisoned");
        conn.execute(
            "INSERT INTO chats (phone, direction, message, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![
                sender.as_str(),
                direction.as_str(),
                text,
                timestamp.to_rfc3339(),
            ],
        )
        .map_err(sql_err)?;
        Ok(())
    }
}

fn sql_err(e: rusqlite::Error) -> Error {
    Error::External(format!("sqlite error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> SenderId {
        SenderId("911234567890".to_string())
    }

    #[tokio::test]
    async fn append_and_count_round_trip() {
        let db = SqliteHistory::open_in_memory().unwrap();
        assert_eq!(db.message_count().unwrap(), 0);

        db.append(&sender(), Direction::Inbound, "What is an FIR?", Utc::now())
            .await
            .unwrap();
        db.append(&sender(), Direction::Outbound, "An FIR is...", Utc::now())
            .await
            .unwrap();

        assert_eq!(db.message_count().unwrap(), 2);

        let rows = db.recent_for(&sender(), 10).unwrap();
        assert_eq!(rows.len(), 2);
        // Newest first.
        assert_eq!(rows[0].direction, "outbound");
        assert_eq!(rows[1].direction, "inbound");
        assert_eq!(rows[1].message, "What is an FIR?");
    }

    #[tokio::test]
    async fn schema_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chats.db");

        {
            let db = SqliteHistory::open(&path).unwrap();
            db.append(&sender(), Direction::Inbound, "hello", Utc::now())
                .await
                .unwrap();
        }

        let db = SqliteHistory::open(&path).unwrap();
        assert_eq!(db.message_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn recent_is_scoped_to_one_sender() {
        let db = SqliteHistory::open_in_memory().unwrap();
        db.append(&sender(), Direction::Inbound, "a", Utc::now())
            .await
            .unwrap();
        db.append(
            &SenderId("919876543210".to_string()),
            Direction::Inbound,
            "b",
            Utc::now(),
        )
        .await
        .unwrap();

        let rows = db.recent_for(&sender(), 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].message, "a");
    }
}
