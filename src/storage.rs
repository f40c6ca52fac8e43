/// Local storage for the chat client session
///
/// Persists the bearer token across restarts. Chats and messages are never
/// stored locally; the server is the source of truth for those.

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

/// A persisted login token
#[derive(Debug, Clone, PartialEq)]
pub struct StoredToken {
    pub access_token: String,
    pub token_type: String,
    pub saved_at: String,
}

/// Local storage manager for SQLite database
pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    /// Create a new local store with the given database path
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Create a store that lives only as long as this process
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(&conn)?;
        Ok(Self { conn })
    }

    fn initialize(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS session (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                access_token TEXT NOT NULL,
                token_type TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Save the token, replacing any previous one
    pub fn save_token(&self, access_token: &str, token_type: &str) -> Result<()> {
        let saved_at = chrono::Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT OR REPLACE INTO session (id, access_token, token_type, saved_at) VALUES (1, ?1, ?2, ?3)",
            (access_token, token_type, saved_at),
        )?;

        Ok(())
    }

    /// Load the persisted token, if any
    pub fn load_token(&self) -> Result<Option<StoredToken>> {
        let mut stmt = self
            .conn
            .prepare("SELECT access_token, token_type, saved_at FROM session WHERE id = 1")?;

        let token = stmt
            .query_row([], |row| {
                Ok(StoredToken {
                    access_token: row.get(0)?,
                    token_type: row.get(1)?,
                    saved_at: row.get(2)?,
                })
            })
            .optional()?;

        Ok(token)
    }

    /// Remove the persisted token
    pub fn clear_token(&self) -> Result<()> {
        self.conn.execute("DELETE FROM session", [])?;
        Ok(())
    }
}
