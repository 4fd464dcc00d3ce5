use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to acquire database lock")]
    Lock,

    #[error("No data directory available")]
    NoDataDir,
}

/// SQLite-backed store shared by the post, taxonomy, media and config tables
pub struct Database {
    pub conn: Mutex<Connection>,
}

impl Database {
    /// Open the default database under the user's data directory
    pub fn new() -> Result<Self, DbError> {
        let path = default_db_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(&path)
    }

    /// Open (or create) a database at `path` and ensure all tables exist
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened database");
        Self::with_connection(conn)
    }

    /// Throwaway database, used by tests and previews
    pub fn in_memory() -> Result<Self, DbError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let db = Database {
            conn: Mutex::new(conn),
        };

        db.create_config_table()?;
        db.create_post_tables()?;
        db.create_media_tables()?;

        Ok(db)
    }
}

/// `<data_dir>/blockpress/blockpress.db`
pub fn default_db_path() -> Result<PathBuf, DbError> {
    let base = dirs::data_dir().ok_or(DbError::NoDataDir)?;
    Ok(base.join("blockpress").join("blockpress.db"))
}
