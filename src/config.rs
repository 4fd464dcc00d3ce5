use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::database::{Database, DbError};

/// Editor configuration, stored as key/value rows in `editor_config`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditorConfig {
    /// Quiescence window before the baseline snapshot is frozen
    pub settle_window_ms: u64,
    /// Upper bound for each raster export attempt
    pub export_timeout_secs: u64,
    /// Mime type requested from the raster surface before falling back to PNG
    pub export_mime: String,
    /// Upper bound for fetching a remote edited image
    pub remote_fetch_timeout_secs: u64,
    pub storage_root: PathBuf,
    /// Prefix of every URL handed out by the local storage service
    pub public_base_url: String,
    pub default_language: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        let storage_root = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("blockpress")
            .join("uploads");

        Self {
            settle_window_ms: 100,
            export_timeout_secs: 30,
            export_mime: "image/webp".to_string(),
            remote_fetch_timeout_secs: 30,
            storage_root,
            public_base_url: "/uploads".to_string(),
            default_language: "en".to_string(),
        }
    }
}

impl EditorConfig {
    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.settle_window_ms)
    }

    pub fn export_timeout(&self) -> Duration {
        Duration::from_secs(self.export_timeout_secs)
    }

    pub fn remote_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_fetch_timeout_secs)
    }
}

impl Database {
    /// Create the editor config table
    pub fn create_config_table(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS editor_config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Get editor config, falling back to defaults for missing or bad values
    pub fn get_editor_config(&self) -> Result<EditorConfig, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;
        let mut config = EditorConfig::default();

        let mut stmt = conn.prepare("SELECT key, value FROM editor_config")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            match key.as_str() {
                "settle_window_ms" => config.settle_window_ms = value.parse().unwrap_or(100),
                "export_timeout_secs" => config.export_timeout_secs = value.parse().unwrap_or(30),
                "export_mime" => config.export_mime = value,
                "remote_fetch_timeout_secs" => {
                    config.remote_fetch_timeout_secs = value.parse().unwrap_or(30)
                }
                "storage_root" => config.storage_root = PathBuf::from(value),
                "public_base_url" => config.public_base_url = value,
                "default_language" => config.default_language = value,
                _ => {}
            }
        }

        Ok(config)
    }

    /// Save editor config
    pub fn save_editor_config(&self, config: &EditorConfig) -> Result<(), DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        let pairs = [
            ("settle_window_ms", config.settle_window_ms.to_string()),
            ("export_timeout_secs", config.export_timeout_secs.to_string()),
            ("export_mime", config.export_mime.clone()),
            ("remote_fetch_timeout_secs", config.remote_fetch_timeout_secs.to_string()),
            ("storage_root", config.storage_root.to_string_lossy().into_owned()),
            ("public_base_url", config.public_base_url.clone()),
            ("default_language", config.default_language.clone()),
        ];

        for (key, value) in pairs {
            conn.execute(
                "INSERT OR REPLACE INTO editor_config (key, value) VALUES (?1, ?2)",
                rusqlite::params![key, value],
            )?;
        }

        Ok(())
    }
}
