use std::path::PathBuf;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};
use crate::settings::DataStoreBackend;
use crate::ApiError;

/// What the store needs to know about a SQL backend.
pub trait SqlDialect: Send + Sync {
    /// Connection factory handed to the pool.
    fn connection_manager(&self) -> SqliteConnectionManager;
    /// Positional parameter placeholder, 1-based.
    fn parameter(&self, index: usize) -> String;
    fn quote_identifier(&self, name: &str) -> String;
    fn table_exists(&self, conn: &Connection, table: &str) -> Result<bool, ApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteDialect {
    Memory,
    File(PathBuf),
}

impl SqliteDialect {
    pub fn from_backend(backend: &DataStoreBackend) -> Self {
        match backend {
            DataStoreBackend::Memory => SqliteDialect::Memory,
            DataStoreBackend::File { path } => SqliteDialect::File(path.clone()),
        }
    }
}

impl SqlDialect for SqliteDialect {
    fn connection_manager(&self) -> SqliteConnectionManager {
        let manager = match self {
            SqliteDialect::Memory => SqliteConnectionManager::memory(),
            SqliteDialect::File(path) => SqliteConnectionManager::file(path),
        };
        manager.with_init(|connection| {
            connection.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        })
    }

    fn parameter(&self, index: usize) -> String {
        format!("?{index}")
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn table_exists(&self, conn: &Connection, table: &str) -> Result<bool, ApiError> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
