//! SQLite database wrapper with versioned migrations

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use tracing::info;

/// Current schema version
const SCHEMA_VERSION: i32 = 2;

/// SQLite database wrapper
pub struct Database {
    conn: Connection,
}

/// Database shared between the async source and blocking query workers
pub type SharedDatabase = Arc<Mutex<Database>>;

/// Unicode lowercase for case-insensitive search; SQLite's `lower()` only
/// folds ASCII
pub(crate) const FOLD_CASE_FN: &str = "fold_case";

fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        FOLD_CASE_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text = ctx.get::<Option<String>>(0)?;
            Ok(text.map(|text| text.to_lowercase()))
        },
    )
}

impl Database {
    /// Create a new database at the given path
    pub fn new(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL lets a seeding process write while a browser reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        register_functions(&conn)?;

        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open a throwaway in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        register_functions(&conn)?;

        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// Wrap for sharing with [`SqliteSource`](crate::source::SqliteSource)
    pub fn into_shared(self) -> SharedDatabase {
        Arc::new(Mutex::new(self))
    }

    /// Get the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get the current schema version from database
    pub(crate) fn get_schema_version(&self) -> i32 {
        if let Err(e) = self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        ) {
            tracing::warn!("Failed to create schema_version table: {}", e);
            return 0;
        }

        self.conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0)
    }

    /// Set schema version after successful migration
    fn set_schema_version(&self, version: i32) -> Result<()> {
        self.conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
        Ok(())
    }

    /// Run database migrations incrementally
    pub(crate) fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version();
        info!(
            "Database schema version: {} (target: {})",
            current_version, SCHEMA_VERSION
        );

        if current_version >= SCHEMA_VERSION {
            return Ok(());
        }

        // Migration 1: Messages table
        if current_version < 1 {
            info!("Running migration 1: Messages table");
            self.conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS messages (
                    id TEXT PRIMARY KEY,
                    group_id TEXT NOT NULL,
                    sort_key TEXT NOT NULL,
                    text TEXT NOT NULL
                );
                "#,
            )?;
            self.set_schema_version(1)?;
        }

        // Migration 2: Keyset index matching the global order
        if current_version < 2 {
            info!("Running migration 2: Keyset order index");
            self.conn.execute_batch(
                r#"
                CREATE INDEX IF NOT EXISTS idx_messages_order
                    ON messages(sort_key DESC, id DESC);

                CREATE INDEX IF NOT EXISTS idx_messages_group
                    ON messages(group_id);
                "#,
            )?;
            self.set_schema_version(2)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::Database;

    /// Helper to create a temporary database for testing
    fn create_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("nested").join("test.db");
        let db = Database::new(&db_path).expect("Failed to create database");
        (db, temp_dir)
    }

    #[test]
    fn test_database_creation() {
        let (db, _temp) = create_test_db();
        assert_eq!(db.get_schema_version(), 2);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let (db, _temp) = create_test_db();
        db.run_migrations().expect("second run");
        assert_eq!(db.get_schema_version(), 2);
    }

    #[test]
    fn test_messages_table_and_index_exist() {
        let (db, _temp) = create_test_db();
        let conn = db.conn();

        let columns: Vec<String> = conn
            .prepare("PRAGMA table_info(messages)")
            .expect("Failed to prepare PRAGMA")
            .query_map([], |row| row.get::<_, String>(1))
            .expect("Failed to get columns")
            .filter_map(Result::ok)
            .collect();
        for column in ["id", "group_id", "sort_key", "text"] {
            assert!(columns.contains(&column.to_string()), "missing {column}");
        }

        let index: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name='idx_messages_order'",
                [],
                |row| row.get(0),
            )
            .expect("Failed to query index");
        assert_eq!(index, 1);
    }

    #[test]
    fn test_wal_mode_enabled() {
        let (db, _temp) = create_test_db();
        let mode: String = db
            .conn()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .expect("Failed to get journal mode");
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_fold_case_handles_non_ascii() {
        let db = Database::in_memory().expect("Failed to open database");
        let folded: String = db
            .conn()
            .query_row("SELECT fold_case('ÄRGER im BÜRO')", [], |row| row.get(0))
            .expect("Failed to call fold_case");
        assert_eq!(folded, "ärger im büro");
        assert_eq!(db.get_schema_version(), 2);
    }
}
