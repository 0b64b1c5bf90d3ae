pub mod repository;
pub mod sqlite;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::Result;

pub enum DatabasePool {
    Sqlite(SqlitePool),
}

impl DatabasePool {
    /// Open (creating if needed) a SQLite database file and run migrations.
    pub async fn new_sqlite(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::run_migrations(&pool).await?;
        Ok(DatabasePool::Sqlite(pool))
    }

    /// Create a new in-memory SQLite database pool and run migrations. Useful for testing.
    ///
    /// The pool holds a single connection that is never recycled, since every
    /// connection to `:memory:` would otherwise see its own empty database.
    pub async fn new_sqlite_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::run_migrations(&pool).await?;
        Ok(DatabasePool::Sqlite(pool))
    }

    pub fn into_repository(self) -> sqlite::SqliteRepository {
        match self {
            DatabasePool::Sqlite(p) => sqlite::SqliteRepository::new(p),
        }
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        let migrations: &[&str] = &[include_str!(
            "../../../../migrations/sqlite/001_initial_schema.sql"
        )];

        for migration_sql in migrations {
            for statement in migration_sql.split(';') {
                let trimmed = statement.trim();
                if !trimmed.is_empty() && !trimmed.starts_with("PRAGMA") {
                    sqlx::query(trimmed).execute(pool).await?;
                }
            }
        }
        Ok(())
    }
}
