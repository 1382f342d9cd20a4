//! Database connection and lifecycle.

use exn::{OptionExt, ResultExt};
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqliteLockingMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::error::{ErrorKind, Result, raise};

/// Embedded migrations that are run automatically on connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
// The file is exclusively locked while open, so more than one connection
// would only deadlock against itself.
const MAX_CONNECTIONS: u32 = 1;

/// Connection to the usage database.
///
/// A file-backed database holds an exclusive lock on its file from
/// [`open`](Self::open) until [`close`](Self::close), so the file can be
/// uploaded or replaced between processing phases and picked up again with
/// [`reopen`](Self::reopen).
#[derive(Debug, Clone)]
pub struct UsageDatabase {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl UsageDatabase {
    async fn new(options: SqliteConnectOptions, path: Option<PathBuf>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Applied to every connection the pool opens, including after
            // an idle connection was reaped.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await;
        let db = Self { pool: raise(pool)?, path };
        db.migrate().await?;
        Ok(db)
    }

    /// Opens (or creates) the usage database at the given path and runs
    /// migrations.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let options = Self::base_options().filename(&path).create_if_missing(true);
        Self::new(options, Some(path)).await
    }

    /// Connect to an in-memory database (useful for testing).
    ///
    /// Not `#[cfg(test)]` so that other crates can use it in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        Self::new(options, None).await
    }

    /// Base connection options shared between file and in-memory databases.
    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // A single self-contained file, without -wal and -shm companions.
            .journal_mode(SqliteJournalMode::Delete)
            // Held from the first write until the connection closes.
            .locking_mode(SqliteLockingMode::Exclusive)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    /// Apply additional PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
                PRAGMA analysis_limit = 1000;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument("performing database migrations", skip_all)]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// The underlying connection pool, for custom queries or transactions.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Backing file, or `None` for an in-memory database.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Compacts the database file.
    pub async fn vacuum(&self) -> Result<()> {
        raise(sqlx::query("VACUUM").execute(&self.pool).await)?;
        debug!("usage database vacuumed");
        Ok(())
    }

    /// Closes every connection, releasing the file lock.
    ///
    /// The database can be opened again with [`reopen`](Self::reopen);
    /// repositories created before closing must be recreated.
    pub async fn close(&self) {
        // Let SQLite update query planner statistics
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }

    /// Reconnects to the backing file after [`close`](Self::close).
    pub async fn reopen(&mut self) -> Result<()> {
        let path = self.path.clone().ok_or_raise(|| ErrorKind::NotReopenable)?;
        if !self.pool.is_closed() {
            return Ok(());
        }
        *self = Self::open(path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_in_memory() {
        let db = UsageDatabase::connect_in_memory().await.unwrap();
        assert!(!db.is_closed());
        assert!(db.path().is_none());
        db.close().await;
        assert!(db.is_closed());
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = UsageDatabase::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn pragmas_are_applied() {
        let db = UsageDatabase::connect_in_memory().await.unwrap();
        let row: (i64,) = sqlx::query_as("PRAGMA foreign_keys").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 1, "foreign_keys should be ON");
        let row: (i64,) = sqlx::query_as("PRAGMA cache_size").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, -8192);
        db.close().await;
    }

    #[tokio::test]
    async fn in_memory_cannot_be_reopened() {
        let mut db = UsageDatabase::connect_in_memory().await.unwrap();
        db.close().await;
        assert_eq!(*db.reopen().await.unwrap_err(), ErrorKind::NotReopenable);
    }

    #[tokio::test]
    async fn file_is_locked_until_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.db");
        let first = UsageDatabase::open(&path).await.unwrap();
        let err = UsageDatabase::open(&path).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Locked);
        assert!(err.is_retryable());

        first.close().await;
        let second = UsageDatabase::open(&path).await.unwrap();
        second.close().await;
    }

    #[tokio::test]
    async fn close_then_reopen_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.db");
        let mut db = UsageDatabase::open(&path).await.unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
        let row: (String,) = sqlx::query_as("PRAGMA locking_mode").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, "exclusive");
        db.vacuum().await.unwrap();
        db.close().await;
        assert!(path.exists());

        db.reopen().await.unwrap();
        assert!(!db.is_closed());
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM features").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 0);
        db.close().await;
    }
}
