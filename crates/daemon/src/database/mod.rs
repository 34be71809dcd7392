//! SQLite persistence for post metadata and the sync cursor.
//!
//! The pool is shared by request handlers and the sync engine. Schema setup
//! is idempotent and runs on every connect.

mod cursor_queries;
mod post_queries;

use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;
use url::Url;

/// Attempts made to check a connection out of an exhausted pool
pub const ACQUIRE_ATTEMPTS: u32 = 15;
/// Attempts after this one are logged
const QUIET_ATTEMPTS: u32 = 3;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_CONNECTIONS: u32 = 6;

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl std::ops::Deref for Database {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseSetupError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
    #[error("failed to create database directory: {0}")]
    Directory(#[from] std::io::Error),
}

/// Failures of the post store and cursor
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
    #[error("no pooled connection after {0} attempts")]
    PoolExhausted(u32),
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

impl Database {
    /// Connect to the database at `url`, creating the file if needed
    pub async fn connect(url: &Url) -> Result<Self, DatabaseSetupError> {
        let options = SqliteConnectOptions::from_str(url.as_str())?.create_if_missing(true);
        let db = Self::with_options(options, url.as_str().contains(":memory:")).await?;
        tracing::info!("database ready at {}", url);
        Ok(db)
    }

    /// Open a database file, creating it and its parent directory if needed
    pub async fn open(path: impl AsRef<std::path::Path>) -> Result<Self, DatabaseSetupError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let db = Self::with_options(options, false).await?;
        tracing::info!("database ready at {:?}", path);
        Ok(db)
    }

    pub async fn in_memory() -> Result<Self, DatabaseSetupError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::with_options(options, true).await
    }

    async fn with_options(
        options: SqliteConnectOptions,
        in_memory: bool,
    ) -> Result<Self, DatabaseSetupError> {
        // every connection to `:memory:` is its own database, so keep exactly one alive
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .acquire_timeout(ACQUIRE_TIMEOUT)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .acquire_timeout(ACQUIRE_TIMEOUT)
                .connect_with(options)
                .await?
        };

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                source_path TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                post_date TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_posts_post_date ON posts(post_date)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_cursor (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                latest_sha TEXT,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Check a connection out of the pool, retrying while the pool is exhausted.
    ///
    /// Each retry sleeps a random 100-600ms. Gives up with
    /// [`StoreError::PoolExhausted`] after [`ACQUIRE_ATTEMPTS`].
    pub(crate) async fn acquire(&self) -> Result<PoolConnection<Sqlite>, StoreError> {
        for attempt in 1..=ACQUIRE_ATTEMPTS {
            if attempt > QUIET_ATTEMPTS {
                tracing::info!("attempt #{} to get a database connection", attempt);
            }
            match self.pool.acquire().await {
                Ok(conn) => return Ok(conn),
                Err(sqlx::Error::PoolTimedOut) => {
                    let delay = Duration::from_millis(rand::rng().random_range(100..600));
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::PoolExhausted(ACQUIRE_ATTEMPTS))
    }

    /// Round-trip a trivial query, for readiness checks
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.acquire().await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::in_memory().await.unwrap();
        db.ping().await.unwrap();
        assert_eq!(db.post_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_connect_by_url() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let url = Url::parse(&format!(
            "sqlite://{}",
            temp_dir.path().join("blawg.db").display()
        ))
        .unwrap();

        let db = Database::connect(&url).await.unwrap();
        db.ping().await.unwrap();
        assert!(temp_dir.path().join("blawg.db").exists());
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::in_memory().await.unwrap();
        db.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_survives_reacquire() {
        let db = Database::in_memory().await.unwrap();
        {
            let _conn = db.acquire().await.unwrap();
        }
        // schema lives on the single pooled connection
        db.ping().await.unwrap();
        assert_eq!(db.post_count().await.unwrap(), 0);
    }
}
