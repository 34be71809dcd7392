use async_trait::async_trait;
use sqlx::Row;

use common::store::SyncCursor;

use super::{Database, StoreError};

#[async_trait]
impl SyncCursor for Database {
    type Error = StoreError;

    async fn read_cursor(&self) -> Result<Option<String>, StoreError> {
        let mut conn = self.acquire().await?;
        let row = sqlx::query("SELECT latest_sha FROM sync_cursor WHERE id = 1")
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(row.try_get::<Option<String>, _>("latest_sha")?),
            None => Ok(None),
        }
    }

    async fn write_cursor(&self, commit_id: &str) -> Result<(), StoreError> {
        let mut conn = self.acquire().await?;
        sqlx::query(
            r#"
            INSERT INTO sync_cursor (id, latest_sha)
            VALUES (1, ?1)
            ON CONFLICT(id) DO UPDATE SET
                latest_sha = excluded.latest_sha,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(commit_id)
        .execute(&mut *conn)
        .await?;

        tracing::debug!("sync cursor at {}", commit_id);
        Ok(())
    }
}
