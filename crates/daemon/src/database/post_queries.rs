use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::Date;
use uuid::Uuid;

use common::post::Post;
use common::store::PostStore;

use super::{Database, StoreError};

impl Database {
    /// Look up a single post by its source path
    pub async fn get_post(&self, source_path: &str) -> Result<Option<Post>, StoreError> {
        let mut conn = self.acquire().await?;
        let row = sqlx::query(
            r#"
            SELECT id, source_path, title, author, post_date
            FROM posts
            WHERE source_path = ?1
            "#,
        )
        .bind(source_path)
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(row_to_post).transpose()
    }

    pub async fn post_count(&self) -> Result<i64, StoreError> {
        let mut conn = self.acquire().await?;
        let row = sqlx::query("SELECT COUNT(*) as count FROM posts")
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.get("count"))
    }
}

#[async_trait]
impl PostStore for Database {
    type Error = StoreError;

    async fn read_all(&self) -> Result<Vec<Post>, StoreError> {
        let mut conn = self.acquire().await?;
        let rows = sqlx::query("SELECT id, source_path, title, author, post_date FROM posts")
            .fetch_all(&mut *conn)
            .await?;

        rows.iter().map(row_to_post).collect()
    }

    async fn upsert_batch(&self, posts: &[Post]) -> Result<(), StoreError> {
        let mut conn = self.acquire().await?;
        let mut tx = sqlx::Connection::begin(&mut *conn).await?;

        for post in posts {
            let id = post.id.unwrap_or_else(Uuid::new_v4).to_string();
            sqlx::query(
                r#"
                INSERT INTO posts (id, source_path, title, author, post_date)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(source_path) DO UPDATE SET
                    title = excluded.title,
                    author = excluded.author,
                    post_date = excluded.post_date,
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(&id)
            .bind(&post.source_path)
            .bind(&post.title)
            .bind(&post.author)
            .bind(post.post_date)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!("upserted {} post(s)", posts.len());
        Ok(())
    }
}

fn row_to_post(row: &SqliteRow) -> Result<Post, StoreError> {
    let id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| StoreError::InvalidRow(format!("post id {:?}: {}", id, e)))?;
    let post_date: Option<Date> = row.try_get("post_date")?;

    Ok(Post {
        id: Some(id),
        source_path: row.try_get("source_path")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        post_date,
    })
}
