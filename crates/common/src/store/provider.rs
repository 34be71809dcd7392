use std::fmt::Debug;

use async_trait::async_trait;

use crate::post::Post;

/// Durable table of post records keyed by source path
#[async_trait]
pub trait PostStore: Send + Sync + Debug + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read every stored post. Order is unspecified.
    async fn read_all(&self) -> Result<Vec<Post>, Self::Error>;

    /// Insert or update a batch of posts
    ///
    /// Each record is matched by `source_path`: unknown paths are inserted
    /// with a freshly assigned id, known paths are updated in place and keep
    /// their id. The batch is applied atomically: on error none of it is
    /// visible.
    async fn upsert_batch(&self, posts: &[Post]) -> Result<(), Self::Error>;
}

/// Durable watermark naming the last fully processed commit
#[async_trait]
pub trait SyncCursor: Send + Sync + Debug + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The last processed commit id, or `None` before the first sync
    async fn read_cursor(&self) -> Result<Option<String>, Self::Error>;

    /// Replace the watermark with `commit_id`
    async fn write_cursor(&self, commit_id: &str) -> Result<(), Self::Error>;
}
