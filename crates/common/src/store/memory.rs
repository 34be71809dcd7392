use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::provider::{PostStore, SyncCursor};
use crate::post::Post;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum MemoryStoreError {
    #[error("write rejected")]
    WriteRejected,
}

#[derive(Debug, Default)]
struct Inner {
    posts: Vec<Post>,
    cursor: Option<String>,
    post_writes: usize,
    cursor_writes: usize,
    reject_writes: bool,
}

/// Post store and sync cursor held in memory.
///
/// Cloning shares the underlying state. Write counters let tests assert that
/// a sync did or did not touch the store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `upsert_batch` calls that succeeded
    pub fn post_writes(&self) -> usize {
        self.inner.lock().post_writes
    }

    /// Number of `write_cursor` calls that succeeded
    pub fn cursor_writes(&self) -> usize {
        self.inner.lock().cursor_writes
    }

    /// Fail every write while set
    pub fn set_reject_writes(&self, reject: bool) {
        self.inner.lock().reject_writes = reject;
    }

    pub fn get(&self, source_path: &str) -> Option<Post> {
        self.inner
            .lock()
            .posts
            .iter()
            .find(|post| post.source_path == source_path)
            .cloned()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    type Error = MemoryStoreError;

    async fn read_all(&self) -> Result<Vec<Post>, Self::Error> {
        Ok(self.inner.lock().posts.clone())
    }

    async fn upsert_batch(&self, posts: &[Post]) -> Result<(), Self::Error> {
        let mut inner = self.inner.lock();
        if inner.reject_writes {
            return Err(MemoryStoreError::WriteRejected);
        }

        for post in posts {
            let position = inner
                .posts
                .iter()
                .position(|stored| stored.source_path == post.source_path);
            match position {
                Some(index) => {
                    let stored = &mut inner.posts[index];
                    stored.title = post.title.clone();
                    stored.author = post.author.clone();
                    stored.post_date = post.post_date;
                }
                None => {
                    let mut post = post.clone();
                    post.id = Some(post.id.unwrap_or_else(Uuid::new_v4));
                    inner.posts.push(post);
                }
            }
        }
        inner.post_writes += 1;
        Ok(())
    }
}

#[async_trait]
impl SyncCursor for MemoryStore {
    type Error = MemoryStoreError;

    async fn read_cursor(&self) -> Result<Option<String>, Self::Error> {
        Ok(self.inner.lock().cursor.clone())
    }

    async fn write_cursor(&self, commit_id: &str) -> Result<(), Self::Error> {
        let mut inner = self.inner.lock();
        if inner.reject_writes {
            return Err(MemoryStoreError::WriteRejected);
        }
        inner.cursor = Some(commit_id.to_string());
        inner.cursor_writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(path: &str, title: &str) -> Post {
        Post {
            id: None,
            source_path: path.to_string(),
            title: title.to_string(),
            author: "a".to_string(),
            post_date: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_assigns_and_keeps_ids() {
        let store = MemoryStore::new();
        store.upsert_batch(&[post("posts/a.md", "A")]).await.unwrap();
        let id = store.get("posts/a.md").unwrap().id.unwrap();

        store
            .upsert_batch(&[post("posts/a.md", "A2"), post("posts/b.md", "B")])
            .await
            .unwrap();

        let all = store.read_all().await.unwrap();
        assert_eq!(all.len(), 2);
        let a = store.get("posts/a.md").unwrap();
        assert_eq!(a.id, Some(id));
        assert_eq!(a.title, "A2");
        assert_eq!(store.post_writes(), 2);
    }

    #[tokio::test]
    async fn test_rejected_writes_change_nothing() {
        let store = MemoryStore::new();
        store.set_reject_writes(true);
        assert!(store.upsert_batch(&[post("posts/a.md", "A")]).await.is_err());
        assert!(store.write_cursor("abc").await.is_err());
        assert!(store.read_all().await.unwrap().is_empty());
        assert_eq!(store.read_cursor().await.unwrap(), None);
    }
}
