//! In-memory content source
//!
//! Keeps a branch history entirely in memory. Used by tests and by anything
//! that wants to drive the sync engine without a remote.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};

use super::provider::{ChangedFile, Commit, ContentSource, FileStatus, SourceError};

#[derive(Debug, Default)]
struct Inner {
    files: HashMap<String, Vec<u8>>,
    /// Oldest first; listed newest first
    commits: Vec<(Commit, Vec<ChangedFile>)>,
    fetches: HashMap<String, usize>,
    /// Ids are never reused, even after a history rewrite
    next_id: usize,
    commit_listings: usize,
    unavailable: bool,
}

/// A branch that lives in memory.
///
/// Cloning shares the underlying history.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentSource {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a commit by `author`.
    ///
    /// Each change is a path and its new content; `None` removes the file.
    /// Commits are authored one minute apart, counting from the unix epoch.
    /// Returns the new commit id.
    pub fn commit(&self, author: &str, changes: &[(&str, Option<&str>)]) -> String {
        self.push_commit(author, None, |files| apply_changes(files, changes))
    }

    /// Like [`Self::commit`], but with an explicit authoring time.
    ///
    /// The commit is still listed on top of the branch, whatever its date.
    pub fn commit_at(
        &self,
        author: &str,
        authored_at: OffsetDateTime,
        changes: &[(&str, Option<&str>)],
    ) -> String {
        self.push_commit(author, Some(authored_at), |files| {
            apply_changes(files, changes)
        })
    }

    /// Append a commit that moves the file at `from` to `to`, reported as a
    /// single rename the way git hosts report it.
    pub fn rename(&self, author: &str, from: &str, to: &str) -> String {
        self.push_commit(author, None, |files| {
            let content = files.remove(from).unwrap_or_default();
            files.insert(to.to_string(), content);
            vec![ChangedFile::renamed(from, to)]
        })
    }

    fn push_commit(
        &self,
        author: &str,
        authored_at: Option<OffsetDateTime>,
        apply: impl FnOnce(&mut HashMap<String, Vec<u8>>) -> Vec<ChangedFile>,
    ) -> String {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = format!("{:040x}", inner.next_id);
        let authored_at = authored_at.unwrap_or_else(|| {
            OffsetDateTime::UNIX_EPOCH + Duration::minutes(inner.next_id as i64)
        });

        let files = apply(&mut inner.files);
        inner.commits.push((
            Commit {
                id: id.clone(),
                author: author.to_string(),
                authored_at,
            },
            files,
        ));
        id
    }

    /// Drop the newest `count` commits from the listing, simulating a history rewrite.
    ///
    /// File contents are left as they are.
    pub fn rewrite_history(&self, count: usize) {
        let mut inner = self.inner.lock();
        let keep = inner.commits.len().saturating_sub(count);
        inner.commits.truncate(keep);
    }

    /// Make every call fail with [`SourceError::Unavailable`] while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unavailable = unavailable;
    }

    /// How many times `path` has been fetched
    pub fn fetch_count(&self, path: &str) -> usize {
        self.inner.lock().fetches.get(path).copied().unwrap_or(0)
    }

    /// How many times the commit list has been requested
    pub fn commit_listings(&self) -> usize {
        self.inner.lock().commit_listings
    }

    fn check_available(inner: &Inner) -> Result<(), SourceError> {
        if inner.unavailable {
            return Err(SourceError::Unavailable("memory source offline".to_string()));
        }
        Ok(())
    }
}

fn apply_changes(
    files: &mut HashMap<String, Vec<u8>>,
    changes: &[(&str, Option<&str>)],
) -> Vec<ChangedFile> {
    changes
        .iter()
        .map(|(path, content)| {
            let status = match content {
                Some(content) => {
                    match files.insert(path.to_string(), content.as_bytes().to_vec()) {
                        Some(_) => FileStatus::Modified,
                        None => FileStatus::Added,
                    }
                }
                None => {
                    files.remove(*path);
                    FileStatus::Removed
                }
            };
            ChangedFile::new(*path, status)
        })
        .collect()
}

#[async_trait]
impl ContentSource for MemoryContentSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        let mut inner = self.inner.lock();
        Self::check_available(&inner)?;
        *inner.fetches.entry(path.to_string()).or_insert(0) += 1;
        inner
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(path.to_string()))
    }

    async fn list_commits(&self) -> Result<Vec<Commit>, SourceError> {
        let mut inner = self.inner.lock();
        Self::check_available(&inner)?;
        inner.commit_listings += 1;
        Ok(inner
            .commits
            .iter()
            .rev()
            .map(|(commit, _)| commit.clone())
            .collect())
    }

    async fn commit_files(&self, id: &str) -> Result<Vec<ChangedFile>, SourceError> {
        let inner = self.inner.lock();
        Self::check_available(&inner)?;
        inner
            .commits
            .iter()
            .find(|(commit, _)| commit.id == id)
            .map(|(_, files)| files.clone())
            .ok_or_else(|| SourceError::NotFound(format!("commit {}", id)))
    }
}
