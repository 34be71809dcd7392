use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A commit on the tracked branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Opaque commit identifier (a sha for git-backed sources)
    pub id: String,
    /// Display name of the commit author
    pub author: String,
    /// When the commit was authored
    pub authored_at: OffsetDateTime,
}

/// How a commit touched a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Added => "added",
            FileStatus::Modified => "modified",
            FileStatus::Removed => "removed",
            FileStatus::Renamed => "renamed",
        }
    }
}

impl std::str::FromStr for FileStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "added" | "copied" => FileStatus::Added,
            "removed" => FileStatus::Removed,
            "renamed" => FileStatus::Renamed,
            _ => FileStatus::Modified,
        })
    }
}

/// A file touched by a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub status: FileStatus,
    /// The path the file had before a rename
    #[serde(default)]
    pub previous_path: Option<String>,
    pub additions: u64,
    pub deletions: u64,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            status,
            previous_path: None,
            additions: 0,
            deletions: 0,
        }
    }

    pub fn renamed(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            previous_path: Some(from.into()),
            ..Self::new(to, FileStatus::Renamed)
        }
    }

    /// The path this change makes disappear from the tree, if any
    pub fn vacated_path(&self) -> Option<&str> {
        match self.status {
            FileStatus::Removed => Some(&self.path),
            FileStatus::Renamed => self.previous_path.as_deref(),
            _ => None,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The requested path or commit does not exist upstream
    #[error("not found: {0}")]
    NotFound(String),
    /// Transport or upstream failure
    #[error("source unavailable: {0}")]
    Unavailable(String),
    /// The upstream answered but the payload could not be decoded
    #[error("decode failure: {0}")]
    Decode(String),
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound(_))
    }
}

/// Read-only access to a remote versioned tree, bound to one branch.
#[async_trait]
pub trait ContentSource: Send + Sync + Debug + 'static {
    /// Fetch the raw bytes of the file at `path` on the tracked branch
    ///
    /// # Returns
    /// * `Ok(bytes)` - The file content
    /// * `Err(SourceError::NotFound)` - No file exists at `path`
    /// * `Err(_)` - Transport or decode failure
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, SourceError>;

    /// List the commits on the tracked branch.
    ///
    /// Sources list newest-first by convention, but callers must not rely on
    /// it for anything beyond locating a known commit.
    async fn list_commits(&self) -> Result<Vec<Commit>, SourceError>;

    /// List the files changed by the commit `id`
    async fn commit_files(&self, id: &str) -> Result<Vec<ChangedFile>, SourceError>;
}

#[async_trait]
impl<T: ContentSource + ?Sized> ContentSource for std::sync::Arc<T> {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        (**self).fetch(path).await
    }

    async fn list_commits(&self) -> Result<Vec<Commit>, SourceError> {
        (**self).list_commits().await
    }

    async fn commit_files(&self, id: &str) -> Result<Vec<ChangedFile>, SourceError> {
        (**self).commit_files(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_status_from_str() {
        assert_eq!("added".parse::<FileStatus>().unwrap(), FileStatus::Added);
        assert_eq!("copied".parse::<FileStatus>().unwrap(), FileStatus::Added);
        assert_eq!("removed".parse::<FileStatus>().unwrap(), FileStatus::Removed);
        assert_eq!("renamed".parse::<FileStatus>().unwrap(), FileStatus::Renamed);
        assert_eq!("changed".parse::<FileStatus>().unwrap(), FileStatus::Modified);
    }

    #[test]
    fn test_vacated_path() {
        let rename = ChangedFile::renamed("posts/old.md", "posts/new.md");
        assert_eq!(rename.vacated_path(), Some("posts/old.md"));
        assert_eq!(rename.path, "posts/new.md");

        let removal = ChangedFile::new("posts/a.md", FileStatus::Removed);
        assert_eq!(removal.vacated_path(), Some("posts/a.md"));
        assert_eq!(ChangedFile::new("posts/a.md", FileStatus::Added).vacated_path(), None);
    }
}
