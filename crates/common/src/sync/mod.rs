//! Incremental metadata synchronization
//!
//! This module contains the engine that brings the post store and fragment
//! cache up to date with the content source, walking only the commits that
//! landed since the stored cursor.

mod walk;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::fragments::FragmentCache;
use crate::front_matter::{self, FrontMatter};
use crate::post::{self, Post};
use crate::source::{Commit, ContentSource, FileStatus, SourceError};
use crate::store::{PostStore, SyncCursor};

pub use walk::unprocessed;

/// Where content lives in the source tree and how often to look at it
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory holding posts
    pub posts_dir: String,
    /// Directory holding template fragments
    pub static_dir: String,
    /// File extensions (without the dot) that count as posts
    pub post_extensions: Vec<String>,
    /// Minimum time between two passes
    pub interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            posts_dir: "posts".to_string(),
            static_dir: "static".to_string(),
            post_extensions: vec!["md".to_string(), "markdown".to_string()],
            interval: Duration::from_secs(60),
        }
    }
}

/// What a call to [`SyncEngine::sync`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncReport {
    /// The throttle interval has not elapsed since the last pass
    Throttled,
    /// Another pass was already running
    InFlight,
    /// No commits newer than the cursor
    UpToDate,
    /// New commits were processed and the cursor advanced to `cursor`
    Applied {
        commits: usize,
        posts: usize,
        fragments_invalidated: bool,
        cursor: String,
    },
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncReport::Throttled => write!(f, "throttled"),
            SyncReport::InFlight => write!(f, "another sync is in flight"),
            SyncReport::UpToDate => write!(f, "up to date"),
            SyncReport::Applied {
                commits,
                posts,
                fragments_invalidated,
                cursor,
            } => {
                write!(
                    f,
                    "processed {} commit(s), upserted {} post(s), cursor at {}",
                    commits, posts, cursor
                )?;
                if *fragments_invalidated {
                    write!(f, ", fragments invalidated")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("content source error: {0}")]
    SourceUnavailable(#[from] SourceError),
    #[error("store failure: {0}")]
    StoreFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SyncError {
    fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SyncError::StoreFailure(Box::new(err))
    }
}

/// Brings a [`PostStore`] and a [`FragmentCache`] up to date with a [`ContentSource`].
///
/// Safe to call on every request: passes are throttled to one per
/// [`SyncConfig::interval`] and at most one runs at a time.
pub struct SyncEngine<S, D> {
    source: S,
    store: D,
    fragments: Arc<FragmentCache>,
    config: SyncConfig,
    last_update: Mutex<Option<Instant>>,
    in_flight: tokio::sync::Mutex<()>,
}

impl<S, D> SyncEngine<S, D>
where
    S: ContentSource,
    D: PostStore + SyncCursor,
{
    pub fn new(source: S, store: D, fragments: Arc<FragmentCache>, config: SyncConfig) -> Self {
        Self {
            source,
            store,
            fragments,
            config,
            last_update: Mutex::new(None),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    pub fn fragments(&self) -> &Arc<FragmentCache> {
        &self.fragments
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run a pass if the throttle allows it and no other pass is running
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        if !self.due() {
            return Ok(SyncReport::Throttled);
        }

        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!("sync already in flight, skipping");
            return Ok(SyncReport::InFlight);
        };

        // a pass may have finished between the check and the lock
        if !self.due() {
            return Ok(SyncReport::Throttled);
        }

        self.stamp();
        self.pass().await
    }

    /// Run a pass now, ignoring the throttle.
    ///
    /// Waits for an in-flight pass to finish first.
    pub async fn force_sync(&self) -> Result<SyncReport, SyncError> {
        let _guard = self.in_flight.lock().await;
        self.stamp();
        self.pass().await
    }

    /// [`Self::sync`] for request handlers: failures are logged and swallowed.
    ///
    /// The pass runs on its own task so that a dropped request cannot
    /// abandon it halfway.
    pub async fn refresh(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        match tokio::spawn(async move { engine.sync().await }).await {
            Ok(Ok(report)) => tracing::debug!("sync: {}", report),
            Ok(Err(e)) => tracing::warn!("sync failed, serving stale content: {}", e),
            Err(e) => tracing::error!("sync task panicked: {}", e),
        }
    }

    fn due(&self) -> bool {
        match *self.last_update.lock() {
            Some(last) => last.elapsed() > self.config.interval,
            None => true,
        }
    }

    fn stamp(&self) {
        *self.last_update.lock() = Some(Instant::now());
    }

    async fn pass(&self) -> Result<SyncReport, SyncError> {
        let latest = self.store.read_cursor().await.map_err(SyncError::store)?;
        let listing = self.source.list_commits().await?;
        let pending = unprocessed(listing, latest.as_deref());

        let Some(newest) = pending.last().map(|commit| commit.id.clone()) else {
            tracing::debug!("no commits after {:?}", latest);
            return Ok(SyncReport::UpToDate);
        };

        tracing::info!(
            "syncing {} commit(s) after {:?}",
            pending.len(),
            latest.as_deref().unwrap_or("<none>")
        );

        // path -> last commit touching it in this pass
        let mut touched: BTreeMap<String, &Commit> = BTreeMap::new();
        let mut static_commit: Option<&str> = None;

        for commit in &pending {
            for file in self.source.commit_files(&commit.id).await? {
                if let Some(vacated) = file.vacated_path() {
                    if self.is_post(vacated) {
                        tracing::debug!("{} gone in {}, keeping stored record", vacated, commit.id);
                        touched.remove(vacated);
                    } else if walk::is_under(vacated, &self.config.static_dir) {
                        static_commit = Some(&commit.id);
                    }
                }
                if file.status == FileStatus::Removed {
                    continue;
                }
                if self.is_post(&file.path) {
                    touched.insert(file.path, commit);
                } else if walk::is_under(&file.path, &self.config.static_dir) {
                    static_commit = Some(&commit.id);
                }
            }
        }

        let mut drafts = Vec::with_capacity(touched.len());
        for (path, commit) in touched {
            let bytes = match self.source.fetch(&path).await {
                Ok(bytes) => bytes,
                // removed by a commit this pass did not see
                Err(SourceError::NotFound(_)) => {
                    tracing::debug!("{} no longer at head, skipping", path);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let text = String::from_utf8(bytes)
                .map_err(|e| SourceError::Decode(format!("{}: {}", path, e)))?;
            let front = front_matter::parse(&text).unwrap_or_else(|e| {
                tracing::warn!("bad front matter in {}, using fallbacks: {}", path, e);
                FrontMatter::default()
            });
            drafts.push(Post::draft(&path, front, commit));
        }

        let fragments_invalidated = static_commit.is_some();
        if let Some(commit) = static_commit {
            tracing::info!("static files changed as of {}, invalidating fragments", commit);
            self.fragments.invalidate_all();
        }

        let posts = drafts.len();
        if !drafts.is_empty() {
            let existing = self.store.read_all().await.map_err(SyncError::store)?;
            let batch = post::reconcile(&existing, drafts);
            self.store
                .upsert_batch(&batch)
                .await
                .map_err(SyncError::store)?;
        }
        self.store
            .write_cursor(&newest)
            .await
            .map_err(SyncError::store)?;

        tracing::info!("sync complete: {} post(s) updated, cursor at {}", posts, newest);

        Ok(SyncReport::Applied {
            commits: pending.len(),
            posts,
            fragments_invalidated,
            cursor: newest,
        })
    }

    fn is_post(&self, path: &str) -> bool {
        walk::is_under(path, &self.config.posts_dir)
            && walk::has_extension(path, &self.config.post_extensions)
    }
}

impl<S, D> std::fmt::Debug for SyncEngine<S, D>
where
    S: std::fmt::Debug,
    D: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("source", &self.source)
            .field("store", &self.store)
            .field("config", &self.config)
            .field("last_update", &*self.last_update.lock())
            .finish()
    }
}
