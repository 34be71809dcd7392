//! Memoized static template fragments
//!
//! The handful of fragments that decorate every page are fetched from the
//! content source once and kept until the sync engine sees a commit touching
//! the static directory. Absence upstream is memoized too, so a blog without
//! a `bottommatter` does not cost a remote call per request.

use std::collections::HashMap;
use std::sync::Arc;

use moka::sync::Cache;
use parking_lot::Mutex;

use crate::source::{ContentSource, SourceError};

/// The named fragments a page is assembled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fragment {
    Topmatter,
    Header,
    Footer,
    Bottommatter,
}

impl Fragment {
    pub const ALL: [Fragment; 4] = [
        Fragment::Topmatter,
        Fragment::Header,
        Fragment::Footer,
        Fragment::Bottommatter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Fragment::Topmatter => "topmatter",
            Fragment::Header => "header",
            Fragment::Footer => "footer",
            Fragment::Bottommatter => "bottommatter",
        }
    }
}

impl std::str::FromStr for Fragment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Fragment::ALL
            .into_iter()
            .find(|fragment| fragment.as_str() == s)
            .ok_or_else(|| format!("unknown fragment: {}", s))
    }
}

impl std::fmt::Display for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cache of decoded fragment text.
///
/// `None` values mean the fragment does not exist upstream. Fetch failures
/// are never cached.
pub struct FragmentCache {
    entries: Cache<Fragment, Option<Arc<str>>>,
    /// Bumped on every invalidation; a fetch only stores its result if no
    /// invalidation happened while it was in flight
    generation: Mutex<u64>,
    static_dir: String,
}

impl FragmentCache {
    pub fn new(static_dir: impl Into<String>) -> Self {
        Self {
            // keys are bounded by `Fragment`, so no capacity limit
            entries: Cache::builder().build(),
            generation: Mutex::new(0),
            static_dir: static_dir.into().trim_end_matches('/').to_string(),
        }
    }

    /// Path of `fragment` in the source tree
    pub fn path(&self, fragment: Fragment) -> String {
        format!("{}/{}.html", self.static_dir, fragment.as_str())
    }

    /// Get the text of `fragment`, fetching it from `source` on a miss
    ///
    /// # Returns
    /// * `Ok(Some(text))` - The fragment exists (it may still be empty text)
    /// * `Ok(None)` - The fragment does not exist upstream
    /// * `Err(_)` - The fetch failed; nothing was cached
    pub async fn get<S>(&self, fragment: Fragment, source: &S) -> Result<Option<Arc<str>>, SourceError>
    where
        S: ContentSource + ?Sized,
    {
        if let Some(cached) = self.entries.get(&fragment) {
            return Ok(cached);
        }

        let generation = *self.generation.lock();
        let path = self.path(fragment);
        tracing::debug!("fragment cache miss for {}, fetching {}", fragment, path);

        let value = match source.fetch(&path).await {
            Ok(bytes) => {
                let text = String::from_utf8(bytes)
                    .map_err(|e| SourceError::Decode(format!("{}: {}", path, e)))?;
                Some(Arc::<str>::from(text))
            }
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        let current = self.generation.lock();
        if *current == generation {
            self.entries.insert(fragment, value.clone());
        } else {
            tracing::debug!("fragment {} invalidated during fetch, not caching", fragment);
        }
        Ok(value)
    }

    /// Get every fragment, treating a failed fetch as absence.
    ///
    /// Failures are logged and, as with [`Self::get`], not cached.
    pub async fn get_all<S>(&self, source: &S) -> HashMap<Fragment, Option<Arc<str>>>
    where
        S: ContentSource + ?Sized,
    {
        let mut fragments = HashMap::with_capacity(Fragment::ALL.len());
        for fragment in Fragment::ALL {
            let text = self.get(fragment, source).await.unwrap_or_else(|e| {
                tracing::warn!("failed to load fragment {}: {}", fragment, e);
                None
            });
            fragments.insert(fragment, text);
        }
        fragments
    }

    /// Drop every cached fragment
    pub fn invalidate_all(&self) {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.entries.invalidate_all();
    }

    /// Whether `fragment` currently has a cached value (including absence)
    pub fn contains(&self, fragment: Fragment) -> bool {
        self.entries.contains_key(&fragment)
    }
}

impl std::fmt::Debug for FragmentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentCache")
            .field("static_dir", &self.static_dir)
            .field("generation", &*self.generation.lock())
            .field("entry_count", &self.entries.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryContentSource;

    #[test]
    fn test_fragment_names() {
        for fragment in Fragment::ALL {
            assert_eq!(fragment.as_str().parse::<Fragment>().unwrap(), fragment);
        }
        assert!("sidebar".parse::<Fragment>().is_err());
    }

    #[test]
    fn test_path() {
        let cache = FragmentCache::new("static/");
        assert_eq!(cache.path(Fragment::Header), "static/header.html");
    }

    #[tokio::test]
    async fn test_get_memoizes() {
        let source = MemoryContentSource::new();
        source.commit("a", &[("static/header.html", Some("<h1>Blog</h1>"))]);
        let cache = FragmentCache::new("static");

        let first = cache.get(Fragment::Header, &source).await.unwrap();
        let second = cache.get(Fragment::Header, &source).await.unwrap();
        assert_eq!(first.as_deref(), Some("<h1>Blog</h1>"));
        assert_eq!(second.as_deref(), Some("<h1>Blog</h1>"));
        assert_eq!(source.fetch_count("static/header.html"), 1);
    }

    #[tokio::test]
    async fn test_absence_is_memoized() {
        let source = MemoryContentSource::new();
        let cache = FragmentCache::new("static");

        assert_eq!(cache.get(Fragment::Footer, &source).await.unwrap(), None);
        assert_eq!(cache.get(Fragment::Footer, &source).await.unwrap(), None);
        assert!(cache.contains(Fragment::Footer));
        assert_eq!(source.fetch_count("static/footer.html"), 1);
    }

    #[tokio::test]
    async fn test_empty_fragment_is_not_absent() {
        let source = MemoryContentSource::new();
        source.commit("a", &[("static/topmatter.html", Some(""))]);
        let cache = FragmentCache::new("static");

        assert_eq!(
            cache.get(Fragment::Topmatter, &source).await.unwrap().as_deref(),
            Some("")
        );
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let source = MemoryContentSource::new();
        source.commit("a", &[("static/header.html", Some("hi"))]);
        let cache = FragmentCache::new("static");

        source.set_unavailable(true);
        assert!(cache.get(Fragment::Header, &source).await.is_err());
        assert!(!cache.contains(Fragment::Header));
        let all = cache.get_all(&source).await;
        assert_eq!(all.len(), Fragment::ALL.len());
        assert_eq!(all[&Fragment::Header], None);
        assert!(!cache.contains(Fragment::Header));

        source.set_unavailable(false);
        assert_eq!(
            cache.get(Fragment::Header, &source).await.unwrap().as_deref(),
            Some("hi")
        );
    }

    #[tokio::test]
    async fn test_invalidate_all_refetches() {
        let source = MemoryContentSource::new();
        source.commit("a", &[("static/header.html", Some("v1"))]);
        let cache = FragmentCache::new("static");

        assert_eq!(cache.get(Fragment::Header, &source).await.unwrap().as_deref(), Some("v1"));
        source.commit("a", &[("static/header.html", Some("v2"))]);
        // still memoized
        assert_eq!(cache.get(Fragment::Header, &source).await.unwrap().as_deref(), Some("v1"));

        cache.invalidate_all();
        assert_eq!(cache.get(Fragment::Header, &source).await.unwrap().as_deref(), Some("v2"));
        assert_eq!(source.fetch_count("static/header.html"), 2);
    }
}
