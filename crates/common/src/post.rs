use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::front_matter::FrontMatter;
use crate::source::Commit;

/// Metadata for a single post, keyed by its path in the source tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Assigned by the store on first insert and never changed afterwards
    pub id: Option<Uuid>,
    pub source_path: String,
    pub title: String,
    pub author: String,
    pub post_date: Option<Date>,
}

impl Post {
    /// Build a draft for `source_path` from its front-matter.
    ///
    /// Missing fields fall back to the file name, the commit author and the
    /// commit date, in that order.
    pub fn draft(source_path: &str, front: FrontMatter, commit: &Commit) -> Self {
        Self {
            id: None,
            source_path: source_path.to_string(),
            title: front.title.unwrap_or_else(|| file_stem(source_path)),
            author: front.author.unwrap_or_else(|| commit.author.clone()),
            post_date: Some(front.date.unwrap_or_else(|| commit.authored_at.date())),
        }
    }
}

/// Attach stored identities to a batch of drafts.
///
/// Drafts whose `source_path` is already known take the existing `id`; the
/// rest stay unset and will be assigned one on insert.
pub fn reconcile(existing: &[Post], drafts: Vec<Post>) -> Vec<Post> {
    let ids: HashMap<&str, Uuid> = existing
        .iter()
        .filter_map(|post| post.id.map(|id| (post.source_path.as_str(), id)))
        .collect();

    drafts
        .into_iter()
        .map(|mut draft| {
            if let Some(id) = ids.get(draft.source_path.as_str()) {
                draft.id = Some(*id);
            }
            draft
        })
        .collect()
}

/// Index order: newest first, undated posts last, ties by path
pub fn sort_for_index(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        b.post_date
            .cmp(&a.post_date)
            .then_with(|| a.source_path.cmp(&b.source_path))
    });
}

/// File name without directory or extension
pub fn file_stem(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}
