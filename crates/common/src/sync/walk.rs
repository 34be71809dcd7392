use crate::source::Commit;

/// Select the commits that still need processing, oldest first.
///
/// `listing` is in branch order, newest first; everything listed before
/// `latest` is unprocessed. When `latest` is unset, or no longer appears in
/// the listing (history rewritten, or pushed out of the listing window),
/// every listed commit is returned.
///
/// Authoring dates are not consulted: after a rebase they need not follow
/// branch order, and the last commit returned must be the branch head.
pub fn unprocessed(mut listing: Vec<Commit>, latest: Option<&str>) -> Vec<Commit> {
    if let Some(latest) = latest {
        match listing.iter().position(|commit| commit.id == latest) {
            Some(position) => listing.truncate(position),
            None => tracing::warn!(
                "cursor {} not found among {} listed commits, resyncing all of them",
                latest,
                listing.len()
            ),
        }
    }

    listing.reverse();
    listing
}

/// Whether `path` lies inside directory `dir` of the source tree
pub(crate) fn is_under(path: &str, dir: &str) -> bool {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        return true;
    }
    path.trim_start_matches('/')
        .strip_prefix(dir)
        .is_some_and(|rest| rest.starts_with('/'))
}

pub(crate) fn has_extension(path: &str, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}
