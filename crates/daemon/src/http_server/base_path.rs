//! Public base path detection behind a reverse proxy
//!
//! A proxy that mounts the service under a prefix (say `/blog/`) reports the
//! URI it received in `X-Original-URI`. Stripping the path the service saw
//! from the end of that URI leaves the prefix, which pages need to build
//! links that work from the outside.

use std::convert::Infallible;

use axum::async_trait;
use axum::extract::FromRequestParts;
use http::request::Parts;
use http::HeaderMap;

pub const ORIGINAL_URI_HEADER: &str = "x-original-uri";

/// The public base path of the request, always ending in `/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasePath(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BasePath
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(BasePath(public_base_path(&parts.headers, parts.uri.path())))
    }
}

/// Derive the public base path from `X-Original-URI` and the request path.
///
/// Without the header the base is `/`.
pub fn public_base_path(headers: &HeaderMap, request_path: &str) -> String {
    let Some(original) = headers
        .get(ORIGINAL_URI_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        return "/".to_string();
    };

    let original = original.split(['?', '#']).next().unwrap_or(original);
    let mine = request_path.trim_start_matches('/');

    let mut public = original.to_string();
    if !mine.is_empty() && public.ends_with(mine) {
        public.truncate(public.len() - mine.len());
    }
    if !public.ends_with('/') {
        tracing::debug!(
            "original uri {:?} does not end in request path {:?}",
            original,
            request_path
        );
        public.push('/');
    }
    public
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(original: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(original) = original {
            headers.insert(ORIGINAL_URI_HEADER, HeaderValue::from_static(original));
        }
        headers
    }

    #[test]
    fn test_no_header_is_root() {
        assert_eq!(public_base_path(&headers(None), "/page/posts/a.md"), "/");
    }

    #[test]
    fn test_strips_request_path() {
        assert_eq!(
            public_base_path(&headers(Some("/blog/page/posts/a.md")), "/page/posts/a.md"),
            "/blog/"
        );
    }

    #[test]
    fn test_index_behind_proxy() {
        assert_eq!(public_base_path(&headers(Some("/blog/")), "/"), "/blog/");
    }

    #[test]
    fn test_ignores_query_string() {
        assert_eq!(
            public_base_path(&headers(Some("/blog/page/posts/a.md?x=1")), "/page/posts/a.md"),
            "/blog/"
        );
    }

    #[test]
    fn test_unrelated_uri_gets_trailing_slash() {
        assert_eq!(public_base_path(&headers(Some("/elsewhere")), "/page/a.md"), "/elsewhere/");
    }
}
