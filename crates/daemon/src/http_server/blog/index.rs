use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use common::post::{self, Post};
use common::store::PostStore;

use super::page_vars;
use crate::database::StoreError;
use crate::http_server::base_path::BasePath;
use crate::render;
use crate::ServiceState;

/// One row of the post listing.
#[derive(Debug, Clone)]
pub struct PostListItem<'a> {
    pub source_path: &'a str,
    pub title: &'a str,
    pub author: &'a str,
    pub date: String,
}

impl<'a> From<&'a Post> for PostListItem<'a> {
    fn from(post: &'a Post) -> Self {
        Self {
            source_path: &post.source_path,
            title: &post.title,
            author: &post.author,
            date: post.post_date.map(|date| date.to_string()).unwrap_or_default(),
        }
    }
}

/// Template for the post listing on the index page.
#[derive(Template)]
#[template(path = "pages/blog/post_list.html")]
pub struct PostListTemplate<'a> {
    pub base: &'a str,
    pub posts: Vec<PostListItem<'a>>,
}

impl<'a> PostListTemplate<'a> {
    /// Posts are listed in the order given
    pub fn new(posts: &'a [Post], base: &'a str) -> Self {
        Self {
            base,
            posts: posts.iter().map(PostListItem::from).collect(),
        }
    }
}

pub async fn handler(
    State(state): State<ServiceState>,
    BasePath(base): BasePath,
) -> Result<impl IntoResponse, IndexError> {
    state.engine().refresh().await;

    let mut posts = state.database().read_all().await?;
    post::sort_for_index(&mut posts);

    let fragments = state.fragments().get_all(state.source()).await;
    let content = PostListTemplate::new(&posts, &base).render()?;
    let vars = page_vars(state.site_title(), &base);

    Ok(Html(render::assemble_page(&fragments, &content, &vars)))
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("template error: {0}")]
    Render(#[from] askama::Error),
}

impl IntoResponse for IndexError {
    fn into_response(self) -> Response {
        tracing::error!("failed to build index: {}", self);
        match self {
            IndexError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to read the post index",
            )
                .into_response(),
            IndexError::Render(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "failed to render page").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn post(path: &str, title: &str) -> Post {
        Post {
            id: None,
            source_path: path.to_string(),
            title: title.to_string(),
            author: "alice".to_string(),
            post_date: Some(date!(2024 - 01 - 02)),
        }
    }

    #[test]
    fn test_post_list_links_and_escapes() {
        let posts = vec![post("posts/a.md", "A & <B>")];
        let html = PostListTemplate::new(&posts, "/blog/").render().unwrap();

        assert!(html.contains("href=\"/blog/page/posts/a.md\""));
        assert!(html.contains("A &amp; &lt;B&gt;"));
        assert!(!html.contains("<B>"));
        assert!(html.contains("<time>2024-01-02</time>"));
    }

    #[test]
    fn test_post_list_keeps_order() {
        let posts = vec![post("posts/z.md", "Zed"), post("posts/a.md", "Ay")];
        let html = PostListTemplate::new(&posts, "/").render().unwrap();

        let zed = html.find("Zed").unwrap();
        let ay = html.find("Ay").unwrap();
        assert!(zed < ay);
    }

    #[test]
    fn test_undated_post_has_empty_time() {
        let mut undated = post("posts/a.md", "A");
        undated.post_date = None;
        let html = PostListTemplate::new(std::slice::from_ref(&undated), "/")
            .render()
            .unwrap();
        assert!(html.contains("<time></time>"));
    }
}
