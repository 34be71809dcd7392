use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use common::front_matter;
use common::post;
use common::source::SourceError;

use super::page_vars;
use crate::http_server::base_path::BasePath;
use crate::render;
use crate::ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    BasePath(base): BasePath,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, PageError> {
    state.engine().refresh().await;

    let path = path.trim_start_matches('/').to_string();
    let bytes = state.source().fetch(&path).await?;
    let text = String::from_utf8(bytes).map_err(|_| PageError::NotText(path.clone()))?;

    let title = page_title(&state, &path, &text).await;
    let content = render::markdown_to_html(front_matter::body(&text));
    let fragments = state.fragments().get_all(state.source()).await;
    let vars = page_vars(&title, &base);

    Ok(Html(render::assemble_page(&fragments, &content, &vars)))
}

/// The stored title, or the page's own front-matter title if the post has
/// not been synced yet, or the file name
async fn page_title(state: &ServiceState, path: &str, text: &str) -> String {
    match state.database().get_post(path).await {
        Ok(Some(post)) => return post.title,
        Ok(None) => {}
        Err(e) => tracing::warn!("failed to look up {}: {}", path, e),
    }

    front_matter::parse(text)
        .ok()
        .and_then(|front| front.title)
        .unwrap_or_else(|| post::file_stem(path))
}

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("content source error: {0}")]
    Source(#[from] SourceError),
    #[error("{0} is not valid UTF-8 text")]
    NotText(String),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::Source(SourceError::NotFound(path)) => {
                (StatusCode::NOT_FOUND, format!("no such page: {}", path)).into_response()
            }
            PageError::Source(e) => {
                tracing::error!("failed to fetch page: {}", e);
                (StatusCode::BAD_GATEWAY, "content source unavailable").into_response()
            }
            PageError::NotText(path) => {
                tracing::error!("failed to render {}: not UTF-8", path);
                (StatusCode::INTERNAL_SERVER_ERROR, "page could not be rendered").into_response()
            }
        }
    }
}
