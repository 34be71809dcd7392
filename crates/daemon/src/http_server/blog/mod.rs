//! Blog pages: the post index and individual posts
//!
//! Both handlers give the sync engine a chance to run before they read
//! anything. A failed sync only means the page is built from what is
//! already stored.

use std::collections::HashMap;

use axum::routing::get;
use axum::Router;

use crate::ServiceState;

mod index;
mod page;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/", get(index::handler))
        .route("/page/*path", get(page::handler))
        .with_state(state)
}

/// Template variables shared by every page
fn page_vars(title: &str, base: &str) -> HashMap<&'static str, String> {
    HashMap::from([
        ("title", crate::render::escape_html(title)),
        ("base", crate::render::escape_html(base)),
    ])
}
