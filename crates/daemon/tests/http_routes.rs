//! Requests against the full router, backed by an in-memory source and database

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::Router;
use http::{Request, StatusCode};
use tower::ServiceExt;

use blawg_daemon::http_server;
use blawg_daemon::{Database, ServiceState};
use common::source::{ContentSource, MemoryContentSource};
use common::sync::SyncConfig;

async fn app(source: &MemoryContentSource, interval: Duration) -> (Router, ServiceState) {
    let db = Database::in_memory().await.unwrap();
    let config = SyncConfig {
        interval,
        ..SyncConfig::default()
    };
    let source: Arc<dyn ContentSource> = Arc::new(source.clone());
    let state = ServiceState::new(source, db, config, "Test Blog");
    (http_server::router(state.clone()), state)
}

async fn get(app: &Router, uri: &str, original_uri: Option<&str>) -> (StatusCode, String) {
    let mut request = Request::builder().uri(uri);
    if let Some(original) = original_uri {
        request = request.header("x-original-uri", original);
    }
    let response = app
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_index_lists_synced_posts_newest_first() {
    let source = MemoryContentSource::new();
    source.commit(
        "alice",
        &[("posts/old.md", Some("---\ntitle: Old\ndate: 2020-01-01\n---\n"))],
    );
    source.commit(
        "alice",
        &[("posts/new.md", Some("---\ntitle: New\ndate: 2024-01-01\n---\n"))],
    );
    let (app, _state) = app(&source, Duration::from_secs(60)).await;

    let (status, body) = get(&app, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<title>Test Blog</title>"));
    let new = body.find("href=\"/page/posts/new.md\"").unwrap();
    let old = body.find("href=\"/page/posts/old.md\"").unwrap();
    assert!(new < old);
}

#[tokio::test]
async fn test_page_renders_with_fragments() {
    let source = MemoryContentSource::new();
    source.commit(
        "alice",
        &[
            ("static/header.html", Some("<header><a href=\"{{ base }}\">home</a></header>")),
            ("static/footer.html", Some("<footer>{{ title }} {{ unknown }}</footer>")),
            ("posts/hello.md", Some("---\ntitle: Hello\n---\n# Greetings\n")),
        ],
    );
    let (app, _state) = app(&source, Duration::from_secs(60)).await;

    let (status, body) = get(&app, "/page/posts/hello.md", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<title>Hello</title>"));
    assert!(body.contains("<header><a href=\"/\">home</a></header>"));
    assert!(body.contains("<h1>Greetings</h1>"));
    assert!(body.contains("<footer>Hello {{ unknown }}</footer>"));
    assert!(!body.contains("title: Hello"));

    let header = body.find("<header>").unwrap();
    let content = body.find("<h1>").unwrap();
    let footer = body.find("<footer>").unwrap();
    assert!(header < content && content < footer);
}

#[tokio::test]
async fn test_base_path_behind_proxy() {
    let source = MemoryContentSource::new();
    source.commit(
        "alice",
        &[
            ("static/header.html", Some("<nav href=\"{{ base }}\"></nav>")),
            ("posts/a.md", Some("A")),
        ],
    );
    let (app, _state) = app(&source, Duration::from_secs(60)).await;

    let (_, page) = get(&app, "/page/posts/a.md", Some("/blog/page/posts/a.md")).await;
    assert!(page.contains("<nav href=\"/blog/\"></nav>"));

    let (_, index) = get(&app, "/", Some("/blog/")).await;
    assert!(index.contains("href=\"/blog/page/posts/a.md\""));
}

#[tokio::test]
async fn test_header_changes_after_static_commit() {
    let source = MemoryContentSource::new();
    source.commit(
        "alice",
        &[
            ("static/header.html", Some("<h1>v1</h1>")),
            ("posts/a.md", Some("A")),
        ],
    );
    let (app, _state) = app(&source, Duration::ZERO).await;

    let (_, body) = get(&app, "/page/posts/a.md", None).await;
    assert!(body.contains("<h1>v1</h1>"));

    // cached: a post-only commit leaves the header alone
    source.commit("alice", &[("posts/b.md", Some("B"))]);
    let (_, body) = get(&app, "/page/posts/a.md", None).await;
    assert!(body.contains("<h1>v1</h1>"));
    assert_eq!(source.fetch_count("static/header.html"), 1);

    source.commit("alice", &[("static/header.html", Some("<h1>v2</h1>"))]);
    let (_, body) = get(&app, "/page/posts/a.md", None).await;
    assert!(body.contains("<h1>v2</h1>"));
    assert_eq!(source.fetch_count("static/header.html"), 2);
}

#[tokio::test]
async fn test_missing_page_is_404() {
    let source = MemoryContentSource::new();
    source.commit("alice", &[("posts/a.md", Some("A"))]);
    let (app, _state) = app(&source, Duration::from_secs(60)).await;

    let (status, _) = get(&app, "/page/posts/nope.md", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pages_served_while_source_is_down() {
    let source = MemoryContentSource::new();
    source.commit("alice", &[("posts/a.md", Some("---\ntitle: A\n---\n"))]);
    let (app, _state) = app(&source, Duration::ZERO).await;
    let (status, _) = get(&app, "/", None).await;
    assert_eq!(status, StatusCode::OK);

    // the sync fails on the next request but the index is built from the store
    source.set_unavailable(true);
    let (status, body) = get(&app, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(">A</a>"));

    let (status, _) = get(&app, "/page/posts/a.md", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_status_routes() {
    let source = MemoryContentSource::new();
    let (app, _state) = app(&source, Duration::from_secs(60)).await;

    let (status, body) = get(&app, "/_status/livez", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "{\"status\":\"ok\"}");

    let (status, _) = get(&app, "/_status/readyz", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&app, "/_status/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(env!("CARGO_PKG_VERSION")));
}
