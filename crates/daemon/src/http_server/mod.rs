use std::iter::once;
use std::net::SocketAddr;

use axum::Router;
use http::header::AUTHORIZATION;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

use crate::ServiceState;

pub mod base_path;
mod blog;
pub mod health;

const STATUS_PREFIX: &str = "/_status";

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Every route the service answers
pub fn router(state: ServiceState) -> Router {
    Router::new()
        .nest(STATUS_PREFIX, health::router(state.clone()))
        .merge(blog::router(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(SetSensitiveRequestHeadersLayer::new(once(AUTHORIZATION)))
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}

/// Serve on `listen_addr` until `shutdown_rx` flips to `true`
pub async fn run(
    listen_addr: SocketAddr,
    state: ServiceState,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), HttpServerError> {
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .map_err(|e| HttpServerError::Bind(listen_addr, e))?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
            tracing::info!("http server shutting down");
        })
        .await?;

    Ok(())
}
