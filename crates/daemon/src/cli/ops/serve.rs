use std::net::SocketAddr;

use clap::Args;
use tokio::sync::watch;

use blawg_daemon::config::ConfigError;
use blawg_daemon::http_server::{self, HttpServerError};
use blawg_daemon::state::StateSetupError;
use blawg_daemon::{ServiceConfig, ServiceState};

#[derive(Args, Debug, Clone)]
pub struct Serve {
    /// Override the configured listen address
    #[arg(long)]
    pub listen_addr: Option<SocketAddr>,

    /// Override the configured sync interval, in seconds
    #[arg(long)]
    pub sync_interval_secs: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("state error: {0}")]
    State(#[from] StateSetupError),
    #[error("http server error: {0}")]
    Server(#[from] HttpServerError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Serve {
    type Error = ServeError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = ServiceConfig::load(ctx.config_path.as_deref())?;
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(secs) = self.sync_interval_secs {
            config.sync_interval_secs = secs;
        }

        let state = ServiceState::from_config(&config).await?;

        // warm the store before the first request arrives
        let engine = state.engine().clone();
        tokio::spawn(async move { engine.refresh().await });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        });

        http_server::run(config.listen_addr, state, shutdown_rx).await?;
        Ok(format!("server on {} stopped", config.listen_addr))
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                tracing::warn!("failed to register signal handlers, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
