use std::fmt;

use clap::Args;
use owo_colors::OwoColorize;

use blawg_daemon::config::ConfigError;
use blawg_daemon::state::StateSetupError;
use blawg_daemon::{ServiceConfig, ServiceState};
use common::sync::{SyncError, SyncReport};

#[derive(Args, Debug, Clone)]
pub struct SyncNow;

#[derive(Debug)]
pub struct SyncOutput {
    pub report: SyncReport,
    pub cursor: Option<String>,
}

impl fmt::Display for SyncOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.report {
            SyncReport::Applied { .. } => write!(f, "{} {}", "synced:".green(), self.report)?,
            SyncReport::UpToDate => write!(f, "{}", "up to date".green())?,
            other => write!(f, "{} {}", "skipped:".yellow(), other)?,
        }
        if let Some(cursor) = &self.cursor {
            write!(f, "\n  {} {}", "cursor:".dimmed(), cursor)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncNowError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("state error: {0}")]
    State(#[from] StateSetupError),
    #[error("sync failed: {0}")]
    Sync(#[from] SyncError),
    #[error("failed to read cursor: {0}")]
    Cursor(#[from] blawg_daemon::StoreError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for SyncNow {
    type Error = SyncNowError;
    type Output = SyncOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        use common::store::SyncCursor;

        let config = ServiceConfig::load(ctx.config_path.as_deref())?;
        if config.sqlite_path.is_none() {
            tracing::warn!("no sqlite_path configured, this sync will not be persisted");
        }
        let state = ServiceState::from_config(&config).await?;

        let report = state.engine().force_sync().await?;
        let cursor = state.database().read_cursor().await?;

        Ok(SyncOutput { report, cursor })
    }
}
