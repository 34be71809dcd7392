use std::path::PathBuf;

use async_trait::async_trait;

/// What every subcommand gets to work with
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    /// `--config`, if given
    pub config_path: Option<PathBuf>,
}

/// A runnable subcommand
#[async_trait]
pub trait Op: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;
    type Output: std::fmt::Display;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}
