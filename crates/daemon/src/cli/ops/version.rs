use clap::Args;

use blawg_daemon::http_server::health::version::VersionInfo;

#[derive(Args, Debug, Clone)]
pub struct Version;

#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("version operation failed: {0}")]
    Failed(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Version {
    type Error = VersionError;
    type Output = VersionInfo;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        Ok(VersionInfo::current())
    }
}
