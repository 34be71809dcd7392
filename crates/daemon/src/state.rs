use std::sync::Arc;

use common::fragments::FragmentCache;
use common::source::ContentSource;
use common::sync::{SyncConfig, SyncEngine};

use crate::config::{Config, ConfigError};
use crate::database::{Database, DatabaseSetupError};
use crate::github::{GithubSetupError, GithubSource};

/// The sync engine as the service runs it
pub type Engine = SyncEngine<Arc<dyn ContentSource>, Database>;

/// Main service state, shared by every request handler
#[derive(Clone)]
pub struct State {
    database: Database,
    engine: Arc<Engine>,
    site_title: Arc<str>,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        config.validate()?;

        // 1. Setup database
        let database = match config.sqlite_path {
            Some(ref path) => Database::open(path).await?,
            None => {
                tracing::warn!("no sqlite_path configured, post metadata is kept in memory");
                Database::in_memory().await?
            }
        };

        // 2. Setup content source
        let source = GithubSource::new(&config.github)?;
        tracing::info!(
            "serving {}/{} at branch {}",
            config.github.owner,
            config.github.repo,
            source.branch()
        );

        Ok(Self::new(
            Arc::new(source),
            database,
            config.sync_config(),
            &config.site_title,
        ))
    }

    pub fn new(
        source: Arc<dyn ContentSource>,
        database: Database,
        sync: SyncConfig,
        site_title: &str,
    ) -> Self {
        let fragments = Arc::new(FragmentCache::new(sync.static_dir.clone()));
        let engine = SyncEngine::new(source, database.clone(), fragments, sync);
        Self {
            database,
            engine: Arc::new(engine),
            site_title: Arc::from(site_title),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn source(&self) -> &Arc<dyn ContentSource> {
        self.engine.source()
    }

    pub fn fragments(&self) -> &Arc<FragmentCache> {
        self.engine.fragments()
    }

    pub fn site_title(&self) -> &str {
        &self.site_title
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("database setup error: {0}")]
    Database(#[from] DatabaseSetupError),
    #[error("github setup error: {0}")]
    Github(#[from] GithubSetupError),
}
