//! Service configuration, read from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration apart from the repository coordinates.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use common::sync::SyncConfig;

/// Looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "blawg.toml";
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// SQLite file; an in-memory database when unset
    pub sqlite_path: Option<PathBuf>,
    pub sync_interval_secs: u64,
    pub posts_dir: String,
    pub static_dir: String,
    /// Extensions (without the dot) of files under `posts_dir` that are posts
    pub post_extensions: Vec<String>,
    /// Shown as `{{ title }}` on the index page
    pub site_title: String,
    /// Default filter directive, overridden by `RUST_LOG`
    pub log_level: String,
    pub github: GithubConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub api_url: Url,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("invalid config file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

impl Default for Config {
    fn default() -> Self {
        let sync = SyncConfig::default();
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 1337)),
            sqlite_path: None,
            sync_interval_secs: sync.interval.as_secs(),
            posts_dir: sync.posts_dir,
            static_dir: sync.static_dir,
            post_extensions: sync.post_extensions,
            site_title: "blawg".to_string(),
            log_level: "info".to_string(),
            github: GithubConfig::default(),
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            branch: "main".to_string(),
            token: None,
            api_url: Url::parse("https://api.github.com").expect("static url"),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists.
    ///
    /// An explicit path must exist. `GITHUB_TOKEN` fills in the token when
    /// the file does not set one.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    tracing::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Self::default()
                }
            }
        };

        if config.github.token.is_none() {
            config.github.token = std::env::var(GITHUB_TOKEN_ENV)
                .ok()
                .filter(|token| !token.is_empty());
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Check the settings that have no usable default
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.github.owner.trim().is_empty() {
            return Err(ConfigError::Missing("github.owner"));
        }
        if self.github.repo.trim().is_empty() {
            return Err(ConfigError::Missing("github.repo"));
        }
        if self.github.branch.trim().is_empty() {
            return Err(ConfigError::Missing("github.branch"));
        }
        Ok(())
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            posts_dir: self.posts_dir.clone(),
            static_dir: self.static_dir.clone(),
            post_extensions: self.post_extensions.clone(),
            interval: Duration::from_secs(self.sync_interval_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.listen_addr.port(), 1337);
        assert_eq!(config.sync_interval_secs, 60);
        assert_eq!(config.posts_dir, "posts");
        assert_eq!(config.static_dir, "static");
        assert_eq!(config.github.branch, "main");
        assert_eq!(config.github.api_url.as_str(), "https://api.github.com/");
        assert!(config.sqlite_path.is_none());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("github.owner"))
        ));
    }

    #[test]
    fn test_parse_full_file() {
        let config: Config = toml::from_str(
            r#"
            listen_addr = "127.0.0.1:8080"
            sqlite_path = "/var/lib/blawg/blawg.db"
            sync_interval_secs = 300
            posts_dir = "content/posts"
            site_title = "Notes"

            [github]
            owner = "someone"
            repo = "blog"
            branch = "published"
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(
            config.sqlite_path.as_deref(),
            Some(Path::new("/var/lib/blawg/blawg.db"))
        );
        assert_eq!(config.github.repo, "blog");
        assert!(config.validate().is_ok());

        let sync = config.sync_config();
        assert_eq!(sync.interval, Duration::from_secs(300));
        assert_eq!(sync.posts_dir, "content/posts");
        assert_eq!(sync.static_dir, "static");
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(ConfigError::Read(_, _))
        ));
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blawg.toml");
        std::fs::write(&path, "sync_interval_secs = \"soon\"").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::Parse(_, _))
        ));
    }
}
