// Service modules
pub mod config;
pub mod database;
pub mod github;
pub mod http_server;
pub mod render;
pub mod state;

// Re-exports for the binary and integration tests
pub use config::Config as ServiceConfig;
pub use database::{Database, StoreError};
pub use github::GithubSource;
pub use state::State as ServiceState;
