pub mod health;
pub mod serve;
pub mod sync;
pub mod version;

pub use health::Health;
pub use serve::Serve;
pub use sync::SyncNow;
pub use version::Version;
