pub mod memory;
mod provider;

pub use memory::MemoryContentSource;
pub use provider::{ChangedFile, Commit, ContentSource, FileStatus, SourceError};
