//! Core data structures and sync machinery for blawg.
//!
//! A blog's content lives in a remote repository. This crate knows how to walk
//! the commits that landed since the last sync, turn touched posts into
//! metadata records, reconcile them into a durable store, and keep the small
//! set of static template fragments fresh.
//!
//! - [`source`]: the read-only repository contract plus an in-memory source
//! - [`front_matter`]: YAML front-matter extraction
//! - [`post`]: post records and reconciliation against stored identities
//! - [`store`]: post store and sync cursor contracts plus an in-memory store
//! - [`fragments`]: memoized static fragments with explicit invalidation
//! - [`sync`]: the throttled, single-flight synchronization engine

pub mod fragments;
pub mod front_matter;
pub mod post;
pub mod source;
pub mod store;
pub mod sync;

pub mod prelude {
    pub use crate::fragments::{Fragment, FragmentCache};
    pub use crate::post::Post;
    pub use crate::source::{ChangedFile, Commit, ContentSource, FileStatus, SourceError};
    pub use crate::store::{PostStore, SyncCursor};
    pub use crate::sync::{SyncConfig, SyncEngine, SyncError, SyncReport};
}
