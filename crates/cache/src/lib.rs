#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! In-memory cache of per-directory version-control metadata
//!
//! This crate keeps working-copy metadata (entry records, ignore rules,
//! connection descriptors, sticky tags) cached per directory and consistent
//! with a concurrently-mutating file tree:
//!
//! - Metadata is loaded lazily on first read and cleared by classifying
//!   file-system events into invalidation actions
//! - Change notifications are delivered to registered listeners on a single
//!   coordinator task, never from the thread that detected the change
//! - The whole cache is live only between `activate()` / `deactivate()`
//!   pairs; reads against an inactive cache fail with `Error::Cancelled`
//!
//! # Example
//!
//! ```no_run
//! use cvsmeta_cache::EntriesCache;
//! use cvsmeta_core::connection::CvsRootParser;
//! use cvsmeta_vfs::{DiskAdminReader, MemFs};
//! use std::sync::Arc;
//!
//! # #[tokio::main] async fn main() -> cvsmeta_core::Result<()> {
//! let fs = MemFs::new();
//! let cache = EntriesCache::new(
//!     fs.clone(),
//!     Arc::new(DiskAdminReader),
//!     Arc::new(CvsRootParser),
//!     fs.clone(),
//! );
//! cache.activate();
//!
//! let dir = fs.create_dir("/work/project");
//! let entry = cache.entry_for(Some(&dir), "main.rs")?;
//! println!("cached entry: {entry:?}");
//!
//! cache.deactivate();
//! # Ok(())
//! # }
//! ```

mod connections;
mod dispatch;
mod info;
mod listeners;
mod registry;
mod router;

pub mod ignore;

// Public exports - minimal API surface
pub use connections::ConnectionSettingsCache;
pub use ignore::{IgnoreFilter, UserIgnores};
pub use info::{DirInfo, StoreOutcome};
pub use listeners::EntriesListener;
pub use registry::EntriesCache;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::listeners::EntriesListener;
    pub use crate::registry::EntriesCache;
}
