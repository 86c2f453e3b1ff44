//! File-system abstraction consumed by the cvsmeta cache
//!
//! The cache never touches the real file system directly. It sees the tree
//! through three seams defined here:
//!
//! - [`NodeHandle`]: opaque, identity-compared handle for one node, with a
//!   validity flag and ancestor queries
//! - [`FsEventSource`]/[`FsEventObserver`]: change-event subscription and the
//!   post-refresh hook
//! - [`AdminReader`]: access to per-directory version-control admin storage
//!
//! [`MemFs`] is an in-memory implementation of all three, used by tests.

pub mod admin;
pub mod events;
pub mod handle;
pub mod memfs;

pub use admin::{
    is_admin_dir, is_ignore_file, user_home_ignore_file, AdminData, AdminReader, DiskAdminReader,
    VersionedQuery, WorkspaceStatus, ADMIN_DIR_NAME, ENTRIES_FILE_NAME, IGNORE_FILE_NAME,
    REPOSITORY_FILE_NAME, ROOT_FILE_NAME, TAG_FILE_NAME,
};
pub use events::{EventPhase, FsEvent, FsEventKind, FsEventObserver, FsEventSource, SubscriptionId};
pub use handle::NodeHandle;
pub use memfs::MemFs;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::admin::{AdminData, AdminReader};
    pub use crate::events::{FsEvent, FsEventObserver, FsEventSource};
    pub use crate::handle::NodeHandle;
}
