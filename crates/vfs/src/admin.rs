//! Per-directory version-control admin storage
//!
//! A version-controlled directory carries a reserved `CVS` subdirectory
//! holding its metadata: the `Entries` record file, the `Root` connection
//! string, the `Repository` path, and an optional sticky `Tag`. Reading any
//! of it is strictly best-effort: missing or unreadable admin storage means
//! "no metadata", never an error.

use crate::handle::NodeHandle;
use cvsmeta_core::entry::EntryRecord;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reserved name of the admin directory
pub const ADMIN_DIR_NAME: &str = "CVS";
/// Record file inside the admin directory
pub const ENTRIES_FILE_NAME: &str = "Entries";
/// Connection root string file inside the admin directory
pub const ROOT_FILE_NAME: &str = "Root";
/// Repository path file inside the admin directory
pub const REPOSITORY_FILE_NAME: &str = "Repository";
/// Sticky tag file inside the admin directory
pub const TAG_FILE_NAME: &str = "Tag";
/// Directory-local ignore rule file
pub const IGNORE_FILE_NAME: &str = ".cvsignore";

/// Whether a node is the reserved admin directory
pub fn is_admin_dir(node: &NodeHandle) -> bool {
    node.is_directory() && node.name() == ADMIN_DIR_NAME
}

/// Whether a node is a directory-local ignore file
pub fn is_ignore_file(node: &NodeHandle) -> bool {
    node.name() == IGNORE_FILE_NAME
}

/// Path of the user's home-directory ignore file, when a home is known
pub fn user_home_ignore_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(IGNORE_FILE_NAME))
}

/// Everything recorded in one directory's admin storage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminData {
    /// Entry records, one per tracked file or subdirectory
    pub entries: Vec<EntryRecord>,
    /// Connection root string (`CVS/Root`), empty when absent
    pub root: String,
    /// Repository path (`CVS/Repository`), empty when absent
    pub repository: String,
    /// Sticky tag line (`CVS/Tag`) with its prefix, empty when absent
    pub sticky_tag: String,
}

/// Reader of per-directory admin storage.
///
/// Failures yield [`AdminData::default`], so a directory with damaged or
/// missing admin files simply behaves as an untracked directory.
pub trait AdminReader: Send + Sync {
    /// Read the admin metadata recorded for `dir`
    fn read(&self, dir: &NodeHandle) -> AdminData;

    /// Read the lines of `dir`'s local ignore file; empty when absent
    fn read_ignore_lines(&self, dir: &NodeHandle) -> Vec<String>;
}

/// Observer of workspace-level status, one per open workspace.
///
/// The cache pushes coarse dirtiness signals here; it never reads back.
pub trait WorkspaceStatus: Send + Sync {
    /// One file or directory needs a status refresh
    fn mark_dirty(&self, node: &NodeHandle);

    /// Everything in the workspace needs a status refresh
    fn mark_everything_dirty(&self);
}

/// Query whether a file is already under version control.
///
/// Used to exempt tracked files from ignore-filter results.
pub trait VersionedQuery: Send + Sync {
    fn is_versioned(&self, node: &NodeHandle) -> bool;
}

/// [`AdminReader`] backed by the real file system
#[derive(Debug, Default)]
pub struct DiskAdminReader;

impl DiskAdminReader {
    fn read_trimmed(path: &Path) -> String {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                debug!("No admin data at {path:?}: {e}");
                String::new()
            }
        }
    }
}

impl AdminReader for DiskAdminReader {
    fn read(&self, dir: &NodeHandle) -> AdminData {
        let admin = dir.path().join(ADMIN_DIR_NAME);

        let entries = match std::fs::read_to_string(admin.join(ENTRIES_FILE_NAME)) {
            Ok(content) => content.lines().filter_map(EntryRecord::parse_line).collect(),
            Err(e) => {
                debug!("No entries for {dir}: {e}");
                Vec::new()
            }
        };

        AdminData {
            entries,
            root: Self::read_trimmed(&admin.join(ROOT_FILE_NAME)),
            repository: Self::read_trimmed(&admin.join(REPOSITORY_FILE_NAME)),
            sticky_tag: Self::read_trimmed(&admin.join(TAG_FILE_NAME)),
        }
    }

    fn read_ignore_lines(&self, dir: &NodeHandle) -> Vec<String> {
        match std::fs::read_to_string(dir.path().join(IGNORE_FILE_NAME)) {
            Ok(content) => content.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }
}
