//! Classification of file-system events into invalidation actions
//!
//! The router looks only at the shape of the changed path. Rules apply in
//! priority order; the first match wins:
//!
//! 1. the user-home ignore file → drop the global ignore rules
//! 2. a directory-local ignore file → drop that directory's filter
//! 3. a member of an admin directory → clear the versioned directory
//!    (the admin directory's parent)
//! 4. an admin directory itself → clear its parent
//! 5. a plain directory → clear it and every cached descendant
//! 6. a plain file → no cache action

use crate::ignore::UserIgnores;
use cvsmeta_vfs::{is_admin_dir, is_ignore_file, FsEvent, NodeHandle};

/// Cache action an event calls for
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InvalidationAction {
    /// Discard the global user ignore rules and mark all workspaces dirty
    ClearUserIgnores,
    /// Discard the ignore filter of this directory and its cached
    /// descendants; entries stay
    ClearFiltersUnder(NodeHandle),
    /// Clear this directory's entry data (with notification if it was
    /// loaded)
    ClearEntries(NodeHandle),
    /// Clear this directory and every cached descendant
    ClearEntriesRecursive(NodeHandle),
    /// Plain-file change; no cache action
    None,
}

pub(crate) fn classify(event: &FsEvent, user_ignores: &UserIgnores) -> InvalidationAction {
    let node = &event.node;

    if user_ignores.is_ignore_file(&node.path()) {
        return InvalidationAction::ClearUserIgnores;
    }

    if is_ignore_file(node) {
        return match event.parent.as_ref() {
            Some(parent) => InvalidationAction::ClearFiltersUnder(parent.clone()),
            None => InvalidationAction::None,
        };
    }

    // A change inside CVS/ invalidates the *versioned* directory, which is
    // the admin directory's own parent.
    if let Some(parent) = event.parent.as_ref() {
        if is_admin_dir(parent) {
            return match parent.parent() {
                Some(grandparent) => InvalidationAction::ClearEntries(grandparent),
                None => InvalidationAction::None,
            };
        }
    }

    if is_admin_dir(node) {
        return match event.parent.as_ref() {
            Some(parent) => InvalidationAction::ClearEntries(parent.clone()),
            None => InvalidationAction::None,
        };
    }

    if node.is_directory() {
        return InvalidationAction::ClearEntriesRecursive(node.clone());
    }

    InvalidationAction::None
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvsmeta_vfs::{EventPhase, FsEventKind, FsEventSource, MemFs};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn event(node: NodeHandle) -> FsEvent {
        FsEvent::new(FsEventKind::ContentChanged, EventPhase::Before, node)
    }

    fn user_ignores() -> UserIgnores {
        UserIgnores::with_path("/home/user/.cvsignore")
    }

    fn fs_with_project() -> Arc<MemFs> {
        let fs = MemFs::new();
        fs.create_dir("/work/project/CVS");
        fs
    }

    #[test]
    fn test_user_home_ignore_file_beats_local_rule() {
        let fs = MemFs::new();
        let node = fs.create_file("/home/user/.cvsignore");
        assert_eq!(
            classify(&event(node), &user_ignores()),
            InvalidationAction::ClearUserIgnores
        );
    }

    #[test]
    fn test_local_ignore_file_clears_parent_filter() {
        let fs = fs_with_project();
        let node = fs.create_file("/work/project/.cvsignore");
        let parent = fs.find_by_path("/work/project".as_ref()).expect("parent exists");
        assert_eq!(
            classify(&event(node), &user_ignores()),
            InvalidationAction::ClearFiltersUnder(parent)
        );
    }

    #[test]
    fn test_admin_member_clears_grandparent() {
        let fs = fs_with_project();
        let node = fs.create_file("/work/project/CVS/Entries");
        let versioned = fs.find_by_path("/work/project".as_ref()).expect("dir exists");
        assert_eq!(
            classify(&event(node), &user_ignores()),
            InvalidationAction::ClearEntries(versioned)
        );
    }

    #[test]
    fn test_admin_dir_clears_parent() {
        let fs = fs_with_project();
        let node = fs.find_by_path("/work/project/CVS".as_ref()).expect("dir exists");
        let versioned = fs.find_by_path("/work/project".as_ref()).expect("dir exists");
        assert_eq!(
            classify(&event(node), &user_ignores()),
            InvalidationAction::ClearEntries(versioned)
        );
    }

    #[test]
    fn test_plain_directory_clears_recursively() {
        let fs = fs_with_project();
        let node = fs.create_dir("/work/project/src");
        assert_eq!(
            classify(&event(node.clone()), &user_ignores()),
            InvalidationAction::ClearEntriesRecursive(node)
        );
    }

    #[test]
    fn test_plain_file_is_no_action() {
        let fs = fs_with_project();
        let node = fs.create_file("/work/project/main.rs");
        assert_eq!(classify(&event(node), &user_ignores()), InvalidationAction::None);
    }

    #[test]
    fn test_cvs_named_file_is_not_admin_dir() {
        let fs = fs_with_project();
        let node = fs.create_file("/work/project/src/CVS");
        assert_eq!(classify(&event(node), &user_ignores()), InvalidationAction::None);
    }
}
