//! Opaque node handles with identity semantics
//!
//! A [`NodeHandle`] identifies one file-system node for as long as the node
//! exists. Equality and hashing follow the shared identity, not the path:
//! two handles are equal only if they came from the same source node, and a
//! handle keeps identifying its node across renames. Deleting the node marks
//! every handle for it invalid; invalid handles must not be used in ancestor
//! tests.

use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug)]
struct NodeState {
    path: RwLock<PathBuf>,
    parent: RwLock<Option<NodeHandle>>,
    directory: bool,
    valid: AtomicBool,
}

/// Cheaply-clonable, identity-compared handle for one file-system node
#[derive(Debug, Clone)]
pub struct NodeHandle {
    inner: Arc<NodeState>,
}

impl NodeHandle {
    /// Create a handle for a node at `path`.
    ///
    /// Intended for event-source implementations; cache code only ever
    /// receives handles, never creates them.
    pub fn new(path: impl Into<PathBuf>, parent: Option<NodeHandle>, directory: bool) -> Self {
        Self {
            inner: Arc::new(NodeState {
                path: RwLock::new(path.into()),
                parent: RwLock::new(parent),
                directory,
                valid: AtomicBool::new(true),
            }),
        }
    }

    /// Current path of the node
    pub fn path(&self) -> PathBuf {
        self.inner.path.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// File name component of the current path
    pub fn name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Parent directory handle, if the node has one
    pub fn parent(&self) -> Option<NodeHandle> {
        self.inner
            .parent
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Whether the node is a directory
    pub fn is_directory(&self) -> bool {
        self.inner.directory
    }

    /// Whether the underlying node still exists
    pub fn is_valid(&self) -> bool {
        self.inner.valid.load(Ordering::Acquire)
    }

    /// Ancestor test against current paths.
    ///
    /// Returns false unless both handles are still valid; callers sweeping a
    /// handle-keyed map must skip invalid handles rather than treating the
    /// test as authoritative for them.
    pub fn is_ancestor_of(&self, other: &NodeHandle, strict: bool) -> bool {
        if !self.is_valid() || !other.is_valid() {
            return false;
        }
        let ancestor = self.path();
        let descendant = other.path();
        if strict && ancestor == descendant {
            return false;
        }
        descendant.starts_with(&ancestor)
    }

    /// Mark the node gone. Event sources call this on deletion.
    pub fn invalidate(&self) {
        self.inner.valid.store(false, Ordering::Release);
    }

    /// Re-point the handle after the node moved. Event sources only.
    pub fn relocate(&self, path: impl Into<PathBuf>, parent: Option<NodeHandle>) {
        *self.inner.path.write().unwrap_or_else(|e| e.into_inner()) = path.into();
        *self.inner.parent.write().unwrap_or_else(|e| e.into_inner()) = parent;
    }

    fn identity(&self) -> *const NodeState {
        Arc::as_ptr(&self.inner)
    }
}

impl PartialEq for NodeHandle {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.identity(), other.identity())
    }
}

impl Eq for NodeHandle {}

impl Hash for NodeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.identity() as usize).hash(state);
    }
}

impl std::fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path().display())
    }
}
