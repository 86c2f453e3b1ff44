//! In-memory file tree with synchronous event delivery
//!
//! Backs the cache's tests: nodes, admin storage, ignore files, and the
//! versioned-file set all live in maps, and every mutation delivers its
//! events to subscribers before returning. No disk, no timing.

use crate::admin::{AdminData, AdminReader, VersionedQuery};
use crate::events::{
    EventPhase, FsEvent, FsEventKind, FsEventObserver, FsEventSource, SubscriptionId,
};
use crate::handle::NodeHandle;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory implementation of the file-system seams
#[derive(Default)]
pub struct MemFs {
    nodes: Mutex<HashMap<PathBuf, NodeHandle>>,
    observers: Mutex<HashMap<u64, Arc<dyn FsEventObserver>>>,
    next_subscription: AtomicU64,
    admin: Mutex<HashMap<PathBuf, AdminData>>,
    ignore_lines: Mutex<HashMap<PathBuf, Vec<String>>>,
    versioned: Mutex<HashSet<PathBuf>>,
    touched: Mutex<Vec<PathBuf>>,
    read_counts: Mutex<HashMap<PathBuf, usize>>,
}

impl MemFs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a directory (and any missing ancestors), returning its handle
    pub fn create_dir(&self, path: impl AsRef<Path>) -> NodeHandle {
        self.create(path.as_ref(), true)
    }

    /// Create a file (and any missing ancestor directories)
    pub fn create_file(&self, path: impl AsRef<Path>) -> NodeHandle {
        self.create(path.as_ref(), false)
    }

    fn create(&self, path: &Path, directory: bool) -> NodeHandle {
        if let Some(existing) = self.find_by_path(path) {
            return existing;
        }

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| self.create(p, true));

        let node = NodeHandle::new(path, parent, directory);
        self.nodes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_path_buf(), node.clone());

        self.emit(FsEvent::new(
            FsEventKind::Created,
            EventPhase::After,
            node.clone(),
        ));
        node
    }

    /// Change a file's content
    pub fn modify(&self, node: &NodeHandle) {
        self.emit(FsEvent::new(
            FsEventKind::ContentChanged,
            EventPhase::Before,
            node.clone(),
        ));
        self.emit(FsEvent::new(
            FsEventKind::ContentChanged,
            EventPhase::After,
            node.clone(),
        ));
    }

    /// Change a node's properties
    pub fn change_property(&self, node: &NodeHandle) {
        self.emit(FsEvent::new(
            FsEventKind::PropertyChanged,
            EventPhase::Before,
            node.clone(),
        ));
    }

    /// Delete a node and its descendants.
    ///
    /// The event fires for the deleted root only, while the old state is
    /// still visible; descendant handles are invalidated silently.
    pub fn delete(&self, node: &NodeHandle) {
        self.emit(FsEvent::new(
            FsEventKind::Deleted,
            EventPhase::Before,
            node.clone(),
        ));

        let prefix = node.path();
        let mut nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        nodes.retain(|path, handle| {
            if path.starts_with(&prefix) {
                handle.invalidate();
                false
            } else {
                true
            }
        });
    }

    /// Move a node (and its subtree) to `new_path`, keeping handle identity
    pub fn move_node(&self, node: &NodeHandle, new_path: impl AsRef<Path>) {
        let new_path = new_path.as_ref();
        self.emit(FsEvent::new(
            FsEventKind::Moved,
            EventPhase::Before,
            node.clone(),
        ));

        let old_prefix = node.path();
        {
            let mut nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
            let moved: Vec<(PathBuf, NodeHandle)> = nodes
                .iter()
                .filter(|(path, _)| path.starts_with(&old_prefix))
                .map(|(path, handle)| (path.clone(), handle.clone()))
                .collect();
            for (path, handle) in moved {
                nodes.remove(&path);
                let relocated = match path.strip_prefix(&old_prefix) {
                    Ok(rest) if rest.as_os_str().is_empty() => new_path.to_path_buf(),
                    Ok(rest) => new_path.join(rest),
                    Err(_) => continue,
                };
                let parent = relocated
                    .parent()
                    .and_then(|p| nodes.get(p).cloned().or_else(|| handle.parent()));
                handle.relocate(&relocated, parent);
                nodes.insert(relocated, handle);
            }
        }

        self.emit(FsEvent::new(
            FsEventKind::Moved,
            EventPhase::After,
            node.clone(),
        ));
    }

    /// Record the admin metadata the reader should report for `dir_path`
    pub fn set_admin_data(&self, dir_path: impl Into<PathBuf>, data: AdminData) {
        self.admin
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(dir_path.into(), data);
    }

    /// Record a directory's local ignore-file lines
    pub fn set_ignore_lines(&self, dir_path: impl Into<PathBuf>, lines: Vec<String>) {
        self.ignore_lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(dir_path.into(), lines);
    }

    /// Mark a path as already under version control
    pub fn mark_versioned(&self, path: impl Into<PathBuf>) {
        self.versioned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.into());
    }

    /// Simulate completion of a bulk refresh
    pub fn finish_refresh(&self) {
        for observer in self.observer_snapshot() {
            observer.after_refresh();
        }
    }

    /// Paths passed to [`touch_children`](FsEventSource::touch_children)
    pub fn touched_paths(&self) -> Vec<PathBuf> {
        self.touched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of admin reads performed for `dir_path`
    pub fn admin_read_count(&self, dir_path: &Path) -> usize {
        self.read_counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(dir_path)
            .copied()
            .unwrap_or(0)
    }

    fn observer_snapshot(&self) -> Vec<Arc<dyn FsEventObserver>> {
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    fn emit(&self, event: FsEvent) {
        for observer in self.observer_snapshot() {
            observer.on_event(&event);
        }
    }
}

impl FsEventSource for MemFs {
    fn subscribe(&self, observer: Arc<dyn FsEventObserver>) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, observer);
        SubscriptionId(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id.0);
    }

    fn find_by_path(&self, path: &Path) -> Option<NodeHandle> {
        self.nodes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
    }

    fn touch_children(&self, dir: &NodeHandle) {
        self.touched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(dir.path());
    }
}

impl AdminReader for MemFs {
    fn read(&self, dir: &NodeHandle) -> AdminData {
        let path = dir.path();
        self.read_counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(path.clone())
            .and_modify(|count| *count += 1)
            .or_insert(1);
        self.admin
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&path)
            .cloned()
            .unwrap_or_default()
    }

    fn read_ignore_lines(&self, dir: &NodeHandle) -> Vec<String> {
        self.ignore_lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&dir.path())
            .cloned()
            .unwrap_or_default()
    }
}

impl VersionedQuery for MemFs {
    fn is_versioned(&self, node: &NodeHandle) -> bool {
        self.versioned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&node.path())
    }
}
