//! File-system change events and the subscription seam

use crate::handle::NodeHandle;
use std::path::Path;
use std::sync::Arc;

/// What happened to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    /// Node came into existence
    Created,
    /// Node is being removed
    Deleted,
    /// Node is being moved to a new parent or name
    Moved,
    /// Node content changed
    ContentChanged,
    /// Node properties (permissions, name case) changed
    PropertyChanged,
}

/// Whether the event fires before or after the change is applied.
///
/// Deletions, moves, content changes, and property changes announce
/// themselves before the tree mutates, so observers can still see the old
/// state; creations and content changes additionally fire after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    Before,
    After,
}

/// One file-system change notification
#[derive(Debug, Clone)]
pub struct FsEvent {
    /// What happened
    pub kind: FsEventKind,
    /// Before or after the mutation
    pub phase: EventPhase,
    /// The node the change applies to
    pub node: NodeHandle,
    /// The node's parent directory at event time, when it has one
    pub parent: Option<NodeHandle>,
}

impl FsEvent {
    /// Build an event, capturing the node's parent at call time
    pub fn new(kind: FsEventKind, phase: EventPhase, node: NodeHandle) -> Self {
        let parent = node.parent();
        Self {
            kind,
            phase,
            node,
            parent,
        }
    }
}

/// Token identifying one active subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Receiver of file-system change events
pub trait FsEventObserver: Send + Sync {
    /// Called for every delivered event
    fn on_event(&self, event: &FsEvent);

    /// Called after a bulk refresh of the event source's view completes
    fn after_refresh(&self) {}
}

/// Source of file-system change events.
///
/// Implementations deliver events synchronously from their delivery thread;
/// observers must not block.
pub trait FsEventSource: Send + Sync {
    /// Register an observer; events flow until [`unsubscribe`](Self::unsubscribe)
    fn subscribe(&self, observer: Arc<dyn FsEventObserver>) -> SubscriptionId;

    /// Remove a previously-registered observer
    fn unsubscribe(&self, id: SubscriptionId);

    /// Resolve a path to a live node handle, if the source knows the node
    fn find_by_path(&self, path: &Path) -> Option<NodeHandle>;

    /// Force a directory's children into the source's cache so later events
    /// for them can be delivered without a full rescan
    fn touch_children(&self, dir: &NodeHandle);
}
