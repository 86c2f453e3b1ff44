//! Observer registration and snapshot-stable fan-out

use cvsmeta_vfs::NodeHandle;
use std::sync::{Arc, Mutex};

/// Observer of cache-visible metadata changes.
///
/// Both callbacks are invoked on the notification coordinator task only,
/// after the corresponding cache mutation has completed, so re-reading the
/// cache from a callback sees post-change state.
pub trait EntriesListener: Send + Sync {
    /// A directory's entry set was invalidated or reloaded
    fn entries_changed(&self, directory: &NodeHandle);

    /// A single file's entry record changed
    fn entry_changed(&self, file: &NodeHandle);
}

/// Thread-safe listener collection with snapshot-at-dispatch iteration.
///
/// Registration is identity-based: removing passes the same `Arc` that was
/// added. A listener removed while a dispatch is in flight may still see
/// that one dispatch, but never a later one.
#[derive(Default)]
pub(crate) struct ListenerList {
    listeners: Mutex<Vec<Arc<dyn EntriesListener>>>,
}

impl ListenerList {
    pub fn add(&self, listener: Arc<dyn EntriesListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    pub fn remove(&self, listener: &Arc<dyn EntriesListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|existing| !Arc::ptr_eq(existing, listener));
    }

    /// Stable copy of the current listeners for one dispatch
    pub fn snapshot(&self) -> Vec<Arc<dyn EntriesListener>> {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter;

    impl EntriesListener for Counter {
        fn entries_changed(&self, _directory: &NodeHandle) {}
        fn entry_changed(&self, _file: &NodeHandle) {}
    }

    #[test]
    fn test_remove_is_identity_based() {
        let list = ListenerList::default();
        let a: Arc<dyn EntriesListener> = Arc::new(Counter);
        let b: Arc<dyn EntriesListener> = Arc::new(Counter);
        list.add(a.clone());
        list.add(b.clone());

        list.remove(&a);

        let snapshot = list.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(Arc::ptr_eq(&snapshot[0], &b));
    }

    #[test]
    fn test_snapshot_is_stable_against_mutation() {
        let list = ListenerList::default();
        let a: Arc<dyn EntriesListener> = Arc::new(Counter);
        list.add(a.clone());

        let snapshot = list.snapshot();
        list.remove(&a);

        assert_eq!(snapshot.len(), 1);
        assert!(list.snapshot().is_empty());
    }
}
