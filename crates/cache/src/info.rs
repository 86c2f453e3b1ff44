//! Per-directory cache entry
//!
//! One [`DirInfo`] owns everything cached for a single directory: the
//! lazily-loaded entry map, the composed ignore filter, and the
//! repository/sticky-tag/connection metadata read from admin storage. The
//! object itself survives invalidation; clearing only resets its data so
//! the next read reloads.

use crate::connections::ConnectionSettingsCache;
use crate::ignore::{IgnoreFilter, UserIgnores};
use cvsmeta_core::connection::ConnectionSettings;
use cvsmeta_core::entry::EntryRecord;
use cvsmeta_vfs::{AdminReader, NodeHandle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// Outcome of storing an entry record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The directory was not loaded; nothing was cached to update
    Skipped,
    /// The record was stored, replacing any previous record for the name
    Stored { replaced: Option<EntryRecord> },
}

#[derive(Default)]
struct InfoState {
    /// True once admin storage has been read; guards the entry map
    loaded: bool,
    entries: HashMap<String, EntryRecord>,
    filter: Option<Arc<IgnoreFilter>>,
    root: String,
    repository: String,
    sticky_tag: String,
    connection: Option<Arc<ConnectionSettings>>,
}

/// Cached metadata for one directory
pub struct DirInfo {
    /// Owning directory; `None` for the dummy sentinel
    directory: Option<NodeHandle>,
    state: Mutex<InfoState>,
}

impl DirInfo {
    pub(crate) fn new(directory: NodeHandle) -> Self {
        Self {
            directory: Some(directory),
            state: Mutex::new(InfoState::default()),
        }
    }

    /// Sentinel standing in for an absent directory: always empty, never
    /// loads, never notifies
    pub(crate) fn dummy() -> Self {
        Self {
            directory: None,
            state: Mutex::new(InfoState::default()),
        }
    }

    /// The directory this entry caches, unless it is the sentinel
    pub fn directory(&self) -> Option<&NodeHandle> {
        self.directory.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    fn lock(&self) -> MutexGuard<'_, InfoState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read admin storage into the state unless already loaded.
    ///
    /// One read fills the entry map and the root/repository/sticky slots
    /// together. The sentinel never loads.
    fn ensure_loaded<'a>(
        &self,
        mut state: MutexGuard<'a, InfoState>,
        reader: &dyn AdminReader,
    ) -> MutexGuard<'a, InfoState> {
        if state.loaded {
            return state;
        }
        let Some(directory) = self.directory.as_ref() else {
            return state;
        };

        trace!("Loading admin metadata for {directory}");
        let data = reader.read(directory);
        state.entries = data
            .entries
            .into_iter()
            .map(|entry| (entry.file_name.clone(), entry))
            .collect();
        state.root = data.root;
        state.repository = data.repository;
        state.sticky_tag = data.sticky_tag;
        state.loaded = true;
        state
    }

    /// Load now instead of on first read. Idempotent.
    pub fn load(&self, reader: &dyn AdminReader) {
        drop(self.ensure_loaded(self.lock(), reader));
    }

    /// Pre-warm everything this entry caches
    pub fn cache_all(&self, reader: &dyn AdminReader) {
        self.load(reader);
    }

    /// The record for `name`, loading admin storage if necessary
    pub fn entry_named(&self, reader: &dyn AdminReader, name: &str) -> Option<EntryRecord> {
        self.ensure_loaded(self.lock(), reader).entries.get(name).cloned()
    }

    /// All records, loading admin storage if necessary
    pub fn entries(&self, reader: &dyn AdminReader) -> Vec<EntryRecord> {
        self.ensure_loaded(self.lock(), reader)
            .entries
            .values()
            .cloned()
            .collect()
    }

    /// The record for `name` only if already loaded; never triggers a load
    pub fn cached_entry_named(&self, name: &str) -> Option<EntryRecord> {
        let state = self.lock();
        if !state.loaded {
            return None;
        }
        state.entries.get(name).cloned()
    }

    /// Store a record, keyed by its file name.
    ///
    /// A silent no-op unless loaded: with nothing cached there is nothing
    /// to update, and materializing partial state here would break the
    /// loaded-map invariant.
    pub fn set_entry(&self, record: EntryRecord) -> StoreOutcome {
        let mut state = self.lock();
        if !state.loaded {
            return StoreOutcome::Skipped;
        }
        let replaced = state.entries.insert(record.file_name.clone(), record);
        StoreOutcome::Stored { replaced }
    }

    /// Remove the record for `name`; returns whether the removal applied
    pub fn remove_entry(&self, name: &str) -> bool {
        let mut state = self.lock();
        if !state.loaded {
            return false;
        }
        state.entries.remove(name);
        true
    }

    /// Discard only the cached ignore filter; entries are untouched
    pub fn clear_filter(&self) {
        self.lock().filter = None;
    }

    /// Discard everything; the next read reloads from admin storage
    pub fn clear_all(&self) {
        *self.lock() = InfoState::default();
    }

    /// Invalidation entry point: always drops the filter, and clears the
    /// entry data only when it had been loaded. Returns true in that case,
    /// meaning the caller owes observers an entries-changed notification,
    /// since they may have seen the now-stale data. An unloaded entry needs
    /// no notification.
    pub(crate) fn clear_for_invalidation(&self) -> bool {
        let mut state = self.lock();
        state.filter = None;
        if !state.loaded {
            return false;
        }
        *state = InfoState::default();
        true
    }

    /// The directory's composed ignore filter, built lazily from the local
    /// ignore file plus the shared user rules
    pub fn ignore_filter(
        &self,
        reader: &dyn AdminReader,
        user: &Arc<UserIgnores>,
    ) -> Arc<IgnoreFilter> {
        let mut state = self.lock();
        if let Some(filter) = state.filter.as_ref() {
            return Arc::clone(filter);
        }
        let local_lines = match self.directory.as_ref() {
            Some(directory) => reader.read_ignore_lines(directory),
            None => Vec::new(),
        };
        let filter = Arc::new(IgnoreFilter::compose(Arc::clone(user), &local_lines));
        state.filter = Some(Arc::clone(&filter));
        filter
    }

    /// Repository path recorded in admin storage; empty when absent
    pub fn repository(&self, reader: &dyn AdminReader) -> String {
        self.ensure_loaded(self.lock(), reader).repository.clone()
    }

    /// Sticky tag line recorded in admin storage, prefix included; empty
    /// when the directory is not pinned
    pub fn sticky_tag(&self, reader: &dyn AdminReader) -> String {
        self.ensure_loaded(self.lock(), reader).sticky_tag.clone()
    }

    /// Connection descriptor for the directory's recorded root, resolved
    /// through the process-wide settings cache
    pub fn connection_settings(
        &self,
        reader: &dyn AdminReader,
        connections: &ConnectionSettingsCache,
    ) -> Option<Arc<ConnectionSettings>> {
        let mut state = self.ensure_loaded(self.lock(), reader);
        if let Some(connection) = state.connection.as_ref() {
            return Some(Arc::clone(connection));
        }
        if state.root.is_empty() {
            return None;
        }
        let connection = connections.resolve(&state.root);
        state.connection = Some(Arc::clone(&connection));
        Some(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvsmeta_vfs::{AdminData, MemFs};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn fixture() -> (Arc<MemFs>, DirInfo) {
        let fs = MemFs::new();
        let dir = fs.create_dir("/work/project");
        fs.set_admin_data(
            "/work/project",
            AdminData {
                entries: vec![
                    EntryRecord::file("a.txt", "1.2"),
                    EntryRecord::file("b.txt", "1.5"),
                ],
                root: ":pserver:u@host:/repo".to_string(),
                repository: "project".to_string(),
                sticky_tag: "Trelease".to_string(),
            },
        );
        (fs.clone(), DirInfo::new(dir))
    }

    #[test]
    fn test_load_is_lazy_and_idempotent() {
        let (fs, info) = fixture();
        assert!(!info.is_loaded());
        assert_eq!(fs.admin_read_count(Path::new("/work/project")), 0);

        let entry = info.entry_named(fs.as_ref(), "a.txt").expect("entry should load");
        assert_eq!(entry.revision, "1.2");
        assert!(info.is_loaded());

        info.load(fs.as_ref());
        info.entry_named(fs.as_ref(), "b.txt");
        assert_eq!(fs.admin_read_count(Path::new("/work/project")), 1);
    }

    #[test]
    fn test_clear_all_forces_exactly_one_reload() {
        let (fs, info) = fixture();
        info.load(fs.as_ref());
        info.clear_all();

        assert!(!info.is_loaded());
        assert_eq!(info.cached_entry_named("a.txt"), None);

        info.entry_named(fs.as_ref(), "a.txt");
        info.entry_named(fs.as_ref(), "b.txt");
        assert_eq!(fs.admin_read_count(Path::new("/work/project")), 2);
    }

    #[test]
    fn test_set_entry_before_load_is_noop() {
        let (fs, info) = fixture();
        assert_eq!(
            info.set_entry(EntryRecord::file("a.txt", "1.3")),
            StoreOutcome::Skipped
        );
        assert_eq!(info.cached_entry_named("a.txt"), None);

        info.load(fs.as_ref());
        let outcome = info.set_entry(EntryRecord::file("a.txt", "1.3"));
        match outcome {
            StoreOutcome::Stored { replaced: Some(previous) } => {
                assert_eq!(previous.revision, "1.2");
            }
            other => panic!("expected replacement, got {other:?}"),
        }
        let entry = info.entry_named(fs.as_ref(), "a.txt").expect("entry should exist");
        assert_eq!(entry.revision, "1.3");
    }

    #[test]
    fn test_remove_entry_requires_load() {
        let (fs, info) = fixture();
        assert!(!info.remove_entry("a.txt"));

        info.load(fs.as_ref());
        assert!(info.remove_entry("a.txt"));
        assert_eq!(info.entry_named(fs.as_ref(), "a.txt"), None);
    }

    #[test]
    fn test_clear_filter_keeps_entries() {
        let (fs, info) = fixture();
        let user = Arc::new(UserIgnores::with_path("/nonexistent/.cvsignore"));
        info.load(fs.as_ref());

        let first = info.ignore_filter(fs.as_ref(), &user);
        let again = info.ignore_filter(fs.as_ref(), &user);
        assert!(Arc::ptr_eq(&first, &again));

        info.clear_filter();
        let rebuilt = info.ignore_filter(fs.as_ref(), &user);
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert!(info.is_loaded());
    }

    #[test]
    fn test_admin_metadata_cached_until_clear() {
        let (fs, info) = fixture();
        assert_eq!(info.repository(fs.as_ref()), "project");
        assert_eq!(info.sticky_tag(fs.as_ref()), "Trelease");
        assert_eq!(fs.admin_read_count(Path::new("/work/project")), 1);

        let connections =
            ConnectionSettingsCache::new(Arc::new(cvsmeta_core::connection::CvsRootParser));
        let settings = info
            .connection_settings(fs.as_ref(), &connections)
            .expect("root is recorded");
        assert_eq!(settings.root, ":pserver:u@host:/repo");

        info.clear_all();
        assert_eq!(info.repository(fs.as_ref()), "project");
        assert_eq!(fs.admin_read_count(Path::new("/work/project")), 2);
    }

    #[test]
    fn test_dummy_never_loads() {
        let fs = MemFs::new();
        let dummy = DirInfo::dummy();
        dummy.load(fs.as_ref());

        assert!(!dummy.is_loaded());
        assert_eq!(dummy.entry_named(fs.as_ref(), "a.txt"), None);
        assert_eq!(dummy.repository(fs.as_ref()), "");
        assert_eq!(dummy.set_entry(EntryRecord::file("a.txt", "1.1")), StoreOutcome::Skipped);

        let connections =
            ConnectionSettingsCache::new(Arc::new(cvsmeta_core::connection::CvsRootParser));
        assert!(dummy.connection_settings(fs.as_ref(), &connections).is_none());
    }
}
