//! Lifecycle, directory registry, and event-driven invalidation
//!
//! [`EntriesCache`] is the context object the rest of the system talks to.
//! It owns the directory → [`DirInfo`] map, the activation reference count,
//! and the pending-refresh path set, each behind its own lock; no operation
//! holds more than one of them at a time, except that invalidation sweeps
//! hold the registry lock while clearing individual `DirInfo` objects so
//! the live set stays consistent for the whole sweep.

use crate::connections::ConnectionSettingsCache;
use crate::dispatch::Dispatcher;
use crate::ignore::{IgnoreFilter, UserIgnores};
use crate::info::{DirInfo, StoreOutcome};
use crate::listeners::{EntriesListener, ListenerList};
use crate::router::{classify, InvalidationAction};
use cvsmeta_core::connection::{ConnectionSettings, RootParser};
use cvsmeta_core::entry::EntryRecord;
use cvsmeta_core::error::{Error, Result};
use cvsmeta_vfs::{
    AdminReader, EventPhase, FsEvent, FsEventKind, FsEventObserver, FsEventSource, NodeHandle,
    SubscriptionId, VersionedQuery, WorkspaceStatus, ADMIN_DIR_NAME,
};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, trace};

/// In-memory cache of per-directory version-control metadata.
///
/// Alive only between [`activate`](Self::activate)/[`deactivate`]
/// (Self::deactivate) pairs; reads that need cached data fail with
/// [`Error::Cancelled`] while inactive. Construct inside a tokio runtime;
/// notification delivery runs on a spawned coordinator task.
pub struct EntriesCache {
    me: Weak<EntriesCache>,
    source: Arc<dyn FsEventSource>,
    reader: Arc<dyn AdminReader>,
    versioned: Arc<dyn VersionedQuery>,
    connections: ConnectionSettingsCache,
    user_ignores: Arc<UserIgnores>,
    listeners: Arc<ListenerList>,
    dispatcher: Dispatcher,
    workspaces: Mutex<Vec<Arc<dyn WorkspaceStatus>>>,
    /// Directory registry: at most one entry per live handle
    infos: Mutex<HashMap<NodeHandle, Arc<DirInfo>>>,
    dummy: Arc<DirInfo>,
    /// Activation reference count
    active: Mutex<u32>,
    subscription: Mutex<Option<SubscriptionId>>,
    /// Admin-directory paths to re-touch after the next bulk refresh
    pending_refresh: Mutex<HashSet<PathBuf>>,
}

/// Event-source observer holding the cache weakly, so an active
/// subscription never keeps a dropped cache alive
struct EventBridge {
    cache: Weak<EntriesCache>,
}

impl FsEventObserver for EventBridge {
    fn on_event(&self, event: &FsEvent) {
        if let Some(cache) = self.cache.upgrade() {
            cache.handle_event(event);
        }
    }

    fn after_refresh(&self) {
        if let Some(cache) = self.cache.upgrade() {
            cache.ensure_admin_dirs_cached();
        }
    }
}

impl EntriesCache {
    /// Create a cache wired to its external collaborators
    pub fn new(
        source: Arc<dyn FsEventSource>,
        reader: Arc<dyn AdminReader>,
        parser: Arc<dyn RootParser>,
        versioned: Arc<dyn VersionedQuery>,
    ) -> Arc<Self> {
        Self::with_user_ignores(source, reader, parser, versioned, Arc::new(UserIgnores::new()))
    }

    /// Like [`new`](Self::new), with explicit user-home ignore rules
    pub fn with_user_ignores(
        source: Arc<dyn FsEventSource>,
        reader: Arc<dyn AdminReader>,
        parser: Arc<dyn RootParser>,
        versioned: Arc<dyn VersionedQuery>,
        user_ignores: Arc<UserIgnores>,
    ) -> Arc<Self> {
        let listeners = Arc::new(ListenerList::default());
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            dispatcher: Dispatcher::start(Arc::clone(&listeners)),
            listeners,
            source,
            reader,
            versioned,
            connections: ConnectionSettingsCache::new(parser),
            user_ignores,
            workspaces: Mutex::new(Vec::new()),
            infos: Mutex::new(HashMap::new()),
            dummy: Arc::new(DirInfo::dummy()),
            active: Mutex::new(0),
            subscription: Mutex::new(None),
            pending_refresh: Mutex::new(HashSet::new()),
        })
    }

    // --- lifecycle ---------------------------------------------------------

    /// Bump the activation count; on 0→1, subscribe to the event source.
    ///
    /// Activation is reentrant: independent callers nest freely, and the
    /// cache stays live until the count returns to zero.
    pub fn activate(&self) {
        let mut active = self.lock_active();
        if *active == 0 {
            debug!("Activating entries cache");
            let bridge = Arc::new(EventBridge {
                cache: self.me.clone(),
            });
            let id = self.source.subscribe(bridge);
            *self.lock_subscription() = Some(id);
        }
        *active += 1;
    }

    /// Drop one activation; on 1→0, unsubscribe and discard the registry.
    ///
    /// # Panics
    ///
    /// Panics when called with the count already at zero; an unbalanced
    /// pair is a caller lifecycle bug, not a recoverable condition.
    pub fn deactivate(&self) {
        let mut active = self.lock_active();
        assert!(*active > 0, "deactivate() without a matching activate()");
        *active -= 1;
        if *active == 0 {
            debug!("Deactivating entries cache; discarding cached directories");
            if let Some(id) = self.lock_subscription().take() {
                self.source.unsubscribe(id);
            }
            self.lock_infos().clear();
            self.lock_pending().clear();
        }
    }

    pub fn is_active(&self) -> bool {
        *self.lock_active() > 0
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::Cancelled)
        }
    }

    // --- registry access ---------------------------------------------------

    /// The cache entry for a directory, created on first lookup.
    ///
    /// An absent handle yields the dummy sentinel (always empty, never
    /// loads). This path needs no activation; only data reads beyond the
    /// sentinel's trivial defaults do.
    pub fn info_for(&self, directory: Option<&NodeHandle>) -> Arc<DirInfo> {
        let Some(directory) = directory else {
            return Arc::clone(&self.dummy);
        };
        let mut infos = self.lock_infos();
        Arc::clone(
            infos
                .entry(directory.clone())
                .or_insert_with(|| Arc::new(DirInfo::new(directory.clone()))),
        )
    }

    fn checked_info_for(&self, directory: Option<&NodeHandle>) -> Result<Arc<DirInfo>> {
        self.ensure_active()?;
        Ok(self.info_for(directory))
    }

    // --- entry reads -------------------------------------------------------

    /// The entry record for `name` under `parent`
    pub fn entry_for(
        &self,
        parent: Option<&NodeHandle>,
        name: &str,
    ) -> Result<Option<EntryRecord>> {
        Ok(self
            .checked_info_for(parent)?
            .entry_named(self.reader.as_ref(), name))
    }

    /// The entry record for a file, keyed by its parent directory and name
    pub fn entry_for_file(&self, file: &NodeHandle) -> Result<Option<EntryRecord>> {
        self.entry_for(file.parent().as_ref(), &file.name())
    }

    /// All entry records cached for a directory
    pub fn entries_in(&self, directory: &NodeHandle) -> Result<Vec<EntryRecord>> {
        Ok(self
            .checked_info_for(Some(directory))?
            .entries(self.reader.as_ref()))
    }

    /// The record for `name` only if the directory is already loaded;
    /// never triggers a load and needs no activation
    pub fn cached_entry(&self, parent: Option<&NodeHandle>, name: &str) -> Option<EntryRecord> {
        self.info_for(parent).cached_entry_named(name)
    }

    // --- entry mutation ----------------------------------------------------

    /// Store a record for a file under `parent`, returning any replaced
    /// record. A silent no-op when the directory is not loaded; otherwise
    /// schedules one deferred entry-changed notification for the file.
    pub fn set_entry(&self, parent: &NodeHandle, record: EntryRecord) -> Option<EntryRecord> {
        let info = self.info_for(Some(parent));
        let name = record.file_name.clone();
        match info.set_entry(record) {
            StoreOutcome::Skipped => None,
            StoreOutcome::Stored { replaced } => {
                if let Some(child) = self.source.find_by_path(&parent.path().join(&name)) {
                    self.dispatcher.entry_changed(child);
                }
                replaced
            }
        }
    }

    /// Remove the record for `name` under `parent`. A silent no-op when
    /// the directory is not loaded.
    pub fn remove_entry(&self, parent: &NodeHandle, name: &str) {
        let info = self.info_for(Some(parent));
        if info.remove_entry(name) {
            if let Some(child) = self.source.find_by_path(&parent.path().join(name)) {
                self.dispatcher.entry_changed(child);
            }
        }
    }

    // --- invalidation ------------------------------------------------------

    /// Clear one directory's cached data. The filter slot is always
    /// dropped. Entry data is cleared, with exactly one deferred
    /// entries-changed scheduled, only if the directory had been loaded,
    /// since otherwise no observer can hold stale data.
    pub fn clear_cached_entries_for(&self, directory: Option<&NodeHandle>) {
        let Some(directory) = directory else { return };
        let info = self.info_for(Some(directory));
        if info.clear_for_invalidation() {
            trace!("Cleared cached entries for {directory}");
            self.dispatcher.entries_changed(directory.clone());
        }
    }

    /// Clear every cached directory that is `directory` or a descendant.
    ///
    /// Holds the registry lock across the sweep so the live set cannot
    /// shift mid-iteration. Handles that stopped being valid are skipped,
    /// not cleared: their nodes are gone and their entries unreachable.
    pub fn clear_entries_under(&self, directory: &NodeHandle) {
        if !directory.is_directory() {
            return;
        }
        let infos = self.lock_infos();
        for (handle, info) in infos.iter() {
            if !handle.is_valid() {
                continue;
            }
            if directory.is_ancestor_of(handle, false) && info.clear_for_invalidation() {
                trace!("Cleared cached entries for {handle} (under {directory})");
                self.dispatcher.entries_changed(handle.clone());
            }
        }
    }

    /// Drop the cached ignore filter of `directory` and every cached
    /// descendant, then mark all workspaces dirty for a status refresh.
    /// Entry data is untouched.
    pub fn clear_filters_under(&self, directory: &NodeHandle) {
        {
            let infos = self.lock_infos();
            for (handle, info) in infos.iter() {
                if handle.is_valid() && directory.is_ancestor_of(handle, false) {
                    info.clear_filter();
                }
            }
        }
        self.mark_all_workspaces_dirty();
    }

    /// Discard every cached directory entry
    pub fn clear_all(&self) {
        self.lock_infos().clear();
    }

    /// Encoding changed: all cached metadata is suspect. No-op while
    /// inactive.
    pub fn encoding_changed(&self) {
        if !self.is_active() {
            return;
        }
        self.clear_all();
        self.mark_all_workspaces_dirty();
    }

    // --- metadata reads ----------------------------------------------------

    /// Repository path recorded for a directory; empty when untracked
    pub fn repository_for(&self, directory: &NodeHandle) -> Result<String> {
        Ok(self
            .checked_info_for(Some(directory))?
            .repository(self.reader.as_ref()))
    }

    /// Sticky tag recorded for a directory; empty when not pinned
    pub fn sticky_tag_for(&self, directory: &NodeHandle) -> Result<String> {
        Ok(self
            .checked_info_for(Some(directory))?
            .sticky_tag(self.reader.as_ref()))
    }

    /// Connection descriptor for a directory's recorded root
    pub fn connection_settings_for(
        &self,
        directory: &NodeHandle,
    ) -> Option<Arc<ConnectionSettings>> {
        self.info_for(Some(directory))
            .connection_settings(self.reader.as_ref(), &self.connections)
    }

    /// The composed ignore filter for a directory
    pub fn filter_for(&self, directory: &NodeHandle) -> Arc<IgnoreFilter> {
        self.info_for(Some(directory))
            .ignore_filter(self.reader.as_ref(), &self.user_ignores)
    }

    /// Whether a file is excluded from tracking. Files already under
    /// version control are never ignored, whatever the rules say.
    pub fn file_is_ignored(&self, file: &NodeHandle) -> bool {
        let Some(parent) = file.parent() else {
            return false;
        };
        if self.versioned.is_versioned(file) {
            return false;
        }
        self.filter_for(&parent).should_ignore(&file.name())
    }

    /// Pre-warm a directory's cached metadata
    pub fn cache_admin_info_in(&self, directory: &NodeHandle) {
        self.info_for(Some(directory)).cache_all(self.reader.as_ref());
    }

    /// The process-wide user ignore rules
    pub fn user_ignores(&self) -> Arc<UserIgnores> {
        Arc::clone(&self.user_ignores)
    }

    // --- observers ---------------------------------------------------------

    pub fn add_listener(&self, listener: Arc<dyn EntriesListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn EntriesListener>) {
        self.listeners.remove(listener);
    }

    /// Register one open workspace's status observer
    pub fn add_workspace_status(&self, workspace: Arc<dyn WorkspaceStatus>) {
        self.workspaces
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(workspace);
    }

    /// Wait until every notification scheduled before this call has been
    /// delivered
    pub async fn flush_notifications(&self) {
        self.dispatcher.flush().await;
    }

    // --- refresh hook ------------------------------------------------------

    /// Remember `parent`'s admin directory for re-touching after the next
    /// bulk refresh, so its children show up in the event source's cache
    pub fn watch_admin_dir(&self, parent: Option<&NodeHandle>) {
        let Some(parent) = parent else { return };
        self.lock_pending()
            .insert(parent.path().join(ADMIN_DIR_NAME));
    }

    fn ensure_admin_dirs_cached(&self) {
        let paths: Vec<PathBuf> = self.lock_pending().drain().collect();
        for path in paths {
            if let Some(node) = self.source.find_by_path(&path) {
                self.source.touch_children(&node);
            }
        }
    }

    // --- event routing -----------------------------------------------------

    fn handle_event(&self, event: &FsEvent) {
        match (event.kind, event.phase) {
            // Content changes on tracked files only move status, never the
            // cache; that happens once the change has landed.
            (FsEventKind::ContentChanged, EventPhase::After) => {
                self.file_status_changed(&event.node);
            }
            (FsEventKind::Created, EventPhase::After)
            | (FsEventKind::Deleted, EventPhase::Before)
            | (FsEventKind::Moved, EventPhase::Before)
            | (FsEventKind::ContentChanged, EventPhase::Before)
            | (FsEventKind::PropertyChanged, EventPhase::Before) => {
                self.apply(classify(event, &self.user_ignores));
            }
            _ => {}
        }
    }

    fn apply(&self, action: InvalidationAction) {
        match action {
            InvalidationAction::ClearUserIgnores => {
                debug!("User ignore file changed; discarding global rules");
                self.user_ignores.clear_cached();
                self.mark_all_workspaces_dirty();
            }
            InvalidationAction::ClearFiltersUnder(directory) => {
                self.clear_filters_under(&directory);
            }
            InvalidationAction::ClearEntries(directory) => {
                self.clear_cached_entries_for(Some(&directory));
            }
            InvalidationAction::ClearEntriesRecursive(directory) => {
                self.clear_entries_under(&directory);
            }
            InvalidationAction::None => {}
        }
    }

    fn file_status_changed(&self, file: &NodeHandle) {
        for workspace in self.workspace_snapshot() {
            workspace.mark_dirty(file);
        }
    }

    fn mark_all_workspaces_dirty(&self) {
        for workspace in self.workspace_snapshot() {
            workspace.mark_everything_dirty();
        }
    }

    fn workspace_snapshot(&self) -> Vec<Arc<dyn WorkspaceStatus>> {
        self.workspaces
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    // --- locks -------------------------------------------------------------

    fn lock_active(&self) -> MutexGuard<'_, u32> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_infos(&self) -> MutexGuard<'_, HashMap<NodeHandle, Arc<DirInfo>>> {
        self.infos.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_subscription(&self) -> MutexGuard<'_, Option<SubscriptionId>> {
        self.subscription.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.pending_refresh.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvsmeta_core::connection::CvsRootParser;
    use cvsmeta_vfs::{AdminData, MemFs};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache_over(fs: &Arc<MemFs>) -> Arc<EntriesCache> {
        EntriesCache::with_user_ignores(
            fs.clone(),
            fs.clone(),
            Arc::new(CvsRootParser),
            fs.clone(),
            Arc::new(UserIgnores::with_path("/home/user/.cvsignore")),
        )
    }

    #[tokio::test]
    async fn test_activation_is_a_true_counter() {
        let fs = MemFs::new();
        let cache = cache_over(&fs);
        assert!(!cache.is_active());

        cache.activate();
        cache.activate();
        cache.activate();
        assert!(cache.is_active());

        cache.deactivate();
        cache.deactivate();
        assert!(cache.is_active());
        cache.deactivate();
        assert!(!cache.is_active());
    }

    #[tokio::test]
    #[should_panic(expected = "deactivate() without a matching activate()")]
    async fn test_deactivate_below_zero_is_fatal() {
        let fs = MemFs::new();
        let cache = cache_over(&fs);
        cache.deactivate();
    }

    #[tokio::test]
    async fn test_reads_while_inactive_are_cancelled() {
        let fs = MemFs::new();
        let dir = fs.create_dir("/work/project");
        let cache = cache_over(&fs);

        let err = cache.entry_for(Some(&dir), "a.txt").unwrap_err();
        assert!(err.is_cancelled());
        assert!(cache.sticky_tag_for(&dir).unwrap_err().is_cancelled());
        assert!(cache.repository_for(&dir).unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_info_identity_stable_across_lookups() {
        let fs = MemFs::new();
        let dir = fs.create_dir("/work/project");
        let cache = cache_over(&fs);
        cache.activate();

        let first = cache.info_for(Some(&dir));
        let second = cache.info_for(Some(&dir));
        assert!(Arc::ptr_eq(&first, &second));

        let dummy_a = cache.info_for(None);
        let dummy_b = cache.info_for(None);
        assert!(Arc::ptr_eq(&dummy_a, &dummy_b));
        assert!(dummy_a.directory().is_none());
    }

    #[tokio::test]
    async fn test_deactivation_discards_registry() {
        let fs = MemFs::new();
        let dir = fs.create_dir("/work/project");
        fs.set_admin_data(
            "/work/project",
            AdminData {
                entries: vec![EntryRecord::file("a.txt", "1.1")],
                ..AdminData::default()
            },
        );
        let cache = cache_over(&fs);
        cache.activate();

        let before = cache.info_for(Some(&dir));
        cache
            .entry_for(Some(&dir), "a.txt")
            .expect("active read")
            .expect("entry exists");

        cache.deactivate();
        cache.activate();

        let after = cache.info_for(Some(&dir));
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(!after.is_loaded());
        cache.deactivate();
    }

    #[tokio::test]
    async fn test_set_entry_noop_then_replace_after_load() {
        let fs = MemFs::new();
        let dir = fs.create_dir("/work/project");
        fs.set_admin_data(
            "/work/project",
            AdminData {
                entries: vec![EntryRecord::file("a.txt", "1.2")],
                ..AdminData::default()
            },
        );
        let cache = cache_over(&fs);
        cache.activate();

        // Not loaded yet: silent no-op.
        assert_eq!(cache.set_entry(&dir, EntryRecord::file("a.txt", "1.3")), None);
        assert_eq!(cache.cached_entry(Some(&dir), "a.txt"), None);

        // Any loading read, then the store applies and reports the
        // replaced record.
        cache.entry_for(Some(&dir), "a.txt").expect("active read");
        let replaced = cache
            .set_entry(&dir, EntryRecord::file("a.txt", "1.3"))
            .expect("record was replaced");
        assert_eq!(replaced.revision, "1.2");

        let current = cache
            .cached_entry(Some(&dir), "a.txt")
            .expect("entry cached");
        assert_eq!(current.revision, "1.3");
        cache.deactivate();
    }

    #[tokio::test]
    async fn test_encoding_change_discards_cache_only_while_active() {
        struct DirtyCounter {
            everything: AtomicUsize,
        }
        impl WorkspaceStatus for DirtyCounter {
            fn mark_dirty(&self, _node: &NodeHandle) {}
            fn mark_everything_dirty(&self) {
                self.everything.fetch_add(1, Ordering::SeqCst);
            }
        }

        let fs = MemFs::new();
        let dir = fs.create_dir("/work/project");
        fs.set_admin_data(
            "/work/project",
            AdminData {
                entries: vec![EntryRecord::file("a.txt", "1.1")],
                ..AdminData::default()
            },
        );
        let cache = cache_over(&fs);
        let workspace = Arc::new(DirtyCounter {
            everything: AtomicUsize::new(0),
        });
        cache.add_workspace_status(workspace.clone());

        // While inactive the encoding change is a no-op.
        cache.encoding_changed();
        assert_eq!(workspace.everything.load(Ordering::SeqCst), 0);

        cache.activate();
        cache.cache_admin_info_in(&dir);
        let before = cache.info_for(Some(&dir));
        assert!(before.is_loaded());

        cache.encoding_changed();
        assert_eq!(workspace.everything.load(Ordering::SeqCst), 1);
        let after = cache.info_for(Some(&dir));
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(!after.is_loaded());
        cache.deactivate();
    }

    #[tokio::test]
    async fn test_versioned_files_never_ignored() {
        let fs = MemFs::new();
        fs.create_dir("/work/project");
        fs.set_ignore_lines("/work/project", vec!["*.log".to_string()]);
        let ignored = fs.create_file("/work/project/build.log");
        let tracked = fs.create_file("/work/project/server.log");
        fs.mark_versioned("/work/project/server.log");

        let cache = cache_over(&fs);
        cache.activate();

        assert!(cache.file_is_ignored(&ignored));
        assert!(!cache.file_is_ignored(&tracked));
        cache.deactivate();
    }
}
