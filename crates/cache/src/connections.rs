//! Process-wide memoization of connection descriptors

use cvsmeta_core::connection::{ConnectionSettings, RootParser};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Cache of root string → connection descriptor.
///
/// The parser runs at most once per distinct root string for the process
/// lifetime; directory-cache invalidation never touches this map. Keys are
/// exact strings: roots differing only in a trailing separator are distinct
/// on purpose.
pub struct ConnectionSettingsCache {
    settings: DashMap<String, Arc<ConnectionSettings>>,
    parser: Arc<dyn RootParser>,
}

impl ConnectionSettingsCache {
    pub fn new(parser: Arc<dyn RootParser>) -> Self {
        Self {
            settings: DashMap::new(),
            parser,
        }
    }

    /// Descriptor for `root`, parsing and caching it on first request
    pub fn resolve(&self, root: &str) -> Arc<ConnectionSettings> {
        // The entry API keeps the per-key parse single-shot: a second
        // resolver for the same root blocks on the shard until the first
        // insert completes.
        Arc::clone(
            self.settings
                .entry(root.to_string())
                .or_insert_with(|| {
                    debug!("Parsing connection settings for root {root:?}");
                    Arc::new(self.parser.parse(root))
                })
                .value(),
        )
    }

    /// Number of distinct roots resolved so far
    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}
