//! Ignore rule sets and their composition
//!
//! A directory's effective filter is the union of the process-wide rules
//! from the user's home ignore file and the directory's own `.cvsignore`
//! rules. Rule sets use shell glob patterns, whitespace-separated, and a
//! single `!` entry resets everything accumulated so far in that file.

use cvsmeta_vfs::user_home_ignore_file;
use glob::Pattern;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

enum Matcher {
    Glob(Pattern),
    /// Fallback for patterns glob cannot compile; matched as a literal name
    Literal(String),
}

impl Matcher {
    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Glob(pattern) => pattern.matches(name),
            Self::Literal(literal) => literal == name,
        }
    }
}

/// One compiled ignore rule set (one file's worth of rules)
#[derive(Default)]
pub struct IgnorePatterns {
    matchers: Vec<Matcher>,
}

impl IgnorePatterns {
    /// Compile rules from ignore-file lines.
    ///
    /// Entries are whitespace-separated within a line; `!` discards every
    /// rule accumulated so far.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut matchers = Vec::new();
        for line in lines {
            for token in line.as_ref().split_whitespace() {
                if token == "!" {
                    matchers.clear();
                    continue;
                }
                match Pattern::new(token) {
                    Ok(pattern) => matchers.push(Matcher::Glob(pattern)),
                    Err(e) => {
                        debug!("Unparsable ignore pattern {token:?} kept as literal: {e}");
                        matchers.push(Matcher::Literal(token.to_string()));
                    }
                }
            }
        }
        Self { matchers }
    }

    /// Whether a file name matches any rule
    pub fn matches(&self, name: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(name))
    }

    /// Number of compiled rules
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

/// Process-wide ignore rules from the user's home ignore file.
///
/// Loaded lazily on first use and cached until [`clear_cached`]
/// (Self::clear_cached), which the cache's router calls when the home
/// ignore file itself changes. Persists for the process lifetime; directory
/// cache clears never touch it.
pub struct UserIgnores {
    path: Option<PathBuf>,
    cached: Mutex<Option<Arc<IgnorePatterns>>>,
}

impl UserIgnores {
    /// Rules from the current user's home ignore file
    pub fn new() -> Self {
        Self {
            path: user_home_ignore_file(),
            cached: Mutex::new(None),
        }
    }

    /// Rules from an explicit file, for tests and non-standard setups
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            cached: Mutex::new(None),
        }
    }

    /// Location of the ignore file these rules come from
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether `node_path` is the user-home ignore file itself
    pub fn is_ignore_file(&self, node_path: &Path) -> bool {
        self.path.as_deref() == Some(node_path)
    }

    /// Current rules, loading the file on first use
    pub fn patterns(&self) -> Arc<IgnorePatterns> {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(patterns) = cached.as_ref() {
            return Arc::clone(patterns);
        }
        let patterns = Arc::new(self.load());
        *cached = Some(Arc::clone(&patterns));
        patterns
    }

    /// Drop the cached rules; the next use re-reads the file
    pub fn clear_cached(&self) {
        trace!("Clearing cached user ignore rules");
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Whether a file name matches the user's rules
    pub fn matches(&self, name: &str) -> bool {
        self.patterns().matches(name)
    }

    fn load(&self) -> IgnorePatterns {
        let Some(path) = self.path.as_deref() else {
            return IgnorePatterns::default();
        };
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let lines: Vec<&str> = content.lines().collect();
                IgnorePatterns::from_lines(&lines)
            }
            Err(e) => {
                debug!("No user ignore rules at {path:?}: {e}");
                IgnorePatterns::default()
            }
        }
    }
}

impl Default for UserIgnores {
    fn default() -> Self {
        Self::new()
    }
}

/// Effective ignore filter for one directory: user rules ∪ local rules.
///
/// Holds the shared [`UserIgnores`] by reference rather than a merged copy,
/// so fresh global rules are picked up as soon as the global cache is
/// invalidated, without re-composing every directory's filter.
pub struct IgnoreFilter {
    user: Arc<UserIgnores>,
    local: IgnorePatterns,
}

impl IgnoreFilter {
    /// Compose the filter from shared user rules and local ignore-file lines
    pub fn compose<S: AsRef<str>>(user: Arc<UserIgnores>, local_lines: &[S]) -> Self {
        Self {
            user,
            local: IgnorePatterns::from_lines(local_lines),
        }
    }

    /// Whether a file name is excluded from tracking.
    ///
    /// Note this is the raw rule match; files already under version control
    /// are exempted one level up, by the registry.
    pub fn should_ignore(&self, name: &str) -> bool {
        self.local.matches(name) || self.user.matches(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_patterns_match_glob_and_literal() {
        let patterns = IgnorePatterns::from_lines(&["*.o *.log", "core"]);
        assert!(patterns.matches("main.o"));
        assert!(patterns.matches("debug.log"));
        assert!(patterns.matches("core"));
        assert!(!patterns.matches("main.rs"));
    }

    #[test]
    fn test_bang_resets_accumulated_rules() {
        let patterns = IgnorePatterns::from_lines(&["*.o", "!", "*.tmp"]);
        assert!(!patterns.matches("main.o"));
        assert!(patterns.matches("scratch.tmp"));
        assert_eq!(patterns.len(), 1);
    }

    #[test]
    fn test_invalid_pattern_falls_back_to_literal() {
        let patterns = IgnorePatterns::from_lines(&["[unclosed"]);
        assert!(patterns.matches("[unclosed"));
        assert!(!patterns.matches("unclosed"));
    }

    #[test]
    fn test_user_ignores_reload_after_clear() {
        let temp = TempDir::new().expect("test setup failed");
        let path = temp.path().join(".cvsignore");
        std::fs::write(&path, "*.bak\n").expect("test setup failed");

        let ignores = UserIgnores::with_path(&path);
        assert!(ignores.matches("old.bak"));
        assert!(!ignores.matches("notes.txt"));

        // New rules are invisible until the cache is cleared.
        std::fs::write(&path, "*.txt\n").expect("test setup failed");
        assert!(!ignores.matches("notes.txt"));

        ignores.clear_cached();
        assert!(ignores.matches("notes.txt"));
        assert!(!ignores.matches("old.bak"));
    }

    #[test]
    fn test_filter_is_union_of_user_and_local() {
        let temp = TempDir::new().expect("test setup failed");
        let path = temp.path().join(".cvsignore");
        std::fs::write(&path, "*.bak\n").expect("test setup failed");

        let user = Arc::new(UserIgnores::with_path(&path));
        let filter = IgnoreFilter::compose(user, &["*.o"]);

        assert!(filter.should_ignore("main.o"));
        assert!(filter.should_ignore("old.bak"));
        assert!(!filter.should_ignore("main.rs"));
    }

    #[test]
    fn test_missing_user_ignore_file_means_no_rules() {
        let ignores = UserIgnores::with_path("/nonexistent/.cvsignore");
        assert!(!ignores.matches("anything"));
    }
}
