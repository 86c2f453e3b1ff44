//! Persisted local client settings
//!
//! A small toml file holding per-machine configuration. Loading never
//! fails: an unreadable or unparsable file is logged and replaced by
//! defaults so callers always hold a usable value.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

fn default_client_path() -> String {
    "cvs".to_string()
}

/// Per-machine settings for the local client binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSettings {
    /// Path to the client executable
    #[serde(default = "default_client_path")]
    pub client_path: String,

    /// Whether the client binary has been probed and found usable
    #[serde(default)]
    pub client_verified: bool,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            client_path: default_client_path(),
            client_verified: false,
        }
    }
}

impl LocalSettings {
    /// Load settings from `path`, substituting defaults on any failure
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read settings from {path:?}: {e}; using defaults");
                return Self::default();
            }
        };

        match toml::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to parse settings from {path:?}: {e}; using defaults");
                Self::default()
            }
        }
    }

    /// Save settings to `path` as toml
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize settings: {e}")))?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().expect("test setup failed");
        let path = dir.path().join("settings.toml");

        let settings = LocalSettings {
            client_path: "/usr/local/bin/cvs".to_string(),
            client_verified: true,
        };
        settings.save(&path).expect("save should succeed");

        assert_eq!(LocalSettings::load(&path), settings);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let settings = LocalSettings::load(Path::new("/nonexistent/settings.toml"));
        assert_eq!(settings, LocalSettings::default());
    }

    #[test]
    fn test_corrupt_file_yields_defaults() {
        let dir = TempDir::new().expect("test setup failed");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "not [valid toml").expect("test setup failed");

        assert_eq!(LocalSettings::load(&path), LocalSettings::default());
    }
}
