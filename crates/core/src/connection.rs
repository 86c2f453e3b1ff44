//! Repository connection descriptors parsed from CVS root strings
//!
//! A root string such as `:pserver:alice@cvs.example.org:2401/var/repo`
//! names the transport, credentials, and repository location for one
//! server. Descriptors are immutable once created and are cached by the
//! exact root string that produced them.

use serde::{Deserialize, Serialize};

/// Transport method named by a root string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionMethod {
    /// Password-authenticated server connection
    Pserver,
    /// External transport (typically ssh)
    Ext,
    /// Local repository, no transport
    Local,
}

impl ConnectionMethod {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "pserver" => Some(Self::Pserver),
            "ext" => Some(Self::Ext),
            "local" | "fork" => Some(Self::Local),
            _ => None,
        }
    }
}

/// Immutable connection descriptor for one repository root.
///
/// Two descriptors are interchangeable only if they were produced from the
/// identical root string; semantically-equivalent roots that differ textually
/// (trailing separators, case) are deliberately kept distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// The exact root string this descriptor was parsed from
    pub root: String,
    /// Transport method
    pub method: ConnectionMethod,
    /// User name, when the root names one
    pub user: Option<String>,
    /// Server host, absent for local roots
    pub host: Option<String>,
    /// Server port, absent when the root leaves it to the client default
    pub port: Option<u16>,
    /// Path of the repository on the server (or local disk)
    pub repository_path: String,
}

impl ConnectionSettings {
    /// Descriptor for a local repository at `path`
    pub fn local(root: impl Into<String>, path: impl Into<String>) -> Self {
        let root = root.into();
        Self {
            root,
            method: ConnectionMethod::Local,
            user: None,
            host: None,
            port: None,
            repository_path: path.into(),
        }
    }
}

/// Parser turning a repository-root string into a connection descriptor.
///
/// Consumed by the connection-settings cache, which guarantees at most one
/// invocation per distinct root string per process lifetime.
pub trait RootParser: Send + Sync {
    /// Parse `root` into a descriptor; must not fail. Unparsable roots
    /// degrade to a local descriptor carrying the raw string.
    fn parse(&self, root: &str) -> ConnectionSettings;
}

/// Default parser for `:method:user@host:port/path` root strings
#[derive(Debug, Default)]
pub struct CvsRootParser;

impl RootParser for CvsRootParser {
    fn parse(&self, root: &str) -> ConnectionSettings {
        parse_root(root).unwrap_or_else(|| ConnectionSettings::local(root, root))
    }
}

fn parse_root(root: &str) -> Option<ConnectionSettings> {
    let rest = match root.strip_prefix(':') {
        Some(rest) => rest,
        // No method prefix: a plain path is a local root.
        None => return Some(ConnectionSettings::local(root, root)),
    };

    let (method_name, rest) = rest.split_once(':')?;
    let method = ConnectionMethod::from_name(method_name)?;

    if method == ConnectionMethod::Local {
        return Some(ConnectionSettings {
            root: root.to_string(),
            method,
            user: None,
            host: None,
            port: None,
            repository_path: rest.to_string(),
        });
    }

    let (user, rest) = match rest.split_once('@') {
        Some((user, rest)) if !user.is_empty() => (Some(user.to_string()), rest),
        Some((_, rest)) => (None, rest),
        None => (None, rest),
    };

    // host[:port]/path, where the path always starts at the first '/'.
    let slash = rest.find('/')?;
    let (location, path) = rest.split_at(slash);
    let (host, port) = match location.split_once(':') {
        Some((host, port_str)) => (host, port_str.parse::<u16>().ok()),
        None => (location, None),
    };
    if host.is_empty() || path.is_empty() {
        return None;
    }

    Some(ConnectionSettings {
        root: root.to_string(),
        method,
        user,
        host: Some(host.to_string()),
        port,
        repository_path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_pserver_root() {
        let settings = CvsRootParser.parse(":pserver:alice@cvs.example.org:2401/var/repo");
        assert_eq!(settings.method, ConnectionMethod::Pserver);
        assert_eq!(settings.user.as_deref(), Some("alice"));
        assert_eq!(settings.host.as_deref(), Some("cvs.example.org"));
        assert_eq!(settings.port, Some(2401));
        assert_eq!(settings.repository_path, "/var/repo");
    }

    #[test]
    fn test_parse_ext_root_without_port() {
        let settings = CvsRootParser.parse(":ext:bob@build.internal/srv/cvs");
        assert_eq!(settings.method, ConnectionMethod::Ext);
        assert_eq!(settings.port, None);
        assert_eq!(settings.repository_path, "/srv/cvs");
    }

    #[test]
    fn test_plain_path_is_local() {
        let settings = CvsRootParser.parse("/var/repo");
        assert_eq!(settings.method, ConnectionMethod::Local);
        assert_eq!(settings.repository_path, "/var/repo");
    }

    #[test]
    fn test_unparsable_root_degrades_to_local() {
        let settings = CvsRootParser.parse(":nonsense:???");
        assert_eq!(settings.method, ConnectionMethod::Local);
        assert_eq!(settings.root, ":nonsense:???");
    }

    #[test]
    fn test_root_string_preserved_exactly() {
        let root = ":pserver:alice@host:/repo/";
        let settings = CvsRootParser.parse(root);
        assert_eq!(settings.root, root);
    }
}
