use thiserror::Error;

/// Result type for cvsmeta operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for cvsmeta operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation abandoned because the cache is no longer active.
    ///
    /// Raised by any read that requires an activated registry. Callers
    /// should treat this as "operation abandoned", not a reportable
    /// failure; it is never retried internally.
    #[error("operation cancelled: entries cache is not active")]
    Cancelled,

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parsing errors when processing admin metadata
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// File-system abstraction errors
    #[error("Vfs error: {0}")]
    Vfs(String),

    /// Authentication errors surfaced by a login worker
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Creates a cancelled error
    pub fn cancelled() -> Self {
        Self::Cancelled
    }

    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a parse error
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Creates a vfs error
    pub fn vfs(msg: impl Into<String>) -> Self {
        Self::Vfs(msg.into())
    }

    /// Creates an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Returns true if this error means the cache was deactivated mid-operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::with_context(context, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_terminal_kind() {
        let err = Error::cancelled();
        assert!(err.is_cancelled());
        assert!(!Error::config("bad").is_cancelled());
    }

    #[test]
    fn test_context_wraps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let result: std::result::Result<(), _> = Err(io);
        let err = result.context("reading Entries").unwrap_err();
        assert!(err.to_string().contains("reading Entries"));
    }
}
