//! Core types for the cvsmeta working-copy metadata cache
//!
//! This crate provides the foundational abstractions shared across the
//! cvsmeta system, including:
//!
//! - **Entry records**: per-file revision metadata and the admin-line format
//! - **Connection descriptors**: parsed CVS root strings
//! - **Login interface**: the tri-state authentication seam
//! - **Settings**: persisted local client configuration
//! - **Error handling**: unified error types
//!

pub mod connection;
pub mod entry;
pub mod error;
pub mod login;
pub mod settings;

// Re-export main types for convenience
pub use connection::{ConnectionMethod, ConnectionSettings, CvsRootParser, RootParser};
pub use entry::EntryRecord;
pub use error::{Error, Result, ResultExt};
pub use login::{LoginResult, LoginWorker};
pub use settings::LocalSettings;

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::entry::EntryRecord;
    pub use crate::error::{Error, Result, ResultExt};
}
