//! Authentication seam for repository connections
//!
//! The cache never performs network I/O; a login worker is supplied by the
//! surrounding application and driven by whichever operation needs an
//! authenticated connection.

use crate::error::Result;
use async_trait::async_trait;

/// Outcome of a silent (non-interactive) login attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginResult {
    /// Credentials are missing or stale; prompt the user, then try again
    Retry,
    /// Authenticated
    Success,
    /// Authentication failed and retrying will not help
    Failure,
}

/// Driver for one connection's authentication flow.
///
/// `silent_login` runs on a background worker; `prompt_for_password` must
/// run on the coordinator context since it may open UI.
#[async_trait]
pub trait LoginWorker: Send + Sync {
    /// Ask the user for credentials; returns false if they cancelled
    fn prompt_for_password(&self) -> bool;

    /// Attempt a non-interactive login with the stored credentials
    async fn silent_login(&self, force_check: bool) -> Result<LoginResult>;

    /// Stop trying to reach the server for the rest of the session
    fn go_offline(&self);
}
