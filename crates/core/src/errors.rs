//! Error types shared by the store, backup and sync layers.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure classes surfaced by the persistence and sync layers.
///
/// Public store and sync entry points degrade these to safe defaults
/// (`false`, the previous local value, an empty list); the variants travel
/// only between internal layers and into logs.
#[derive(Debug, Error)]
pub enum Error {
    /// The local key-value store is absent or rejected the operation.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A value could not round-trip through JSON.
    #[error("Serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A write landed but reading it back produced different content.
    #[error("Write verification failed for key '{0}'")]
    WriteVerification(String),

    /// Network or remote service failure.
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// No user identity could be resolved for a sync call.
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    /// Malformed input (bad document path, empty id, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable(message.into())
    }

    pub fn remote_unavailable(message: impl Into<String>) -> Self {
        Self::RemoteUnavailable(message.into())
    }

    pub fn not_authenticated(message: impl Into<String>) -> Self {
        Self::NotAuthenticated(message.into())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// True for failures on the remote side of a sync call.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_) | Self::NotAuthenticated(_))
    }
}
