//! State backend trait and error types

use async_trait::async_trait;
use thiserror::Error;

use crate::state::StateFile;

/// Errors that can occur when interacting with a state backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// State file is corrupted or invalid
    #[error("Invalid state file: {0}")]
    InvalidState(String),

    /// State file was written by a newer, unknown format version
    #[error("Unsupported state file version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Trait for state storage backends
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Read the current state from the backend
    ///
    /// Returns `None` if no state exists (first-time use)
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    /// Write the state to the backend
    ///
    /// The state's serial number should be incremented before calling this
    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let error = BackendError::UnsupportedVersion {
            found: 3,
            supported: 1,
        };
        assert_eq!(
            error.to_string(),
            "Unsupported state file version 3 (supported: 1)"
        );

        let error = BackendError::Io("disk full".to_string());
        assert_eq!(error.to_string(), "I/O error: disk full");
    }
}
