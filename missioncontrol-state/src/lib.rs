//! Mission Control State Management
//!
//! Persists the recorded state of managed resources between runs.
//!
//! # Overview
//!
//! - **StateFile**: The main state structure containing all managed resources
//! - **StateBackend**: A trait for state storage backends
//! - **LocalBackend**: Stores the state file as JSON on the local filesystem
//!
//! # Example
//!
//! ```ignore
//! use missioncontrol_state::{LocalBackend, StateBackend, StateFile};
//!
//! let backend = LocalBackend::with_path("missioncontrol.state.json".into());
//! let mut state = backend.read_state().await?.unwrap_or_default();
//!
//! // ... apply changes ...
//!
//! state.increment_serial();
//! backend.write_state(&state).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod state;

// Re-export main types for convenience
pub use backend::{BackendError, BackendResult, StateBackend};
pub use backends::LocalBackend;
pub use state::{ResourceState, StateFile};
