//! Mission Control Provider
//!
//! Manages JFrog Mission Control objects through its REST API.
//!
//! ## Module Structure
//!
//! - `client` - Authenticated HTTP client for the platform
//! - `config` - Provider configuration and environment resolution
//! - `oidc` - Workload identity token exchange
//! - `usage` - Fire-and-forget usage reporting
//! - `provider` - MissionControlProvider and shared provider data
//! - `resources` - Per-resource models and lifecycle handlers

pub mod client;
pub mod config;
pub mod oidc;
pub mod provider;
pub mod resources;
pub mod usage;

// Re-export main types
pub use client::{ClientError, PlatformClient};
pub use config::ProviderConfig;
pub use provider::{MissionControlProvider, ProviderData, resource_types, schemas};
