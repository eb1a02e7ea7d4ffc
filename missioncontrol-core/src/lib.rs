//! Mission Control Core
//!
//! Provider-agnostic contracts for managing Mission Control resources:
//! the `Provider` trait, attribute schemas, diagnostics, and the differ
//! that turns desired resources and recorded state into a plan of effects.

pub mod diagnostics;
pub mod differ;
pub mod effect;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod version;
