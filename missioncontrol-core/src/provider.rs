//! Provider - Trait abstracting resource lifecycle operations
//!
//! A Provider owns a set of resource types and translates lifecycle calls
//! (create, read, update, delete, import) into remote API calls.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;

/// Lifecycle step an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Configure,
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl Operation {
    /// Diagnostic title used when this operation fails
    pub fn title(&self) -> &'static str {
        match self {
            Operation::Configure => "Unable to Configure Provider",
            Operation::Create => "Unable to Create Resource",
            Operation::Read => "Unable to Refresh Resource",
            Operation::Update => "Unable to Update Resource",
            Operation::Delete => "Unable to Delete Resource",
            Operation::Import => "Unexpected Import Identifier",
        }
    }

    /// Upper-case verb used in usage events (e.g., "CREATE")
    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Configure => "CONFIGURE",
            Operation::Create => "CREATE",
            Operation::Read => "READ",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Import => "IMPORT",
        }
    }
}

/// Classification of provider failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Provider configuration is unusable (e.g., no URL)
    Configuration,
    /// Network or client construction failure
    Transport,
    /// Remote API answered with a non-2xx status
    Api { status: u16 },
    /// Expected entity is absent
    NotFound,
    /// Configuration values violate the resource schema
    Validation,
    /// Import identifier cannot be interpreted
    Import,
    /// Wire or state payload could not be converted
    Conversion,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration error"),
            ErrorKind::Transport => write!(f, "transport error"),
            ErrorKind::Api { status } => write!(f, "API error (HTTP {})", status),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::Validation => write!(f, "validation error"),
            ErrorKind::Import => write!(f, "import error"),
            ErrorKind::Conversion => write!(f, "conversion error"),
        }
    }
}

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub operation: Option<Operation>,
    pub message: String,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}] ", id)?;
        }
        if let Some(op) = self.operation {
            write!(f, "{}: ", op.title())?;
        }
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            operation: None,
            message: message.into(),
            resource_id: None,
            cause: None,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Non-2xx response; the message is the raw response body
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::new(ErrorKind::Api { status }, body)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn import(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Import, message).during(Operation::Import)
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conversion, message)
    }

    /// Attach the lifecycle step, keeping an already recorded one
    pub fn during(mut self, operation: Operation) -> Self {
        self.operation.get_or_insert(operation);
        self
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Render as an error diagnostic titled after the failed operation
    pub fn to_diagnostic(&self) -> Diagnostic {
        let summary = match self.operation {
            Some(op) => op.title().to_string(),
            None => match self.kind {
                ErrorKind::Configuration => "Missing URL Configuration".to_string(),
                ErrorKind::Validation => "Invalid Attribute Configuration".to_string(),
                _ => "Provider Error".to_string(),
            },
        };
        Diagnostic::error(summary, self.message.clone())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Definition of resource types that a Provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "jpd")
    fn name(&self) -> &'static str;

    /// Attribute schema used to validate configuration
    fn schema(&self) -> ResourceSchema;
}

/// Main Provider trait
///
/// All operations are async and involve side effects. Implementations must
/// treat their shared client and configuration as read-only.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "missioncontrol")
    fn name(&self) -> &'static str;

    /// List of resource types this Provider can handle
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Refresh a recorded state from the remote API
    ///
    /// On failure the caller keeps its prior state.
    fn read(&self, state: &State) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource and return its state, identifier included
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource in place
    fn update(&self, from: &State, to: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource
    ///
    /// Returns warnings when the remote object cannot be removed but the
    /// state entry should still be dropped.
    fn delete(&self, state: &State) -> BoxFuture<'_, ProviderResult<Diagnostics>>;

    /// Build state for an existing remote object from a caller-supplied identifier
    fn import(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>>;
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).resource_types()
    }

    fn read(&self, state: &State) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read(state)
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).create(resource)
    }

    fn update(&self, from: &State, to: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).update(from, to)
    }

    fn delete(&self, state: &State) -> BoxFuture<'_, ProviderResult<Diagnostics>> {
        (**self).delete(state)
    }

    fn import(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).import(id, identifier)
    }
}
