//! Effect - A single planned lifecycle step

use crate::resource::{Resource, ResourceId, State};

/// Lifecycle step to be executed against the provider
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Create(Resource),
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Destroy then create; used when a replace-triggering attribute changed
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    Delete(State),
}

impl Effect {
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Create(r) => &r.id,
            Effect::Update { id, .. } | Effect::Replace { id, .. } => id,
            Effect::Delete(state) => &state.id,
        }
    }

    /// Short verb for display
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Create(_) => "create",
            Effect::Update { .. } => "update",
            Effect::Replace { .. } => "replace",
            Effect::Delete(_) => "delete",
        }
    }
}
