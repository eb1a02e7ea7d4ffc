//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the desired resources declared in configuration with the state
//! refreshed from the Provider, and generates the Effects needed to converge.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Attributes, Resource, ResourceId, State};
use crate::schema::ResourceSchema;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// A changed attribute cannot be updated in place
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
///
/// Attributes present in the desired resource are compared, plus configurable
/// attributes that were dropped from configuration but still hold a value in
/// state. Computed attributes recorded in state never show up as changes.
pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes, schema);

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let replace = schema.is_some_and(|s| changed.iter().any(|name| s.requires_replace(name)));
    if replace {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    desired: &Attributes,
    current: &Attributes,
    schema: Option<&ResourceSchema>,
) -> Vec<String> {
    let normalize = |key: &str, value: &Value| match schema {
        Some(s) => s.normalize(key, value),
        None => value.clone(),
    };

    let mut changed = Vec::new();
    for (key, desired_value) in desired {
        let current_value = current.get(key).unwrap_or(&Value::Null);
        if desired_value.is_null() && current_value.is_null() {
            continue;
        }
        if normalize(key, desired_value) != normalize(key, current_value) {
            changed.push(key.clone());
        }
    }

    if let Some(schema) = schema {
        for (key, current_value) in current {
            let dropped = desired.get(key).is_none_or(Value::is_null);
            if dropped && schema.is_configurable(key) && !is_unset(current_value) {
                changed.push(key.clone());
            }
        }
    }

    changed.sort();
    changed.dedup();
    changed
}

/// Null or an empty collection; both read back from the API for omitted values
fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Compute Diff for multiple resources and generate a Plan
///
/// Recorded states with no desired counterpart are planned for deletion,
/// ordered by resource id.
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    schemas: &HashMap<String, ResourceSchema>,
) -> Plan {
    let mut plan = Plan::new();

    for resource in desired {
        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        let schema = schemas.get(&resource.id.resource_type);
        match diff(resource, &current, schema) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Update {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::Replace {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Replace {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::NoChange(_) => {}
        }
    }

    let wanted: HashSet<&ResourceId> = desired.iter().map(|r| &r.id).collect();
    let mut orphans: Vec<&State> = current_states
        .values()
        .filter(|s| s.exists && !wanted.contains(&s.id))
        .collect();
    orphans.sort_by(|a, b| a.id.cmp(&b.id));
    for state in orphans {
        plan.add(Effect::Delete(state.clone()));
    }

    plan
}
