//! Execution of refresh, apply and import against a provider
//!
//! Every step records its result in the state file as it completes, so a
//! partially failed run leaves the state consistent with what actually
//! happened remotely.

use colored::Colorize;

use missioncontrol_core::diagnostics::Diagnostics;
use missioncontrol_core::effect::Effect;
use missioncontrol_core::plan::Plan;
use missioncontrol_core::provider::{Provider, ProviderError};
use missioncontrol_core::resource::{ResourceId, State};
use missioncontrol_state::{ResourceState, StateFile};

use crate::display::format_effect;

/// Counts of applied effects
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    pub succeeded: usize,
    pub failed: usize,
}

/// Re-read every recorded resource
///
/// A failed read leaves the recorded entry untouched and is reported as a
/// diagnostic.
pub async fn refresh_states(provider: &dyn Provider, state_file: &mut StateFile) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    let recorded: Vec<State> = state_file.resources.iter().map(|r| r.to_state()).collect();

    for state in recorded {
        match provider.read(&state).await {
            Ok(refreshed) => {
                log::debug!("refreshed {}", refreshed.id);
                state_file.upsert_resource(ResourceState::from_state(&refreshed));
            }
            Err(e) => {
                let e = e.for_resource(state.id.clone());
                diagnostics.push(e.to_diagnostic());
            }
        }
    }

    diagnostics
}

/// Execute a plan effect by effect, recording each result in `state_file`
pub async fn apply_plan(
    provider: &dyn Provider,
    plan: &Plan,
    state_file: &mut StateFile,
) -> (Outcome, Diagnostics) {
    let mut outcome = Outcome::default();
    let mut diagnostics = Diagnostics::new();

    for effect in plan.effects() {
        match execute(provider, effect, state_file, &mut diagnostics).await {
            Ok(()) => {
                println!("  {} {}", "✓".green(), format_effect(effect));
                outcome.succeeded += 1;
            }
            Err(message) => {
                println!("  {} {} - {}", "✗".red(), format_effect(effect), message);
                outcome.failed += 1;
            }
        }
    }

    (outcome, diagnostics)
}

async fn execute(
    provider: &dyn Provider,
    effect: &Effect,
    state_file: &mut StateFile,
    diagnostics: &mut Diagnostics,
) -> Result<(), String> {
    let fail = |diagnostics: &mut Diagnostics, e: ProviderError| {
        let message = e.message.clone();
        diagnostics.push(e.for_resource(effect.resource_id().clone()).to_diagnostic());
        message
    };

    match effect {
        Effect::Create(resource) => {
            let state = provider
                .create(resource)
                .await
                .map_err(|e| fail(diagnostics, e))?;
            state_file.upsert_resource(ResourceState::from_state(&state));
        }
        Effect::Update { from, to, .. } => {
            let state = provider
                .update(from, to)
                .await
                .map_err(|e| fail(diagnostics, e))?;
            state_file.upsert_resource(ResourceState::from_state(&state));
        }
        Effect::Replace { id, from, to, .. } => {
            let warnings = provider
                .delete(from)
                .await
                .map_err(|e| fail(diagnostics, e))?;
            diagnostics.extend(warnings);
            state_file.remove_resource(&id.resource_type, &id.name);

            let state = provider
                .create(to)
                .await
                .map_err(|e| fail(diagnostics, e))?;
            state_file.upsert_resource(ResourceState::from_state(&state));
        }
        Effect::Delete(state) => {
            let warnings = provider
                .delete(state)
                .await
                .map_err(|e| fail(diagnostics, e))?;
            diagnostics.extend(warnings);
            state_file.remove_resource(&state.id.resource_type, &state.id.name);
        }
    }

    Ok(())
}

/// Bring an existing remote object under management
pub async fn import_resource(
    provider: &dyn Provider,
    id: &ResourceId,
    identifier: &str,
    state_file: &mut StateFile,
) -> Result<(), String> {
    if state_file
        .find_resource(&id.resource_type, &id.name)
        .is_some()
    {
        return Err(format!("Resource {} is already managed", id));
    }

    let state = provider
        .import(id, identifier)
        .await
        .map_err(|e| e.for_resource(id.clone()).to_diagnostic().to_string())?;
    state_file.upsert_resource(ResourceState::from_state(&state));
    Ok(())
}

/// Plan deleting the given recorded resources, in order
pub fn destroy_plan<'a>(states: impl IntoIterator<Item = &'a ResourceState>) -> Plan {
    let mut plan = Plan::new();
    for recorded in states {
        plan.add(Effect::Delete(recorded.to_state()));
    }
    plan
}
