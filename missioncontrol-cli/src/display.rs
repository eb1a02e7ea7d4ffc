//! Plan and diagnostic rendering

use std::collections::HashMap;

use colored::Colorize;
use serde_json::Value;

use missioncontrol_core::diagnostics::{Diagnostics, Severity};
use missioncontrol_core::effect::Effect;
use missioncontrol_core::plan::Plan;
use missioncontrol_core::schema::ResourceSchema;

const SENSITIVE: &str = "(sensitive)";

pub fn print_plan(plan: &Plan, schemas: &HashMap<String, ResourceSchema>) {
    if plan.is_empty() {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    for effect in plan.effects() {
        let schema = schemas.get(&effect.resource_id().resource_type);
        match effect {
            Effect::Create(resource) => {
                println!("  {} {}", "+".green().bold(), resource.id.to_string().green());
                for (key, value) in &resource.attributes {
                    if value.is_null() {
                        continue;
                    }
                    println!("      {}: {}", key, format_attribute(schema, key, value));
                }
            }
            Effect::Update {
                id,
                from,
                to,
                changed_attributes,
            } => {
                println!("  {} {}", "~".yellow().bold(), id.to_string().yellow());
                print_changes(schema, &from.attributes, &to.attributes, changed_attributes);
            }
            Effect::Replace {
                id,
                from,
                to,
                changed_attributes,
            } => {
                println!(
                    "  {} {} {}",
                    "-/+".magenta().bold(),
                    id.to_string().magenta(),
                    "(forces replacement)".dimmed()
                );
                print_changes(schema, &from.attributes, &to.attributes, changed_attributes);
            }
            Effect::Delete(state) => {
                println!("  {} {}", "-".red().bold(), state.id.to_string().red());
            }
        }
    }

    println!();
    println!("{}", plan.summary().to_string().bold());
}

fn print_changes(
    schema: Option<&ResourceSchema>,
    from: &serde_json::Map<String, Value>,
    to: &serde_json::Map<String, Value>,
    changed: &[String],
) {
    for key in changed {
        let old = from.get(key).unwrap_or(&Value::Null);
        let new = to.get(key).unwrap_or(&Value::Null);
        println!(
            "      {}: {} → {}",
            key,
            format_attribute(schema, key, old).red(),
            format_attribute(schema, key, new).green()
        );
    }
}

fn format_attribute(schema: Option<&ResourceSchema>, key: &str, value: &Value) -> String {
    if !value.is_null() && schema.is_some_and(|s| s.is_sensitive(key)) {
        return SENSITIVE.to_string();
    }
    format_value(value)
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "(none)".to_string(),
        Value::String(s) => format!("\"{}\"", s),
        Value::Array(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Object(map) => {
            let strs: Vec<_> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
        other => other.to_string(),
    }
}

pub fn format_effect(effect: &Effect) -> String {
    match effect {
        Effect::Create(r) => format!("Create {}", r.id),
        Effect::Update { id, .. } => format!("Update {}", id),
        Effect::Replace { id, .. } => format!("Replace {}", id),
        Effect::Delete(state) => format!("Delete {}", state.id),
    }
}

pub fn print_diagnostics(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.iter() {
        let text = diagnostic.to_string();
        match diagnostic.severity {
            Severity::Warning => eprintln!("{}", text.yellow()),
            Severity::Error => eprintln!("{}", text.red()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use missioncontrol_core::resource::{Resource, ResourceId, State};
    use missioncontrol_core::schema::{AttributeSchema, AttributeType};
    use serde_json::json;

    #[test]
    fn format_value_renders_json() {
        assert_eq!(format_value(&json!("a")), "\"a\"");
        assert_eq!(format_value(&json!(["x", 2])), "[\"x\", 2]");
        assert_eq!(format_value(&json!({"k": true})), "{k: true}");
        assert_eq!(format_value(&Value::Null), "(none)");
    }

    #[test]
    fn sensitive_attributes_are_masked() {
        let schema = ResourceSchema::new("jpd")
            .attribute(AttributeSchema::new("token", AttributeType::String).sensitive());
        assert_eq!(
            format_attribute(Some(&schema), "token", &json!("secret")),
            SENSITIVE
        );
        assert_eq!(
            format_attribute(Some(&schema), "token", &Value::Null),
            "(none)"
        );
        assert_eq!(format_attribute(None, "token", &json!("x")), "\"x\"");
    }

    #[test]
    fn format_effect_names_the_resource() {
        let create = Effect::Create(Resource::new("jpd", "edge"));
        assert_eq!(format_effect(&create), "Create jpd.edge");

        let delete = Effect::Delete(State::existing(
            ResourceId::new("license_bucket", "prod"),
            Default::default(),
        ));
        assert_eq!(format_effect(&delete), "Delete license_bucket.prod");
    }
}
