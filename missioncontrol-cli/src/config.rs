//! Configuration file loading
//!
//! A configuration file is a JSON document holding the provider block and
//! the list of desired resources.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use missioncontrol_core::resource::{Attributes, Resource};
use missioncontrol_core::schema::ResourceSchema;
use missioncontrol_provider::ProviderConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::parse(&content).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let config: ConfigFile =
            serde_json::from_str(content).map_err(|e| format!("Parse error: {}", e))?;

        let mut seen = HashSet::new();
        for resource in &config.resources {
            if !seen.insert((&resource.resource_type, &resource.name)) {
                return Err(format!(
                    "Duplicate resource {}.{}",
                    resource.resource_type, resource.name
                ));
            }
        }
        Ok(config)
    }

    /// Desired resources in declaration order
    pub fn desired_resources(&self) -> Vec<Resource> {
        self.resources
            .iter()
            .map(|r| {
                Resource::new(&r.resource_type, &r.name).with_attributes(r.attributes.clone())
            })
            .collect()
    }
}

/// Check every resource against its schema, collecting all problems
pub fn validate_resources(
    resources: &[Resource],
    schemas: &HashMap<String, ResourceSchema>,
) -> Result<(), String> {
    let mut all_errors = Vec::new();

    for resource in resources {
        match schemas.get(&resource.id.resource_type) {
            Some(schema) => {
                if let Err(errors) = schema.validate(&resource.attributes) {
                    for error in errors {
                        all_errors.push(format!("{}: {}", resource.id, error));
                    }
                }
            }
            None => all_errors.push(format!(
                "{}: Unknown resource type: {}",
                resource.id, resource.id.resource_type
            )),
        }
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(all_errors.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use missioncontrol_core::schema::{AttributeSchema, AttributeType};
    use serde_json::json;

    fn schemas() -> HashMap<String, ResourceSchema> {
        let schema = ResourceSchema::new("license_bucket")
            .attribute(AttributeSchema::new("name", AttributeType::String).required());
        HashMap::from([("license_bucket".to_string(), schema)])
    }

    #[test]
    fn parse_config_file() {
        let config = ConfigFile::parse(
            r#"{
                "provider": { "url": "https://example.jfrog.io" },
                "resources": [
                    { "type": "license_bucket", "name": "prod", "attributes": { "name": "prod" } }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.provider.url.as_deref(),
            Some("https://example.jfrog.io")
        );
        let resources = config.desired_resources();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id.to_string(), "license_bucket.prod");
        assert_eq!(resources[0].attributes.get("name"), Some(&json!("prod")));
    }

    #[test]
    fn parse_rejects_duplicate_resources() {
        let err = ConfigFile::parse(
            r#"{ "resources": [
                { "type": "jpd", "name": "edge" },
                { "type": "jpd", "name": "edge" }
            ] }"#,
        )
        .unwrap_err();
        assert_eq!(err, "Duplicate resource jpd.edge");
    }

    #[test]
    fn parse_rejects_unknown_provider_fields() {
        assert!(ConfigFile::parse(r#"{ "provider": { "region": "x" } }"#).is_err());
    }

    #[test]
    fn validate_reports_unknown_types_and_schema_errors() {
        let resources = vec![
            Resource::new("license_bucket", "missing_name"),
            Resource::new("repository", "libs"),
        ];
        let err = validate_resources(&resources, &schemas()).unwrap_err();
        assert!(err.contains("license_bucket.missing_name"));
        assert!(err.contains("Unknown resource type: repository"));
    }
}
