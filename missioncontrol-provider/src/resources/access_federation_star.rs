//! Access Federation in star topology
//!
//! One source JPD pushes the selected entity types to each target.

use std::collections::BTreeSet;

use async_trait::async_trait;
use missioncontrol_core::diagnostics::Diagnostics;
use missioncontrol_core::provider::{ProviderError, ProviderResult};
use missioncontrol_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use serde::{Deserialize, Serialize};

use super::{ManagedResource, nullable, unsupported_federation_delete, validate_url_pattern};
use crate::provider::ProviderData;

pub const TYPE_NAME: &str = "access_federation_star";

const FEDERATION_ENDPOINT: &str = "mc/api/v1/federation/{id}";

/// Entity types that can be federated
pub const ENTITY_TYPES: [&str; 4] = ["USERS", "GROUPS", "PERMISSIONS", "TOKENS"];

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PermissionFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_patterns: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_patterns: Option<BTreeSet<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Target {
    /// Target JPD id
    pub id: String,
    /// Access URL of the target, e.g. `http://myplatformserver:8082/access`
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_filters: Option<PermissionFilters>,
}

/// Star federation as recorded in state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessFederationStarModel {
    /// Source JPD id
    pub id: String,
    pub entities: BTreeSet<String>,
    pub targets: BTreeSet<Target>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionFiltersApi {
    #[serde(deserialize_with = "nullable")]
    pub include_patterns: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub exclude_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetApi {
    pub id: String,
    pub url: String,
    #[serde(deserialize_with = "nullable")]
    pub permission_filters: PermissionFiltersApi,
}

#[derive(Debug, Serialize)]
pub struct AccessFederationRequest {
    pub id: String,
    pub entities: Vec<String>,
    pub targets: Vec<TargetApi>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AccessFederationResponse {
    #[serde(deserialize_with = "nullable")]
    pub entities: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub targets: Vec<TargetApi>,
}

/// Per-target outcome returned by the configure call
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FederationResult {
    pub label: String,
    pub status: String,
}

impl AccessFederationStarModel {
    pub fn to_api_model(&self) -> AccessFederationRequest {
        let targets = self
            .targets
            .iter()
            .map(|target| {
                let filters = target.permission_filters.clone().unwrap_or_default();
                TargetApi {
                    id: target.id.clone(),
                    url: target.url.clone(),
                    permission_filters: PermissionFiltersApi {
                        include_patterns: filters
                            .include_patterns
                            .unwrap_or_default()
                            .into_iter()
                            .collect(),
                        exclude_patterns: filters
                            .exclude_patterns
                            .unwrap_or_default()
                            .into_iter()
                            .collect(),
                    },
                }
            })
            .collect();

        AccessFederationRequest {
            id: self.id.clone(),
            entities: self.entities.iter().cloned().collect(),
            targets,
        }
    }

    /// Refresh entities and targets; empty pattern lists become unset
    pub fn from_api_model(&mut self, response: AccessFederationResponse) {
        self.entities = response.entities.into_iter().collect();
        self.targets = response
            .targets
            .into_iter()
            .map(|target| {
                let include = non_empty_set(target.permission_filters.include_patterns);
                let exclude = non_empty_set(target.permission_filters.exclude_patterns);
                let permission_filters = if include.is_none() && exclude.is_none() {
                    None
                } else {
                    Some(PermissionFilters {
                        include_patterns: include,
                        exclude_patterns: exclude,
                    })
                };
                Target {
                    id: target.id,
                    url: target.url,
                    permission_filters,
                }
            })
            .collect();
    }
}

fn non_empty_set(patterns: Vec<String>) -> Option<BTreeSet<String>> {
    if patterns.is_empty() {
        None
    } else {
        Some(patterns.into_iter().collect())
    }
}

/// Entity set attribute shared with the mesh topology
pub(crate) fn entities_attribute() -> AttributeSchema {
    AttributeSchema::new(
        "entities",
        AttributeType::set_of(AttributeType::Enum(
            ENTITY_TYPES.iter().map(|s| s.to_string()).collect(),
        )),
    )
    .required()
    .with_description("Entity types to sync. Allowed values: USERS, GROUPS, PERMISSIONS, TOKENS")
}

fn access_url() -> AttributeType {
    AttributeType::Custom {
        name: "AccessUrl".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value.as_str() {
            Some(s) => validate_url_pattern(s, r"^.+/access$", "must end in '/access'"),
            None => Err("Expected string".to_string()),
        },
    }
}

pub struct AccessFederationStar;

#[async_trait]
impl ManagedResource for AccessFederationStar {
    type Model = AccessFederationStarModel;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        let patterns = AttributeType::set_of(AttributeType::String);
        let target = AttributeType::object([
            AttributeSchema::new("id", types::non_empty_string()).required(),
            AttributeSchema::new("url", access_url()).required(),
            AttributeSchema::new(
                "permission_filters",
                AttributeType::object([
                    AttributeSchema::new("include_patterns", patterns.clone()),
                    AttributeSchema::new("exclude_patterns", patterns),
                ]),
            ),
        ]);

        ResourceSchema::new(TYPE_NAME)
            .with_description("Sets up Access Federation in star topology.")
            .attribute(
                AttributeSchema::new("id", types::non_empty_string())
                    .required()
                    .requires_replace()
                    .with_description("ID for the source Platform Deployment"),
            )
            .attribute(entities_attribute())
            .attribute(
                AttributeSchema::new("targets", AttributeType::set_of(target))
                    .required()
                    .with_description("Target JPDs"),
            )
    }

    fn identifier(&self, model: &AccessFederationStarModel) -> String {
        model.id.clone()
    }

    async fn create(
        &self,
        data: &ProviderData,
        plan: AccessFederationStarModel,
    ) -> ProviderResult<AccessFederationStarModel> {
        configure_federation(data, &plan).await?;
        Ok(plan)
    }

    async fn read(
        &self,
        data: &ProviderData,
        state: AccessFederationStarModel,
    ) -> ProviderResult<AccessFederationStarModel> {
        let url = data
            .client
            .endpoint(FEDERATION_ENDPOINT, &[("id", state.id.as_str())])?;
        let response: AccessFederationResponse = data.client.get(url).await?;

        let mut model = state;
        model.from_api_model(response);
        Ok(model)
    }

    async fn update(
        &self,
        data: &ProviderData,
        _prior: AccessFederationStarModel,
        plan: AccessFederationStarModel,
    ) -> ProviderResult<AccessFederationStarModel> {
        configure_federation(data, &plan).await?;
        Ok(plan)
    }

    async fn delete(
        &self,
        _data: &ProviderData,
        _state: AccessFederationStarModel,
    ) -> ProviderResult<Diagnostics> {
        Ok(unsupported_federation_delete())
    }

    fn import_model(&self, identifier: &str) -> ProviderResult<AccessFederationStarModel> {
        if identifier.is_empty() {
            return Err(ProviderError::import("Expected the source JPD ID"));
        }
        Ok(AccessFederationStarModel {
            id: identifier.to_string(),
            ..Default::default()
        })
    }
}

async fn configure_federation(
    data: &ProviderData,
    plan: &AccessFederationStarModel,
) -> ProviderResult<()> {
    let url = data
        .client
        .endpoint(FEDERATION_ENDPOINT, &[("id", plan.id.as_str())])?;
    let results: Vec<FederationResult> = data
        .client
        .put_optional(url, &plan.to_api_model())
        .await?
        .unwrap_or_default();
    for result in results {
        log::info!(
            "access federation {}: {} {}",
            plan.id,
            result.label,
            result.status
        );
    }
    Ok(())
}
