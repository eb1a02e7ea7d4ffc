//! Access Federation in mesh topology
//!
//! Every JPD in the mesh federates the selected entities with every other
//! member. The resource id is the sorted member ids joined with `:`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use missioncontrol_core::diagnostics::Diagnostics;
use missioncontrol_core::provider::{ProviderError, ProviderResult};
use missioncontrol_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use serde::{Deserialize, Serialize};

use super::access_federation_star::{FederationResult, entities_attribute};
use super::{ManagedResource, nullable, unsupported_federation_delete};
use crate::provider::ProviderData;

pub const TYPE_NAME: &str = "access_federation_mesh";

const FEDERATIONS_ENDPOINT: &str = "mc/api/v1/federation";
const CREATE_MESH_ENDPOINT: &str = "mc/api/v1/federation/create_mesh";

const ID_SEPARATOR: &str = ":";

/// Mesh federation as recorded in state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessFederationMeshModel {
    pub id: Option<String>,
    pub ids: BTreeSet<String>,
    pub entities: BTreeSet<String>,
}

#[derive(Debug, Serialize)]
pub struct MeshRequest {
    pub jpd_ids: Vec<String>,
    pub entities: Vec<String>,
}

/// Federation configuration of one source JPD
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FederationEntry {
    pub source: String,
    #[serde(deserialize_with = "nullable")]
    pub targets: Vec<FederationEntryTarget>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FederationEntryTarget {
    pub id: String,
    pub url: String,
    #[serde(deserialize_with = "nullable")]
    pub entities: Vec<String>,
}

impl FederationEntry {
    /// Whether this entry's source and all of its targets belong to `ids`
    fn belongs_to(&self, ids: &BTreeSet<String>) -> bool {
        ids.contains(&self.source) && self.targets.iter().all(|t| ids.contains(&t.id))
    }
}

impl AccessFederationMeshModel {
    pub fn to_api_model(&self) -> MeshRequest {
        MeshRequest {
            jpd_ids: self.ids.iter().cloned().collect(),
            entities: self.entities.iter().cloned().collect(),
        }
    }

    pub fn from_api_model(&mut self, entry: FederationEntry) {
        let mut ids = BTreeSet::from([entry.source]);
        let mut entities = BTreeSet::new();
        for target in entry.targets {
            ids.insert(target.id);
            entities.extend(target.entities);
        }
        self.ids = ids;
        self.entities = entities;
        self.id = Some(mesh_id(&self.ids));
    }
}

/// Joined member ids, e.g. `JPD-1:JPD-2:JPD-3`
pub fn mesh_id(ids: &BTreeSet<String>) -> String {
    ids.iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(ID_SEPARATOR)
}

/// Split an import identifier into at least two non-empty JPD ids
pub fn parse_mesh_id(identifier: &str) -> ProviderResult<BTreeSet<String>> {
    let parts: Vec<&str> = identifier.split(ID_SEPARATOR).collect();
    if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
        return Err(ProviderError::import(format!(
            "Expected at least two JPD IDs in the form of: jpd_id_1:jpd_id_2:... Got: {}",
            identifier
        )));
    }
    Ok(parts.into_iter().map(str::to_string).collect())
}

pub struct AccessFederationMesh;

#[async_trait]
impl ManagedResource for AccessFederationMesh {
    type Model = AccessFederationMeshModel;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(TYPE_NAME)
            .with_description("Sets up Access Federation in mesh topology.")
            .attribute(AttributeSchema::new("id", AttributeType::String).computed())
            .attribute(
                AttributeSchema::new("ids", types::string_set_min_two())
                    .required()
                    .with_description("IDs of the Platform Deployments to connect"),
            )
            .attribute(entities_attribute())
    }

    fn identifier(&self, model: &AccessFederationMeshModel) -> String {
        mesh_id(&model.ids)
    }

    async fn create(
        &self,
        data: &ProviderData,
        plan: AccessFederationMeshModel,
    ) -> ProviderResult<AccessFederationMeshModel> {
        create_mesh(data, plan).await
    }

    async fn read(
        &self,
        data: &ProviderData,
        state: AccessFederationMeshModel,
    ) -> ProviderResult<AccessFederationMeshModel> {
        let mut url = data.client.endpoint(FEDERATIONS_ENDPOINT, &[])?;
        url.query_pairs_mut()
            .append_pair("includeNonConfiguredJPDs", "false");
        let entries: Vec<FederationEntry> = data.client.get(url).await?;

        let entry = entries
            .into_iter()
            .find(|e| e.belongs_to(&state.ids))
            .ok_or_else(|| {
                let ids: Vec<&str> = state.ids.iter().map(String::as_str).collect();
                ProviderError::not_found(format!(
                    "unable to find Access Federation Configurations for JPDs: {}",
                    ids.join(", ")
                ))
            })?;

        let mut model = state;
        model.from_api_model(entry);
        Ok(model)
    }

    async fn update(
        &self,
        data: &ProviderData,
        _prior: AccessFederationMeshModel,
        plan: AccessFederationMeshModel,
    ) -> ProviderResult<AccessFederationMeshModel> {
        create_mesh(data, plan).await
    }

    async fn delete(
        &self,
        _data: &ProviderData,
        _state: AccessFederationMeshModel,
    ) -> ProviderResult<Diagnostics> {
        Ok(unsupported_federation_delete())
    }

    fn import_model(&self, identifier: &str) -> ProviderResult<AccessFederationMeshModel> {
        let ids = parse_mesh_id(identifier)?;
        Ok(AccessFederationMeshModel {
            id: Some(mesh_id(&ids)),
            ids,
            ..Default::default()
        })
    }
}

async fn create_mesh(
    data: &ProviderData,
    plan: AccessFederationMeshModel,
) -> ProviderResult<AccessFederationMeshModel> {
    let url = data.client.endpoint(CREATE_MESH_ENDPOINT, &[])?;
    let results: Vec<FederationResult> = data
        .client
        .post_optional(url, &plan.to_api_model())
        .await?
        .unwrap_or_default();
    for result in results {
        log::info!("access federation mesh: {} {}", result.label, result.status);
    }

    let mut model = plan;
    model.id = Some(mesh_id(&model.ids));
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MissionControlProvider;
    use crate::resources::testing::provider_data;
    use missioncontrol_core::provider::{ErrorKind, Operation, Provider};
    use missioncontrol_core::resource::{Resource, ResourceId, State};
    use serde_json::{Value, json};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn federations() -> Value {
        json!([
            {
                "source": "JPD-9",
                "targets": [{"id": "JPD-1", "url": "https://one/access", "entities": ["USERS"]}]
            },
            {
                "source": "JPD-1",
                "targets": [
                    {"id": "JPD-2", "url": "https://two/access", "permission_filters": null, "entities": ["USERS", "GROUPS"]},
                    {"id": "JPD-3", "url": "https://three/access", "entities": ["USERS"]}
                ]
            }
        ])
    }

    #[test]
    fn parse_mesh_id_splits_segments() {
        let ids = parse_mesh_id("A:B:C").unwrap();
        assert_eq!(
            ids,
            BTreeSet::from(["A".to_string(), "B".to_string(), "C".to_string()])
        );

        for bad in ["A", "", "A::B", "A:"] {
            let err = parse_mesh_id(bad).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Import, "{}", bad);
            assert_eq!(err.to_diagnostic().summary, "Unexpected Import Identifier");
        }
    }

    #[test]
    fn mesh_id_is_order_independent() {
        let ids: BTreeSet<String> = ["JPD-3", "JPD-1", "JPD-2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(mesh_id(&ids), "JPD-1:JPD-2:JPD-3");
    }

    #[test]
    fn schema_requires_two_ids() {
        let schema = AccessFederationMesh.schema();
        let attrs = |ids: Value| {
            json!({"ids": ids, "entities": ["USERS"]})
                .as_object()
                .cloned()
                .unwrap()
        };
        assert!(schema.validate(&attrs(json!(["JPD-1"]))).is_err());
        assert!(schema.validate(&attrs(json!(["JPD-1", ""]))).is_err());
        assert!(schema.validate(&attrs(json!(["JPD-1", "JPD-2"]))).is_ok());
    }

    #[tokio::test]
    async fn create_posts_mesh_and_sets_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mc/api/v1/federation/create_mesh"))
            .and(body_json(json!({
                "jpd_ids": ["JPD-1", "JPD-2"],
                "entities": ["GROUPS", "USERS"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"label": "JPD-1", "status": "OK"},
                {"label": "JPD-2", "status": "OK"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let provider = MissionControlProvider::new(provider_data(&server, "7.77.5"));
        let resource = Resource::new(TYPE_NAME, "mesh").with_attributes(
            json!({"ids": ["JPD-2", "JPD-1"], "entities": ["USERS", "GROUPS"]})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let state = provider.create(&resource).await.unwrap();
        assert_eq!(state.attributes["id"], "JPD-1:JPD-2");
        assert_eq!(state.identifier.as_deref(), Some("JPD-1:JPD-2"));
    }

    #[tokio::test]
    async fn create_accepts_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mc/api/v1/federation/create_mesh"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let provider = MissionControlProvider::new(provider_data(&server, "7.77.5"));
        let resource = Resource::new(TYPE_NAME, "mesh").with_attributes(
            json!({"ids": ["JPD-1", "JPD-2"], "entities": ["USERS"]})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let state = provider.create(&resource).await.unwrap();
        assert_eq!(state.identifier.as_deref(), Some("JPD-1:JPD-2"));
    }

    #[tokio::test]
    async fn import_reads_matching_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mc/api/v1/federation"))
            .and(query_param("includeNonConfiguredJPDs", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(federations()))
            .mount(&server)
            .await;

        let provider = MissionControlProvider::new(provider_data(&server, "7.77.5"));
        let id = ResourceId::new(TYPE_NAME, "mesh");
        let state = provider.import(&id, "JPD-3:JPD-1:JPD-2").await.unwrap();

        assert_eq!(state.attributes["ids"], json!(["JPD-1", "JPD-2", "JPD-3"]));
        assert_eq!(state.attributes["entities"], json!(["GROUPS", "USERS"]));
        assert_eq!(state.attributes["id"], "JPD-1:JPD-2:JPD-3");
    }

    #[tokio::test]
    async fn import_rejects_single_segment_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mc/api/v1/federation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(federations()))
            .expect(0)
            .mount(&server)
            .await;

        let provider = MissionControlProvider::new(provider_data(&server, "7.77.5"));
        let err = provider
            .import(&ResourceId::new(TYPE_NAME, "mesh"), "JPD-1")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Import);
        assert_eq!(err.operation, Some(Operation::Import));
    }

    #[tokio::test]
    async fn read_without_match_lists_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mc/api/v1/federation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(federations()))
            .mount(&server)
            .await;

        let provider = MissionControlProvider::new(provider_data(&server, "7.77.5"));
        let state = State::existing(
            ResourceId::new(TYPE_NAME, "mesh"),
            json!({"id": "JPD-4:JPD-5", "ids": ["JPD-4", "JPD-5"], "entities": ["USERS"]})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let err = provider.read(&state).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            err.message,
            "unable to find Access Federation Configurations for JPDs: JPD-4, JPD-5"
        );
    }

    #[tokio::test]
    async fn delete_only_warns() {
        let server = MockServer::start().await;
        let provider = MissionControlProvider::new(provider_data(&server, "7.77.5"));
        let state = State::existing(
            ResourceId::new(TYPE_NAME, "mesh"),
            json!({"ids": ["JPD-1", "JPD-2"], "entities": ["USERS"]})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let diagnostics = provider.delete(&state).await.unwrap();
        assert_eq!(diagnostics.warnings().count(), 1);
        assert!(!diagnostics.has_error());
    }
}
