//! JFrog Platform Deployment (JPD) registration

use std::collections::BTreeSet;

use async_trait::async_trait;
use missioncontrol_core::diagnostics::Diagnostics;
use missioncontrol_core::provider::{ProviderError, ProviderResult};
use missioncontrol_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use missioncontrol_core::version::check_version;
use serde::{Deserialize, Serialize};

use super::{ManagedResource, nullable, validate_url_pattern};
use crate::provider::ProviderData;

pub const TYPE_NAME: &str = "jpd";

const JPDS_ENDPOINT: &str = "mc/api/v1/jpds";
const JPD_ENDPOINT: &str = "mc/api/v1/jpds/{id}";

/// First platform version that accepts access tokens for registration
const TOKEN_AUTH_MIN_VERSION: &str = "7.0.0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub city_name: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct License {
    pub expired: bool,
    pub license_hash: String,
    pub licensed_to: String,
    #[serde(rename = "type")]
    pub license_type: String,
    pub valid_through: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceStatus {
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(deserialize_with = "nullable")]
    pub status: ServiceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JpdStatus {
    pub code: String,
    pub message: String,
    #[serde(deserialize_with = "nullable")]
    pub warnings: BTreeSet<String>,
}

/// JPD as recorded in state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JpdModel {
    pub id: Option<String>,
    pub name: String,
    /// Registration URL; must end in `/`
    pub url: String,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub location: Location,
    pub tags: BTreeSet<String>,

    pub base_url: Option<String>,
    pub local: Option<bool>,
    pub licenses: Option<BTreeSet<License>>,
    pub services: Option<BTreeSet<Service>>,
    pub status: Option<JpdStatus>,
    pub is_cold_storage: Option<bool>,
    pub cold_storage_jpd: Option<String>,
}

/// Body of create and update requests
#[derive(Debug, Serialize)]
pub struct JpdRequest {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Platforms older than 7.0.0 only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub location: Location,
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct JpdResponse {
    pub id: String,
    pub name: String,
    pub url: String,
    pub base_url: String,
    #[serde(deserialize_with = "nullable")]
    pub location: Location,
    pub local: bool,
    #[serde(deserialize_with = "nullable")]
    pub licenses: Vec<License>,
    #[serde(deserialize_with = "nullable")]
    pub services: Vec<Service>,
    #[serde(deserialize_with = "nullable")]
    pub status: JpdStatus,
    #[serde(deserialize_with = "nullable")]
    pub tags: Vec<String>,
    pub is_cold_storage: bool,
    #[serde(deserialize_with = "nullable")]
    pub cold_storage_jpd: String,
}

impl JpdModel {
    /// Build the request body, choosing credentials by platform version
    pub fn to_api_model(&self, platform_version: &str) -> ProviderResult<JpdRequest> {
        let token_auth = check_version(platform_version, TOKEN_AUTH_MIN_VERSION).map_err(|e| {
            ProviderError::conversion(format!("failed to check version: {}", e)).with_cause(e)
        })?;

        let (token, username, password) = if token_auth {
            (self.token.clone(), None, None)
        } else {
            (None, self.username.clone(), self.password.clone())
        };

        Ok(JpdRequest {
            name: self.name.clone(),
            url: self.url.clone(),
            token,
            username,
            password,
            location: self.location.clone(),
            tags: self.tags.iter().cloned().collect(),
        })
    }

    /// Refresh from a response; credentials are never returned and are kept
    pub fn from_api_model(&mut self, response: JpdResponse) {
        self.id = Some(response.id);
        self.name = response.name;
        self.url = response.url;
        self.base_url = Some(response.base_url);
        self.location = response.location;
        self.local = Some(response.local);
        self.licenses = Some(response.licenses.into_iter().collect());
        self.services = Some(response.services.into_iter().collect());
        self.status = Some(response.status);
        self.tags = response.tags.into_iter().collect();
        self.is_cold_storage = Some(response.is_cold_storage);
        self.cold_storage_jpd = response
            .is_cold_storage
            .then_some(response.cold_storage_jpd);
    }

    fn require_id(&self) -> ProviderResult<&str> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::conversion("JPD state has no id"))
    }
}

fn jpd_url() -> AttributeType {
    AttributeType::Custom {
        name: "JpdUrl".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value.as_str() {
            Some(s) => validate_url_pattern(s, r"^.+/$", "must end in '/'"),
            None => Err("Expected string".to_string()),
        },
    }
}

fn country_code() -> AttributeType {
    AttributeType::Custom {
        name: "CountryCode".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value.as_str() {
            Some(s) if s.chars().count() == 2 => Ok(()),
            _ => Err("string length must be exactly 2".to_string()),
        },
    }
}

fn computed(name: &str, attr_type: AttributeType) -> AttributeSchema {
    AttributeSchema::new(name, attr_type).computed()
}

fn string(name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String)
}

pub struct Jpd;

#[async_trait]
impl ManagedResource for Jpd {
    type Model = JpdModel;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        let location = AttributeType::object([
            AttributeSchema::new("city_name", types::non_empty_string()).required(),
            AttributeSchema::new("country_code", country_code()).required(),
            AttributeSchema::new("latitude", AttributeType::Float).required(),
            AttributeSchema::new("longitude", AttributeType::Float).required(),
        ]);
        let license = AttributeType::object([
            AttributeSchema::new("expired", AttributeType::Bool),
            string("license_hash"),
            string("licensed_to"),
            string("type"),
            string("valid_through"),
        ]);
        let service = AttributeType::object([
            string("type"),
            AttributeSchema::new("status", AttributeType::object([string("code")])),
        ]);
        let status = AttributeType::object([
            string("code"),
            string("message"),
            AttributeSchema::new("warnings", AttributeType::set_of(AttributeType::String)),
        ]);

        ResourceSchema::new(TYPE_NAME)
            .with_description("Registers a JFrog Platform Deployment (JPD) with Mission Control.")
            .attribute(computed("id", AttributeType::String))
            .attribute(
                AttributeSchema::new("name", types::non_empty_string())
                    .required()
                    .with_description("Name of the JPD"),
            )
            .attribute(
                AttributeSchema::new("url", jpd_url())
                    .required()
                    .with_description("URL of the JPD. Must end in '/'"),
            )
            .attribute(
                AttributeSchema::new("token", types::non_empty_string())
                    .sensitive()
                    .with_description("Join key or access token for platforms 7.0.0 and later"),
            )
            .attribute(
                AttributeSchema::new("username", types::non_empty_string())
                    .with_description("Admin username for platforms older than 7.0.0"),
            )
            .attribute(AttributeSchema::new("password", types::non_empty_string()).sensitive())
            .attribute(AttributeSchema::new("location", location).required())
            .attribute(AttributeSchema::new(
                "tags",
                AttributeType::set_of(AttributeType::String),
            ))
            .attribute(computed("base_url", AttributeType::String))
            .attribute(computed("local", AttributeType::Bool))
            .attribute(computed("licenses", AttributeType::set_of(license)))
            .attribute(computed("services", AttributeType::set_of(service)))
            .attribute(computed("status", status))
            .attribute(computed("is_cold_storage", AttributeType::Bool))
            .attribute(computed("cold_storage_jpd", AttributeType::String))
            .exactly_one_of(&["token", "username"])
            .conflicts_with("token", &["username", "password"])
            .also_requires("username", &["password"])
            .also_requires("password", &["username"])
    }

    fn identifier(&self, model: &JpdModel) -> String {
        model.id.clone().unwrap_or_default()
    }

    async fn create(&self, data: &ProviderData, plan: JpdModel) -> ProviderResult<JpdModel> {
        let request = plan.to_api_model(&data.platform_version)?;
        let url = data.client.endpoint(JPDS_ENDPOINT, &[])?;
        let response: JpdResponse = data.client.post(url, &request).await?;

        let mut model = plan;
        model.from_api_model(response);
        Ok(model)
    }

    async fn read(&self, data: &ProviderData, state: JpdModel) -> ProviderResult<JpdModel> {
        let id = state.require_id()?.to_string();
        let url = data.client.endpoint(JPD_ENDPOINT, &[("id", id.as_str())])?;
        let response: JpdResponse = data.client.get(url).await.map_err(|e| {
            if e.status() == Some(404) {
                ProviderError::not_found(format!("JPD {} not found", id)).with_cause(e)
            } else {
                ProviderError::from(e)
            }
        })?;

        let mut model = state;
        model.from_api_model(response);
        Ok(model)
    }

    async fn update(
        &self,
        data: &ProviderData,
        prior: JpdModel,
        plan: JpdModel,
    ) -> ProviderResult<JpdModel> {
        let id = prior.require_id()?;
        let request = plan.to_api_model(&data.platform_version)?;
        let url = data.client.endpoint(JPD_ENDPOINT, &[("id", id)])?;
        data.client.put_discarding(url.clone(), &request).await?;

        let response: JpdResponse = data.client.get(url).await?;
        let mut model = plan;
        model.from_api_model(response);
        Ok(model)
    }

    async fn delete(&self, data: &ProviderData, state: JpdModel) -> ProviderResult<Diagnostics> {
        let id = state.require_id()?;
        let url = data.client.endpoint(JPD_ENDPOINT, &[("id", id)])?;
        data.client.delete(url).await?;
        Ok(Diagnostics::new())
    }

    fn import_model(&self, identifier: &str) -> ProviderResult<JpdModel> {
        if identifier.is_empty() {
            return Err(ProviderError::import("Expected a JPD ID"));
        }
        Ok(JpdModel {
            id: Some(identifier.to_string()),
            ..Default::default()
        })
    }
}
