//! Managed resources
//!
//! Each resource module defines a typed model, its conversion to and from
//! the REST payloads, and a `ManagedResource` implementation. The generic
//! functions below adapt a `ManagedResource` to the attribute-map based
//! `Provider` contract: usage reporting, validation, decoding and error
//! annotation happen here once for every resource.

pub mod access_federation_mesh;
pub mod access_federation_star;
pub mod jpd;
pub mod license_bucket;

use async_trait::async_trait;
use missioncontrol_core::diagnostics::Diagnostics;
use missioncontrol_core::provider::{Operation, ProviderError, ProviderResult, ResourceType};
use missioncontrol_core::resource::{Attributes, Resource, ResourceId, State};
use missioncontrol_core::schema::{ResourceSchema, validate_http_url};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::provider::ProviderData;

/// Typed lifecycle of one resource type
#[async_trait]
pub trait ManagedResource: Send + Sync {
    /// Local model as stored in state
    type Model: Serialize + DeserializeOwned + Send + Sync;

    fn type_name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    /// Remote identity recorded alongside the state
    fn identifier(&self, model: &Self::Model) -> String;

    async fn create(&self, data: &ProviderData, plan: Self::Model) -> ProviderResult<Self::Model>;

    async fn read(&self, data: &ProviderData, state: Self::Model) -> ProviderResult<Self::Model>;

    async fn update(
        &self,
        data: &ProviderData,
        prior: Self::Model,
        plan: Self::Model,
    ) -> ProviderResult<Self::Model>;

    async fn delete(&self, data: &ProviderData, state: Self::Model) -> ProviderResult<Diagnostics>;

    /// Partial model built from an import identifier, completed by a read
    fn import_model(&self, identifier: &str) -> ProviderResult<Self::Model>;
}

/// Exposes a `ManagedResource` through the object-safe `ResourceType`
pub struct Registered<R>(pub R);

impl<R: ManagedResource> ResourceType for Registered<R> {
    fn name(&self) -> &'static str {
        self.0.type_name()
    }

    fn schema(&self) -> ResourceSchema {
        self.0.schema()
    }
}

pub async fn create<R: ManagedResource>(
    resource: &R,
    data: &ProviderData,
    desired: &Resource,
) -> ProviderResult<State> {
    data.usage
        .report_operation(resource.type_name(), Operation::Create);
    let result = async {
        let plan = decode_plan(resource, &desired.attributes)?;
        let created = resource.create(data, plan).await?;
        encode_state(resource, &desired.id, &created)
    }
    .await;
    result.map_err(|e| e.during(Operation::Create).for_resource(desired.id.clone()))
}

pub async fn read<R: ManagedResource>(
    resource: &R,
    data: &ProviderData,
    current: &State,
) -> ProviderResult<State> {
    data.usage.report_operation(resource.type_name(), Operation::Read);
    let result = async {
        let model = decode_state(resource, &current.attributes)?;
        let refreshed = resource.read(data, model).await?;
        encode_state(resource, &current.id, &refreshed)
    }
    .await;
    result.map_err(|e| e.during(Operation::Read).for_resource(current.id.clone()))
}

pub async fn update<R: ManagedResource>(
    resource: &R,
    data: &ProviderData,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    data.usage
        .report_operation(resource.type_name(), Operation::Update);
    let result = async {
        let plan = decode_plan(resource, &to.attributes)?;
        let prior = decode_state(resource, &from.attributes)?;
        let updated = resource.update(data, prior, plan).await?;
        encode_state(resource, &to.id, &updated)
    }
    .await;
    result.map_err(|e| e.during(Operation::Update).for_resource(to.id.clone()))
}

pub async fn delete<R: ManagedResource>(
    resource: &R,
    data: &ProviderData,
    current: &State,
) -> ProviderResult<Diagnostics> {
    data.usage
        .report_operation(resource.type_name(), Operation::Delete);
    let result = async {
        let model = decode_state(resource, &current.attributes)?;
        resource.delete(data, model).await
    }
    .await;
    result.map_err(|e| e.during(Operation::Delete).for_resource(current.id.clone()))
}

pub async fn import<R: ManagedResource>(
    resource: &R,
    data: &ProviderData,
    id: &ResourceId,
    identifier: &str,
) -> ProviderResult<State> {
    data.usage
        .report_operation(resource.type_name(), Operation::Import);
    let result = async {
        let partial = resource
            .import_model(identifier)
            .map_err(|e| e.during(Operation::Import))?;
        let model = resource
            .read(data, partial)
            .await
            .map_err(|e| e.during(Operation::Read))?;
        encode_state(resource, id, &model)
    }
    .await;
    result.map_err(|e| e.during(Operation::Import).for_resource(id.clone()))
}

/// Validate configuration against the schema, then decode it
fn decode_plan<R: ManagedResource>(resource: &R, attributes: &Attributes) -> ProviderResult<R::Model> {
    resource.schema().validate(attributes).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        ProviderError::validation(messages.join("; "))
    })?;
    serde_json::from_value(Value::Object(attributes.clone()))
        .map_err(|e| ProviderError::validation(format!("invalid configuration: {}", e)))
}

fn decode_state<R: ManagedResource>(
    _resource: &R,
    attributes: &Attributes,
) -> ProviderResult<R::Model> {
    serde_json::from_value(Value::Object(attributes.clone()))
        .map_err(|e| ProviderError::conversion(format!("invalid recorded state: {}", e)))
}

fn encode_state<R: ManagedResource>(
    resource: &R,
    id: &ResourceId,
    model: &R::Model,
) -> ProviderResult<State> {
    let value = serde_json::to_value(model)
        .map_err(|e| ProviderError::conversion(format!("failed to encode state: {}", e)))?;
    let Value::Object(mut attributes) = value else {
        return Err(ProviderError::conversion("state model is not an object"));
    };
    attributes.retain(|_, v| !v.is_null());
    Ok(State::existing(id.clone(), attributes).with_identifier(resource.identifier(model)))
}

/// Federation relationships cannot be removed through the REST API
pub(crate) fn unsupported_federation_delete() -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    diagnostics.add_warning(
        "Access Federation deletion not supported",
        "The resource has been removed from state. To delete the Access Federation \
         relationship, please use the JFrog UI.",
    );
    diagnostics
}

/// Check an http(s) URL against an additional pattern
pub(crate) fn validate_url_pattern(value: &str, pattern: &str, message: &str) -> Result<(), String> {
    validate_http_url(value)?;
    match Regex::new(pattern) {
        Ok(re) if re.is_match(value) => Ok(()),
        _ => Err(format!("Invalid URL '{}': {}", value, message)),
    }
}

/// Deserialize `null` as the type's default
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use wiremock::MockServer;

    use crate::client::PlatformClient;
    use crate::provider::ProviderData;
    use crate::usage::UsageReporter;

    /// Provider data pointed at a mock server
    pub fn provider_data(server: &MockServer, platform_version: &str) -> Arc<ProviderData> {
        let client = PlatformClient::new(&server.uri())
            .unwrap()
            .with_access_token("test-token");
        Arc::new(ProviderData {
            usage: UsageReporter::new(client.clone()),
            client,
            platform_version: platform_version.to_string(),
        })
    }
}
