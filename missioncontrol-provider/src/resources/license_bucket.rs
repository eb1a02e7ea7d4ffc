//! License buckets
//!
//! A bucket is loaded either from a signed URL or from a local license
//! file. The platform has no update endpoint, so every configurable
//! attribute forces replacement.

use std::path::Path;

use async_trait::async_trait;
use missioncontrol_core::diagnostics::Diagnostics;
use missioncontrol_core::provider::{ProviderError, ProviderResult};
use missioncontrol_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use super::{ManagedResource, nullable};
use crate::provider::ProviderData;

pub const TYPE_NAME: &str = "license_bucket";

const BUCKETS_ENDPOINT: &str = "mc/api/v1/buckets";
const BUCKET_ENDPOINT: &str = "mc/api/v1/buckets/{name}";

/// License bucket as recorded in state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseBucketModel {
    pub id: Option<String>,
    pub name: String,
    /// Signed URL of the bucket
    pub url: Option<String>,
    /// Path to a local license bucket file
    pub file: Option<String>,
    pub key: String,

    pub subject: Option<String>,
    pub product_name: Option<String>,
    pub product_id: Option<i64>,
    pub license_type: Option<String>,
    pub issued_date: Option<String>,
    pub valid_date: Option<String>,
    pub quantity: Option<i64>,
    pub signature: Option<String>,
    pub used: Option<i64>,
}

/// Where the bucket content comes from
#[derive(Debug, PartialEq)]
pub enum LicenseSource<'a> {
    Url(&'a str),
    File(&'a Path),
}

#[derive(Debug, Serialize)]
pub struct LicenseBucketRequest<'a> {
    pub name: &'a str,
    pub url: &'a str,
    pub key: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LicenseBucketResponse {
    #[serde(rename = "identifier", deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub subject: String,
    #[serde(deserialize_with = "nullable")]
    pub product_name: String,
    pub product_id: i64,
    #[serde(deserialize_with = "nullable")]
    pub license_type: String,
    #[serde(deserialize_with = "nullable")]
    pub issued_date: String,
    #[serde(deserialize_with = "nullable")]
    pub valid_date: String,
    pub quantity: i64,
    #[serde(deserialize_with = "nullable")]
    pub signature: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub used: i64,
    #[serde(deserialize_with = "nullable")]
    pub url: String,
}

/// Entry of the bucket listing
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LicenseBucketSummary {
    pub identifier: String,
    pub name: String,
    pub size: i64,
    pub license_type: String,
}

impl LicenseBucketModel {
    /// Exactly one of `url` or `file` must be set
    pub fn source(&self) -> ProviderResult<LicenseSource<'_>> {
        let url = self.url.as_deref().filter(|u| !u.is_empty());
        let file = self.file.as_deref().filter(|f| !f.is_empty());
        match (url, file) {
            (Some(url), None) => Ok(LicenseSource::Url(url)),
            (None, Some(file)) => Ok(LicenseSource::File(Path::new(file))),
            (Some(_), Some(_)) => Err(ProviderError::validation(
                "url and file can't be set together",
            )),
            (None, None) => Err(ProviderError::validation(
                "exactly one of url or file must be set",
            )),
        }
    }

    /// Refresh from a create response; the signed URL, file and key stay as planned
    pub fn from_api_model(&mut self, response: LicenseBucketResponse) {
        self.id = Some(response.id);
        if !response.name.is_empty() {
            self.name = response.name;
        }
        self.subject = Some(response.subject);
        self.product_name = Some(response.product_name);
        self.product_id = Some(response.product_id);
        self.license_type = Some(response.license_type);
        self.issued_date = Some(response.issued_date);
        self.valid_date = Some(response.valid_date);
        self.quantity = Some(response.quantity);
        self.signature = Some(response.signature);
        self.used = Some(response.used);
    }

    /// Refresh from the listing entry matching this bucket's name
    pub fn from_summary(&mut self, summary: LicenseBucketSummary) {
        if !summary.identifier.is_empty() {
            self.id = Some(summary.identifier);
        }
        self.name = summary.name;
        self.quantity = Some(summary.size);
        self.license_type = Some(summary.license_type);
    }
}

async fn multipart_form(path: &Path, name: &str, key: &str) -> ProviderResult<Form> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        ProviderError::validation(format!("failed to read {}: {}", path.display(), e))
            .with_cause(e)
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("application/octet-stream")
        .map_err(|e| ProviderError::transport(e.to_string()).with_cause(e))?;

    Ok(Form::new()
        .part("file", part)
        .text("name", name.to_string())
        .text("key", key.to_string()))
}

fn replace_on_change(attribute: AttributeSchema) -> AttributeSchema {
    attribute.requires_replace()
}

pub struct LicenseBucket;

#[async_trait]
impl ManagedResource for LicenseBucket {
    type Model = LicenseBucketModel;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        let computed = |name: &str, t: AttributeType| AttributeSchema::new(name, t).computed();
        ResourceSchema::new(TYPE_NAME)
            .with_description("Provides a Mission Control license bucket.")
            .attribute(computed("id", AttributeType::String))
            .attribute(replace_on_change(
                AttributeSchema::new("name", types::non_empty_string())
                    .required()
                    .with_description("Name of the license bucket"),
            ))
            .attribute(replace_on_change(
                AttributeSchema::new("url", types::http_url())
                    .with_description("Signed URL of the license bucket. Can't be set together with `file`."),
            ))
            .attribute(replace_on_change(
                AttributeSchema::new("file", types::non_empty_string())
                    .with_description("File path to the license bucket. Can't be set together with `url`."),
            ))
            .attribute(replace_on_change(
                AttributeSchema::new("key", types::non_empty_string())
                    .required()
                    .sensitive()
                    .with_description("License bucket key."),
            ))
            .attribute(computed("subject", AttributeType::String))
            .attribute(computed("product_name", AttributeType::String))
            .attribute(computed("product_id", AttributeType::Int))
            .attribute(computed("license_type", AttributeType::String))
            .attribute(computed("issued_date", AttributeType::String))
            .attribute(computed("valid_date", AttributeType::String))
            .attribute(computed("quantity", AttributeType::Int))
            .attribute(computed("signature", AttributeType::String))
            .attribute(computed("used", AttributeType::Int))
            .exactly_one_of(&["url", "file"])
    }

    fn identifier(&self, model: &LicenseBucketModel) -> String {
        model.name.clone()
    }

    async fn create(
        &self,
        data: &ProviderData,
        plan: LicenseBucketModel,
    ) -> ProviderResult<LicenseBucketModel> {
        let url = data.client.endpoint(BUCKETS_ENDPOINT, &[])?;
        let response: LicenseBucketResponse = match plan.source()? {
            LicenseSource::Url(signed_url) => {
                let request = LicenseBucketRequest {
                    name: &plan.name,
                    url: signed_url,
                    key: &plan.key,
                };
                data.client.post(url, &request).await?
            }
            LicenseSource::File(path) => {
                let form = multipart_form(path, &plan.name, &plan.key).await?;
                data.client.post_multipart(url, form).await?
            }
        };

        let mut model = plan;
        model.from_api_model(response);
        Ok(model)
    }

    async fn read(
        &self,
        data: &ProviderData,
        state: LicenseBucketModel,
    ) -> ProviderResult<LicenseBucketModel> {
        let url = data.client.endpoint(BUCKETS_ENDPOINT, &[])?;
        let buckets: Vec<LicenseBucketSummary> = data.client.get(url).await?;
        let matched = buckets
            .into_iter()
            .find(|b| b.name == state.name)
            .ok_or_else(|| {
                ProviderError::not_found(format!("bucket {} can't be found", state.name))
            })?;

        let mut model = state;
        model.from_summary(matched);
        Ok(model)
    }

    /// Every configurable attribute forces replacement; nothing to send
    async fn update(
        &self,
        _data: &ProviderData,
        prior: LicenseBucketModel,
        _plan: LicenseBucketModel,
    ) -> ProviderResult<LicenseBucketModel> {
        Ok(prior)
    }

    async fn delete(
        &self,
        data: &ProviderData,
        state: LicenseBucketModel,
    ) -> ProviderResult<Diagnostics> {
        let url = data
            .client
            .endpoint(BUCKET_ENDPOINT, &[("name", state.name.as_str())])?;
        data.client.delete(url).await?;
        Ok(Diagnostics::new())
    }

    fn import_model(&self, identifier: &str) -> ProviderResult<LicenseBucketModel> {
        if identifier.is_empty() {
            return Err(ProviderError::import("Expected a license bucket name"));
        }
        Ok(LicenseBucketModel {
            name: identifier.to_string(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MissionControlProvider;
    use crate::resources::testing::provider_data;
    use missioncontrol_core::provider::{ErrorKind, Operation, Provider};
    use missioncontrol_core::resource::{Resource, ResourceId, State};
    use serde_json::{Value, json};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn bucket_response() -> Value {
        json!({
            "identifier": "B-100",
            "subject": "Example Corp",
            "product_name": "JFrog Enterprise Plus",
            "product_id": 5,
            "license_type": "ENTERPRISE_PLUS",
            "issued_date": "2026-01-01",
            "valid_date": "2027-01-01",
            "quantity": 10,
            "signature": "sig",
            "name": "prod-bucket",
            "used": 2,
            "url": "https://signed.example.com/bucket"
        })
    }

    fn resource(attrs: Value) -> Resource {
        Resource::new(TYPE_NAME, "prod").with_attributes(attrs.as_object().cloned().unwrap())
    }

    #[test]
    fn source_requires_exactly_one() {
        let mut model = LicenseBucketModel {
            url: Some("https://signed.example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(
            model.source().unwrap(),
            LicenseSource::Url("https://signed.example.com")
        );

        model.file = Some("/tmp/license.lic".to_string());
        assert_eq!(model.source().unwrap_err().kind, ErrorKind::Validation);

        model.url = None;
        model.file = None;
        assert_eq!(model.source().unwrap_err().kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn create_from_url_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mc/api/v1/buckets"))
            .and(body_json(json!({
                "name": "prod-bucket",
                "url": "https://signed.example.com/bucket",
                "key": "bucket-key"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(bucket_response()))
            .expect(1)
            .mount(&server)
            .await;

        let provider = MissionControlProvider::new(provider_data(&server, "7.77.5"));
        let state = provider
            .create(&resource(json!({
                "name": "prod-bucket",
                "url": "https://signed.example.com/bucket",
                "key": "bucket-key"
            })))
            .await
            .unwrap();

        assert_eq!(state.identifier.as_deref(), Some("prod-bucket"));
        assert_eq!(state.attributes["id"], "B-100");
        assert_eq!(state.attributes["quantity"], 10);
        assert_eq!(state.attributes["key"], "bucket-key");
        assert!(state.attributes.get("file").is_none());
    }

    #[tokio::test]
    async fn create_from_file_uploads_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("license.lic");
        std::fs::write(&file, b"LICENSE-CONTENT").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mc/api/v1/buckets"))
            .and(|request: &Request| {
                let content_type = request
                    .headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                let body = String::from_utf8_lossy(&request.body);
                content_type.starts_with("multipart/form-data")
                    && body.contains("filename=\"license.lic\"")
                    && body.contains("LICENSE-CONTENT")
                    && body.contains("name=\"key\"")
            })
            .respond_with(ResponseTemplate::new(200).set_body_json(bucket_response()))
            .expect(1)
            .mount(&server)
            .await;

        let provider = MissionControlProvider::new(provider_data(&server, "7.77.5"));
        let state = provider
            .create(&resource(json!({
                "name": "prod-bucket",
                "file": file.to_string_lossy(),
                "key": "bucket-key"
            })))
            .await
            .unwrap();
        assert_eq!(state.attributes["subject"], "Example Corp");
    }

    #[tokio::test]
    async fn create_rejects_both_or_neither_source_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mc/api/v1/buckets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bucket_response()))
            .expect(0)
            .mount(&server)
            .await;

        let provider = MissionControlProvider::new(provider_data(&server, "7.77.5"));
        for attrs in [
            json!({"name": "b", "key": "k"}),
            json!({"name": "b", "key": "k", "url": "https://signed.example.com", "file": "/tmp/x"}),
        ] {
            let err = provider.create(&resource(attrs)).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation);
            assert_eq!(err.to_diagnostic().summary, "Unable to Create Resource");
        }
    }

    #[tokio::test]
    async fn read_matches_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mc/api/v1/buckets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"identifier": "B-1", "name": "other", "size": 1, "license_type": "EDGE"},
                {"identifier": "B-100", "name": "prod-bucket", "size": 25, "license_type": "ENTERPRISE_PLUS"}
            ])))
            .mount(&server)
            .await;

        let provider = MissionControlProvider::new(provider_data(&server, "7.77.5"));
        let state = State::existing(
            ResourceId::new(TYPE_NAME, "prod"),
            json!({"name": "prod-bucket", "key": "k", "quantity": 10})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let refreshed = provider.read(&state).await.unwrap();
        assert_eq!(refreshed.attributes["quantity"], 25);
        assert_eq!(refreshed.attributes["license_type"], "ENTERPRISE_PLUS");
        assert_eq!(refreshed.attributes["key"], "k");

        let missing = State::existing(
            ResourceId::new(TYPE_NAME, "gone"),
            json!({"name": "gone-bucket"}).as_object().cloned().unwrap(),
        );
        let err = provider.read(&missing).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.message, "bucket gone-bucket can't be found");
        assert_eq!(err.operation, Some(Operation::Read));
    }

    #[tokio::test]
    async fn update_is_a_no_op() {
        let server = MockServer::start().await;
        let provider = MissionControlProvider::new(provider_data(&server, "7.77.5"));
        let prior = State::existing(
            ResourceId::new(TYPE_NAME, "prod"),
            json!({"id": "B-100", "name": "prod-bucket", "key": "k", "url": "https://a.example.com"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let state = provider
            .update(
                &prior,
                &resource(json!({"name": "prod-bucket", "key": "k", "url": "https://a.example.com"})),
            )
            .await
            .unwrap();
        assert_eq!(state.attributes, prior.attributes);
    }

    #[tokio::test]
    async fn delete_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/mc/api/v1/buckets/prod-bucket"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let provider = MissionControlProvider::new(provider_data(&server, "7.77.5"));
        let state = State::existing(
            ResourceId::new(TYPE_NAME, "prod"),
            json!({"name": "prod-bucket"}).as_object().cloned().unwrap(),
        );
        assert!(provider.delete(&state).await.unwrap().is_empty());
    }

    #[test]
    fn every_configurable_attribute_forces_replacement() {
        let schema = LicenseBucket.schema();
        for name in ["name", "url", "file", "key"] {
            assert!(schema.requires_replace(name), "{}", name);
        }
        assert!(!schema.requires_replace("quantity"));
    }
}
