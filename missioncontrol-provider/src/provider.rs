//! Mission Control Provider implementation
//!
//! Configuration resolves the platform URL and credentials, queries the
//! platform version once and freezes the result in `ProviderData`, which
//! every resource handler then shares read-only.

use std::collections::HashMap;
use std::sync::Arc;

use missioncontrol_core::diagnostics::Diagnostics;
use missioncontrol_core::provider::{
    BoxFuture, Operation, Provider, ProviderError, ProviderResult, ResourceType,
};
use missioncontrol_core::resource::{Resource, ResourceId, State};
use missioncontrol_core::schema::ResourceSchema;
use serde::Deserialize;

use crate::client::PlatformClient;
use crate::config::{ENV_WORKLOAD_IDENTITY_TOKEN, ProviderConfig, process_env};
use crate::oidc;
use crate::resources::{
    self, ManagedResource, Registered, access_federation_mesh::AccessFederationMesh,
    access_federation_star::AccessFederationStar, jpd::Jpd, license_bucket::LicenseBucket,
};
use crate::usage::UsageReporter;

const VERSION_ENDPOINT: &str = "artifactory/api/system/version";

/// Shared, immutable state produced by provider configuration
#[derive(Debug)]
pub struct ProviderData {
    pub client: PlatformClient,
    /// Platform version reported by the version endpoint (e.g., "7.77.5")
    pub platform_version: String,
    pub usage: UsageReporter,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

/// Mission Control Provider
pub struct MissionControlProvider {
    data: Arc<ProviderData>,
}

impl MissionControlProvider {
    pub fn new(data: Arc<ProviderData>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &ProviderData {
        &self.data
    }

    /// Configure from the given block and the process environment
    pub async fn configure(config: &ProviderConfig) -> ProviderResult<(Self, Diagnostics)> {
        Self::configure_with(config, process_env).await
    }

    /// Configure with an explicit environment lookup
    ///
    /// A missing access token is reported as a warning; every other problem
    /// aborts configuration.
    pub async fn configure_with(
        config: &ProviderConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> ProviderResult<(Self, Diagnostics)> {
        let mut diagnostics = Diagnostics::new();

        config.validate()?;

        let url = config.resolve_url(&env).ok_or_else(|| {
            ProviderError::configuration(
                "While configuring the provider, the url was not found in the JFROG_URL \
                 environment variable or provider configuration block url attribute.",
            )
        })?;

        let client = PlatformClient::new(&url).map_err(|e| {
            let mut err = ProviderError::from(e).during(Operation::Configure);
            err.message = format!("Error creating HTTP client: {}", err.message);
            err
        })?;

        let oidc_token = match config.oidc_provider_name.as_deref() {
            Some(provider_name) => match env(ENV_WORKLOAD_IDENTITY_TOKEN).filter(|t| !t.is_empty())
            {
                Some(identity_token) => {
                    let token = oidc::exchange_token(&client, provider_name, &identity_token)
                        .await
                        .map_err(|e| {
                            let mut err = ProviderError::from(e).during(Operation::Configure);
                            err.message = format!("Failed OIDC ID token exchange: {}", err.message);
                            err
                        })?;
                    Some(token)
                }
                None => {
                    log::debug!(
                        "{} not set, skipping OIDC token exchange",
                        ENV_WORKLOAD_IDENTITY_TOKEN
                    );
                    None
                }
            },
            None => None,
        };

        let client = match config.resolve_access_token(oidc_token, &env) {
            Some(token) => client.with_access_token(token),
            None => {
                diagnostics.add_warning(
                    "Missing JFrog Access Token",
                    "Access Token was not found in the JFROG_ACCESS_TOKEN environment variable, \
                     provider configuration block access_token attribute, or the \
                     TFC_WORKLOAD_IDENTITY_TOKEN environment variable. Mission Control \
                     functionality will be affected.",
                );
                client
            }
        };

        let platform_version = fetch_platform_version(&client).await.map_err(|e| {
            let mut err = e.during(Operation::Configure);
            err.message = format!("Error getting Artifactory version: {}", err.message);
            err
        })?;
        log::info!("connected to {} (version {})", url, platform_version);

        let usage = UsageReporter::new(client.clone());
        usage.report(format!("Provider/{}", env!("CARGO_PKG_VERSION")));

        let data = ProviderData {
            client,
            platform_version,
            usage,
        };
        Ok((Self::new(Arc::new(data)), diagnostics))
    }
}

async fn fetch_platform_version(client: &PlatformClient) -> ProviderResult<String> {
    let url = client.endpoint(VERSION_ENDPOINT, &[])?;
    let response: VersionResponse = client.get(url).await?;
    Ok(response.version)
}

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(Registered(Jpd)),
        Box::new(Registered(LicenseBucket)),
        Box::new(Registered(AccessFederationStar)),
        Box::new(Registered(AccessFederationMesh)),
    ]
}

/// Schemas of all resource types, keyed by type name
pub fn schemas() -> HashMap<String, ResourceSchema> {
    resource_types()
        .into_iter()
        .map(|t| (t.name().to_string(), t.schema()))
        .collect()
}

fn unknown_type(resource_type: &str) -> ProviderError {
    ProviderError::validation(format!("Unknown resource type: {}", resource_type))
}

/// Route a call to the handler registered for a resource type name
macro_rules! dispatch {
    ($resource_type:expr, $handler:ident => $call:expr) => {
        match $resource_type {
            t if t == Jpd.type_name() => {
                let $handler = &Jpd;
                $call.await
            }
            t if t == LicenseBucket.type_name() => {
                let $handler = &LicenseBucket;
                $call.await
            }
            t if t == AccessFederationStar.type_name() => {
                let $handler = &AccessFederationStar;
                $call.await
            }
            t if t == AccessFederationMesh.type_name() => {
                let $handler = &AccessFederationMesh;
                $call.await
            }
            other => Err(unknown_type(other)),
        }
    };
}

impl Provider for MissionControlProvider {
    fn name(&self) -> &'static str {
        "missioncontrol"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn read(&self, state: &State) -> BoxFuture<'_, ProviderResult<State>> {
        let state = state.clone();
        Box::pin(async move {
            let data = &*self.data;
            dispatch!(state.id.resource_type.as_str(), r => resources::read(r, data, &state))
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let data = &*self.data;
            dispatch!(resource.id.resource_type.as_str(), r => resources::create(r, data, &resource))
        })
    }

    fn update(&self, from: &State, to: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move {
            let data = &*self.data;
            dispatch!(to.id.resource_type.as_str(), r => resources::update(r, data, &from, &to))
        })
    }

    fn delete(&self, state: &State) -> BoxFuture<'_, ProviderResult<Diagnostics>> {
        let state = state.clone();
        Box::pin(async move {
            let data = &*self.data;
            dispatch!(state.id.resource_type.as_str(), r => resources::delete(r, data, &state))
        })
    }

    fn import(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            let data = &*self.data;
            dispatch!(id.resource_type.as_str(), r => resources::import(r, data, &id, &identifier))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use missioncontrol_core::provider::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    async fn mount_version(server: &MockServer, token: &str) {
        Mock::given(method("GET"))
            .and(path("/artifactory/api/system/version"))
            .and(header("authorization", format!("Bearer {}", token).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "version": "7.77.5",
                "revision": "77705900",
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn configure_without_url_fails() {
        let result =
            MissionControlProvider::configure_with(&ProviderConfig::default(), env_of(&[])).await;
        let err = result.err().unwrap();
        assert_eq!(err.kind, ErrorKind::Configuration);
        assert_eq!(err.to_diagnostic().summary, "Missing URL Configuration");
    }

    #[tokio::test]
    async fn configure_uses_env_and_caches_version() {
        let server = MockServer::start().await;
        mount_version(&server, "env-token").await;

        let env = env_of(&[
            ("JFROG_URL", server.uri().as_str()),
            ("JFROG_ACCESS_TOKEN", "env-token"),
        ]);
        let (provider, diagnostics) =
            MissionControlProvider::configure_with(&ProviderConfig::default(), env)
                .await
                .unwrap();

        assert!(diagnostics.is_empty());
        assert_eq!(provider.data().platform_version, "7.77.5");
        assert_eq!(provider.resource_types().len(), 4);
    }

    #[tokio::test]
    async fn configure_without_token_warns() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/system/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "7.0.0"})))
            .mount(&server)
            .await;

        let config = ProviderConfig {
            url: Some(server.uri()),
            ..Default::default()
        };
        let (_provider, diagnostics) = MissionControlProvider::configure_with(&config, env_of(&[]))
            .await
            .unwrap();

        assert!(!diagnostics.has_error());
        let warning = diagnostics.warnings().next().unwrap();
        assert_eq!(warning.summary, "Missing JFrog Access Token");
        let requests = server.received_requests().await.unwrap();
        assert!(
            requests
                .iter()
                .all(|r| !r.headers.contains_key("authorization"))
        );
    }

    #[tokio::test]
    async fn configure_prefers_oidc_token_over_env() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/access/api/v1/oidc/token"))
            .and(body_partial_json(json!({
                "provider_name": "github",
                "subject_token": "workload-id",
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": "oidc-token"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_version(&server, "oidc-token").await;

        let config = ProviderConfig {
            url: Some(server.uri()),
            oidc_provider_name: Some("github".to_string()),
            ..Default::default()
        };
        let env = env_of(&[
            ("JFROG_ACCESS_TOKEN", "env-token"),
            ("TFC_WORKLOAD_IDENTITY_TOKEN", "workload-id"),
        ]);
        let (_, diagnostics) = MissionControlProvider::configure_with(&config, env)
            .await
            .unwrap();
        assert!(diagnostics.is_empty());
    }

    #[tokio::test]
    async fn configure_reports_version_lookup_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/system/version"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let config = ProviderConfig {
            url: Some(server.uri()),
            access_token: Some("t".to_string()),
            ..Default::default()
        };
        let err = MissionControlProvider::configure_with(&config, env_of(&[]))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind, ErrorKind::Api { status: 503 });
        assert_eq!(err.message, "Error getting Artifactory version: unavailable");
        assert_eq!(err.operation, Some(Operation::Configure));
    }

    #[tokio::test]
    async fn unknown_resource_type_is_rejected() {
        let server = MockServer::start().await;
        let provider =
            MissionControlProvider::new(crate::resources::testing::provider_data(&server, "7.0.0"));
        let err = provider
            .create(&Resource::new("repository", "r"))
            .await
            .unwrap_err();
        assert!(err.message.contains("Unknown resource type: repository"));
    }
}
