//! Provider configuration
//!
//! Values come from the provider configuration block and fall back to
//! environment variables.

use missioncontrol_core::provider::ProviderError;
use missioncontrol_core::schema::validate_http_url;
use serde::Deserialize;

pub const ENV_URL: &str = "JFROG_URL";
pub const ENV_ACCESS_TOKEN: &str = "JFROG_ACCESS_TOKEN";
pub const ENV_WORKLOAD_IDENTITY_TOKEN: &str = "TFC_WORKLOAD_IDENTITY_TOKEN";

/// Provider configuration block
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// Platform URL, e.g. `https://myinstance.jfrog.io`
    pub url: Option<String>,
    pub access_token: Option<String>,
    /// Name of the OIDC integration configured on the platform
    pub oidc_provider_name: Option<String>,
}

impl ProviderConfig {
    /// Check attribute values that were explicitly set
    pub fn validate(&self) -> Result<(), ProviderError> {
        if let Some(url) = &self.url
            && !url.is_empty()
        {
            validate_http_url(url).map_err(ProviderError::validation)?;
        }
        if self.access_token.as_deref() == Some("") {
            return Err(ProviderError::validation(
                "access_token: string length must be at least 1",
            ));
        }
        if self.oidc_provider_name.as_deref() == Some("") {
            return Err(ProviderError::validation(
                "oidc_provider_name: string length must be at least 1",
            ));
        }
        Ok(())
    }

    /// Platform URL: configuration first, then `JFROG_URL`
    pub fn resolve_url(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        non_empty(self.url.clone()).or_else(|| non_empty(env(ENV_URL)))
    }

    /// Access token: configuration, then the OIDC-exchanged token, then `JFROG_ACCESS_TOKEN`
    pub fn resolve_access_token(
        &self,
        oidc_token: Option<String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        non_empty(self.access_token.clone())
            .or_else(|| non_empty(oidc_token))
            .or_else(|| non_empty(env(ENV_ACCESS_TOKEN)))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Environment lookup backed by the process environment
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
