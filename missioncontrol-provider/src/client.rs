//! HTTP client for the JFrog platform REST API
//!
//! Wraps a `reqwest::Client` with the platform base URL, bearer
//! authentication and path-parameter expansion. Non-2xx responses keep the
//! raw response body so it can be surfaced to the user verbatim.

use missioncontrol_core::provider::ProviderError;
use reqwest::{Method, RequestBuilder, multipart::Form};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("missioncontrol-provider/", env!("CARGO_PKG_VERSION"));

/// Errors raised by the platform client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ClientError {
    /// HTTP status for non-2xx responses
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ClientError> for ProviderError {
    fn from(err: ClientError) -> Self {
        let converted = match &err {
            ClientError::Status { status, body } => ProviderError::api(*status, body.clone()),
            ClientError::Transport(e) => ProviderError::transport(e.to_string()),
            ClientError::Decode { .. } => ProviderError::conversion(err.to_string()),
            ClientError::InvalidUrl { .. } => ProviderError::configuration(err.to_string()),
        };
        converted.with_cause(err)
    }
}

/// Authenticated client bound to one platform base URL
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: Url,
    access_token: Option<String>,
}

impl PlatformClient {
    /// Build a client for the given base URL
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                url: base_url.to_string(),
                reason: "cannot be used as a base URL".to_string(),
            });
        }

        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            http,
            base_url: parsed,
            access_token: None,
        })
    }

    /// Attach a bearer token used for every subsequent request
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.access_token = if token.is_empty() { None } else { Some(token) };
        self
    }

    /// Expand an endpoint template such as `mc/api/v1/jpds/{id}`
    ///
    /// Each `{name}` segment is replaced by the matching parameter, which is
    /// percent-encoded as a single path segment.
    pub fn endpoint(&self, template: &str, params: &[(&str, &str)]) -> Result<Url, ClientError> {
        let mut segments = Vec::new();
        for segment in template.split('/').filter(|s| !s.is_empty()) {
            match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => {
                    let value = params
                        .iter()
                        .find(|(key, _)| *key == name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| ClientError::InvalidUrl {
                            url: template.to_string(),
                            reason: format!("missing path parameter '{}'", name),
                        })?;
                    segments.push(value);
                }
                None => segments.push(segment),
            }
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: "cannot be used as a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        log::debug!("{} {}", method, url);
        let builder = self
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and return the raw body of a 2xx response
    async fn send(&self, request: RequestBuilder) -> Result<String, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            log::debug!("request failed with HTTP {}: {}", status.as_u16(), body);
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn send_decoded<T: DeserializeOwned>(
        &self,
        url: Url,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|source| ClientError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Like `send_decoded`, but an empty 2xx body yields `None`
    async fn send_optional<T: DeserializeOwned>(
        &self,
        url: Url,
        request: RequestBuilder,
    ) -> Result<Option<T>, ClientError> {
        let body = self.send(request).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|source| ClientError::Decode {
                url: url.to_string(),
                source,
            })
    }

    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let request = self.request(Method::GET, url.clone());
        self.send_decoded(url, request).await
    }

    pub async fn post<B, T>(&self, url: Url, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, url.clone()).json(body);
        self.send_decoded(url, request).await
    }

    /// POST a JSON body; the response payload may be empty
    pub async fn post_optional<B, T>(&self, url: Url, body: &B) -> Result<Option<T>, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, url.clone()).json(body);
        self.send_optional(url, request).await
    }

    /// PUT a JSON body; the response payload may be empty
    pub async fn put_optional<B, T>(&self, url: Url, body: &B) -> Result<Option<T>, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::PUT, url.clone()).json(body);
        self.send_optional(url, request).await
    }

    /// POST a JSON body and ignore the response payload
    pub async fn post_discarding<B>(&self, url: Url, body: &B) -> Result<(), ClientError>
    where
        B: Serialize + ?Sized,
    {
        self.send(self.request(Method::POST, url).json(body))
            .await
            .map(|_| ())
    }

    /// PUT a JSON body and ignore the response payload
    pub async fn put_discarding<B>(&self, url: Url, body: &B) -> Result<(), ClientError>
    where
        B: Serialize + ?Sized,
    {
        self.send(self.request(Method::PUT, url).json(body))
            .await
            .map(|_| ())
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        url: Url,
        form: Form,
    ) -> Result<T, ClientError> {
        let request = self.request(Method::POST, url.clone()).multipart(form);
        self.send_decoded(url, request).await
    }

    pub async fn delete(&self, url: Url) -> Result<(), ClientError> {
        self.send(self.request(Method::DELETE, url)).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use missioncontrol_core::provider::ErrorKind;
    use serde_json::{Value, json};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn endpoint_expands_and_encodes_parameters() {
        let client = PlatformClient::new("https://example.jfrog.io/").unwrap();
        let url = client
            .endpoint("mc/api/v1/buckets/{name}", &[("name", "my bucket/1")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.jfrog.io/mc/api/v1/buckets/my%20bucket%2F1"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let client = PlatformClient::new("https://example.com/jfrog").unwrap();
        let url = client.endpoint("mc/api/v1/jpds", &[]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/jfrog/mc/api/v1/jpds");
    }

    #[test]
    fn endpoint_rejects_missing_parameter() {
        let client = PlatformClient::new("https://example.com").unwrap();
        let err = client.endpoint("mc/api/v1/jpds/{id}", &[]).unwrap_err();
        assert!(err.to_string().contains("missing path parameter 'id'"));
    }

    #[test]
    fn new_rejects_non_base_url() {
        assert!(PlatformClient::new("mailto:someone@example.com").is_err());
        assert!(PlatformClient::new("not a url").is_err());
    }

    #[tokio::test]
    async fn get_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/system/version"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "7.77.5"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = PlatformClient::new(&server.uri())
            .unwrap()
            .with_access_token("secret");
        let url = client.endpoint("artifactory/api/system/version", &[]).unwrap();
        let body: Value = client.get(url).await.unwrap();
        assert_eq!(body["version"], "7.77.5");
    }

    #[tokio::test]
    async fn optional_body_tolerates_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/mc/api/v1/federation/JPD-1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/mc/api/v1/federation/JPD-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"label": "a"}])))
            .mount(&server)
            .await;

        let client = PlatformClient::new(&server.uri()).unwrap();
        let empty = client
            .endpoint("mc/api/v1/federation/{id}", &[("id", "JPD-1")])
            .unwrap();
        let body: Option<Value> = client.put_optional(empty, &json!([])).await.unwrap();
        assert!(body.is_none());

        let filled = client
            .endpoint("mc/api/v1/federation/{id}", &[("id", "JPD-2")])
            .unwrap();
        let body: Option<Value> = client.put_optional(filled, &json!([])).await.unwrap();
        assert_eq!(body, Some(json!([{"label": "a"}])));
    }

    #[tokio::test]
    async fn non_success_keeps_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(409).set_body_string("{\"errors\":[\"in use\"]}"))
            .mount(&server)
            .await;

        let client = PlatformClient::new(&server.uri()).unwrap();
        let url = client
            .endpoint("mc/api/v1/buckets/{name}", &[("name", "b")])
            .unwrap();
        let err = client.delete(url).await.unwrap_err();
        assert_eq!(err.status(), Some(409));

        let provider_err = ProviderError::from(err);
        assert_eq!(provider_err.kind, ErrorKind::Api { status: 409 });
        assert_eq!(provider_err.message, "{\"errors\":[\"in use\"]}");
    }

    #[tokio::test]
    async fn undecodable_body_is_conversion_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = PlatformClient::new(&server.uri()).unwrap();
        let url = client.endpoint("mc/api/v1/jpds", &[]).unwrap();
        let err = client.get::<Value>(url).await.unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
        assert_eq!(ProviderError::from(err).kind, ErrorKind::Conversion);
    }
}
