//! OIDC workload identity token exchange

use serde::{Deserialize, Serialize};

use crate::client::{ClientError, PlatformClient};

const TOKEN_ENDPOINT: &str = "access/api/v1/oidc/token";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
const SUBJECT_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:id_token";

#[derive(Debug, Serialize)]
struct TokenExchangeRequest<'a> {
    grant_type: &'a str,
    subject_token_type: &'a str,
    subject_token: &'a str,
    provider_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: String,
}

/// Trade a workload identity token for a platform access token
pub async fn exchange_token(
    client: &PlatformClient,
    provider_name: &str,
    identity_token: &str,
) -> Result<String, ClientError> {
    let url = client.endpoint(TOKEN_ENDPOINT, &[])?;
    let request = TokenExchangeRequest {
        grant_type: GRANT_TYPE,
        subject_token_type: SUBJECT_TOKEN_TYPE,
        subject_token: identity_token,
        provider_name,
    };
    let response: TokenExchangeResponse = client.post(url, &request).await?;
    Ok(response.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn exchange_returns_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/access/api/v1/oidc/token"))
            .and(body_partial_json(json!({
                "provider_name": "github",
                "subject_token": "id-token",
                "grant_type": GRANT_TYPE,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "exchanged",
                "token_type": "Bearer",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = PlatformClient::new(&server.uri()).unwrap();
        let token = exchange_token(&client, "github", "id-token").await.unwrap();
        assert_eq!(token, "exchanged");
    }

    #[tokio::test]
    async fn exchange_surfaces_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad identity token"))
            .mount(&server)
            .await;

        let client = PlatformClient::new(&server.uri()).unwrap();
        let err = exchange_token(&client, "github", "id-token").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }
}
