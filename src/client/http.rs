//! Thin HTTP wrapper around the account endpoints.

use reqwest::{Client, Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::session::SessionError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Deserialize)]
struct TokenField {
    token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPairBody {
    bearer_token: Option<TokenField>,
    refresh_token: Option<TokenField>,
}

impl TokenPairBody {
    fn into_tokens(self) -> Result<Tokens, SessionError> {
        let access_token = self.bearer_token.and_then(|t| t.token);
        let refresh_token = self.refresh_token.and_then(|t| t.token);
        match (access_token, refresh_token) {
            (Some(access_token), Some(refresh_token)) => Ok(Tokens {
                access_token,
                refresh_token,
            }),
            _ => Err(SessionError::MalformedResponse(
                "token pair missing from response".to_string(),
            )),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// HTTP client for the account API.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base: Url) -> Result<Self, SessionError> {
        let client = Client::builder()
            .user_agent(concat!("cinedex-client/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, base })
    }

    /// Underlying client, for building requests to pass to
    /// [`super::SessionClient::perform_authenticated_request`].
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Resolve a path such as `/people/nm0000206` against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, SessionError> {
        Ok(self.base.join(path)?)
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<(), SessionError> {
        debug!("Registering user: {}", email);
        let response = self
            .client
            .post(self.endpoint("/user/register")?)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        check_status(response).await?;
        info!("Registered user {}", email);
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Tokens, SessionError> {
        self.login_with_ttl(email, password, None, None).await
    }

    /// Log in with explicit token lifetimes in seconds.
    pub async fn login_with_ttl(
        &self,
        email: &str,
        password: &str,
        bearer_ttl: Option<u64>,
        refresh_ttl: Option<u64>,
    ) -> Result<Tokens, SessionError> {
        debug!("Signing in user: {}", email);
        let mut body = json!({ "email": email, "password": password });
        if let Some(ttl) = bearer_ttl {
            body["bearerExpiresInSeconds"] = json!(ttl);
        }
        if let Some(ttl) = refresh_ttl {
            body["refreshExpiresInSeconds"] = json!(ttl);
        }

        let response = self
            .client
            .post(self.endpoint("/user/login")?)
            .json(&body)
            .send()
            .await?;
        let body: TokenPairBody = check_status(response).await?.json().await?;
        info!("Sign in successful for {}", email);
        body.into_tokens()
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Tokens, SessionError> {
        debug!("Refreshing access token");
        let response = self
            .client
            .post(self.endpoint("/user/refresh")?)
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await?;
        let body: TokenPairBody = check_status(response).await?.json().await?;
        body.into_tokens()
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), SessionError> {
        let response = self
            .client
            .post(self.endpoint("/user/logout")?)
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn execute(&self, request: Request) -> Result<Response, SessionError> {
        Ok(self.client.execute(request).await?)
    }
}

/// Turn a non-success response into [`SessionError::Api`], keeping the
/// server's `message` when there is one.
async fn check_status(response: Response) -> Result<Response, SessionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
    if status != StatusCode::UNAUTHORIZED {
        warn!("API error: {} - {}", status, message);
    }
    Err(SessionError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_pair_body_requires_both_tokens() {
        let body: TokenPairBody = serde_json::from_str(
            r#"{"bearerToken":{"token":"a","token_type":"Bearer","expires_in":600},
                "refreshToken":{"token":"r","token_type":"Refresh","expires_in":86400}}"#,
        )
        .unwrap();
        assert_eq!(
            body.into_tokens().unwrap(),
            Tokens {
                access_token: "a".to_string(),
                refresh_token: "r".to_string(),
            }
        );

        let body: TokenPairBody =
            serde_json::from_str(r#"{"bearerToken":{"token":"a"}}"#).unwrap();
        assert!(matches!(
            body.into_tokens(),
            Err(SessionError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_endpoint_joins_base() {
        let api = ApiClient::new(Url::parse("http://127.0.0.1:3000").unwrap()).unwrap();
        assert_eq!(
            api.endpoint("/user/login").unwrap().as_str(),
            "http://127.0.0.1:3000/user/login"
        );
    }
}
