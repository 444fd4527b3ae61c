//! OAuth2 JWT-bearer token exchange (RFC 7523).

use crate::errors::{Result, TokenError};
use crate::http::success_body;
use crate::oauth::assertion::Assertion;
use serde::{Deserialize, Serialize};

/// `grant_type` value for JWT-bearer grants
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Serialize)]
struct JwtBearerForm<'a> {
    grant_type: &'static str,
    assertion: &'a str,
}

/// Successful token endpoint response
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds, as reported by the server
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Submits signed assertions to a token endpoint
#[derive(Debug, Clone)]
pub struct TokenExchangeClient {
    http_client: reqwest::Client,
    token_endpoint: String,
}

impl TokenExchangeClient {
    pub fn new(http_client: reqwest::Client, token_endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            token_endpoint: token_endpoint.into(),
        }
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Exchange `assertion` and return the parsed token response.
    ///
    /// No retry is attempted. Non-2xx answers become
    /// [`TokenError::TokenExchange`] with the server's body verbatim.
    #[tracing::instrument(skip_all, fields(endpoint = %self.token_endpoint))]
    pub async fn exchange(&self, assertion: Assertion) -> Result<TokenResponse> {
        let form = JwtBearerForm {
            grant_type: JWT_BEARER_GRANT_TYPE,
            assertion: assertion.as_str(),
        };

        let response = self
            .http_client
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|source| TokenError::Transport {
                endpoint: self.token_endpoint.clone(),
                source,
            })?;

        let body = success_body(&self.token_endpoint, response).await?;
        let token_response = parse_token_response(&self.token_endpoint, body)?;

        tracing::debug!(
            token_type = ?token_response.token_type,
            expires_in = ?token_response.expires_in,
            "token exchange succeeded"
        );
        Ok(token_response)
    }

    /// Exchange `assertion` and return only the bearer token
    pub async fn exchange_for_access_token(&self, assertion: Assertion) -> Result<String> {
        Ok(self.exchange(assertion).await?.access_token)
    }
}

fn parse_token_response(endpoint: &str, body: String) -> Result<TokenResponse> {
    let token_response: TokenResponse = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(err) => {
            return Err(TokenError::TokenResponseParse {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
                body,
            });
        }
    };

    if token_response.access_token.trim().is_empty() {
        return Err(TokenError::EmptyToken {
            endpoint: endpoint.to_string(),
        });
    }
    Ok(token_response)
}
