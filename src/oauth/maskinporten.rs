//! JWT-bearer grant client: claims, signing and exchange in one call.

use crate::config::MaskinportenConfig;
use crate::errors::{ConfigError, Result};
use crate::oauth::assertion::{Assertion, AssertionSigner};
use crate::oauth::claims::ClaimsBuilder;
use crate::oauth::exchange::{TokenExchangeClient, TokenResponse};

/// Obtains access tokens with self-signed grant assertions
#[derive(Debug, Clone)]
pub struct MaskinportenClient {
    client_id: String,
    claims: ClaimsBuilder,
    signer: AssertionSigner,
    exchange: TokenExchangeClient,
}

impl MaskinportenClient {
    /// Build a client from configuration.
    ///
    /// The private key is imported here, so malformed key material fails
    /// before any request is made.
    pub fn new(http_client: reqwest::Client, config: &MaskinportenConfig) -> Result<Self> {
        if config.client_id.trim().is_empty() {
            return Err(ConfigError::MissingParameter("client_id").into());
        }
        let signer = AssertionSigner::from_jwk(config.private_jwk.expose())?;
        let claims = ClaimsBuilder::new().with_lifetime(*config.assertion_lifetime.as_ref());
        let exchange = TokenExchangeClient::new(http_client, config.token_endpoint.clone());
        Ok(Self::from_parts(config.client_id.clone(), claims, signer, exchange))
    }

    pub fn from_parts(
        client_id: impl Into<String>,
        claims: ClaimsBuilder,
        signer: AssertionSigner,
        exchange: TokenExchangeClient,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            claims,
            signer,
            exchange,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Build and sign a fresh grant assertion for `scope`
    pub fn build_assertion(&self, scope: &str) -> Result<Assertion> {
        if scope.trim().is_empty() {
            return Err(ConfigError::MissingParameter("scope").into());
        }
        let claims =
            self.claims
                .grant_claims(&self.client_id, self.exchange.token_endpoint(), scope.trim());
        Ok(self.signer.sign(&claims)?)
    }

    /// Run one signing-and-exchange cycle and return the full token response
    #[tracing::instrument(skip(self), fields(client_id = %self.client_id))]
    pub async fn token_response(&self, scope: &str) -> Result<TokenResponse> {
        let assertion = self.build_assertion(scope)?;
        self.exchange.exchange(assertion).await
    }

    /// Run one signing-and-exchange cycle and return the bearer token
    pub async fn access_token(&self, scope: &str) -> Result<String> {
        Ok(self.token_response(scope).await?.access_token)
    }
}
