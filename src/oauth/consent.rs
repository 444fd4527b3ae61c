//! Consent-scoped token orchestration.
//!
//! Binds an access token to one previously approved consent request through
//! the `authorization_details` claim of the assertion.

use async_trait::async_trait;

use crate::config::MaskinportenConfig;
use crate::errors::{ConfigError, Result, TokenError};
use crate::oauth::assertion::{Assertion, AssertionSigner};
use crate::oauth::claims::{ClaimsBuilder, person_urn};
use crate::oauth::exchange::{TokenExchangeClient, TokenResponse};

/// Creates consent requests in the external consent service
#[async_trait]
pub trait ConsentRequestCreator: Send + Sync {
    /// Create a consent request from `from_person_id` and return its identifier
    async fn create_consent_request(
        &self,
        from_person_id: &str,
    ) -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

/// Parameters of one consent token request
#[derive(Debug, Clone, Copy)]
pub struct ConsentTokenRequest<'a> {
    pub consent_request_id: &'a str,
    /// National identity number or person URN of the consenting party
    pub from_person_id: &'a str,
    /// Organization number for on-behalf-of exchanges
    pub consumer_org: Option<&'a str>,
}

/// Access token together with the consent request it is bound to
#[derive(Clone)]
pub struct ConsentToken {
    pub consent_request_id: String,
    pub access_token: String,
}

impl std::fmt::Debug for ConsentToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsentToken")
            .field("consent_request_id", &self.consent_request_id)
            .finish_non_exhaustive()
    }
}

/// Composes claims, signing and exchange for consent authorization tokens
#[derive(Debug, Clone)]
pub struct ConsentTokenOrchestrator {
    client_id: String,
    audience: String,
    claims: ClaimsBuilder,
    signer: AssertionSigner,
    exchange: TokenExchangeClient,
}

impl ConsentTokenOrchestrator {
    pub fn new(http_client: reqwest::Client, config: &MaskinportenConfig) -> Result<Self> {
        if config.client_id.trim().is_empty() {
            return Err(ConfigError::MissingParameter("client_id").into());
        }
        let signer = AssertionSigner::from_jwk(config.private_jwk.expose())?;
        let claims = ClaimsBuilder::new().with_lifetime(*config.assertion_lifetime.as_ref());
        let exchange = TokenExchangeClient::new(http_client, config.token_endpoint.clone());
        Ok(Self::from_parts(
            config.client_id.clone(),
            config.audience.clone(),
            claims,
            signer,
            exchange,
        ))
    }

    pub fn from_parts(
        client_id: impl Into<String>,
        audience: impl Into<String>,
        claims: ClaimsBuilder,
        signer: AssertionSigner,
        exchange: TokenExchangeClient,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            audience: audience.into(),
            claims,
            signer,
            exchange,
        }
    }

    /// Build and sign a fresh consent authorization assertion
    pub fn build_assertion(&self, request: &ConsentTokenRequest<'_>) -> Result<Assertion> {
        if request.consent_request_id.trim().is_empty() {
            return Err(ConfigError::MissingParameter("consent_request_id").into());
        }
        if request.from_person_id.trim().is_empty() {
            return Err(ConfigError::MissingParameter("from_person_id").into());
        }
        let consumer_org = request
            .consumer_org
            .map(str::trim)
            .filter(|org| !org.is_empty());

        let claims = self.claims.consent_claims(
            &self.client_id,
            &self.audience,
            request.consent_request_id.trim(),
            &person_urn(request.from_person_id),
            consumer_org,
        );
        Ok(self.signer.sign(&claims)?)
    }

    /// Exchange a consent authorization assertion for a token response
    #[tracing::instrument(skip_all, fields(consent_request_id = %request.consent_request_id))]
    pub async fn token_response(&self, request: &ConsentTokenRequest<'_>) -> Result<TokenResponse> {
        let assertion = self.build_assertion(request)?;
        self.exchange.exchange(assertion).await
    }

    /// Exchange a consent authorization assertion for a bearer token
    pub async fn consent_token(&self, request: &ConsentTokenRequest<'_>) -> Result<String> {
        Ok(self.token_response(request).await?.access_token)
    }

    /// Create a consent request through `creator`, then exchange a token bound to it
    pub async fn create_and_exchange(
        &self,
        creator: &dyn ConsentRequestCreator,
        from_person_id: &str,
        consumer_org: Option<&str>,
    ) -> Result<ConsentToken> {
        if from_person_id.trim().is_empty() {
            return Err(ConfigError::MissingParameter("from_person_id").into());
        }

        let consent_request_id = creator
            .create_consent_request(from_person_id)
            .await
            .map_err(|e| TokenError::ConsentRequestFailed(e.to_string()))?;
        tracing::info!(%consent_request_id, "consent request created");

        let access_token = self
            .consent_token(&ConsentTokenRequest {
                consent_request_id: &consent_request_id,
                from_person_id,
                consumer_org,
            })
            .await?;

        Ok(ConsentToken {
            consent_request_id,
            access_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::claims::ConsentAuthorizationClaims;
    use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

    const RSA_JWK: &str = include_str!("../../tests/fixtures/rsa_private_jwk.json");

    struct FailingCreator;

    #[async_trait]
    impl ConsentRequestCreator for FailingCreator {
        async fn create_consent_request(
            &self,
            _from_person_id: &str,
        ) -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>> {
            Err("consent service unavailable".into())
        }
    }

    fn orchestrator() -> ConsentTokenOrchestrator {
        let config = MaskinportenConfig::new("client-id", RSA_JWK)
            .with_token_endpoint("http://127.0.0.1:9/token")
            .with_audience("https://test.maskinporten.no/");
        ConsentTokenOrchestrator::new(reqwest::Client::new(), &config).unwrap()
    }

    fn decode_claims(assertion: &Assertion) -> ConsentAuthorizationClaims {
        let jwk: serde_json::Value = serde_json::from_str(RSA_JWK).unwrap();
        let key = DecodingKey::from_rsa_components(jwk["n"].as_str().unwrap(), jwk["e"].as_str().unwrap())
            .unwrap();
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&["https://test.maskinporten.no/"]);
        decode::<ConsentAuthorizationClaims>(assertion.as_str(), &key, &validation)
            .unwrap()
            .claims
    }

    #[test]
    fn test_from_is_person_urn() {
        let assertion = orchestrator()
            .build_assertion(&ConsentTokenRequest {
                consent_request_id: "0195c4a2-9d1e-7a0b-a2c4-2f4a3f1b9e10",
                from_person_id: "21818297804",
                consumer_org: None,
            })
            .unwrap();

        let claims = decode_claims(&assertion);
        assert_eq!(claims.scope, "altinn:consentrequests.read");
        assert_eq!(claims.aud, "https://test.maskinporten.no/");
        assert_eq!(claims.authorization_details.len(), 1);
        assert_eq!(claims.authorization_details[0].kind, "urn:altinn:consent");
        assert_eq!(
            claims.authorization_details[0].id,
            "0195c4a2-9d1e-7a0b-a2c4-2f4a3f1b9e10"
        );
        assert_eq!(
            claims.authorization_details[0].from,
            "urn:altinn:person:identifier-no:21818297804"
        );
        assert_eq!(claims.consumer_org, None);
    }

    #[test]
    fn test_consumer_org_is_carried() {
        let assertion = orchestrator()
            .build_assertion(&ConsentTokenRequest {
                consent_request_id: "id",
                from_person_id: "21818297804",
                consumer_org: Some("310461598"),
            })
            .unwrap();
        assert_eq!(decode_claims(&assertion).consumer_org.as_deref(), Some("310461598"));

        let assertion = orchestrator()
            .build_assertion(&ConsentTokenRequest {
                consent_request_id: "id",
                from_person_id: "21818297804",
                consumer_org: Some(" "),
            })
            .unwrap();
        assert_eq!(decode_claims(&assertion).consumer_org, None);
    }

    #[test]
    fn test_blank_parameters_are_rejected() {
        let err = orchestrator()
            .build_assertion(&ConsentTokenRequest {
                consent_request_id: "",
                from_person_id: "21818297804",
                consumer_org: None,
            })
            .unwrap_err();
        assert!(err.to_string().contains("consent_request_id"));

        let err = orchestrator()
            .build_assertion(&ConsentTokenRequest {
                consent_request_id: "id",
                from_person_id: " ",
                consumer_org: None,
            })
            .unwrap_err();
        assert!(err.to_string().contains("from_person_id"));
    }

    #[tokio::test]
    async fn test_creator_failure_is_reported() {
        let err = orchestrator()
            .create_and_exchange(&FailingCreator, "21818297804", None)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::ConsentRequestFailed(ref message) if message.contains("unavailable")));
    }
}
