//! Claim sets for JWT-bearer grant and consent authorization assertions.
//!
//! Every claim set gets a fresh `jti` and an `iat`/`exp` pair computed when it
//! is built. Time and identifier sources are injectable so tests can pin them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default `exp - iat` window for assertions
pub const DEFAULT_ASSERTION_LIFETIME_SECONDS: i64 = 60;

/// Scope requested by consent authorization assertions
pub const CONSENT_REQUEST_READ_SCOPE: &str = "altinn:consentrequests.read";

/// `type` of the single consent authorization detail
pub const CONSENT_AUTHORIZATION_TYPE: &str = "urn:altinn:consent";

/// URN prefix for Norwegian national identity numbers
pub const PERSON_IDENTIFIER_URN_PREFIX: &str = "urn:altinn:person:identifier-no:";

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of unique `jti` values
///
/// Implementations must return unpredictable values; servers reject any
/// assertion whose `jti` they have already seen.
pub trait JwtIdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random UUIDv4 identifiers
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidJwtIdGenerator;

impl JwtIdGenerator for UuidJwtIdGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Claims for a standard JWT-bearer grant assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantClaims {
    /// Token endpoint receiving the assertion
    pub aud: String,
    /// Client identifier registered with the authorization server
    pub iss: String,
    /// Space-separated requested scopes
    pub scope: String,
    pub iat: i64,
    pub exp: i64,
    /// Replay-protection identifier
    pub jti: String,
}

/// One entry of the `authorization_details` claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationDetail {
    #[serde(rename = "type")]
    pub kind: String,
    /// Consent request identifier
    pub id: String,
    /// URN of the person who granted consent
    pub from: String,
}

/// Claims for an assertion bound to one consent transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentAuthorizationClaims {
    pub aud: String,
    pub iss: String,
    pub scope: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub authorization_details: Vec<AuthorizationDetail>,
    /// Organization on whose behalf the client acts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer_org: Option<String>,
}

/// Convert a national identity number into its Altinn person URN.
///
/// Values that already carry the prefix are returned unchanged.
pub fn person_urn(person_id: &str) -> String {
    let person_id = person_id.trim();
    if person_id.starts_with(PERSON_IDENTIFIER_URN_PREFIX) {
        person_id.to_string()
    } else {
        format!("{PERSON_IDENTIFIER_URN_PREFIX}{person_id}")
    }
}

/// Builds claim sets from caller parameters, a clock, and an identifier source
#[derive(Clone)]
pub struct ClaimsBuilder {
    clock: Arc<dyn Clock>,
    jwt_ids: Arc<dyn JwtIdGenerator>,
    lifetime: Duration,
}

impl fmt::Debug for ClaimsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimsBuilder")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl Default for ClaimsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimsBuilder {
    /// Create a builder using the wall clock, UUIDv4 identifiers and the default window
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            jwt_ids: Arc::new(UuidJwtIdGenerator),
            lifetime: Duration::seconds(DEFAULT_ASSERTION_LIFETIME_SECONDS),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_jwt_id_generator(mut self, jwt_ids: Arc<dyn JwtIdGenerator>) -> Self {
        self.jwt_ids = jwt_ids;
        self
    }

    /// Override the `exp - iat` window
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    fn window(&self) -> (i64, i64, String) {
        let issued_at = self.clock.now().timestamp();
        let expires_at = issued_at + self.lifetime.num_seconds();
        (issued_at, expires_at, self.jwt_ids.generate())
    }

    /// Claims for a JWT-bearer grant whose audience is the token endpoint
    pub fn grant_claims(&self, issuer: &str, audience: &str, scope: &str) -> GrantClaims {
        let (iat, exp, jti) = self.window();
        GrantClaims {
            aud: audience.to_string(),
            iss: issuer.to_string(),
            scope: scope.to_string(),
            iat,
            exp,
            jti,
        }
    }

    /// Claims bound to a consent request granted by `from_person_urn`
    pub fn consent_claims(
        &self,
        issuer: &str,
        audience: &str,
        consent_request_id: &str,
        from_person_urn: &str,
        consumer_org: Option<&str>,
    ) -> ConsentAuthorizationClaims {
        let (iat, exp, jti) = self.window();
        ConsentAuthorizationClaims {
            aud: audience.to_string(),
            iss: issuer.to_string(),
            scope: CONSENT_REQUEST_READ_SCOPE.to_string(),
            iat,
            exp,
            jti,
            authorization_details: vec![AuthorizationDetail {
                kind: CONSENT_AUTHORIZATION_TYPE.to_string(),
                id: consent_request_id.to_string(),
                from: from_person_urn.to_string(),
            }],
            consumer_org: consumer_org.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct SequenceIds(AtomicUsize);

    impl JwtIdGenerator for SequenceIds {
        fn generate(&self) -> String {
            format!("jti-{}", self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    fn fixed_builder() -> ClaimsBuilder {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        ClaimsBuilder::new()
            .with_clock(Arc::new(FixedClock(now)))
            .with_jwt_id_generator(Arc::new(SequenceIds(AtomicUsize::new(0))))
    }

    #[test]
    fn test_grant_claims_use_injected_sources() {
        let claims = fixed_builder().grant_claims(
            "client-id",
            "https://test.maskinporten.no/token",
            "altinn:serviceowner altinn:enterprise",
        );

        assert_eq!(claims.iss, "client-id");
        assert_eq!(claims.aud, "https://test.maskinporten.no/token");
        assert_eq!(claims.scope, "altinn:serviceowner altinn:enterprise");
        assert_eq!(claims.iat, 1_714_564_800);
        assert_eq!(claims.exp, 1_714_564_860);
        assert_eq!(claims.jti, "jti-0");
    }

    #[test]
    fn test_default_window_is_sixty_seconds() {
        let builder = ClaimsBuilder::new();
        for _ in 0..10 {
            let claims = builder.grant_claims("iss", "aud", "scope");
            assert_eq!(claims.exp - claims.iat, DEFAULT_ASSERTION_LIFETIME_SECONDS);
        }
    }

    #[test]
    fn test_custom_window() {
        let builder = fixed_builder().with_lifetime(Duration::seconds(120));
        let claims = builder.grant_claims("iss", "aud", "scope");
        assert_eq!(claims.exp - claims.iat, 120);

        let consent = builder.consent_claims("iss", "aud", "id", "urn", None);
        assert_eq!(consent.exp - consent.iat, 120);
    }

    #[test]
    fn test_jwt_ids_are_unique() {
        let builder = ClaimsBuilder::new();
        let ids: HashSet<String> = (0..500)
            .map(|_| builder.grant_claims("iss", "aud", "scope").jti)
            .collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn test_each_build_draws_a_new_identifier() {
        let builder = fixed_builder();
        let first = builder.grant_claims("iss", "aud", "scope");
        let second = builder.grant_claims("iss", "aud", "scope");
        assert_ne!(first.jti, second.jti);
    }

    #[test]
    fn test_person_urn() {
        assert_eq!(
            person_urn("21818297804"),
            "urn:altinn:person:identifier-no:21818297804"
        );
        assert_eq!(
            person_urn("urn:altinn:person:identifier-no:21818297804"),
            "urn:altinn:person:identifier-no:21818297804"
        );
        assert_eq!(
            person_urn(" 21818297804 "),
            "urn:altinn:person:identifier-no:21818297804"
        );
    }

    #[test]
    fn test_consent_claims_shape() {
        let claims = fixed_builder().consent_claims(
            "client-id",
            "https://test.maskinporten.no/",
            "0195c4a2-9d1e-7a0b-a2c4-2f4a3f1b9e10",
            &person_urn("21818297804"),
            None,
        );

        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value["scope"], "altinn:consentrequests.read");
        assert_eq!(value["aud"], "https://test.maskinporten.no/");
        assert_eq!(value["authorization_details"][0]["type"], "urn:altinn:consent");
        assert_eq!(
            value["authorization_details"][0]["id"],
            "0195c4a2-9d1e-7a0b-a2c4-2f4a3f1b9e10"
        );
        assert_eq!(
            value["authorization_details"][0]["from"],
            "urn:altinn:person:identifier-no:21818297804"
        );
        assert!(value.get("consumer_org").is_none());
    }

    #[test]
    fn test_consent_claims_with_consumer_org() {
        let claims = fixed_builder().consent_claims("iss", "aud", "id", "urn", Some("310461598"));
        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value["consumer_org"], "310461598");
    }

    #[test]
    fn test_grant_claims_serialize_to_expected_names() {
        let claims = fixed_builder().grant_claims("iss", "aud", "scope");
        let value = serde_json::to_value(&claims).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["aud", "exp", "iat", "iss", "jti", "scope"]);
    }
}
