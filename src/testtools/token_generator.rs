//! Client for the password-protected test-token generator service.

use base64::prelude::*;
use url::Url;

use crate::config::{Environment, Secret, TokenGeneratorConfig};
use crate::errors::{ConfigError, Result, TokenError};
use crate::http::success_body;
use crate::testtools::party_lookup::{PersonIdentity, lookup_person};

/// Scope requested for personal tokens unless the caller overrides it
pub const DEFAULT_PERSONAL_SCOPES: &str = "altinn:portal/enduser";

/// Authentication level claimed by personal tokens
pub const PERSONAL_AUTH_LEVEL: &str = "3";

/// Fetches pre-provisioned enterprise, personal and platform tokens
#[derive(Debug, Clone)]
pub struct TestTokenClient {
    http_client: reqwest::Client,
    base_url: Url,
    username: String,
    password: Secret,
    environment: Environment,
    personal_token_ttl: u64,
    platform_token_app: String,
    platform_token_ttl: u64,
    platform_base_url: Url,
}

fn require<'a>(name: &'static str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::MissingParameter(name).into());
    }
    Ok(value)
}

impl TestTokenClient {
    pub fn new(
        http_client: reqwest::Client,
        environment: Environment,
        config: &TokenGeneratorConfig,
    ) -> Result<Self> {
        require("username", &config.username)?;
        require("password", config.password.expose())?;
        if config.base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(
                config.base_url.to_string(),
                url::ParseError::RelativeUrlWithCannotBeABaseBase,
            )
            .into());
        }

        let platform_base_url = match &config.platform_base_url {
            Some(url) => url.clone(),
            None => environment.platform_base_url()?,
        };

        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
            username: config.username.trim().to_string(),
            password: config.password.clone(),
            environment,
            personal_token_ttl: config.personal_token_ttl,
            platform_token_app: config.platform_token_app.clone(),
            platform_token_ttl: config.platform_token_ttl,
            platform_base_url,
        })
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    fn endpoint(&self, operation: &str) -> String {
        format!(
            "{}/api/{}",
            self.base_url.as_str().trim_end_matches('/'),
            operation
        )
    }

    fn basic_authorization(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password.expose());
        format!("Basic {}", BASE64_STANDARD.encode(credentials))
    }

    async fn fetch_token(&self, operation: &str, query: &[(&str, &str)]) -> Result<String> {
        let endpoint = self.endpoint(operation);

        let response = self
            .http_client
            .get(&endpoint)
            .header(reqwest::header::AUTHORIZATION, self.basic_authorization())
            .query(query)
            .send()
            .await
            .map_err(|source| TokenError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;

        let body = success_body(&endpoint, response).await?;
        let token = body.trim();
        if token.is_empty() {
            return Err(TokenError::EmptyToken { endpoint });
        }
        Ok(token.to_string())
    }

    /// Token representing an enterprise (organization)
    #[tracing::instrument(skip(self), fields(env = %self.environment))]
    pub async fn enterprise_token(&self, org_no: &str, scopes: &str) -> Result<String> {
        let org_no = require("org_no", org_no)?;
        let scopes = require("scopes", scopes)?;
        self.fetch_token(
            "GetEnterpriseToken",
            &[
                ("orgNo", org_no),
                ("env", self.environment.name()),
                ("scopes", scopes),
            ],
        )
        .await
    }

    /// Token representing a person whose identifiers are all known
    #[tracing::instrument(skip(self, identity), fields(env = %self.environment))]
    pub async fn personal_token(
        &self,
        identity: &PersonIdentity,
        scopes: Option<&str>,
    ) -> Result<String> {
        let pid = require("pid", &identity.pid)?;
        let user_id = require("user_id", &identity.user_id)?;
        let party_id = require("party_id", &identity.party_id)?;
        let party_uuid = require("party_uuid", &identity.party_uuid)?;
        let scopes = scopes
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_PERSONAL_SCOPES);
        let ttl = self.personal_token_ttl.to_string();

        self.fetch_token(
            "GetPersonalToken",
            &[
                ("env", self.environment.name()),
                ("pid", pid),
                ("userid", user_id),
                ("partyid", party_id),
                ("partyUuid", party_uuid),
                ("authLvl", PERSONAL_AUTH_LEVEL),
                ("ttl", ttl.as_str()),
                ("scopes", scopes),
            ],
        )
        .await
    }

    /// Token representing a person known only by national identity number.
    ///
    /// Resolves the remaining identifiers through the profile service, authorized
    /// with a platform access token, before requesting the personal token.
    pub async fn personal_token_for_pid(&self, pid: &str, scopes: Option<&str>) -> Result<String> {
        let identity = self.lookup_person(pid).await?;
        self.personal_token(&identity, scopes).await
    }

    /// Resolve user, party and party UUID identifiers for `pid`
    pub async fn lookup_person(&self, pid: &str) -> Result<PersonIdentity> {
        let pid = require("pid", pid)?;
        let platform_token = self.platform_access_token(None).await?;
        lookup_person(&self.http_client, &self.platform_base_url, &platform_token, pid).await
    }

    /// Platform access token for `app`, or the configured default app
    #[tracing::instrument(skip(self), fields(env = %self.environment))]
    pub async fn platform_access_token(&self, app: Option<&str>) -> Result<String> {
        let app = match app {
            Some(app) => require("app", app)?,
            None => require("app", &self.platform_token_app)?,
        };
        let ttl = self.platform_token_ttl.to_string();
        self.fetch_token(
            "GetPlatformAccessToken",
            &[("env", self.environment.name()), ("app", app), ("ttl", ttl.as_str())],
        )
        .await
    }
}
