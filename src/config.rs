//! Environment-based configuration for token clients.
//!
//! [`Config::new`] reads the process environment once; [`Config::from_lookup`]
//! accepts any variable source so callers and tests never have to mutate
//! process state.

use anyhow::Result;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::errors::ConfigError;
use crate::oauth::claims::DEFAULT_ASSERTION_LIFETIME_SECONDS;

pub const DEFAULT_ENVIRONMENT: &str = "tt02";
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://test.maskinporten.no/token";
pub const DEFAULT_AUDIENCE: &str = "https://test.maskinporten.no/";
pub const DEFAULT_TOKEN_GENERATOR_URL: &str =
    "https://altinn-testtools-token-generator.azurewebsites.net";
pub const DEFAULT_PERSONAL_TOKEN_TTL: u64 = 3000;
pub const DEFAULT_PLATFORM_TOKEN_TTL: u64 = 300;
pub const DEFAULT_PLATFORM_TOKEN_APP: &str = "altinn-tokens";

/// Altinn environment selector (`tt02`, `at22`, `yt01`, `prod`, ...)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Environment(String);

/// Certificate bundles for HTTPS connections
#[derive(Clone, Debug, Default)]
pub struct CertificateBundles(Vec<String>);

/// HTTP client timeout configuration
#[derive(Clone, Debug)]
pub struct HttpClientTimeout(Duration);

/// `exp - iat` window for signed assertions
#[derive(Clone, Debug)]
pub struct AssertionLifetime(chrono::Duration);

/// Secret string that never appears in `Debug` output
#[derive(Clone)]
pub struct Secret(String);

/// Settings for the signed-assertion (Maskinporten) paths
#[derive(Clone, Debug)]
pub struct MaskinportenConfig {
    pub client_id: String,
    /// Private JWK, raw JSON or base64-encoded JSON
    pub private_jwk: Secret,
    pub token_endpoint: String,
    /// Audience of consent authorization assertions
    pub audience: String,
    pub assertion_lifetime: AssertionLifetime,
}

/// Settings for the test-token generator service
#[derive(Clone, Debug)]
pub struct TokenGeneratorConfig {
    pub base_url: Url,
    pub username: String,
    pub password: Secret,
    pub personal_token_ttl: u64,
    pub platform_token_app: String,
    pub platform_token_ttl: u64,
    /// Overrides the platform URL derived from the environment
    pub platform_base_url: Option<Url>,
}

/// Main configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub version: String,
    pub environment: Environment,
    pub http_client_timeout: HttpClientTimeout,
    pub user_agent: String,
    pub certificate_bundles: CertificateBundles,
    pub maskinporten: Option<MaskinportenConfig>,
    pub token_generator: Option<TokenGeneratorConfig>,
}

struct Variables<F>(F);

impl<F: Fn(&str) -> Option<String>> Variables<F> {
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|value| !value.trim().is_empty())
    }

    fn require(&self, name: &str) -> Result<String, ConfigError> {
        self.optional(name)
            .ok_or_else(|| ConfigError::EnvVarRequired(name.to_string()))
    }

    fn default(&self, name: &str, default_value: &str) -> String {
        self.optional(name)
            .unwrap_or_else(|| default_value.to_string())
    }

    fn number(&self, name: &'static str, default_value: u64) -> Result<u64, ConfigError> {
        match self.optional(name) {
            None => Ok(default_value),
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|err| ConfigError::NumberParsingFailed(name, value, err)),
        }
    }
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create a configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Variables(lookup);

        let version = version()?;
        let environment: Environment =
            vars.default("ALTINN_ENVIRONMENT", DEFAULT_ENVIRONMENT).try_into()?;
        let http_client_timeout: HttpClientTimeout =
            vars.default("HTTP_CLIENT_TIMEOUT", "30s").try_into()?;
        let default_user_agent = format!("altinn-tokens/{version}");
        let user_agent = vars.default("USER_AGENT", &default_user_agent);
        let certificate_bundles: CertificateBundles = vars.optional("CERTIFICATE_BUNDLES").into();

        let maskinporten = match vars.optional("MASKINPORTEN_CLIENT_ID") {
            None => None,
            Some(client_id) => Some(MaskinportenConfig {
                client_id,
                private_jwk: Secret(vars.require("MASKINPORTEN_JWK")?),
                token_endpoint: parse_url(
                    &vars.default("MASKINPORTEN_TOKEN_ENDPOINT", DEFAULT_TOKEN_ENDPOINT),
                )?
                .to_string(),
                audience: vars.default("MASKINPORTEN_AUDIENCE", DEFAULT_AUDIENCE),
                assertion_lifetime: vars
                    .default(
                        "ASSERTION_LIFETIME",
                        &format!("{DEFAULT_ASSERTION_LIFETIME_SECONDS}s"),
                    )
                    .try_into()?,
            }),
        };

        let token_generator = match vars.optional("TOKEN_GENERATOR_USERNAME") {
            None => None,
            Some(username) => Some(TokenGeneratorConfig {
                base_url: parse_url(
                    &vars.default("TOKEN_GENERATOR_URL", DEFAULT_TOKEN_GENERATOR_URL),
                )?,
                username,
                password: Secret(vars.require("TOKEN_GENERATOR_PASSWORD")?),
                personal_token_ttl: vars
                    .number("PERSONAL_TOKEN_TTL", DEFAULT_PERSONAL_TOKEN_TTL)?,
                platform_token_app: vars.default("PLATFORM_TOKEN_APP", DEFAULT_PLATFORM_TOKEN_APP),
                platform_token_ttl: vars
                    .number("PLATFORM_TOKEN_TTL", DEFAULT_PLATFORM_TOKEN_TTL)?,
                platform_base_url: vars
                    .optional("PLATFORM_BASE_URL")
                    .map(|value| parse_url(&value))
                    .transpose()?,
            }),
        };

        Ok(Self {
            version,
            environment,
            http_client_timeout,
            user_agent,
            certificate_bundles,
            maskinporten,
            token_generator,
        })
    }

    /// Maskinporten settings, or the variable that enables them
    pub fn maskinporten(&self) -> Result<&MaskinportenConfig, ConfigError> {
        self.maskinporten
            .as_ref()
            .ok_or_else(|| ConfigError::EnvVarRequired("MASKINPORTEN_CLIENT_ID".to_string()))
    }

    /// Token generator settings, or the variable that enables them
    pub fn token_generator(&self) -> Result<&TokenGeneratorConfig, ConfigError> {
        self.token_generator
            .as_ref()
            .ok_or_else(|| ConfigError::EnvVarRequired("TOKEN_GENERATOR_USERNAME".to_string()))
    }
}

impl MaskinportenConfig {
    /// Settings with the test-environment endpoint, audience and 60 second window
    pub fn new(client_id: impl Into<String>, private_jwk: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            private_jwk: Secret(private_jwk.into()),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            assertion_lifetime: AssertionLifetime(chrono::Duration::seconds(
                DEFAULT_ASSERTION_LIFETIME_SECONDS,
            )),
        }
    }

    pub fn with_token_endpoint(mut self, token_endpoint: impl Into<String>) -> Self {
        self.token_endpoint = token_endpoint.into();
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    pub fn with_assertion_lifetime(mut self, lifetime: chrono::Duration) -> Self {
        self.assertion_lifetime = AssertionLifetime(lifetime);
        self
    }
}

impl TokenGeneratorConfig {
    pub fn new(base_url: Url, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url,
            username: username.into(),
            password: Secret(password.into()),
            personal_token_ttl: DEFAULT_PERSONAL_TOKEN_TTL,
            platform_token_app: DEFAULT_PLATFORM_TOKEN_APP.to_string(),
            platform_token_ttl: DEFAULT_PLATFORM_TOKEN_TTL,
            platform_base_url: None,
        }
    }

    pub fn with_platform_base_url(mut self, platform_base_url: Url) -> Self {
        self.platform_base_url = Some(platform_base_url);
        self
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

fn parse_url(value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|err| ConfigError::InvalidUrl(value.to_string(), err))
}

impl Environment {
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Base URL of the Altinn platform APIs for this environment
    pub fn platform_base_url(&self) -> Result<Url, ConfigError> {
        let url = match self.0.as_str() {
            "prod" => "https://platform.altinn.no".to_string(),
            "tt02" => "https://platform.tt02.altinn.no".to_string(),
            other => format!("https://platform.{other}.altinn.cloud"),
        };
        parse_url(&url)
    }
}

impl TryFrom<String> for Environment {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim().to_lowercase();
        if value.is_empty() {
            return Err(ConfigError::MissingParameter("environment"));
        }
        Ok(Self(value))
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Option<String>> for CertificateBundles {
    fn from(value: Option<String>) -> Self {
        let value = value.unwrap_or_default();
        Self(
            value
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl AsRef<Vec<String>> for CertificateBundles {
    fn as_ref(&self) -> &Vec<String> {
        &self.0
    }
}

impl TryFrom<String> for HttpClientTimeout {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        duration_str::parse(value.trim())
            .map(Self)
            .map_err(|e| ConfigError::TimeoutParsingFailed(value, e.to_string()))
    }
}

impl AsRef<Duration> for HttpClientTimeout {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl Default for HttpClientTimeout {
    fn default() -> Self {
        Self(Duration::from_secs(30))
    }
}

impl TryFrom<String> for AssertionLifetime {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let duration = duration_str::parse(value.trim())
            .map_err(|e| ConfigError::DurationParsingFailed(value.clone(), e.to_string()))?;
        let duration = chrono::Duration::from_std(duration)
            .map_err(|e| ConfigError::DurationParsingFailed(value.clone(), e.to_string()))?;
        if duration <= chrono::Duration::zero() {
            return Err(ConfigError::DurationParsingFailed(
                value,
                "assertion lifetime must be positive".to_string(),
            ));
        }
        Ok(Self(duration))
    }
}

impl AsRef<chrono::Duration> for AssertionLifetime {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_without_clients() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.environment.name(), "tt02");
        assert_eq!(*config.http_client_timeout.as_ref(), Duration::from_secs(30));
        assert!(config.user_agent.starts_with("altinn-tokens/"));
        assert!(config.certificate_bundles.as_ref().is_empty());
        assert!(config.maskinporten.is_none());
        assert!(config.token_generator.is_none());

        let err = config.maskinporten().unwrap_err();
        assert!(err.to_string().contains("MASKINPORTEN_CLIENT_ID"));
        let err = config.token_generator().unwrap_err();
        assert!(err.to_string().contains("TOKEN_GENERATOR_USERNAME"));
    }

    #[test]
    fn test_maskinporten_settings() {
        let config = config_from(&[
            ("MASKINPORTEN_CLIENT_ID", "3f5a1e4c"),
            ("MASKINPORTEN_JWK", "{\"kty\":\"RSA\"}"),
            ("ASSERTION_LIFETIME", "2m"),
        ])
        .unwrap();

        let maskinporten = config.maskinporten().unwrap();
        assert_eq!(maskinporten.client_id, "3f5a1e4c");
        assert_eq!(maskinporten.token_endpoint, DEFAULT_TOKEN_ENDPOINT);
        assert_eq!(maskinporten.audience, DEFAULT_AUDIENCE);
        assert_eq!(maskinporten.assertion_lifetime.as_ref().num_seconds(), 120);
        assert!(!format!("{maskinporten:?}").contains("RSA"));
    }

    #[test]
    fn test_client_id_without_key_fails_fast() {
        let err = config_from(&[("MASKINPORTEN_CLIENT_ID", "3f5a1e4c")]).unwrap_err();
        assert!(err.to_string().contains("MASKINPORTEN_JWK must be set"));
    }

    #[test]
    fn test_token_generator_settings() {
        let config = config_from(&[
            ("ALTINN_ENVIRONMENT", "AT22"),
            ("TOKEN_GENERATOR_USERNAME", "tester"),
            ("TOKEN_GENERATOR_PASSWORD", "hunter2"),
            ("PERSONAL_TOKEN_TTL", "600"),
        ])
        .unwrap();

        assert_eq!(config.environment.name(), "at22");
        let generator = config.token_generator().unwrap();
        assert_eq!(generator.username, "tester");
        assert_eq!(generator.password.expose(), "hunter2");
        assert_eq!(generator.personal_token_ttl, 600);
        assert_eq!(generator.platform_token_ttl, DEFAULT_PLATFORM_TOKEN_TTL);
        assert_eq!(generator.base_url.as_str(), format!("{DEFAULT_TOKEN_GENERATOR_URL}/"));
        assert!(!format!("{generator:?}").contains("hunter2"));
    }

    #[test]
    fn test_invalid_values() {
        let err = config_from(&[("HTTP_CLIENT_TIMEOUT", "soon")]).unwrap_err();
        assert!(err.to_string().contains("error-altinn-config-2"));

        let err = config_from(&[
            ("TOKEN_GENERATOR_USERNAME", "tester"),
            ("TOKEN_GENERATOR_PASSWORD", "hunter2"),
            ("PERSONAL_TOKEN_TTL", "forever"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("PERSONAL_TOKEN_TTL"));

        let err = config_from(&[
            ("MASKINPORTEN_CLIENT_ID", "3f5a1e4c"),
            ("MASKINPORTEN_JWK", "{}"),
            ("MASKINPORTEN_TOKEN_ENDPOINT", "not a url"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("error-altinn-config-4"));
    }

    #[test]
    fn test_platform_base_url() {
        let url = |env: &str| {
            Environment::try_from(env.to_string())
                .unwrap()
                .platform_base_url()
                .unwrap()
                .to_string()
        };
        assert_eq!(url("tt02"), "https://platform.tt02.altinn.no/");
        assert_eq!(url("prod"), "https://platform.altinn.no/");
        assert_eq!(url("at23"), "https://platform.at23.altinn.cloud/");
    }

    #[test]
    fn test_certificate_bundles() {
        let bundles = CertificateBundles::from(Some("/etc/a.pem; ;/etc/b.pem".to_string()));
        assert_eq!(bundles.as_ref(), &vec!["/etc/a.pem".to_string(), "/etc/b.pem".to_string()]);
    }
}
