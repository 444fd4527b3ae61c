//! Standardized error types following the `error-altinn-<domain>-<number>` format.

use reqwest::StatusCode;
use thiserror::Error;

/// Configuration errors raised while loading settings or validating inputs
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-altinn-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when HTTP client timeout cannot be parsed
    #[error("error-altinn-config-2 Failed to parse HTTP client timeout '{0}': {1}")]
    TimeoutParsingFailed(String, String),

    /// Error when duration string cannot be parsed
    #[error("error-altinn-config-3 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when a configured URL is not valid
    #[error("error-altinn-config-4 Invalid URL '{0}': {1}")]
    InvalidUrl(String, url::ParseError),

    /// Error when a required request parameter is blank
    #[error("error-altinn-config-5 Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Error when a numeric setting cannot be parsed
    #[error("error-altinn-config-6 Failed to parse {0} '{1}': {2}")]
    NumberParsingFailed(&'static str, String, std::num::ParseIntError),

    /// Error when version information is not available
    #[error("error-altinn-config-7 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,
}

/// Private key import and signing errors
#[derive(Debug, Error)]
pub enum KeyError {
    /// Key material is neither JSON nor base64-encoded JSON
    #[error("error-altinn-key-1 Invalid key encoding: {0}")]
    InvalidEncoding(String),

    /// Key material is not a valid JSON Web Key
    #[error("error-altinn-key-2 Invalid JWK: {0}")]
    InvalidJwk(String),

    /// A JWK member is missing or malformed
    #[error("error-altinn-key-3 Invalid JWK member '{0}': {1}")]
    InvalidMember(&'static str, String),

    /// Key type or curve is not supported for signing
    #[error("error-altinn-key-4 Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// Declared algorithm is unsupported or does not fit the key type
    #[error("error-altinn-key-5 Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Signature computation failed
    #[error("error-altinn-key-6 Signing failed: {0}")]
    SigningFailed(String),
}

/// Errors returned by token acquisition operations
#[derive(Debug, Error)]
pub enum TokenError {
    /// Missing or malformed configuration or input
    #[error("error-altinn-token-1 Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Private key could not be imported or used
    #[error("error-altinn-token-2 Key format error: {0}")]
    KeyFormat(#[from] KeyError),

    /// Token endpoint answered with a non-success status
    #[error("error-altinn-token-3 Request to {endpoint} failed with status {status}: {body}")]
    TokenExchange {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    /// Success response did not carry a usable token document
    #[error("error-altinn-token-4 Unable to parse token response from {endpoint}: {reason}; body: {body}")]
    TokenResponseParse {
        endpoint: String,
        reason: String,
        body: String,
    },

    /// Success response carried a blank token
    #[error("error-altinn-token-5 Empty token returned by {endpoint}")]
    EmptyToken { endpoint: String },

    /// Request never produced a response (connect, timeout, TLS)
    #[error("error-altinn-token-6 HTTP request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// External consent request creation failed
    #[error("error-altinn-token-7 Consent request creation failed: {0}")]
    ConsentRequestFailed(String),
}

impl TokenError {
    /// HTTP status of a rejected request, if the server answered
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TokenError::TokenExchange { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a retry with a freshly built assertion could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TokenError::TokenExchange { status, .. } => status.is_server_error(),
            TokenError::Transport { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TokenError>;
