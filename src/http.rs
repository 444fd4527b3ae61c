//! Outbound HTTP client construction and response handling.

use crate::config::Config;
use crate::errors::{Result, TokenError};

/// Build the shared HTTP client with the configured timeout, user agent and
/// extra root certificates
pub fn build_http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    let mut client_builder = reqwest::Client::builder();
    for ca_certificate in config.certificate_bundles.as_ref() {
        tracing::info!("Loading CA certificate: {:?}", ca_certificate);
        let cert = std::fs::read(ca_certificate)?;
        let cert = reqwest::Certificate::from_pem(&cert)?;
        client_builder = client_builder.add_root_certificate(cert);
    }

    let http_client = client_builder
        .user_agent(config.user_agent.clone())
        .timeout(*config.http_client_timeout.as_ref())
        .build()?;
    Ok(http_client)
}

/// Read the body of a response, turning non-2xx answers into
/// [`TokenError::TokenExchange`] with the full body text
pub(crate) async fn success_body(endpoint: &str, response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await.map_err(|source| TokenError::Transport {
        endpoint: endpoint.to_string(),
        source,
    })?;

    if !status.is_success() {
        tracing::warn!(%endpoint, %status, "token request rejected");
        return Err(TokenError::TokenExchange {
            endpoint: endpoint.to_string(),
            status,
            body,
        });
    }

    tracing::debug!(%endpoint, %status, "token request succeeded");
    Ok(body)
}
