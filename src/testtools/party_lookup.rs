//! Resolution of a national identity number to Altinn user and party identifiers.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{Result, TokenError};
use crate::http::success_body;

/// Header carrying the platform access token on internal platform APIs
pub const PLATFORM_ACCESS_TOKEN_HEADER: &str = "PlatformAccessToken";

/// Identifiers selecting a pre-provisioned person
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonIdentity {
    pub pid: String,
    pub user_id: String,
    pub party_id: String,
    pub party_uuid: String,
}

#[derive(Serialize)]
struct UserLookupRequest<'a> {
    ssn: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserProfileResponse {
    user_id: i64,
    #[serde(default)]
    party_id: Option<i64>,
    #[serde(default)]
    party: Option<PartyResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartyResponse {
    #[serde(default)]
    party_id: Option<i64>,
    #[serde(default)]
    party_uuid: Option<String>,
}

fn profile_endpoint(platform_base_url: &Url) -> String {
    format!(
        "{}/profile/api/v1/internal/user/",
        platform_base_url.as_str().trim_end_matches('/')
    )
}

/// Look up the profile of `pid` using a platform access token
pub(crate) async fn lookup_person(
    http_client: &reqwest::Client,
    platform_base_url: &Url,
    platform_token: &str,
    pid: &str,
) -> Result<PersonIdentity> {
    let endpoint = profile_endpoint(platform_base_url);

    let response = http_client
        .post(&endpoint)
        .header(PLATFORM_ACCESS_TOKEN_HEADER, platform_token)
        .json(&UserLookupRequest { ssn: pid })
        .send()
        .await
        .map_err(|source| TokenError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;

    let body = success_body(&endpoint, response).await?;
    let identity = parse_profile(&endpoint, pid, body)?;
    tracing::debug!(user_id = %identity.user_id, party_id = %identity.party_id, "resolved person");
    Ok(identity)
}

fn parse_profile(endpoint: &str, pid: &str, body: String) -> Result<PersonIdentity> {
    let parse_error = |reason: String, body: String| TokenError::TokenResponseParse {
        endpoint: endpoint.to_string(),
        reason,
        body,
    };

    let profile: UserProfileResponse = match serde_json::from_str(&body) {
        Ok(profile) => profile,
        Err(err) => return Err(parse_error(err.to_string(), body)),
    };

    let party_id = profile
        .party_id
        .or_else(|| profile.party.as_ref().and_then(|party| party.party_id));
    let party_uuid = profile
        .party
        .as_ref()
        .and_then(|party| party.party_uuid.clone())
        .filter(|uuid| !uuid.trim().is_empty());

    match (party_id, party_uuid) {
        (Some(party_id), Some(party_uuid)) => Ok(PersonIdentity {
            pid: pid.to_string(),
            user_id: profile.user_id.to_string(),
            party_id: party_id.to_string(),
            party_uuid,
        }),
        (None, _) => Err(parse_error("missing partyId".to_string(), body)),
        (_, None) => Err(parse_error("missing party.partyUuid".to_string(), body)),
    }
}
