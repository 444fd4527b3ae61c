//! Compact JWS serialization of assertion claim sets.

use crate::errors::KeyError;
use crate::oauth::signing_key::{JwkSigningKey, SigningKey};
use base64::prelude::*;
use jsonwebtoken::Header;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Signed assertion ready for one token exchange.
///
/// Not `Clone`: exchanging consumes it, so a retry has to build and sign a
/// new claim set.
pub struct Assertion(String);

impl Assertion {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Assertion(..)")
    }
}

/// Signs claim sets with a shared, read-only key
#[derive(Clone)]
pub struct AssertionSigner {
    key: Arc<dyn SigningKey>,
}

impl fmt::Debug for AssertionSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssertionSigner")
            .field("algorithm", &self.key.algorithm())
            .field("key_id", &self.key.key_id())
            .finish()
    }
}

impl AssertionSigner {
    pub fn new(key: Arc<dyn SigningKey>) -> Self {
        Self { key }
    }

    /// Import JWK key material (JSON or base64-encoded JSON)
    pub fn from_jwk(material: &str) -> Result<Self, KeyError> {
        Ok(Self::new(Arc::new(JwkSigningKey::from_encoded(material)?)))
    }

    pub fn key(&self) -> &Arc<dyn SigningKey> {
        &self.key
    }

    /// Serialize `claims` as a JWT and sign it.
    ///
    /// The header carries the key's algorithm, `typ: JWT`, and the key's
    /// `kid` when it has one.
    pub fn sign<C: Serialize>(&self, claims: &C) -> Result<Assertion, KeyError> {
        let mut header = Header::new(self.key.algorithm());
        header.kid = self.key.key_id().map(str::to_string);

        let header_json =
            serde_json::to_vec(&header).map_err(|e| KeyError::SigningFailed(e.to_string()))?;
        let claims_json =
            serde_json::to_vec(claims).map_err(|e| KeyError::SigningFailed(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            BASE64_URL_SAFE_NO_PAD.encode(header_json),
            BASE64_URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = self.key.sign(signing_input.as_bytes())?;

        Ok(Assertion(format!("{signing_input}.{signature}")))
    }
}
