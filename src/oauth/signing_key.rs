//! Private JSON Web Key import and signing.
//!
//! Key material arrives as a private JWK, either raw JSON or base64-encoded
//! JSON. RSA keys sign with RS*/PS* algorithms, P-256 keys with ES256.

use crate::errors::KeyError;
use base64::prelude::*;
use jsonwebtoken::{Algorithm, EncodingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::EncodePrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::str::FromStr;

/// Capability to sign assertion bytes
pub trait SigningKey: Send + Sync {
    /// JWS algorithm the signature is produced with
    fn algorithm(&self) -> Algorithm;

    /// Key identifier for the JWS `kid` header
    fn key_id(&self) -> Option<&str>;

    /// Sign `message`, returning the base64url (unpadded) signature
    fn sign(&self, message: &[u8]) -> Result<String, KeyError>;
}

/// Private JWK members this crate reads
#[derive(Deserialize)]
struct PrivateJwk {
    kty: String,
    kid: Option<String>,
    alg: Option<String>,
    crv: Option<String>,
    n: Option<String>,
    e: Option<String>,
    d: Option<String>,
    p: Option<String>,
    q: Option<String>,
    x: Option<String>,
    y: Option<String>,
}

enum PublicComponents {
    Rsa { n: Vec<u8>, e: Vec<u8> },
    Ec { x: Vec<u8>, y: Vec<u8> },
}

/// Signing key imported from a private JWK
pub struct JwkSigningKey {
    key_id: Option<String>,
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    public: PublicComponents,
}

impl fmt::Debug for JwkSigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwkSigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl JwkSigningKey {
    /// Import key material given as JSON or base64-encoded JSON
    pub fn from_encoded(material: &str) -> Result<Self, KeyError> {
        let material = material.trim();
        if material.starts_with('{') {
            return Self::from_jwk_json(material);
        }

        let decoded = BASE64_STANDARD
            .decode(material)
            .or_else(|_| BASE64_URL_SAFE_NO_PAD.decode(material.trim_end_matches('=')))
            .map_err(|e| KeyError::InvalidEncoding(e.to_string()))?;
        let json = String::from_utf8(decoded).map_err(|e| KeyError::InvalidEncoding(e.to_string()))?;
        Self::from_jwk_json(&json)
    }

    /// Import a private JWK from its JSON text
    pub fn from_jwk_json(json: &str) -> Result<Self, KeyError> {
        let jwk: PrivateJwk =
            serde_json::from_str(json).map_err(|e| KeyError::InvalidJwk(e.to_string()))?;

        let key = match jwk.kty.as_str() {
            "RSA" => Self::import_rsa(&jwk)?,
            "EC" => Self::import_ec(&jwk)?,
            other => return Err(KeyError::UnsupportedKeyType(other.to_string())),
        };

        // ring parses the DER lazily; fail here rather than on first use.
        key.sign(b"key-import-probe")?;
        Ok(key)
    }

    fn import_rsa(jwk: &PrivateJwk) -> Result<Self, KeyError> {
        let algorithm = resolve_algorithm(&jwk.kty, jwk.alg.as_deref(), Algorithm::RS256)?;

        let n = BigUint::from_bytes_be(&decode_member("n", jwk.n.as_deref())?);
        let e = BigUint::from_bytes_be(&decode_member("e", jwk.e.as_deref())?);
        let d = BigUint::from_bytes_be(&decode_member("d", jwk.d.as_deref())?);
        let primes = match (jwk.p.as_deref(), jwk.q.as_deref()) {
            (Some(p), Some(q)) => vec![
                BigUint::from_bytes_be(&decode_member("p", Some(p))?),
                BigUint::from_bytes_be(&decode_member("q", Some(q))?),
            ],
            _ => Vec::new(),
        };

        let private_key = RsaPrivateKey::from_components(n, e, d, primes)
            .map_err(|e| KeyError::InvalidJwk(format!("RSA key rejected: {e}")))?;
        let der = private_key
            .to_pkcs1_der()
            .map_err(|e| KeyError::InvalidJwk(format!("RSA key encoding failed: {e}")))?;

        let public_key = private_key.to_public_key();
        Ok(Self {
            key_id: jwk.kid.clone(),
            algorithm,
            encoding_key: EncodingKey::from_rsa_der(der.as_bytes()),
            public: PublicComponents::Rsa {
                n: public_key.n().to_bytes_be(),
                e: public_key.e().to_bytes_be(),
            },
        })
    }

    fn import_ec(jwk: &PrivateJwk) -> Result<Self, KeyError> {
        match jwk.crv.as_deref() {
            Some("P-256") => {}
            Some(other) => return Err(KeyError::UnsupportedKeyType(format!("EC curve {other}"))),
            None => return Err(KeyError::InvalidMember("crv", "missing".to_string())),
        }
        let algorithm = resolve_algorithm(&jwk.kty, jwk.alg.as_deref(), Algorithm::ES256)?;

        let d = decode_member("d", jwk.d.as_deref())?;
        let secret_key =
            p256::SecretKey::from_slice(&d).map_err(|e| KeyError::InvalidMember("d", e.to_string()))?;

        let point = secret_key.public_key().to_encoded_point(false);
        let (x, y) = match (point.x(), point.y()) {
            (Some(x), Some(y)) => (x.to_vec(), y.to_vec()),
            _ => return Err(KeyError::InvalidJwk("P-256 public point is the identity".into())),
        };

        if let (Some(declared_x), Some(declared_y)) = (jwk.x.as_deref(), jwk.y.as_deref()) {
            if decode_member("x", Some(declared_x))? != x || decode_member("y", Some(declared_y))? != y {
                return Err(KeyError::InvalidJwk(
                    "public coordinates do not match the private scalar".to_string(),
                ));
            }
        }

        let der = secret_key
            .to_pkcs8_der()
            .map_err(|e| KeyError::InvalidJwk(format!("EC key encoding failed: {e}")))?;

        Ok(Self {
            key_id: jwk.kid.clone(),
            algorithm,
            encoding_key: EncodingKey::from_ec_der(der.as_bytes()),
            public: PublicComponents::Ec { x, y },
        })
    }

    /// Public half of the key as a JWK, for registration with the authorization server
    pub fn public_jwk(&self) -> serde_json::Value {
        let mut jwk = match &self.public {
            PublicComponents::Rsa { n, e } => json!({
                "kty": "RSA",
                "n": BASE64_URL_SAFE_NO_PAD.encode(n),
                "e": BASE64_URL_SAFE_NO_PAD.encode(e),
            }),
            PublicComponents::Ec { x, y } => json!({
                "kty": "EC",
                "crv": "P-256",
                "x": BASE64_URL_SAFE_NO_PAD.encode(x),
                "y": BASE64_URL_SAFE_NO_PAD.encode(y),
            }),
        };
        jwk["alg"] = json!(format!("{:?}", self.algorithm));
        jwk["use"] = json!("sig");
        if let Some(kid) = &self.key_id {
            jwk["kid"] = json!(kid);
        }
        jwk
    }
}

impl SigningKey for JwkSigningKey {
    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    fn sign(&self, message: &[u8]) -> Result<String, KeyError> {
        jsonwebtoken::crypto::sign(message, &self.encoding_key, self.algorithm)
            .map_err(|e| KeyError::SigningFailed(e.to_string()))
    }
}

fn decode_member(name: &'static str, value: Option<&str>) -> Result<Vec<u8>, KeyError> {
    let value = value.ok_or_else(|| KeyError::InvalidMember(name, "missing".to_string()))?;
    BASE64_URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| KeyError::InvalidMember(name, e.to_string()))
}

fn resolve_algorithm(
    kty: &str,
    declared: Option<&str>,
    default: Algorithm,
) -> Result<Algorithm, KeyError> {
    let Some(name) = declared else {
        return Ok(default);
    };
    let algorithm =
        Algorithm::from_str(name).map_err(|_| KeyError::UnsupportedAlgorithm(name.to_string()))?;

    let compatible = match kty {
        "RSA" => matches!(
            algorithm,
            Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512
        ),
        "EC" => algorithm == Algorithm::ES256,
        _ => false,
    };
    if compatible {
        Ok(algorithm)
    } else {
        Err(KeyError::UnsupportedAlgorithm(format!("{name} with {kty} key")))
    }
}
