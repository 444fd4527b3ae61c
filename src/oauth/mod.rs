//! JWT-bearer grant assertions and token exchange.
//!
//! Claims are built fresh for every call, signed with a caller-supplied
//! private JWK, and exchanged once at the token endpoint.

pub mod assertion;
pub mod claims;
pub mod consent;
pub mod exchange;
pub mod maskinporten;
pub mod signing_key;

pub use assertion::{Assertion, AssertionSigner};
pub use claims::{
    AuthorizationDetail, ClaimsBuilder, Clock, ConsentAuthorizationClaims, GrantClaims,
    JwtIdGenerator, SystemClock, UuidJwtIdGenerator, person_urn,
};
pub use consent::{ConsentRequestCreator, ConsentToken, ConsentTokenOrchestrator, ConsentTokenRequest};
pub use exchange::{JWT_BEARER_GRANT_TYPE, TokenExchangeClient, TokenResponse};
pub use maskinporten::MaskinportenClient;
pub use signing_key::{JwkSigningKey, SigningKey};
