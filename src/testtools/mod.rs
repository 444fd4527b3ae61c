//! Pre-provisioned test tokens from the Altinn test-token generator.

pub mod party_lookup;
pub mod token_generator;

pub use party_lookup::PersonIdentity;
pub use token_generator::{DEFAULT_PERSONAL_SCOPES, TestTokenClient};
