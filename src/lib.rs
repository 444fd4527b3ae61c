//! Altinn token acquisition for automated test and integration clients.
//!
//! Provides password-authenticated retrieval of pre-provisioned test tokens,
//! OAuth2 JWT-bearer grants with self-signed assertions, and consent-scoped
//! tokens bound to a single approved consent request.

pub mod config;
pub mod errors;
pub mod http;
pub mod oauth;
pub mod testtools;
