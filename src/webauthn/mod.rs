//! Passkey (WebAuthn) core: challenge issuance, attestation decoding,
//! assertion verification, and replay protection.
//!
//! The entry point is [`PasskeyService`], generic over the user, credential,
//! and key-value stores so the ceremonies can run against Postgres in
//! production and in-memory stores in tests.

pub mod challenge;
pub mod codec;
pub mod counter;
pub mod error;
pub mod service;
pub mod types;

mod authentication;
mod registration;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::WebauthnError;
pub use service::{DEFAULT_CHALLENGE_TTL, PasskeyService, RpConfig};
pub use types::{
    AssertionResponse, AttestationResponse, AuthenticationOptions, RegistrationOptions,
};
