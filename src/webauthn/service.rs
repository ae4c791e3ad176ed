//! Passkey service: relying-party configuration and the flow orchestrator.
//!
//! `PasskeyService` coordinates the multi-step ceremonies:
//! 1. Issue a challenge through the TTL-backed key-value collaborator.
//! 2. Verify the browser's response against the consumed challenge and the
//!    configured relying party.
//! 3. Persist or update the credential record.
//!
//! The registration and authentication flows live in their own modules as
//! impl blocks on this type.

use super::challenge::ChallengeStore;
use super::error::WebauthnError;
use super::types::{self, CollectedClientData};
use crate::store::{CredentialStore, KeyValueStore, UserStore};
use anyhow::{Result, anyhow};
use sha2::{Digest, Sha256};
use std::time::Duration;
use url::Url;

/// Challenges expire after 15 minutes.
pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(15 * 60);

/// Client-side ceremony timeout relayed in the options.
pub(crate) const CEREMONY_TIMEOUT_MS: u32 = 60_000;

/// COSE algorithm identifier for ES256, the only algorithm we verify.
pub(crate) const COSE_ALG_ES256: i64 = -7;

/// Relying-party identity the credentials are scoped to.
#[derive(Debug, Clone)]
pub struct RpConfig {
    rp_id: String,
    rp_name: String,
    origin: String,
    challenge_ttl: Duration,
}

impl RpConfig {
    /// Create a relying-party configuration.
    ///
    /// # Errors
    /// Returns error if the RP ID is empty or the origin is not a valid URL
    /// with a host.
    pub fn new(
        rp_id: &str,
        rp_name: &str,
        origin: &str,
        challenge_ttl: Duration,
    ) -> Result<Self> {
        if rp_id.trim().is_empty() {
            return Err(anyhow!("Relying-party ID must not be empty"));
        }
        Ok(Self {
            rp_id: rp_id.trim().to_string(),
            rp_name: rp_name.trim().to_string(),
            origin: normalize_origin(origin)?,
            challenge_ttl,
        })
    }

    #[must_use]
    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    #[must_use]
    pub fn rp_name(&self) -> &str {
        &self.rp_name
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    #[must_use]
    pub fn challenge_ttl(&self) -> Duration {
        self.challenge_ttl
    }

    /// SHA-256 of the RP ID, the value authenticators embed in their data.
    #[must_use]
    pub fn rp_id_hash(&self) -> [u8; 32] {
        Sha256::digest(self.rp_id.as_bytes()).into()
    }
}

fn normalize_origin(origin: &str) -> Result<String> {
    let parsed = Url::parse(origin).map_err(|_| anyhow!("Invalid origin URL: {origin}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Origin must include a host: {origin}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    Ok(format!("{}://{}{}", parsed.scheme(), host, port))
}

pub struct PasskeyService<U, C, K> {
    pub(super) config: RpConfig,
    pub(super) users: U,
    pub(super) credentials: C,
    pub(super) challenges: ChallengeStore<K>,
}

impl<U, C, K> PasskeyService<U, C, K>
where
    U: UserStore,
    C: CredentialStore,
    K: KeyValueStore,
{
    pub fn new(config: RpConfig, users: U, credentials: C, kv: K) -> Self {
        let challenges = ChallengeStore::new(kv, config.challenge_ttl());
        Self {
            config,
            users,
            credentials,
            challenges,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RpConfig {
        &self.config
    }

    /// Check the signed client data against the consumed challenge and the
    /// configured relying party. The challenge comparison is byte-exact.
    pub(super) fn verify_client_data(
        &self,
        client_data: &[u8],
        expected_ceremony: &str,
        expected_challenge: &[u8],
    ) -> Result<(), WebauthnError> {
        let data = CollectedClientData::parse(client_data)?;
        if data.ceremony != expected_ceremony {
            return Err(WebauthnError::ChallengeMismatch);
        }
        if data.challenge != types::b64url_encode(expected_challenge) {
            return Err(WebauthnError::ChallengeMismatch);
        }
        if data.origin != self.config.origin() {
            return Err(WebauthnError::ChallengeMismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryCredentialStore, MemoryKv, MemoryUserStore};

    fn service() -> PasskeyService<MemoryUserStore, MemoryCredentialStore, MemoryKv> {
        let config = RpConfig::new(
            "example.com",
            "Example",
            "https://app.example.com",
            DEFAULT_CHALLENGE_TTL,
        )
        .expect("valid config");
        PasskeyService::new(
            config,
            MemoryUserStore::new(),
            MemoryCredentialStore::new(),
            MemoryKv::new(),
        )
    }

    #[test]
    fn rp_config_rejects_empty_rp_id() {
        assert!(RpConfig::new(" ", "Example", "https://x.com", DEFAULT_CHALLENGE_TTL).is_err());
    }

    #[test]
    fn rp_config_rejects_hostless_origin() {
        assert!(
            RpConfig::new("example.com", "Example", "not a url", DEFAULT_CHALLENGE_TTL).is_err()
        );
    }

    #[test]
    fn origin_is_normalized_without_path() {
        let config = RpConfig::new(
            "example.com",
            "Example",
            "https://app.example.com/login/",
            DEFAULT_CHALLENGE_TTL,
        )
        .expect("valid config");
        assert_eq!(config.origin(), "https://app.example.com");
    }

    #[test]
    fn rp_id_hash_is_sha256_of_rp_id() {
        let config = RpConfig::new(
            "example.com",
            "Example",
            "https://app.example.com",
            DEFAULT_CHALLENGE_TTL,
        )
        .expect("valid config");
        let expected: [u8; 32] = Sha256::digest(b"example.com").into();
        assert_eq!(config.rp_id_hash(), expected);
    }

    #[test]
    fn client_data_ceremony_mismatch_is_rejected() {
        let service = service();
        let challenge = b"0123456789abcdef0123456789abcdef";
        let client_data = format!(
            r#"{{"type":"webauthn.get","challenge":"{}","origin":"https://app.example.com"}}"#,
            types::b64url_encode(challenge)
        );
        let result =
            service.verify_client_data(client_data.as_bytes(), "webauthn.create", challenge);
        assert!(matches!(result, Err(WebauthnError::ChallengeMismatch)));
    }

    #[test]
    fn client_data_origin_mismatch_is_rejected() {
        let service = service();
        let challenge = b"0123456789abcdef0123456789abcdef";
        let client_data = format!(
            r#"{{"type":"webauthn.create","challenge":"{}","origin":"https://evil.example.com"}}"#,
            types::b64url_encode(challenge)
        );
        let result =
            service.verify_client_data(client_data.as_bytes(), "webauthn.create", challenge);
        assert!(matches!(result, Err(WebauthnError::ChallengeMismatch)));
    }

    #[test]
    fn client_data_match_is_accepted() {
        let service = service();
        let challenge = b"0123456789abcdef0123456789abcdef";
        let client_data = format!(
            r#"{{"type":"webauthn.create","challenge":"{}","origin":"https://app.example.com"}}"#,
            types::b64url_encode(challenge)
        );
        let result =
            service.verify_client_data(client_data.as_bytes(), "webauthn.create", challenge);
        assert!(result.is_ok());
    }
}
