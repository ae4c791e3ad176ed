//! Challenge lifecycle: issue, store with TTL, consume exactly once.
//!
//! Challenges live in the external key-value collaborator, never in process
//! memory, so horizontal scaling and restarts cannot lose or duplicate them.
//! At most one challenge is live per (purpose, identity); issuing a new one
//! overwrites the prior entry and resets its expiry.

use super::error::WebauthnError;
use crate::store::KeyValueStore;
use anyhow::Context;
use rand::{RngCore, rngs::OsRng};
use std::fmt;
use std::time::Duration;

/// Challenges carry at least 32 bytes of entropy.
pub const CHALLENGE_LEN: usize = 32;

/// Which ceremony a challenge was issued for. Registration and authentication
/// challenges are stored under separate keys and never interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengePurpose {
    Registration,
    Authentication,
}

impl fmt::Display for ChallengePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registration => write!(f, "registration"),
            Self::Authentication => write!(f, "authentication"),
        }
    }
}

pub struct ChallengeStore<K> {
    kv: K,
    ttl: Duration,
}

impl<K: KeyValueStore> ChallengeStore<K> {
    pub fn new(kv: K, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    fn key(purpose: ChallengePurpose, identity: &str) -> String {
        format!("webauthn:{purpose}:{identity}")
    }

    /// Generate and store a fresh random challenge for (purpose, identity),
    /// replacing any live one. Returns the raw bytes; callers encode them for
    /// transport.
    ///
    /// # Errors
    /// `Storage` if the key-value collaborator fails.
    pub async fn issue(
        &self,
        purpose: ChallengePurpose,
        identity: &str,
    ) -> Result<Vec<u8>, WebauthnError> {
        let mut challenge = vec![0u8; CHALLENGE_LEN];
        OsRng
            .try_fill_bytes(&mut challenge)
            .context("failed to generate challenge")?;
        self.kv
            .set(&Self::key(purpose, identity), &challenge, self.ttl)
            .await?;
        Ok(challenge)
    }

    /// Retrieve and atomically delete the stored challenge.
    ///
    /// # Errors
    /// `ChallengeExpiredOrMissing` when no live challenge exists; when two
    /// finish calls race, the key-value delete decides the single winner and
    /// the loser lands here.
    pub async fn consume(
        &self,
        purpose: ChallengePurpose,
        identity: &str,
    ) -> Result<Vec<u8>, WebauthnError> {
        self.kv
            .get_and_delete(&Self::key(purpose, identity))
            .await?
            .ok_or(WebauthnError::ChallengeExpiredOrMissing)
    }
}
