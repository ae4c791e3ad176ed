//! Storage collaborators consumed by the authentication flows.
//!
//! Three seams: durable identities (`UserStore`), durable passkey credentials
//! (`CredentialStore`), and a short-lived key-value store with per-key expiry
//! (`KeyValueStore`) used for webauthn challenges and one-time codes.
//!
//! `pg` holds the Postgres implementations used by the server; `memory` holds
//! in-process stubs for local development and tests.

pub mod memory;
pub mod pg;

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

pub use memory::{MemoryCredentialStore, MemoryKv, MemoryUserStore};
pub use pg::{PgCredentialStore, PgKv, PgUserStore};

/// A registered principal, keyed by a unique email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// One registered authenticator bound to a user.
///
/// `public_key` holds the uncompressed SEC1 point extracted from the COSE key
/// at registration time. `sign_count` is the authenticator-maintained usage
/// counter and must never decrease across updates.
#[derive(Debug, Clone)]
pub struct Credential {
    pub credential_id: Vec<u8>,
    pub user_id: Uuid,
    pub public_key: Vec<u8>,
    pub sign_count: i64,
    pub transports: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Identity lookup and creation keyed by email.
pub trait UserStore: Send + Sync {
    /// Find a user by email, creating it on first contact.
    /// Returns the user and whether it was created by this call.
    fn find_or_create(&self, email: &str) -> impl Future<Output = Result<(User, bool)>> + Send;

    /// Find a user by email without side effects.
    fn find_by_email(&self, email: &str) -> impl Future<Output = Result<Option<User>>> + Send;
}

/// Durable credential records keyed by owner and by credential id.
pub trait CredentialStore: Send + Sync {
    fn list_by_owner(&self, user_id: Uuid)
    -> impl Future<Output = Result<Vec<Credential>>> + Send;

    fn find_by_credential_id(
        &self,
        credential_id: &[u8],
    ) -> impl Future<Output = Result<Option<Credential>>> + Send;

    fn insert(&self, credential: &Credential) -> impl Future<Output = Result<()>> + Send;

    /// Persist a new signature counter for the credential and stamp its last
    /// use. Implementations must never let the stored counter go backwards.
    fn update_counter(
        &self,
        credential_id: &[u8],
        sign_count: i64,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Short-lived key-value storage with per-key expiry.
///
/// `get_and_delete` must be atomic: two concurrent callers for the same key
/// must not both observe the value.
pub trait KeyValueStore: Send + Sync {
    /// Store a value under `key`, overwriting any prior value and resetting
    /// the expiry to `ttl` from now.
    fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Retrieve and delete the value in one step. Returns `None` when the key
    /// is absent or expired.
    fn get_and_delete(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Compare-and-delete in one step: remove the key and return `true` only
    /// when a live value byte-equal to `expected` is present. A mismatch or a
    /// missing/expired key leaves the store untouched. Atomic for the same
    /// reason as `get_and_delete`: two concurrent callers must not both
    /// consume the value.
    fn consume_if_eq(
        &self,
        key: &str,
        expected: &[u8],
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Read without consuming. Returns `None` when absent or expired.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;
}
