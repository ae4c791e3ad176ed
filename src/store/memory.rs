//! In-process collaborator stubs for local development and tests.
//!
//! These mirror the contracts of the Postgres implementations, including TTL
//! and atomic-consume semantics, but keep everything in a mutex-guarded map.
//! Authentication-critical state must not live here in production; the server
//! always wires the Postgres-backed stores.

use super::{Credential, CredentialStore, KeyValueStore, User, UserStore};
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for MemoryUserStore {
    async fn find_or_create(&self, email: &str) -> Result<(User, bool)> {
        let mut users = self.users.lock().expect("user store lock poisoned");
        if let Some(user) = users.get(email) {
            return Ok((user.clone(), false));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        users.insert(email.to_string(), user.clone());
        Ok((user, true))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.lock().expect("user store lock poisoned");
        Ok(users.get(email).cloned())
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    credentials: Mutex<Vec<Credential>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Credential>> {
        let credentials = self.credentials.lock().expect("credential lock poisoned");
        Ok(credentials
            .iter()
            .filter(|cred| cred.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_by_credential_id(&self, credential_id: &[u8]) -> Result<Option<Credential>> {
        let credentials = self.credentials.lock().expect("credential lock poisoned");
        Ok(credentials
            .iter()
            .find(|cred| cred.credential_id == credential_id)
            .cloned())
    }

    async fn insert(&self, credential: &Credential) -> Result<()> {
        let mut credentials = self.credentials.lock().expect("credential lock poisoned");
        credentials.push(credential.clone());
        Ok(())
    }

    async fn update_counter(&self, credential_id: &[u8], sign_count: i64) -> Result<()> {
        let mut credentials = self.credentials.lock().expect("credential lock poisoned");
        if let Some(cred) = credentials
            .iter_mut()
            .find(|cred| cred.credential_id == credential_id)
        {
            cred.sign_count = cred.sign_count.max(sign_count);
            cred.last_used_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn prune(entries: &mut HashMap<String, (Vec<u8>, Instant)>) {
        entries.retain(|_, (_, deadline)| *deadline > Instant::now());
    }
}

impl KeyValueStore for MemoryKv {
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().expect("kv lock poisoned");
        Self::prune(&mut entries);
        entries.insert(key.to_string(), (value.to_vec(), Instant::now() + ttl));
        Ok(())
    }

    async fn get_and_delete(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().expect("kv lock poisoned");
        Self::prune(&mut entries);
        Ok(entries.remove(key).map(|(value, _)| value))
    }

    async fn consume_if_eq(&self, key: &str, expected: &[u8]) -> Result<bool> {
        let mut entries = self.entries.lock().expect("kv lock poisoned");
        Self::prune(&mut entries);
        if entries.get(key).is_some_and(|(value, _)| value == expected) {
            entries.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().expect("kv lock poisoned");
        Self::prune(&mut entries);
        Ok(entries.get(key).map(|(value, _)| value.clone()))
    }
}
