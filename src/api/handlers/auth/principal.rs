//! Request principal derived from the session cookie.

use axum::http::{HeaderMap, StatusCode};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use super::session::extract_session_token;
use super::storage::{PgSessionStore, SessionRecord, SessionStore};
use super::utils::hash_session_token;

/// Who is making the request, decided once per request from the cookie or
/// bearer token. Handlers match on this instead of re-reading headers.
#[derive(Debug, Clone)]
pub(crate) enum Principal {
    Authenticated { user_id: Uuid, email: String },
    Anonymous,
}

impl Principal {
    /// Resolve the principal for a request. Missing or invalid cookies are
    /// `Anonymous`, never an error, so public endpoints stay reachable.
    pub(crate) async fn resolve(headers: &HeaderMap, pool: &PgPool) -> Result<Self, StatusCode> {
        let Some(token) = extract_session_token(headers) else {
            return Ok(Self::Anonymous);
        };
        let token_hash = hash_session_token(&token);
        match PgSessionStore::new(pool.clone()).lookup(&token_hash).await {
            Ok(Some(SessionRecord { user_id, email })) => {
                Ok(Self::Authenticated { user_id, email })
            }
            Ok(None) => Ok(Self::Anonymous),
            Err(err) => {
                error!("Failed to lookup session: {err}");
                Err(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
