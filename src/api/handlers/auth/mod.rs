//! Auth handlers: one-time-code email login and session management.
//!
//! Login is passwordless. `POST /v1/auth/login` creates the user on first
//! contact, stores the SHA-256 digest of a short-lived 6-digit code in the
//! key-value collaborator, and hands the code to the email sender.
//! `POST /v1/auth/login/confirm` consumes the digest with an atomic
//! compare-and-delete and mints a session cookie. Codes are deleted only on
//! success so a typo does not force a new email.

pub(crate) mod principal;
pub(crate) mod session;
pub(crate) mod state;
pub(crate) mod storage;
mod utils;

pub use state::AuthConfig;

use crate::api::email::{EmailSender, login_code_message};
use crate::store::{KeyValueStore, PgKv, PgUserStore, UserStore};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

use session::session_cookie;
use storage::{PgSessionStore, SessionStore};
use utils::{generate_login_code, hash_login_code, login_code_key, normalize_email, valid_email};

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginConfirmRequest {
    pub email: String,
    pub code: String,
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login code sent"),
        (status = 201, description = "Account created and login code sent"),
        (status = 400, description = "Invalid email")
    ),
    tag = "auth"
)]
/// Start a login: create the account on first contact and email a one-time
/// code. Re-requesting overwrites any pending code.
pub async fn login(
    pool: Extension<PgPool>,
    config: Extension<Arc<AuthConfig>>,
    sender: Extension<Arc<dyn EmailSender>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    let users = PgUserStore::new(pool.0.clone());
    let (user, created) = match users.find_or_create(&email).await {
        Ok(result) => result,
        Err(err) => {
            error!("Failed to create user for login: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string())
                .into_response();
        }
    };

    let code = generate_login_code();
    let kv = PgKv::new(pool.0.clone());
    if let Err(err) = kv
        .set(&login_code_key(&email), &hash_login_code(&code), config.otp_ttl())
        .await
    {
        error!(user_id = %user.id, "Failed to store login code: {err}");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string()).into_response();
    }

    let ttl_minutes = config.otp_ttl().as_secs() / 60;
    if let Err(err) = sender.send(&login_code_message(&email, &code, ttl_minutes)) {
        error!(user_id = %user.id, "Failed to send login code: {err}");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string()).into_response();
    }

    info!(user_id = %user.id, created, "login code issued");
    if created {
        StatusCode::CREATED.into_response()
    } else {
        StatusCode::OK.into_response()
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/login/confirm",
    request_body = LoginConfirmRequest,
    responses(
        (status = 204, description = "Login confirmed, session cookie set"),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Wrong or expired code")
    ),
    tag = "auth"
)]
/// Confirm a login code and mint a session. The stored digest is consumed
/// with a single compare-and-delete, so only one confirm can win the code; a
/// wrong code leaves it in place for a retry.
pub async fn login_confirm(
    pool: Extension<PgPool>,
    config: Extension<Arc<AuthConfig>>,
    payload: Option<Json<LoginConfirmRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    // One compare-and-delete round trip: the store compares fixed-width
    // digests and deletes the entry only on a match, so two confirms racing
    // on the same code cannot both mint a session.
    let kv = PgKv::new(pool.0.clone());
    let digest = hash_login_code(request.code.trim());
    let consumed = match kv.consume_if_eq(&login_code_key(&email), &digest).await {
        Ok(consumed) => consumed,
        Err(err) => {
            error!("Failed to consume login code: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string())
                .into_response();
        }
    };
    if !consumed {
        return (StatusCode::UNAUTHORIZED, "Invalid code".to_string()).into_response();
    }

    let users = PgUserStore::new(pool.0.clone());
    let user = match users.find_by_email(&email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (StatusCode::UNAUTHORIZED, "Invalid code".to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to load user for login confirm: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string())
                .into_response();
        }
    };

    let sessions = PgSessionStore::new(pool.0.clone());
    let token = match sessions.insert(user.id, config.session_ttl_seconds()).await {
        Ok(token) => token,
        Err(err) => {
            error!(user_id = %user.id, "Failed to create session: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string())
                .into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    match session_cookie(&config, &token) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
            info!(user_id = %user.id, "login confirmed");
            (StatusCode::NO_CONTENT, response_headers).into_response()
        }
        Err(err) => {
            error!(user_id = %user.id, "Failed to set session cookie: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string()).into_response()
        }
    }
}
