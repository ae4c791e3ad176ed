//! Passkey ceremony endpoints.
//!
//! Registration requires an authenticated principal (the user signed in with
//! a one-time code or an existing passkey first). Login is public and keyed
//! by email. Raw authenticator payloads are never logged.

use crate::api::AppPasskeyService;
use crate::api::handlers::auth::{
    AuthConfig,
    principal::Principal,
    session::session_cookie,
    storage::{PgSessionStore, SessionStore},
};
use crate::store::{User, UserStore};
use crate::webauthn::{
    AssertionResponse, AttestationResponse, AuthenticationOptions, RegistrationOptions,
    WebauthnError,
};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasskeyLoginStartRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PasskeyLoginFinishRequest {
    pub email: String,
    pub assertion: AssertionResponse,
}

#[utoipa::path(
    post,
    path = "/v1/auth/passkeys/register/start",
    responses(
        (status = 200, description = "Registration challenge issued", body = RegistrationOptions),
        (status = 401, description = "Not signed in")
    ),
    tag = "passkeys"
)]
/// Issue a passkey registration challenge for the signed-in user.
pub async fn register_start(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    service: Extension<Arc<AppPasskeyService>>,
) -> impl IntoResponse {
    let user = match require_user(&headers, &pool).await {
        Ok(user) => user,
        Err(status) => return status.into_response(),
    };

    match service.register_begin(&user).await {
        Ok(options) => (StatusCode::OK, Json(options)).into_response(),
        Err(err) => {
            let (status, message) = webauthn_error_response(&err);
            warn!(user_id = %user.id, "passkey registration start failed: {err}");
            (status, message).into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/passkeys/register/finish",
    request_body = AttestationResponse,
    responses(
        (status = 204, description = "Passkey registered"),
        (status = 400, description = "Invalid attestation"),
        (status = 401, description = "Not signed in")
    ),
    tag = "passkeys"
)]
/// Verify the attestation and persist the new credential.
pub async fn register_finish(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    service: Extension<Arc<AppPasskeyService>>,
    payload: Option<Json<AttestationResponse>>,
) -> impl IntoResponse {
    let user = match require_user(&headers, &pool).await {
        Ok(user) => user,
        Err(status) => return status.into_response(),
    };
    let Some(Json(response)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match service.register_finish(&user, &response).await {
        Ok(credential) => {
            info!(
                user_id = %user.id,
                credential_len = credential.credential_id.len(),
                "passkey registered"
            );
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => {
            let (status, message) = webauthn_error_response(&err);
            warn!(user_id = %user.id, "passkey registration failed: {err}");
            (status, message).into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/passkeys/login/start",
    request_body = PasskeyLoginStartRequest,
    responses(
        (status = 200, description = "Authentication challenge issued", body = AuthenticationOptions),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "passkeys"
)]
/// Issue a passkey authentication challenge for an email.
pub async fn login_start(
    service: Extension<Arc<AppPasskeyService>>,
    payload: Option<Json<PasskeyLoginStartRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let email = request.email.trim().to_lowercase();
    if email.is_empty() {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    match service.auth_begin(&email).await {
        Ok(options) => (StatusCode::OK, Json(options)).into_response(),
        Err(err) => {
            let (status, message) = webauthn_error_response(&err);
            warn!("passkey login start failed: {err}");
            (status, message).into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/passkeys/login/finish",
    request_body = PasskeyLoginFinishRequest,
    responses(
        (status = 204, description = "Login verified, session cookie set"),
        (status = 400, description = "Invalid assertion"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "passkeys"
)]
/// Verify the assertion and mint a session cookie.
pub async fn login_finish(
    pool: Extension<PgPool>,
    config: Extension<Arc<AuthConfig>>,
    service: Extension<Arc<AppPasskeyService>>,
    payload: Option<Json<PasskeyLoginFinishRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let email = request.email.trim().to_lowercase();

    let user = match service.auth_finish(&email, &request.assertion).await {
        Ok(user) => user,
        Err(err) => {
            let (status, message) = webauthn_error_response(&err);
            warn!("passkey login failed: {err}");
            return (status, message).into_response();
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
            info!(user_id = %user.id, "passkey login verified");
            (StatusCode::NO_CONTENT, response_headers).into_response()
        }
        Err(err) => {
            error!(user_id = %user.id, "Failed to set session cookie: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string()).into_response()
        }
    }
}

/// Resolve the principal and load its full user record, or reject with 401.
async fn require_user(headers: &HeaderMap, pool: &PgPool) -> Result<User, StatusCode> {
    let principal = Principal::resolve(headers, pool).await?;
    let Principal::Authenticated { email, .. } = principal else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    let users = crate::store::PgUserStore::new(pool.clone());
    match users.find_by_email(&email).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(StatusCode::UNAUTHORIZED),
        Err(err) => {
            error!("Failed to load user for principal: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Map protocol errors to HTTP statuses. Identity and credential failures all
/// render as a generic 401 so the endpoint cannot be used to enumerate
/// accounts.
fn webauthn_error_response(err: &WebauthnError) -> (StatusCode, String) {
    match err {
        WebauthnError::UnknownIdentity
        | WebauthnError::UnknownCredential
        | WebauthnError::InvalidSignature
        | WebauthnError::ReplayDetected => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
        }
        WebauthnError::ChallengeExpiredOrMissing => (
            StatusCode::BAD_REQUEST,
            "Challenge expired, restart the ceremony".to_string(),
        ),
        WebauthnError::MalformedAttestation
        | WebauthnError::MalformedPublicKey
        | WebauthnError::ChallengeMismatch => (
            StatusCode::BAD_REQUEST,
            "Invalid authenticator response".to_string(),
        ),
        WebauthnError::Storage(inner) => {
            error!("passkey storage failure: {inner}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Request failed".to_string(),
            )
        }
    }
}
