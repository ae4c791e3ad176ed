//! # Tessera (Passwordless Authentication Service)
//!
//! `tessera` is a passwordless authentication backend. Users sign in with a
//! one-time email code, then enroll passkeys for subsequent logins.
//!
//! ## Email login codes
//!
//! `POST /v1/auth/login` emails a six-digit code with a short TTL; confirming
//! the code mints an opaque session cookie. Codes are single use and stored
//! server side only.
//!
//! ## Passkeys (`WebAuthn`)
//!
//! Registration and login ceremonies follow the `WebAuthn` model: the server
//! issues a random challenge, the authenticator signs it, and the server
//! verifies origin, relying-party binding, signature, and signature counter.
//! Challenges are single use and expire; counter regressions are rejected as
//! possible cloned credentials.
//!
//! ## Sessions
//!
//! Session tokens are opaque random values; only their SHA-256 hash is stored.
//! Cookies are `HttpOnly` + `SameSite=Lax`, and refresh rotates the token.

pub mod api;
pub mod cli;
pub mod store;
pub mod webauthn;
