//! Shared auth configuration carried as an axum extension.

use anyhow::{Result, anyhow};
use std::time::Duration;

/// One-time login codes expire after 15 minutes.
pub const DEFAULT_OTP_TTL: Duration = Duration::from_secs(15 * 60);

/// Sessions last 30 days unless refreshed.
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    session_ttl_seconds: i64,
    session_cookie_secure: bool,
    frontend_base_url: String,
    otp_ttl: Duration,
}

impl AuthConfig {
    /// Build the auth configuration from CLI-provided values.
    ///
    /// # Errors
    /// Returns error if the session TTL is not positive or the frontend base
    /// URL is empty.
    pub fn new(
        session_ttl_seconds: i64,
        session_cookie_secure: bool,
        frontend_base_url: &str,
        otp_ttl: Duration,
    ) -> Result<Self> {
        if session_ttl_seconds <= 0 {
            return Err(anyhow!("Session TTL must be positive"));
        }
        let frontend_base_url = frontend_base_url.trim();
        if frontend_base_url.is_empty() {
            return Err(anyhow!("Frontend base URL must not be empty"));
        }
        Ok(Self {
            session_ttl_seconds,
            session_cookie_secure,
            frontend_base_url: frontend_base_url.to_string(),
            otp_ttl,
        })
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn otp_ttl(&self) -> Duration {
        self.otp_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_session_ttl() {
        assert!(AuthConfig::new(0, false, "https://app.example.com", DEFAULT_OTP_TTL).is_err());
        assert!(AuthConfig::new(-1, false, "https://app.example.com", DEFAULT_OTP_TTL).is_err());
    }

    #[test]
    fn rejects_empty_frontend_url() {
        assert!(AuthConfig::new(3600, false, "  ", DEFAULT_OTP_TTL).is_err());
    }

    #[test]
    fn trims_frontend_url() {
        let config = AuthConfig::new(3600, true, " https://app.example.com ", DEFAULT_OTP_TTL)
            .expect("valid config");
        assert_eq!(config.frontend_base_url(), "https://app.example.com");
        assert!(config.session_cookie_secure());
    }
}
