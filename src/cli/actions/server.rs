use crate::{api, webauthn::RpConfig};
use anyhow::Result;
use std::time::Duration;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub rp_id: String,
    pub rp_name: String,
    pub origin: String,
    pub challenge_ttl_seconds: u64,
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
    pub session_cookie_secure: bool,
    pub otp_ttl_seconds: u64,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let rp_config = RpConfig::new(
        &args.rp_id,
        &args.rp_name,
        &args.origin,
        Duration::from_secs(args.challenge_ttl_seconds),
    )?;

    let auth_config = api::AuthConfig::new(
        args.session_ttl_seconds,
        args.session_cookie_secure,
        &args.frontend_base_url,
        Duration::from_secs(args.otp_ttl_seconds),
    )?;

    api::new(args.port, args.dsn, auth_config, rp_config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            port: 8080,
            dsn: "postgres://localhost/tessera".to_string(),
            rp_id: "example.com".to_string(),
            rp_name: "Example".to_string(),
            origin: "https://app.example.com".to_string(),
            challenge_ttl_seconds: 900,
            frontend_base_url: "https://app.example.com".to_string(),
            session_ttl_seconds: 2_592_000,
            session_cookie_secure: true,
            otp_ttl_seconds: 900,
        }
    }

    #[test]
    fn rp_config_from_args() {
        let args = args();
        let rp_config = RpConfig::new(
            &args.rp_id,
            &args.rp_name,
            &args.origin,
            Duration::from_secs(args.challenge_ttl_seconds),
        )
        .expect("valid config");
        assert_eq!(rp_config.rp_id(), "example.com");
        assert_eq!(rp_config.origin(), "https://app.example.com");
    }

    #[test]
    fn auth_config_from_args() {
        let args = args();
        let auth_config = api::AuthConfig::new(
            args.session_ttl_seconds,
            args.session_cookie_secure,
            &args.frontend_base_url,
            Duration::from_secs(args.otp_ttl_seconds),
        )
        .expect("valid config");
        assert!(auth_config.session_cookie_secure());
        assert_eq!(auth_config.session_ttl_seconds(), 2_592_000);
    }
}
