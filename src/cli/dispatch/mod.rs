//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the action to run, currently only the API
//! server with its full configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{auth, rp};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let rp_opts = rp::Options::parse(matches)?;
    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        rp_id: rp_opts.rp_id,
        rp_name: rp_opts.rp_name,
        origin: rp_opts.origin,
        challenge_ttl_seconds: rp_opts.challenge_ttl_seconds,
        frontend_base_url: auth_opts.frontend_base_url,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        session_cookie_secure: auth_opts.session_cookie_secure,
        otp_ttl_seconds: auth_opts.otp_ttl_seconds,
    }))
}
