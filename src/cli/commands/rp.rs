use clap::{Arg, Command};

pub const ARG_RP_ID: &str = "rp-id";
pub const ARG_RP_NAME: &str = "rp-name";
pub const ARG_ORIGIN: &str = "origin";
pub const ARG_CHALLENGE_TTL_SECONDS: &str = "challenge-ttl-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_RP_ID)
                .long(ARG_RP_ID)
                .help("Relying-party ID, the registrable domain passkeys are scoped to")
                .env("TESSERA_RP_ID")
                .required(true),
        )
        .arg(
            Arg::new(ARG_RP_NAME)
                .long(ARG_RP_NAME)
                .help("Human-readable relying-party name shown by authenticators")
                .env("TESSERA_RP_NAME")
                .default_value("Tessera"),
        )
        .arg(
            Arg::new(ARG_ORIGIN)
                .long(ARG_ORIGIN)
                .help("Web origin ceremonies must come from, e.g. https://app.example.com")
                .env("TESSERA_ORIGIN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_CHALLENGE_TTL_SECONDS)
                .long(ARG_CHALLENGE_TTL_SECONDS)
                .help("TTL for pending ceremony challenges in seconds")
                .env("TESSERA_CHALLENGE_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub rp_id: String,
    pub rp_name: String,
    pub origin: String,
    pub challenge_ttl_seconds: u64,
}

impl Options {
    /// Extract relying-party options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &clap::ArgMatches) -> anyhow::Result<Self> {
        use anyhow::Context;

        Ok(Self {
            rp_id: matches
                .get_one::<String>(ARG_RP_ID)
                .cloned()
                .context("missing required argument: --rp-id")?,
            rp_name: matches
                .get_one::<String>(ARG_RP_NAME)
                .cloned()
                .context("missing required argument: --rp-name")?,
            origin: matches
                .get_one::<String>(ARG_ORIGIN)
                .cloned()
                .context("missing required argument: --origin")?,
            challenge_ttl_seconds: matches
                .get_one::<u64>(ARG_CHALLENGE_TTL_SECONDS)
                .copied()
                .unwrap_or(900),
        })
    }
}
