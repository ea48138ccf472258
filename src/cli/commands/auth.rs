use anyhow::{Context, Result};
use clap::{Arg, Command};
use secrecy::SecretString;

pub const ARG_ACCESS_SECRET: &str = "access-secret";
pub const ARG_REFRESH_SECRET: &str = "refresh-secret";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_secret_args(command);
    with_token_args(command)
}

fn with_secret_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL, the only origin allowed by CORS")
                .env("GATEKEEPER_FRONTEND_BASE_URL")
                .default_value("https://app.gatekeeper.dev"),
        )
        .arg(
            Arg::new(ARG_ACCESS_SECRET)
                .long(ARG_ACCESS_SECRET)
                .help("HMAC secret used to sign access tokens")
                .env("GATEKEEPER_ACCESS_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_REFRESH_SECRET)
                .long(ARG_REFRESH_SECRET)
                .help("HMAC secret used to sign refresh tokens")
                .env("GATEKEEPER_REFRESH_SECRET")
                .hide_env_values(true)
                .required(true),
        )
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("token-issuer")
                .long("token-issuer")
                .help("Issuer claim stamped into every token")
                .env("GATEKEEPER_TOKEN_ISSUER")
                .default_value("gatekeeper"),
        )
        .arg(
            Arg::new("token-audience")
                .long("token-audience")
                .help("Audience claim stamped into every token")
                .env("GATEKEEPER_TOKEN_AUDIENCE")
                .default_value("platform"),
        )
        .arg(
            Arg::new("access-ttl-seconds")
                .long("access-ttl-seconds")
                .help("Access token TTL in seconds")
                .env("GATEKEEPER_ACCESS_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("remember-access-ttl-seconds")
                .long("remember-access-ttl-seconds")
                .help("Access token TTL in seconds when remember-me is requested")
                .env("GATEKEEPER_REMEMBER_ACCESS_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("refresh-ttl-seconds")
                .long("refresh-ttl-seconds")
                .help("Refresh token TTL in seconds")
                .env("GATEKEEPER_REFRESH_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("remember-refresh-ttl-seconds")
                .long("remember-refresh-ttl-seconds")
                .help("Refresh token TTL in seconds when remember-me is requested")
                .env("GATEKEEPER_REMEMBER_REFRESH_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("profile-cache-ttl-seconds")
                .long("profile-cache-ttl-seconds")
                .help("How long verified identity profiles are cached in-process")
                .env("GATEKEEPER_PROFILE_CACHE_TTL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub access_secret: SecretString,
    pub refresh_secret: SecretString,
    pub token_issuer: String,
    pub token_audience: String,
    pub access_ttl_seconds: u64,
    pub remember_access_ttl_seconds: u64,
    pub refresh_ttl_seconds: u64,
    pub remember_refresh_ttl_seconds: u64,
    pub profile_cache_ttl_seconds: u64,
}

impl Options {
    /// Collect auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let ttl = |name: &str| -> Result<u64> {
            matches
                .get_one::<u64>(name)
                .copied()
                .with_context(|| format!("missing required argument: --{name}"))
        };

        Ok(Self {
            frontend_base_url: matches
                .get_one::<String>("frontend-base-url")
                .cloned()
                .context("missing required argument: --frontend-base-url")?,
            access_secret: matches
                .get_one::<String>(ARG_ACCESS_SECRET)
                .cloned()
                .map(SecretString::from)
                .with_context(|| format!("missing required argument: --{ARG_ACCESS_SECRET}"))?,
            refresh_secret: matches
                .get_one::<String>(ARG_REFRESH_SECRET)
                .cloned()
                .map(SecretString::from)
                .with_context(|| format!("missing required argument: --{ARG_REFRESH_SECRET}"))?,
            token_issuer: matches
                .get_one::<String>("token-issuer")
                .cloned()
                .context("missing required argument: --token-issuer")?,
            token_audience: matches
                .get_one::<String>("token-audience")
                .cloned()
                .context("missing required argument: --token-audience")?,
            access_ttl_seconds: ttl("access-ttl-seconds")?,
            remember_access_ttl_seconds: ttl("remember-access-ttl-seconds")?,
            refresh_ttl_seconds: ttl("refresh-ttl-seconds")?,
            remember_refresh_ttl_seconds: ttl("remember-refresh-ttl-seconds")?,
            profile_cache_ttl_seconds: ttl("profile-cache-ttl-seconds")?,
        })
    }
}
