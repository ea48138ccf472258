//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{auth, limits};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches.get_one::<String>("dsn").cloned();
    let redis_url = matches.get_one::<String>("redis-url").cloned();

    let auth_opts = auth::Options::parse(matches)?;
    let limit_opts = limits::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        redis_url,
        frontend_base_url: auth_opts.frontend_base_url,
        access_secret: auth_opts.access_secret,
        refresh_secret: auth_opts.refresh_secret,
        token_issuer: auth_opts.token_issuer,
        token_audience: auth_opts.token_audience,
        access_ttl_seconds: auth_opts.access_ttl_seconds,
        remember_access_ttl_seconds: auth_opts.remember_access_ttl_seconds,
        refresh_ttl_seconds: auth_opts.refresh_ttl_seconds,
        remember_refresh_ttl_seconds: auth_opts.remember_refresh_ttl_seconds,
        profile_cache_ttl_seconds: auth_opts.profile_cache_ttl_seconds,
        limiter: limit_opts.limiter,
        guard: limit_opts.guard,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn server_action_from_env() {
        temp_env::with_vars(
            [
                ("GATEKEEPER_PORT", Some("9090")),
                (
                    "GATEKEEPER_DSN",
                    Some("postgres://user@localhost:5432/gatekeeper"),
                ),
                ("GATEKEEPER_REDIS_URL", Some("redis://localhost:6379")),
                ("GATEKEEPER_ACCESS_SECRET", Some("access")),
                ("GATEKEEPER_REFRESH_SECRET", Some("refresh")),
                ("GATEKEEPER_RATE_LIMIT_AUTH_MAX", Some("7")),
                ("GATEKEEPER_LOCKOUT_WINDOW_SECONDS", Some("120")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["gatekeeper"]);
                let action = handler(&matches).expect("handler should succeed");

                let Action::Server(args) = action;
                assert_eq!(args.port, 9090);
                assert_eq!(
                    args.dsn.as_deref(),
                    Some("postgres://user@localhost:5432/gatekeeper")
                );
                assert_eq!(args.redis_url.as_deref(), Some("redis://localhost:6379"));
                assert_eq!(args.token_issuer, "gatekeeper");
                assert_eq!(args.token_audience, "platform");
                assert_eq!(args.limiter.auth.max, 7);
                assert_eq!(args.guard.window, Duration::from_secs(120));
            },
        );
    }

    #[test]
    fn server_action_defaults_without_stores() {
        temp_env::with_vars(
            [
                ("GATEKEEPER_PORT", None::<&str>),
                ("GATEKEEPER_DSN", None),
                ("GATEKEEPER_REDIS_URL", None),
                ("GATEKEEPER_ACCESS_SECRET", Some("access")),
                ("GATEKEEPER_REFRESH_SECRET", Some("refresh")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["gatekeeper"]);
                let action = handler(&matches).expect("handler should succeed");

                let Action::Server(args) = action;
                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, None);
                assert_eq!(args.redis_url, None);
                assert_eq!(args.access_ttl_seconds, 86400);
                assert_eq!(args.remember_refresh_ttl_seconds, 2_592_000);
                assert_eq!(args.limiter.general.max, 1000);
                assert_eq!(args.guard.identity_threshold, 5);
            },
        );
    }
}
