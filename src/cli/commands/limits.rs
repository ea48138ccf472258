use crate::guard::GuardConfig;
use crate::limiter::{LimiterConfig, TierPolicy};
use anyhow::{Context, Result};
use clap::{Arg, Command};
use std::time::Duration;

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_tier_args(command);
    with_lockout_args(command)
}

fn tier_arg(name: &'static str, help: &'static str, default: &'static str) -> Arg {
    // GATEKEEPER_RATE_LIMIT_GENERAL_MAX and friends
    let env: &'static str = Box::leak(
        format!("GATEKEEPER_{}", name.replace('-', "_").to_uppercase()).into_boxed_str(),
    );
    Arg::new(name)
        .long(name)
        .help(help)
        .env(env)
        .default_value(default)
        .value_parser(clap::value_parser!(i64))
}

fn with_tier_args(command: Command) -> Command {
    command
        .arg(tier_arg(
            "rate-limit-general-max",
            "Requests allowed per window for unclassified routes",
            "1000",
        ))
        .arg(tier_arg(
            "rate-limit-general-window-seconds",
            "Window length in seconds for unclassified routes",
            "900",
        ))
        .arg(tier_arg(
            "rate-limit-auth-max",
            "Requests allowed per window for /v1/auth routes",
            "20",
        ))
        .arg(tier_arg(
            "rate-limit-auth-window-seconds",
            "Window length in seconds for /v1/auth routes",
            "900",
        ))
        .arg(tier_arg(
            "rate-limit-upload-max",
            "Requests allowed per window for upload routes",
            "50",
        ))
        .arg(tier_arg(
            "rate-limit-upload-window-seconds",
            "Window length in seconds for upload routes",
            "60",
        ))
        .arg(tier_arg(
            "rate-limit-analysis-max",
            "Requests allowed per window for analysis routes",
            "20",
        ))
        .arg(tier_arg(
            "rate-limit-analysis-window-seconds",
            "Window length in seconds for analysis routes",
            "300",
        ))
}

fn with_lockout_args(command: Command) -> Command {
    command
        .arg(tier_arg(
            "lockout-identity-threshold",
            "Failed logins per account before a lockout",
            "5",
        ))
        .arg(tier_arg(
            "lockout-origin-threshold",
            "Failed logins per client address before a lockout",
            "10",
        ))
        .arg(tier_arg(
            "lockout-window-seconds",
            "Window length in seconds for failed-login counting",
            "900",
        ))
}

#[derive(Debug)]
pub struct Options {
    pub limiter: LimiterConfig,
    pub guard: GuardConfig,
}

impl Options {
    /// Build the limiter and lockout configuration from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is somehow missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let value = |name: &str| -> Result<i64> {
            matches
                .get_one::<i64>(name)
                .copied()
                .with_context(|| format!("missing required argument: --{name}"))
        };
        let tier = |prefix: &str| -> Result<TierPolicy> {
            let max = value(&format!("{prefix}-max"))?;
            let window = value(&format!("{prefix}-window-seconds"))?;
            Ok(TierPolicy {
                max,
                window: Duration::from_secs(window.unsigned_abs()),
            })
        };

        let limiter = LimiterConfig::default()
            .with_general(tier("rate-limit-general")?)
            .with_auth(tier("rate-limit-auth")?)
            .with_upload(tier("rate-limit-upload")?)
            .with_analysis(tier("rate-limit-analysis")?);

        let guard = GuardConfig {
            identity_threshold: value("lockout-identity-threshold")?,
            origin_threshold: value("lockout-origin-threshold")?,
            window: Duration::from_secs(value("lockout-window-seconds")?.unsigned_abs()),
        };

        Ok(Self { limiter, guard })
    }
}
