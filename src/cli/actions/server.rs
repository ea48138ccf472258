use crate::{api, guard::GuardConfig, limiter::LimiterConfig};
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub redis_url: Option<String>,
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
    pub limiter: LimiterConfig,
    pub guard: GuardConfig,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = api::handlers::auth::AuthConfig::new(
        args.frontend_base_url,
        args.access_secret,
        args.refresh_secret,
    )
    .with_token_issuer(args.token_issuer)
    .with_token_audience(args.token_audience)
    .with_access_ttl_seconds(args.access_ttl_seconds)
    .with_remember_access_ttl_seconds(args.remember_access_ttl_seconds)
    .with_refresh_ttl_seconds(args.refresh_ttl_seconds)
    .with_remember_refresh_ttl_seconds(args.remember_refresh_ttl_seconds)
    .with_profile_cache_ttl_seconds(args.profile_cache_ttl_seconds)
    .with_limiter(args.limiter)
    .with_guard(args.guard);

    api::new(args.port, args.dsn, args.redis_url, auth_config).await
}
