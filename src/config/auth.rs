//! Session token configuration.

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Deserialize;

/// Session token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret shared with the login endpoint.
    #[serde(default = "default_secret")]
    pub secret: String,
    /// Expected `iss` claim.
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// Lifetime of tokens issued by this process, in seconds (default: 24h).
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
            issuer: default_issuer(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

fn default_secret() -> String {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    tracing::warn!(
        "No auth secret configured - using ephemeral random secret. \
         Tokens issued by the login service will NOT verify. \
         Set [auth].secret in config.toml for production use."
    );
    secret
}

fn default_issuer() -> String {
    "real-time-forum".to_string()
}

fn default_token_ttl_secs() -> u64 {
    24 * 60 * 60
}
