//! Session verification.
//!
//! The real-time core depends only on [`SessionVerifier`]: a token either
//! yields [`Claims`] or an [`AuthError`]. How tokens are minted belongs to
//! the login service; [`HmacVerifier`] understands the HS256 tokens it issues.

mod token;

pub use token::HmacVerifier;

use crate::error::AuthError;
use serde::{Deserialize, Serialize};

/// Verified token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Fail-closed token check run once per connection, before upgrade.
pub trait SessionVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}
