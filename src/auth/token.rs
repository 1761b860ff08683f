//! HS256 session tokens, as minted by the forum's login endpoint.

use super::{Claims, SessionVerifier};
use crate::config::AuthConfig;
use crate::error::AuthError;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::time::Duration;

/// Verifies (and, for tooling and tests, issues) HS256 session tokens.
pub struct HmacVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl: Duration,
}

impl HmacVerifier {
    pub fn new(secret: impl AsRef<[u8]>, issuer: impl Into<String>, ttl: Duration) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            validation,
            issuer,
            ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.secret.as_bytes(),
            config.issuer.clone(),
            Duration::from_secs(config.token_ttl_secs),
        )
    }

    /// Issue a token for `user_id` valid from now for the configured lifetime.
    pub fn issue(&self, user_id: i64) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_at(user_id, chrono::Utc::now().timestamp())
    }

    /// Issue a token as if it had been minted at `issued_at` (unix seconds).
    pub fn issue_at(
        &self,
        user_id: i64,
        issued_at: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            user_id,
            iat: issued_at,
            exp: issued_at + self.ttl.as_secs() as i64,
            iss: self.issuer.clone(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }
}

impl SessionVerifier for HmacVerifier {
    fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::Missing);
        }

        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| auth_error(e.kind()))
    }
}

fn auth_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature => AuthError::BadSignature,
        ErrorKind::InvalidIssuer => AuthError::WrongIssuer,
        ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => {
            AuthError::Malformed("unsupported algorithm")
        }
        ErrorKind::MissingRequiredClaim(_) => AuthError::Malformed("missing claim"),
        ErrorKind::InvalidToken => AuthError::Malformed("expected three segments"),
        ErrorKind::Base64(_) => AuthError::Malformed("encoding"),
        ErrorKind::Json(_) | ErrorKind::Utf8(_) => AuthError::Malformed("json"),
        _ => AuthError::Malformed("token"),
    }
}
