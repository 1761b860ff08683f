//! Upgrade request checks: path, origin and session token.
//!
//! Runs inside the WebSocket handshake callback, before any connection
//! state exists. A rejection becomes a plain HTTP error response and the
//! socket is dropped.

use crate::auth::{Claims, SessionVerifier};
use crate::config::ListenConfig;
use crate::error::AuthError;
use http::header::{ORIGIN, SEC_WEBSOCKET_PROTOCOL};
use http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use url::form_urlencoded;

/// Where the client put its session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// `Sec-WebSocket-Protocol` header; echoed back as the negotiated subprotocol.
    Subprotocol,
    /// `?token=` query parameter.
    Query,
}

/// A session token pulled from an upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub source: TokenSource,
}

/// Why an upgrade was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotFound,
    OriginNotAllowed(String),
    Unauthorized(AuthError),
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::OriginNotAllowed(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn into_response(self) -> ErrorResponse {
        let body = match &self {
            Self::NotFound => "not found".to_string(),
            Self::OriginNotAllowed(_) => "origin not allowed".to_string(),
            Self::Unauthorized(e) => e.to_string(),
        };
        let mut response = ErrorResponse::new(Some(body));
        *response.status_mut() = self.status();
        response
    }
}

/// Upgrade path and origin rules from `[listen]`.
#[derive(Debug, Clone)]
pub struct HandshakePolicy {
    pub path: String,
    pub allow_origins: Vec<String>,
}

impl From<&ListenConfig> for HandshakePolicy {
    fn from(config: &ListenConfig) -> Self {
        Self {
            path: config.path.clone(),
            allow_origins: config.allow_origins.clone(),
        }
    }
}

/// Find the session token: subprotocol header first, then the query string.
pub fn extract_token(request: &Request) -> Option<Credential> {
    let header = request
        .headers()
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(token) = header {
        return Some(Credential {
            token: token.to_string(),
            source: TokenSource::Subprotocol,
        });
    }

    let query = request.uri().query()?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, value)| key == "token" && !value.is_empty())
        .map(|(_, value)| Credential {
            token: value.into_owned(),
            source: TokenSource::Query,
        })
}

/// An empty allow list admits every origin, as does a `*` entry.
/// Requests without an `Origin` header are non-browser clients and pass.
pub fn origin_allowed(request: &Request, allowed: &[String]) -> Result<(), Rejection> {
    if allowed.is_empty() {
        return Ok(());
    }
    let Some(origin) = request.headers().get(ORIGIN).and_then(|o| o.to_str().ok()) else {
        return Ok(());
    };
    if allowed.iter().any(|a| a == origin || a == "*") {
        Ok(())
    } else {
        Err(Rejection::OriginNotAllowed(origin.to_string()))
    }
}

/// Check an upgrade request and verify its token.
///
/// On success the response carries the echoed subprotocol when the token
/// arrived that way.
pub fn authorize(
    request: &Request,
    mut response: Response,
    policy: &HandshakePolicy,
    verifier: &dyn SessionVerifier,
) -> Result<(Response, Claims), Rejection> {
    if request.uri().path() != policy.path {
        return Err(Rejection::NotFound);
    }
    origin_allowed(request, &policy.allow_origins)?;

    let credential = extract_token(request).ok_or(Rejection::Unauthorized(AuthError::Missing))?;
    let claims = verifier
        .verify(&credential.token)
        .map_err(Rejection::Unauthorized)?;

    if credential.source == TokenSource::Subprotocol {
        let value = HeaderValue::from_str(&credential.token)
            .map_err(|_| Rejection::Unauthorized(AuthError::Malformed("subprotocol value")))?;
        response.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
    }

    Ok((response, claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::HmacVerifier;
    use std::time::Duration;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn verifier() -> HmacVerifier {
        HmacVerifier::new(SECRET, "real-time-forum", Duration::from_secs(3600))
    }

    fn policy() -> HandshakePolicy {
        HandshakePolicy {
            path: "/ws".to_string(),
            allow_origins: Vec::new(),
        }
    }

    fn request(uri: &str) -> http::request::Builder {
        http::Request::builder().uri(uri)
    }

    #[test]
    fn header_token_wins_over_query() {
        let req = request("/ws?token=from-query")
            .header(SEC_WEBSOCKET_PROTOCOL, "from-header")
            .body(())
            .unwrap();
        assert_eq!(
            extract_token(&req),
            Some(Credential {
                token: "from-header".to_string(),
                source: TokenSource::Subprotocol
            })
        );
    }

    #[test]
    fn query_token_is_found() {
        let req = request("/ws?x=1&token=abc").body(()).unwrap();
        assert_eq!(extract_token(&req).unwrap().source, TokenSource::Query);
        assert_eq!(extract_token(&req).unwrap().token, "abc");

        let req = request("/ws?token=").body(()).unwrap();
        assert_eq!(extract_token(&req), None);
    }

    #[test]
    fn query_token_is_percent_decoded() {
        let req = request("/ws?token=a%2Eb%2Ec").body(()).unwrap();
        assert_eq!(extract_token(&req).unwrap().token, "a.b.c");
    }

    #[test]
    fn subprotocol_token_is_echoed() {
        let v = verifier();
        let token = v.issue(5).unwrap();
        let req = request("/ws")
            .header(SEC_WEBSOCKET_PROTOCOL, token.as_str())
            .body(())
            .unwrap();

        let (response, claims) = authorize(&req, Response::new(()), &policy(), &v).unwrap();
        assert_eq!(claims.user_id, 5);
        assert_eq!(
            response.headers().get(SEC_WEBSOCKET_PROTOCOL).unwrap(),
            token.as_str()
        );
    }

    #[test]
    fn query_token_is_not_echoed() {
        let v = verifier();
        let token = v.issue(5).unwrap();
        let req = request(&format!("/ws?token={token}")).body(()).unwrap();

        let (response, _) = authorize(&req, Response::new(()), &policy(), &v).unwrap();
        assert!(response.headers().get(SEC_WEBSOCKET_PROTOCOL).is_none());
    }

    #[test]
    fn missing_and_bad_tokens_are_unauthorized() {
        let v = verifier();
        let req = request("/ws").body(()).unwrap();
        let err = authorize(&req, Response::new(()), &policy(), &v).unwrap_err();
        assert_eq!(err, Rejection::Unauthorized(AuthError::Missing));
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);

        let other = HmacVerifier::new(
            "another-secret-another-secret-xx",
            "real-time-forum",
            Duration::from_secs(3600),
        );
        let req = request(&format!("/ws?token={}", other.issue(1).unwrap()))
            .body(())
            .unwrap();
        let err = authorize(&req, Response::new(()), &policy(), &v).unwrap_err();
        assert_eq!(err, Rejection::Unauthorized(AuthError::BadSignature));
    }

    #[test]
    fn wrong_path_is_not_found() {
        let v = verifier();
        let req = request(&format!("/chat?token={}", v.issue(1).unwrap()))
            .body(())
            .unwrap();
        let err = authorize(&req, Response::new(()), &policy(), &v).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn origin_allow_list() {
        let allowed = vec!["https://forum.example".to_string()];
        let ok = request("/ws")
            .header(ORIGIN, "https://forum.example")
            .body(())
            .unwrap();
        assert!(origin_allowed(&ok, &allowed).is_ok());

        let bad = request("/ws")
            .header(ORIGIN, "https://evil.example")
            .body(())
            .unwrap();
        assert_eq!(
            origin_allowed(&bad, &allowed),
            Err(Rejection::OriginNotAllowed("https://evil.example".to_string()))
        );

        let none = request("/ws").body(()).unwrap();
        assert!(origin_allowed(&none, &allowed).is_ok());
    }
}
