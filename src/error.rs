//! Unified error handling for forumd.
//!
//! This module provides the error hierarchy for the real-time layer. Each
//! enum maps to one failure domain and exposes a static code for metric
//! labels. None of these ever cross from one connection into another.

use thiserror::Error;

// ============================================================================
// Handshake Errors (session verification)
// ============================================================================

/// Session token verification failures.
///
/// Every variant refuses the upgrade; the distinction exists for logs,
/// metrics and the HTTP status body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing token")]
    Missing,

    #[error("malformed token: {0}")]
    Malformed(&'static str),

    #[error("invalid token signature")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("unexpected token issuer")]
    WrongIssuer,
}

impl AuthError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Malformed(_) => "malformed",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
            Self::WrongIssuer => "wrong_issuer",
        }
    }
}

// ============================================================================
// Protocol Errors (inbound frames, never fatal)
// ============================================================================

/// Problems with a single inbound frame. The frame is dropped and the
/// connection keeps reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("frame of {size} bytes exceeds limit of {max}")]
    Oversized { size: usize, max: usize },

    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("unsupported frame type: {0}")]
    UnsupportedType(String),

    #[error("empty chat content")]
    EmptyContent,

    #[error("invalid recipient id: {0}")]
    InvalidRecipient(i64),
}

impl ProtocolError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Oversized { .. } => "oversized",
            Self::Malformed(_) => "malformed",
            Self::UnsupportedType(_) => "unsupported_type",
            Self::EmptyContent => "empty_content",
            Self::InvalidRecipient(_) => "invalid_recipient",
        }
    }
}

// ============================================================================
// Transport Errors (fatal to one connection)
// ============================================================================

/// Read or write failures on a live connection. Each one ends that
/// connection's lifecycle and nothing else.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("read error: {0}")]
    Read(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("write error: {0}")]
    Write(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("write did not complete within {0:?}")]
    WriteTimeout(std::time::Duration),

    #[error("no inbound frame within {0:?}")]
    IdleTimeout(std::time::Duration),
}

impl TransportError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Read(_) => "read",
            Self::Write(_) => "write",
            Self::WriteTimeout(_) => "write_timeout",
            Self::IdleTimeout(_) => "idle_timeout",
        }
    }
}

// ============================================================================
// Routing Errors (one chat message)
// ============================================================================

/// Why a chat message was not delivered.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid chat message: {0}")]
    Invalid(#[from] ProtocolError),

    #[error("failed to persist chat message: {0}")]
    Persistence(#[from] crate::db::DbError),
}

impl RouteError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "invalid",
            Self::Persistence(_) => "persistence",
        }
    }
}

// ============================================================================
// Database Errors (re-exported, kept in db module for sqlx proximity)
// ============================================================================

// DbError stays in db/mod.rs because it has #[from] sqlx::Error which requires
// sqlx to be in scope.
