//! Token error callbacks
//!
//! When a protected request fails authentication the token manager classifies
//! the failure into a [`TokenErrorKind`] and invokes the callback registered for
//! that kind. Kinds without a registered callback fall back to
//! [`default_response`].

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use super::{DecodedToken, TokenType};

/// Category of an authentication failure, used as the callback registry key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenErrorKind {
    /// Token `jti` is on the blocklist
    Revoked,
    /// `exp` is in the past
    Expired,
    /// Signature or claims could not be verified
    Invalid,
    /// No bearer token on a protected request
    Missing,
    /// Token is valid but not fresh where freshness is required
    NotFresh,
    /// Refresh token used where an access token is expected, or vice versa
    WrongType,
}

impl TokenErrorKind {
    pub const ALL: [TokenErrorKind; 6] = [
        TokenErrorKind::Revoked,
        TokenErrorKind::Expired,
        TokenErrorKind::Invalid,
        TokenErrorKind::Missing,
        TokenErrorKind::NotFresh,
        TokenErrorKind::WrongType,
    ];
}

/// A classified authentication failure with whatever context was recoverable
#[derive(Debug, Clone)]
pub enum TokenFailure {
    Missing(String),
    Invalid(String),
    Expired(DecodedToken),
    WrongType {
        expected: TokenType,
        token: DecodedToken,
    },
    Revoked(DecodedToken),
    NotFresh(DecodedToken),
}

impl TokenFailure {
    pub fn kind(&self) -> TokenErrorKind {
        match self {
            Self::Missing(_) => TokenErrorKind::Missing,
            Self::Invalid(_) => TokenErrorKind::Invalid,
            Self::Expired(_) => TokenErrorKind::Expired,
            Self::WrongType { .. } => TokenErrorKind::WrongType,
            Self::Revoked(_) => TokenErrorKind::Revoked,
            Self::NotFresh(_) => TokenErrorKind::NotFresh,
        }
    }

    /// Decoded token, for the failures that happen after decoding
    pub fn token(&self) -> Option<&DecodedToken> {
        match self {
            Self::Expired(token)
            | Self::Revoked(token)
            | Self::NotFresh(token)
            | Self::WrongType { token, .. } => Some(token),
            Self::Missing(_) | Self::Invalid(_) => None,
        }
    }
}

/// JSON body plus status produced by a callback
#[derive(Debug, Clone, PartialEq)]
pub struct TokenErrorResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TokenErrorResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    pub fn unauthorized(body: Value) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, body)
    }
}

impl IntoResponse for TokenErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Registered handler for one [`TokenErrorKind`]
pub type TokenErrorCallback = Arc<dyn Fn(&TokenFailure) -> TokenErrorResponse + Send + Sync>;

/// Response used when no callback is registered for the failure's kind
pub fn default_response(failure: &TokenFailure) -> TokenErrorResponse {
    match failure {
        TokenFailure::Missing(reason) => TokenErrorResponse::unauthorized(json!({ "msg": reason })),
        TokenFailure::Invalid(reason) => {
            TokenErrorResponse::new(StatusCode::UNPROCESSABLE_ENTITY, json!({ "msg": reason }))
        }
        TokenFailure::Expired(_) => {
            TokenErrorResponse::unauthorized(json!({ "msg": "Token has expired" }))
        }
        TokenFailure::Revoked(_) => {
            TokenErrorResponse::unauthorized(json!({ "msg": "Token has been revoked" }))
        }
        TokenFailure::NotFresh(_) => {
            TokenErrorResponse::unauthorized(json!({ "msg": "Fresh token required" }))
        }
        TokenFailure::WrongType { expected, .. } => {
            let msg = match expected {
                TokenType::Access => "Only non-refresh tokens are allowed",
                TokenType::Refresh => "Only refresh tokens are allowed",
            };
            TokenErrorResponse::new(StatusCode::UNPROCESSABLE_ENTITY, json!({ "msg": msg }))
        }
    }
}

// Application callbacks. Existing clients match on these bodies, keep them verbatim.

pub fn revoked_token_callback(_failure: &TokenFailure) -> TokenErrorResponse {
    TokenErrorResponse::unauthorized(json!({
        "description": "The token has been revoked.",
        "error": "token_revoked",
    }))
}

pub fn expired_token_callback(_failure: &TokenFailure) -> TokenErrorResponse {
    TokenErrorResponse::unauthorized(json!({
        "message": "The token has expired.",
        "error": "token_expired",
    }))
}

pub fn invalid_token_callback(_failure: &TokenFailure) -> TokenErrorResponse {
    TokenErrorResponse::unauthorized(json!({
        "message": "Signature verification failed.",
        "error": "invalid_token",
    }))
}

pub fn missing_token_callback(_failure: &TokenFailure) -> TokenErrorResponse {
    TokenErrorResponse::unauthorized(json!({
        "description": "Request does not contain an access token.",
        "error": "authorization_required",
    }))
}

pub fn token_not_fresh_callback(_failure: &TokenFailure) -> TokenErrorResponse {
    TokenErrorResponse::unauthorized(json!({
        "description": "The token is not fresh.",
        "error": "fresh_token_required",
    }))
}
