//! JWT authentication module
//!
//! `TokenManager` issues and validates HS256 tokens signed with `JWT_SECRET_KEY`
//! and turns every validation failure into the response produced by the
//! callback registered for its [`TokenErrorKind`].
//!
//! Handlers opt in through the extractors in this module:
//! - [`AccessToken`] - any valid, non-revoked access token
//! - [`FreshAccessToken`] - same, and the token must be fresh
//! - [`RefreshToken`] - a valid, non-revoked refresh token
//! - [`OptionalAccessToken`] - `None` when no bearer token was sent

pub mod blocklist;
pub mod callbacks;
pub mod password;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Settings;
use crate::error::ApiError;

pub use blocklist::TokenBlocklist;
pub use callbacks::{
    default_response, TokenErrorCallback, TokenErrorKind, TokenErrorResponse, TokenFailure,
};

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Token flavour, serialized into the `type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by every token this server issues
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity the token was issued for (user id)
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    /// Unique token id, the blocklist key
    pub jti: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Set on access tokens issued straight from a password login
    #[serde(default)]
    pub fresh: bool,
}

/// Header and claims of a token whose signature checked out
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub header: Header,
    pub claims: Claims,
}

/// Errors on the issuing side; these are server misconfiguration, not client errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT_SECRET_KEY is not configured")]
    MissingSecret,

    #[error("Failed to encode token: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        ApiError::internal(err.to_string())
    }
}

/// Outcome of a failed request authentication
#[derive(Debug)]
pub enum AuthError {
    /// Client-side failure, answered by a registered callback
    Token(TokenFailure),
    /// Server cannot validate tokens at all
    Server(TokenError),
}

/// What a protected route demands from the bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRequirement {
    pub token_type: TokenType,
    pub fresh: bool,
    /// Absent token is allowed and yields `None`
    pub optional: bool,
}

impl TokenRequirement {
    pub const fn access() -> Self {
        Self {
            token_type: TokenType::Access,
            fresh: false,
            optional: false,
        }
    }

    pub const fn fresh_access() -> Self {
        Self {
            fresh: true,
            ..Self::access()
        }
    }

    pub const fn refresh() -> Self {
        Self {
            token_type: TokenType::Refresh,
            ..Self::access()
        }
    }

    pub const fn optional_access() -> Self {
        Self {
            optional: true,
            ..Self::access()
        }
    }
}

/// Issues, validates and revokes tokens; dispatches failures to callbacks
pub struct TokenManager {
    secret: Option<String>,
    access_expires: Duration,
    refresh_expires: Duration,
    callbacks: HashMap<TokenErrorKind, TokenErrorCallback>,
    blocklist: TokenBlocklist,
}

impl TokenManager {
    /// Create a manager using the token lifetimes from `settings`
    pub fn new(secret: Option<String>, settings: &Settings) -> Self {
        Self::with_expiry(
            secret,
            settings.access_token_expires(),
            settings.refresh_token_expires(),
        )
    }

    pub fn with_expiry(
        secret: Option<String>,
        access_expires: Duration,
        refresh_expires: Duration,
    ) -> Self {
        if secret.is_none() {
            tracing::warn!("JWT_SECRET_KEY is not set; token issuance and validation will fail");
        }

        Self {
            secret,
            access_expires,
            refresh_expires,
            callbacks: HashMap::new(),
            blocklist: TokenBlocklist::new(),
        }
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Register the callback answering failures of `kind`, replacing any previous one
    pub fn register<F>(&mut self, kind: TokenErrorKind, callback: F)
    where
        F: Fn(&TokenFailure) -> TokenErrorResponse + Send + Sync + 'static,
    {
        tracing::debug!(?kind, "Registered token error callback");
        self.callbacks.insert(kind, Arc::new(callback));
    }

    pub fn has_callback(&self, kind: TokenErrorKind) -> bool {
        self.callbacks.contains_key(&kind)
    }

    /// Build the response for a failure: registered callback, else the default
    pub fn handle(&self, failure: &TokenFailure) -> TokenErrorResponse {
        match self.callbacks.get(&failure.kind()) {
            Some(callback) => callback(failure),
            None => default_response(failure),
        }
    }

    pub fn create_access_token(&self, identity: &str, fresh: bool) -> Result<String, TokenError> {
        self.issue(identity, TokenType::Access, fresh, self.access_expires)
    }

    pub fn create_refresh_token(&self, identity: &str) -> Result<String, TokenError> {
        self.issue(identity, TokenType::Refresh, false, self.refresh_expires)
    }

    fn issue(
        &self,
        identity: &str,
        token_type: TokenType,
        fresh: bool,
        lifetime: Duration,
    ) -> Result<String, TokenError> {
        let secret = self.secret.as_deref().ok_or(TokenError::MissingSecret)?;
        let now = Utc::now().timestamp();
        let lifetime = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);

        let claims = Claims {
            sub: identity.to_string(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(lifetime),
            jti: uuid::Uuid::new_v4().to_string(),
            token_type,
            fresh,
        };

        Ok(encode(
            &Header::new(ALGORITHM),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?)
    }

    /// Verify signature and registered claims of `token`
    pub fn decode(&self, token: &str) -> Result<DecodedToken, AuthError> {
        let secret = self
            .secret
            .as_deref()
            .ok_or(AuthError::Server(TokenError::MissingSecret))?;
        let key = DecodingKey::from_secret(secret.as_bytes());

        let header = decode_header(token)
            .map_err(|e| AuthError::Token(TokenFailure::Invalid(invalid_reason(&e))))?;

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        match decode::<Claims>(token, &key, &validation) {
            Ok(data) => Ok(DecodedToken {
                header,
                claims: data.claims,
            }),
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                // Signature is good; recover the payload for the expired callback
                validation.validate_exp = false;
                let data = decode::<Claims>(token, &key, &validation)
                    .map_err(|e| AuthError::Token(TokenFailure::Invalid(invalid_reason(&e))))?;
                Err(AuthError::Token(TokenFailure::Expired(DecodedToken {
                    header,
                    claims: data.claims,
                })))
            }
            Err(e) => Err(AuthError::Token(TokenFailure::Invalid(invalid_reason(&e)))),
        }
    }

    /// Authenticate a request from its headers.
    ///
    /// Checks run in order: bearer header, signature and claims, token type,
    /// blocklist, freshness. `Ok(None)` only when the requirement is optional and
    /// no bearer token was sent.
    pub fn verify(
        &self,
        headers: &HeaderMap,
        requirement: TokenRequirement,
    ) -> Result<Option<DecodedToken>, AuthError> {
        let token = match extract_bearer_token(headers) {
            Ok(token) => token,
            Err(_) if requirement.optional => return Ok(None),
            Err(failure) => return Err(AuthError::Token(failure)),
        };

        let decoded = self.decode(token)?;

        if decoded.claims.token_type != requirement.token_type {
            return Err(AuthError::Token(TokenFailure::WrongType {
                expected: requirement.token_type,
                token: decoded,
            }));
        }

        if self.blocklist.is_revoked(&decoded.claims.jti) {
            return Err(AuthError::Token(TokenFailure::Revoked(decoded)));
        }

        if requirement.fresh && !decoded.claims.fresh {
            return Err(AuthError::Token(TokenFailure::NotFresh(decoded)));
        }

        Ok(Some(decoded))
    }

    /// Add the token to the blocklist until it expires
    pub fn revoke(&self, claims: &Claims) {
        let purged = self.blocklist.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "Dropped expired blocklist entries");
        }
        self.blocklist.revoke(claims.jti.clone(), claims.exp);
        tracing::info!(jti = %claims.jti, sub = %claims.sub, "Token revoked");
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.blocklist.is_revoked(jti)
    }

    pub fn blocklist(&self) -> &TokenBlocklist {
        &self.blocklist
    }

    /// Turn an authentication failure into the HTTP response sent to the client
    pub fn reject(&self, err: AuthError) -> Response {
        match err {
            AuthError::Token(failure) => {
                let sub = failure.token().map(|t| t.claims.sub.as_str());
                tracing::warn!(kind = ?failure.kind(), sub, "Token authentication failed");
                self.handle(&failure).into_response()
            }
            AuthError::Server(e) => ApiError::from(e).into_response(),
        }
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.callbacks.keys().collect();
        kinds.sort_by_key(|k| format!("{k:?}"));
        f.debug_struct("TokenManager")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("access_expires", &self.access_expires)
            .field("refresh_expires", &self.refresh_expires)
            .field("callbacks", &kinds)
            .field("blocklist", &self.blocklist)
            .finish()
    }
}

fn invalid_reason(err: &jsonwebtoken::errors::Error) -> String {
    match err.kind() {
        ErrorKind::InvalidSignature => "Signature verification failed".to_string(),
        ErrorKind::ImmatureSignature => "The token is not yet valid (nbf)".to_string(),
        _ => err.to_string(),
    }
}

/// Extract the Bearer token from the Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, TokenFailure> {
    let auth_value = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| TokenFailure::Missing("Missing Authorization Header".to_string()))?
        .to_str()
        .map_err(|_| TokenFailure::Missing("Invalid Authorization header encoding".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            TokenFailure::Missing(
                "Missing 'Bearer' type in 'Authorization' header. Expected 'Authorization: Bearer <JWT>'"
                    .to_string(),
            )
        })
}

fn authenticate<S>(
    parts: &Parts,
    state: &S,
    requirement: TokenRequirement,
) -> Result<Option<DecodedToken>, Response>
where
    Arc<TokenManager>: FromRef<S>,
{
    let manager = Arc::<TokenManager>::from_ref(state);
    manager
        .verify(&parts.headers, requirement)
        .map_err(|e| manager.reject(e))
}

fn required(decoded: Option<DecodedToken>) -> Result<DecodedToken, Response> {
    // verify() only returns None for optional requirements
    decoded.ok_or_else(|| ApiError::internal("token check returned no token").into_response())
}

/// Valid, non-revoked access token
#[derive(Debug, Clone)]
pub struct AccessToken(pub DecodedToken);

/// Valid, non-revoked, fresh access token
#[derive(Debug, Clone)]
pub struct FreshAccessToken(pub DecodedToken);

/// Valid, non-revoked refresh token
#[derive(Debug, Clone)]
pub struct RefreshToken(pub DecodedToken);

/// Access token when one was sent; invalid tokens are still rejected
#[derive(Debug, Clone)]
pub struct OptionalAccessToken(pub Option<DecodedToken>);

macro_rules! token_accessors {
    ($($name:ident),*) => {
        $(
            impl $name {
                pub fn claims(&self) -> &Claims {
                    &self.0.claims
                }

                /// The `sub` claim
                pub fn identity(&self) -> &str {
                    &self.0.claims.sub
                }
            }
        )*
    };
}

token_accessors!(AccessToken, FreshAccessToken, RefreshToken);

impl<S> FromRequestParts<S> for AccessToken
where
    Arc<TokenManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate(parts, state, TokenRequirement::access())
            .and_then(required)
            .map(AccessToken)
    }
}

impl<S> FromRequestParts<S> for FreshAccessToken
where
    Arc<TokenManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate(parts, state, TokenRequirement::fresh_access())
            .and_then(required)
            .map(FreshAccessToken)
    }
}

impl<S> FromRequestParts<S> for RefreshToken
where
    Arc<TokenManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate(parts, state, TokenRequirement::refresh())
            .and_then(required)
            .map(RefreshToken)
    }
}

impl<S> FromRequestParts<S> for OptionalAccessToken
where
    Arc<TokenManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate(parts, state, TokenRequirement::optional_access()).map(OptionalAccessToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};
    use serde_json::json;

    const SECRET: &str = "test-secret-key-must-be-at-least-32-chars-long!";

    fn manager() -> TokenManager {
        TokenManager::with_expiry(
            Some(SECRET.to_string()),
            Duration::from_secs(900),
            Duration::from_secs(3600),
        )
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    fn expect_failure(result: Result<Option<DecodedToken>, AuthError>) -> TokenFailure {
        match result {
            Err(AuthError::Token(failure)) => failure,
            Err(AuthError::Server(e)) => panic!("Expected token failure, got server error: {e}"),
            Ok(_) => panic!("Expected token failure, got success"),
        }
    }

    /// Sign arbitrary claims with the test secret
    fn sign(claims: &Claims) -> String {
        encode(
            &Header::new(ALGORITHM),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_access_token_round_trip() {
        let manager = manager();
        let token = manager.create_access_token("42", true).unwrap();

        let decoded = manager
            .verify(&bearer(&token), TokenRequirement::fresh_access())
            .unwrap()
            .unwrap();
        assert_eq!(decoded.claims.sub, "42");
        assert_eq!(decoded.claims.token_type, TokenType::Access);
        assert!(decoded.claims.fresh);
        assert_eq!(decoded.claims.exp - decoded.claims.iat, 900);
        assert_eq!(decoded.header.alg, Algorithm::HS256);
    }

    #[test]
    fn test_each_token_gets_unique_jti() {
        let manager = manager();
        let a = manager.decode(&manager.create_access_token("1", false).unwrap()).unwrap();
        let b = manager.decode(&manager.create_access_token("1", false).unwrap()).unwrap();
        assert_ne!(a.claims.jti, b.claims.jti);
    }

    #[test]
    fn test_missing_header() {
        let failure = expect_failure(manager().verify(&HeaderMap::new(), TokenRequirement::access()));
        assert_eq!(failure.kind(), TokenErrorKind::Missing);
    }

    #[test]
    fn test_wrong_scheme_counts_as_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        let failure = expect_failure(manager().verify(&headers, TokenRequirement::access()));
        assert_eq!(failure.kind(), TokenErrorKind::Missing);
    }

    #[test]
    fn test_optional_without_token() {
        let result = manager()
            .verify(&HeaderMap::new(), TokenRequirement::optional_access())
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_optional_with_garbage_token_still_fails() {
        let failure = expect_failure(
            manager().verify(&bearer("not-a-jwt"), TokenRequirement::optional_access()),
        );
        assert_eq!(failure.kind(), TokenErrorKind::Invalid);
    }

    #[test]
    fn test_malformed_token_is_invalid() {
        let failure = expect_failure(manager().verify(&bearer("not-a-jwt"), TokenRequirement::access()));
        assert_eq!(failure.kind(), TokenErrorKind::Invalid);
    }

    #[test]
    fn test_foreign_signature_is_invalid() {
        let other = TokenManager::with_expiry(
            Some("a-completely-different-signing-secret!!".to_string()),
            Duration::from_secs(900),
            Duration::from_secs(3600),
        );
        let token = other.create_access_token("1", false).unwrap();

        let failure = expect_failure(manager().verify(&bearer(&token), TokenRequirement::access()));
        match failure {
            TokenFailure::Invalid(reason) => assert_eq!(reason, "Signature verification failed"),
            other => panic!("Expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_expired_token_keeps_payload() {
        let now = Utc::now().timestamp();
        let token = sign(&Claims {
            sub: "7".to_string(),
            iat: now - 7200,
            nbf: now - 7200,
            exp: now - 3600,
            jti: "expired-jti".to_string(),
            token_type: TokenType::Access,
            fresh: false,
        });

        let failure = expect_failure(manager().verify(&bearer(&token), TokenRequirement::access()));
        match failure {
            TokenFailure::Expired(decoded) => {
                assert_eq!(decoded.claims.sub, "7");
                assert_eq!(decoded.claims.jti, "expired-jti");
            }
            other => panic!("Expected Expired, got {other:?}"),
        }
    }

    #[test]
    fn test_refresh_token_rejected_on_access_route() {
        let manager = manager();
        let token = manager.create_refresh_token("1").unwrap();

        let failure = expect_failure(manager.verify(&bearer(&token), TokenRequirement::access()));
        assert_eq!(failure.kind(), TokenErrorKind::WrongType);

        assert!(manager
            .verify(&bearer(&token), TokenRequirement::refresh())
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_revoked_token() {
        let manager = manager();
        let token = manager.create_access_token("1", true).unwrap();
        let decoded = manager.decode(&token).unwrap();

        manager.revoke(&decoded.claims);
        assert!(manager.is_revoked(&decoded.claims.jti));

        let failure = expect_failure(manager.verify(&bearer(&token), TokenRequirement::access()));
        assert_eq!(failure.kind(), TokenErrorKind::Revoked);
    }

    #[test]
    fn test_revocation_checked_before_freshness() {
        let manager = manager();
        let token = manager.create_access_token("1", false).unwrap();
        manager.revoke(&manager.decode(&token).unwrap().claims);

        let failure =
            expect_failure(manager.verify(&bearer(&token), TokenRequirement::fresh_access()));
        assert_eq!(failure.kind(), TokenErrorKind::Revoked);
    }

    #[test]
    fn test_not_fresh() {
        let manager = manager();
        let token = manager.create_access_token("1", false).unwrap();

        let failure =
            expect_failure(manager.verify(&bearer(&token), TokenRequirement::fresh_access()));
        assert_eq!(failure.kind(), TokenErrorKind::NotFresh);

        assert!(manager
            .verify(&bearer(&token), TokenRequirement::access())
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_missing_secret() {
        let manager =
            TokenManager::with_expiry(None, Duration::from_secs(900), Duration::from_secs(3600));
        assert!(!manager.has_secret());
        assert!(matches!(
            manager.create_access_token("1", true),
            Err(TokenError::MissingSecret)
        ));
        assert!(matches!(
            manager.verify(&bearer("a.b.c"), TokenRequirement::access()),
            Err(AuthError::Server(TokenError::MissingSecret))
        ));

        let response = manager.reject(AuthError::Server(TokenError::MissingSecret));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_registered_callback_overrides_default() {
        let mut manager = manager();
        let failure = TokenFailure::Missing("Missing Authorization Header".to_string());

        assert!(!manager.has_callback(TokenErrorKind::Missing));
        assert_eq!(manager.handle(&failure), default_response(&failure));

        manager.register(TokenErrorKind::Missing, callbacks::missing_token_callback);
        assert!(manager.has_callback(TokenErrorKind::Missing));
        assert_eq!(
            manager.handle(&failure).body,
            json!({
                "description": "Request does not contain an access token.",
                "error": "authorization_required"
            })
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", manager());
        assert!(!rendered.contains(SECRET));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_optional_extractor_through_router() {
        use axum::{body::Body, http::Request, routing::get, Router};
        use tower::ServiceExt;

        let manager = Arc::new(manager());
        let token = manager.create_access_token("9", false).unwrap();
        let app = Router::new()
            .route(
                "/whoami",
                get(|OptionalAccessToken(token): OptionalAccessToken| async move {
                    token.map_or_else(|| "anonymous".to_string(), |t| t.claims.sub)
                }),
            )
            .with_state(manager);

        let anonymous = app
            .clone()
            .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::OK);
        let body = axum::body::to_bytes(anonymous.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"anonymous");

        let request = Request::builder()
            .uri("/whoami")
            .header(axum::http::header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let identified = app.oneshot(request).await.unwrap();
        let body = axum::body::to_bytes(identified.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"9");
    }
}
