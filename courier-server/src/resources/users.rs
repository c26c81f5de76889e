//! Users resource group
//!
//! Registration, password login, token refresh, logout and account management.

use std::sync::Arc;

use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{user_id_from_identity, MessageResponse};
use crate::api::{ResourceGroup, RouteInfo};
use crate::auth::password::{hash_password, verify_password, PasswordError};
use crate::auth::{AccessToken, FreshAccessToken, RefreshToken, TokenManager};
use crate::db::{CreateUser, Database, UserRepository, UserResponse};
use crate::error::ApiError;

pub const NAME: &str = "users";
pub const DESCRIPTION: &str = "Operations on users";

/// Maximum username length, matches the column width
const MAX_USERNAME_LEN: usize = 80;

pub const ROUTES: &[RouteInfo] = &[
    RouteInfo { method: "POST", path: "/register" },
    RouteInfo { method: "POST", path: "/login" },
    RouteInfo { method: "POST", path: "/refresh" },
    RouteInfo { method: "POST", path: "/logout" },
    RouteInfo { method: "GET", path: "/user/{user_id}" },
    RouteInfo { method: "DELETE", path: "/user/{user_id}" },
];

/// Dependencies of the users handlers
#[derive(Clone)]
pub struct UsersState {
    users: UserRepository,
    tokens: Arc<TokenManager>,
}

impl FromRef<UsersState> for Arc<TokenManager> {
    fn from_ref(state: &UsersState) -> Self {
        state.tokens.clone()
    }
}

/// Build the users group from its dependencies
pub fn resource_group(db: &Database, tokens: Arc<TokenManager>) -> ResourceGroup {
    let state = UsersState {
        users: UserRepository::new(db),
        tokens,
    };

    let router = Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/refresh", post(refresh_handler))
        .route("/logout", post(logout_handler))
        .route("/user/{user_id}", get(get_user_handler).delete(delete_user_handler))
        .with_state(state);

    ResourceGroup::new(NAME, DESCRIPTION, router).with_routes(ROUTES)
}

/// Username and password, used by register and login
#[derive(Debug, Deserialize, ToSchema)]
pub struct UserCredentials {
    #[schema(example = "jane")]
    pub username: String,
    #[schema(example = "correct horse battery staple")]
    pub password: String,
}

/// Tokens issued on login
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// New access token issued from a refresh token
#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
}

fn validate_username(username: &str) -> Result<&str, ApiError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ApiError::validation("Username must not be empty."));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ApiError::validation(format!(
            "Username must be at most {MAX_USERNAME_LEN} characters."
        )));
    }
    Ok(username)
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/register",
    tag = "users",
    request_body = UserCredentials,
    responses(
        (status = 201, description = "User created", body = MessageResponse),
        (status = 409, description = "Username already taken"),
        (status = 422, description = "Invalid username or password")
    )
)]
pub async fn register_handler(
    State(state): State<UsersState>,
    Json(request): Json<UserCredentials>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let username = validate_username(&request.username)?.to_string();

    let password_hash = hash_password(&request.password).map_err(|e| match e {
        e @ PasswordError::TooShort => ApiError::validation(e.to_string()),
        other => ApiError::internal(other.to_string()),
    })?;

    let user = state
        .users
        .create(CreateUser {
            username,
            password_hash,
        })
        .await?
        .ok_or_else(|| ApiError::conflict("A user with that username already exists."))?;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User created successfully.")),
    ))
}

/// Exchange credentials for a fresh access token and a refresh token
#[utoipa::path(
    post,
    path = "/login",
    tag = "users",
    request_body = UserCredentials,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login_handler(
    State(state): State<UsersState>,
    Json(request): Json<UserCredentials>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .users
        .find_by_username(request.username.trim())
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials."))?;

    let valid = verify_password(&request.password, &user.password_hash).map_err(|e| {
        tracing::error!(user_id = user.id, error = %e, "Stored password hash is unusable");
        ApiError::internal(e.to_string())
    })?;
    if !valid {
        tracing::warn!(user_id = user.id, "Login rejected: wrong password");
        return Err(ApiError::unauthorized("Invalid credentials."));
    }

    let identity = user.id.to_string();
    let access_token = state.tokens.create_access_token(&identity, true)?;
    let refresh_token = state.tokens.create_refresh_token(&identity)?;

    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
    }))
}

/// Issue a non-fresh access token from a refresh token
#[utoipa::path(
    post,
    path = "/refresh",
    tag = "users",
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, description = "Missing, invalid, expired or revoked refresh token, or deleted user")
    ),
    security(("jwt" = []))
)]
pub async fn refresh_handler(
    State(state): State<UsersState>,
    token: RefreshToken,
) -> Result<Json<RefreshResponse>, ApiError> {
    let user_id = user_id_from_identity(token.identity())?;
    if state.users.find_by_id(user_id).await?.is_none() {
        // Refresh tokens outlive account deletion; stop this one minting more
        state.tokens.revoke(token.claims());
        tracing::warn!(user_id, "Refresh rejected: user no longer exists");
        return Err(ApiError::unauthorized("User no longer exists."));
    }

    let access_token = state
        .tokens
        .create_access_token(token.identity(), false)?;

    Ok(Json(RefreshResponse { access_token }))
}

/// Revoke the access token used for this request
#[utoipa::path(
    post,
    path = "/logout",
    tag = "users",
    responses(
        (status = 200, description = "Token revoked", body = MessageResponse),
        (status = 401, description = "Missing, invalid, expired or revoked token")
    ),
    security(("jwt" = []))
)]
pub async fn logout_handler(
    State(state): State<UsersState>,
    token: AccessToken,
) -> Json<MessageResponse> {
    state.tokens.revoke(token.claims());
    Json(MessageResponse::new("Successfully logged out."))
}

/// Get a user by id
#[utoipa::path(
    get,
    path = "/user/{user_id}",
    tag = "users",
    params(("user_id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "User not found")
    ),
    security(("jwt" = []))
)]
pub async fn get_user_handler(
    State(state): State<UsersState>,
    _token: AccessToken,
    Path(user_id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found."))?;

    Ok(Json(UserResponse::from(user)))
}

/// Delete your own account; requires a fresh token
#[utoipa::path(
    delete,
    path = "/user/{user_id}",
    tag = "users",
    params(("user_id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 401, description = "Missing, invalid or non-fresh token"),
        (status = 403, description = "Not your account"),
        (status = 404, description = "User not found")
    ),
    security(("jwt" = []))
)]
pub async fn delete_user_handler(
    State(state): State<UsersState>,
    token: FreshAccessToken,
    Path(user_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    if user_id_from_identity(token.identity())? != user_id {
        return Err(ApiError::forbidden("You can only delete your own account."));
    }

    if !state.users.delete(user_id).await? {
        return Err(ApiError::not_found("User not found."));
    }

    // The account is gone; its token must not keep working
    state.tokens.revoke(token.claims());
    tracing::info!(user_id, "User deleted");

    Ok(Json(MessageResponse::new("User deleted.")))
}
