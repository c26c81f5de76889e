//! Emails resource group
//!
//! Every route requires an access token and only sees the caller's own emails.

use std::sync::Arc;

use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use super::{user_id_from_identity, MessageResponse};
use crate::api::{ResourceGroup, RouteInfo};
use crate::auth::{AccessToken, FreshAccessToken, TokenManager};
use crate::db::{CreateEmail, Database, Email, EmailRepository};
use crate::error::ApiError;

pub const NAME: &str = "emails";
pub const DESCRIPTION: &str = "Operations on emails";

const MAX_RECIPIENT_LEN: usize = 320;
const MAX_SUBJECT_LEN: usize = 255;

pub const ROUTES: &[RouteInfo] = &[
    RouteInfo { method: "GET", path: "/email" },
    RouteInfo { method: "POST", path: "/email" },
    RouteInfo { method: "GET", path: "/email/{email_id}" },
    RouteInfo { method: "DELETE", path: "/email/{email_id}" },
];

/// Dependencies of the emails handlers
#[derive(Clone)]
pub struct EmailsState {
    emails: EmailRepository,
    tokens: Arc<TokenManager>,
}

impl FromRef<EmailsState> for Arc<TokenManager> {
    fn from_ref(state: &EmailsState) -> Self {
        state.tokens.clone()
    }
}

/// Build the emails group from its dependencies
pub fn resource_group(db: &Database, tokens: Arc<TokenManager>) -> ResourceGroup {
    let state = EmailsState {
        emails: EmailRepository::new(db),
        tokens,
    };

    let router = Router::new()
        .route("/email", get(list_emails_handler).post(create_email_handler))
        .route(
            "/email/{email_id}",
            get(get_email_handler).delete(delete_email_handler),
        )
        .with_state(state);

    ResourceGroup::new(NAME, DESCRIPTION, router).with_routes(ROUTES)
}

/// Trim recipient and subject, then validate the trimmed draft
fn prepare_email(input: CreateEmail) -> Result<CreateEmail, ApiError> {
    let draft = CreateEmail {
        recipient: input.recipient.trim().to_string(),
        subject: input.subject.trim().to_string(),
        body: input.body,
    };
    validate_email(&draft)?;
    Ok(draft)
}

fn validate_email(input: &CreateEmail) -> Result<(), ApiError> {
    let well_formed = input
        .recipient
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed || input.recipient.len() > MAX_RECIPIENT_LEN {
        return Err(ApiError::validation("Recipient is not a valid email address."));
    }

    if input.subject.is_empty() {
        return Err(ApiError::validation("Subject must not be empty."));
    }
    if input.subject.chars().count() > MAX_SUBJECT_LEN {
        return Err(ApiError::validation(format!(
            "Subject must be at most {MAX_SUBJECT_LEN} characters."
        )));
    }

    Ok(())
}

/// Map an insert failure; a missing owner row means the account was deleted
fn create_error(err: sqlx::Error) -> ApiError {
    let missing_owner = err
        .as_database_error()
        .is_some_and(|e| e.kind() == sqlx::error::ErrorKind::ForeignKeyViolation);
    if missing_owner {
        ApiError::unauthorized("User no longer exists.")
    } else {
        ApiError::from(err)
    }
}

/// List the caller's emails, newest first
#[utoipa::path(
    get,
    path = "/email",
    tag = "emails",
    responses(
        (status = 200, description = "Emails of the caller", body = [Email]),
        (status = 401, description = "Missing, invalid, expired or revoked token")
    ),
    security(("jwt" = []))
)]
pub async fn list_emails_handler(
    State(state): State<EmailsState>,
    token: AccessToken,
) -> Result<Json<Vec<Email>>, ApiError> {
    let user_id = user_id_from_identity(token.identity())?;
    Ok(Json(state.emails.list_for_user(user_id).await?))
}

/// Store a new email for the caller
#[utoipa::path(
    post,
    path = "/email",
    tag = "emails",
    request_body = CreateEmail,
    responses(
        (status = 201, description = "Email stored", body = Email),
        (status = 401, description = "Missing, invalid, expired or revoked token, or deleted user"),
        (status = 422, description = "Invalid email")
    ),
    security(("jwt" = []))
)]
pub async fn create_email_handler(
    State(state): State<EmailsState>,
    token: AccessToken,
    Json(input): Json<CreateEmail>,
) -> Result<(StatusCode, Json<Email>), ApiError> {
    let user_id = user_id_from_identity(token.identity())?;
    let draft = prepare_email(input)?;

    let email = state
        .emails
        .create(user_id, &draft)
        .await
        .map_err(create_error)?;
    tracing::info!(user_id, email_id = email.id, "Email created");

    Ok((StatusCode::CREATED, Json(email)))
}

/// Get one of the caller's emails
#[utoipa::path(
    get,
    path = "/email/{email_id}",
    tag = "emails",
    params(("email_id" = i64, Path, description = "Email id")),
    responses(
        (status = 200, description = "Email found", body = Email),
        (status = 401, description = "Missing, invalid, expired or revoked token"),
        (status = 404, description = "Email not found")
    ),
    security(("jwt" = []))
)]
pub async fn get_email_handler(
    State(state): State<EmailsState>,
    token: AccessToken,
    Path(email_id): Path<i64>,
) -> Result<Json<Email>, ApiError> {
    let user_id = user_id_from_identity(token.identity())?;
    let email = state
        .emails
        .find_for_user(email_id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Email not found."))?;

    Ok(Json(email))
}

/// Delete one of the caller's emails; requires a fresh token
#[utoipa::path(
    delete,
    path = "/email/{email_id}",
    tag = "emails",
    params(("email_id" = i64, Path, description = "Email id")),
    responses(
        (status = 200, description = "Email deleted", body = MessageResponse),
        (status = 401, description = "Missing, invalid or non-fresh token"),
        (status = 404, description = "Email not found")
    ),
    security(("jwt" = []))
)]
pub async fn delete_email_handler(
    State(state): State<EmailsState>,
    token: FreshAccessToken,
    Path(email_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = user_id_from_identity(token.identity())?;

    if !state.emails.delete_for_user(email_id, user_id).await? {
        return Err(ApiError::not_found("Email not found."));
    }
    tracing::info!(user_id, email_id, "Email deleted");

    Ok(Json(MessageResponse::new("Email deleted.")))
}
