//! Resource groups
//!
//! Each group is built from explicitly passed dependencies (repositories made
//! from the `Database` handle, the shared `TokenManager`) and registered on the
//! API registrar during bootstrap.

pub mod emails;
pub mod users;

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;

/// Plain `{"message": ...}` acknowledgement
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "User created successfully.")]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Parse the user id carried in a token's `sub` claim
pub(crate) fn user_id_from_identity(identity: &str) -> Result<i64, ApiError> {
    identity
        .parse()
        .map_err(|_| ApiError::unauthorized("Token identity is not a user id."))
}
