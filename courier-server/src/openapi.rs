//! OpenAPI documentation configuration
//!
//! Title, version and group tags are overridden at runtime by the registrar.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::db::{CreateEmail, Email, UserResponse};
use crate::handlers::{HealthResponse, ReadyResponse};
use crate::resources::users::{LoginResponse, RefreshResponse, UserCredentials};
use crate::resources::MessageResponse;

/// Courier REST API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Courier REST API",
        version = "v1",
        description = "Account management and per-user email storage behind JWT authentication.",
        license(name = "MIT OR Apache-2.0")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::resources::users::register_handler,
        crate::resources::users::login_handler,
        crate::resources::users::refresh_handler,
        crate::resources::users::logout_handler,
        crate::resources::users::get_user_handler,
        crate::resources::users::delete_user_handler,
        crate::resources::emails::list_emails_handler,
        crate::resources::emails::create_email_handler,
        crate::resources::emails::get_email_handler,
        crate::resources::emails::delete_email_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            MessageResponse,
            UserCredentials,
            LoginResponse,
            RefreshResponse,
            UserResponse,
            Email,
            CreateEmail,
        )
    ),
    modifiers(&BearerSecurity)
)]
pub struct ApiDoc;

/// Adds the `jwt` bearer scheme referenced by protected paths
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_resource_paths() {
        let doc = ApiDoc::openapi();
        for path in ["/register", "/login", "/user/{user_id}", "/email", "/email/{email_id}"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("jwt"));
    }
}
