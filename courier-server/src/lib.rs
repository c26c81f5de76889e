//! Courier Server Library - application factory for the Courier REST API
//!
//! The `courier-server` binary and the `courier` CLI both build the
//! application through [`create_app`]; integration tests use the same path.

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod cors;
pub mod db;
pub mod error;
pub mod handlers;
pub mod migrate;
pub mod openapi;
pub mod resources;
pub mod routes;
pub mod telemetry;

pub use api::{ApiRegistrar, ResourceGroup, RouteInfo};
pub use auth::callbacks::{TokenErrorKind, TokenErrorResponse, TokenFailure};
pub use auth::{
    AccessToken, Claims, FreshAccessToken, OptionalAccessToken, RefreshToken, TokenManager,
    TokenType,
};
pub use bootstrap::{
    create_app, create_app_with_env, serve, shutdown_signal, AppConfig, Application,
};
pub use config::{get_config, Profile, Settings};
pub use db::{CreateEmail, CreateUser, Database, Email, User, UserResponse};
pub use error::{ApiError, BootstrapError};
pub use migrate::{MigrationInfo, MigrationStatus, MigrationTracker};
pub use openapi::ApiDoc;
pub use routes::build_router;
