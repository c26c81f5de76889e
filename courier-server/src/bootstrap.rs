//! Application bootstrap
//!
//! `create_app` runs the configuration steps in a fixed order and returns an
//! [`Application`] holding every subsystem handle. Each step reads what the
//! previous ones attached.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::ApiRegistrar;
use crate::auth::callbacks::{
    expired_token_callback, invalid_token_callback, missing_token_callback,
    revoked_token_callback, token_not_fresh_callback, TokenErrorKind,
};
use crate::auth::TokenManager;
use crate::config::{get_config, Settings};
use crate::cors::{cors_layer, ALLOWED_ORIGINS};
use crate::db::Database;
use crate::error::BootstrapError;
use crate::migrate::MigrationTracker;
use crate::resources::{emails, users};
use crate::routes::build_router;

/// Configuration state owned by one application instance
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub allowed_origins: Vec<String>,
    pub settings: Settings,
    pub jwt_secret_key: Option<String>,
}

/// A configured application, ready to be turned into a router and served
#[derive(Debug)]
pub struct Application {
    config: AppConfig,
    cors: CorsLayer,
    db: Database,
    migrations: MigrationTracker,
    api: ApiRegistrar,
    tokens: Arc<TokenManager>,
}

impl Application {
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        &self.config.settings
    }

    pub fn cors(&self) -> &CorsLayer {
        &self.cors
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn migrations(&self) -> &MigrationTracker {
        &self.migrations
    }

    pub fn api(&self) -> &ApiRegistrar {
        &self.api
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Router serving every registered group, the built-in routes and middleware
    pub fn router(&self) -> Result<Router, BootstrapError> {
        build_router(self)
    }
}

/// Bind the profile's address and serve until `shutdown` resolves
pub async fn serve<F>(app: &Application, shutdown: F) -> Result<(), BootstrapError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = app.settings().socket_addr();
    let router = app.router()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, profile = %app.settings().profile, "Listening");

    // Connect info feeds the rate limiter's peer address key
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Build the application from `.env` and the process environment.
///
/// Must be called inside a Tokio runtime: the database pool is created lazily
/// but spawns its maintenance task immediately.
pub fn create_app() -> Result<Application, BootstrapError> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!(error = %e, "Failed to load .env file");
        }
    }

    create_app_with_env(|key| std::env::var(key).ok())
}

/// Build the application, reading every variable through `lookup`
pub fn create_app_with_env<F>(lookup: F) -> Result<Application, BootstrapError>
where
    F: Fn(&str) -> Option<String>,
{
    // Environment is already resolved by `lookup`
    if let Some(frontend_url) = lookup("FRONTEND_URL") {
        tracing::info!(frontend_url = %frontend_url, "Frontend URL");
    }

    let allowed_origins: Vec<String> = ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect();
    let cors = cors_layer(&allowed_origins);

    let settings = get_config(&lookup)?;
    tracing::info!(profile = %settings.profile, "Applied configuration profile");

    let db = Database::connect_lazy(&settings)?;

    let migrations = MigrationTracker::new(db.clone());

    let mut api = ApiRegistrar::new(&settings);

    let jwt_secret_key = lookup("JWT_SECRET_KEY").filter(|s| !s.is_empty());

    let mut tokens = TokenManager::new(jwt_secret_key.clone(), &settings);
    tokens.register(TokenErrorKind::Revoked, revoked_token_callback);
    tokens.register(TokenErrorKind::Expired, expired_token_callback);
    tokens.register(TokenErrorKind::Invalid, invalid_token_callback);
    tokens.register(TokenErrorKind::Missing, missing_token_callback);
    tokens.register(TokenErrorKind::NotFresh, token_not_fresh_callback);
    let tokens = Arc::new(tokens);

    api.register(users::resource_group(&db, tokens.clone()))?;
    api.register(emails::resource_group(&db, tokens.clone()))?;

    Ok(Application {
        config: AppConfig {
            allowed_origins,
            settings,
            jwt_secret_key,
        },
        cors,
        db,
        migrations,
        api,
        tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[tokio::test]
    async fn test_create_app_runs_every_step() {
        let app = create_app_with_env(env(&[
            ("APP_ENV", "testing"),
            ("JWT_SECRET_KEY", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(app.config().allowed_origins.len(), 3);
        assert_eq!(app.settings().profile.as_str(), "testing");
        assert_eq!(app.config().jwt_secret_key.as_deref(), Some("s3cret"));
        assert_eq!(app.api().group_names(), vec!["users", "emails"]);
        for kind in TokenErrorKind::ALL {
            let registered = app.tokens().has_callback(kind);
            assert_eq!(registered, kind != TokenErrorKind::WrongType, "{kind:?}");
        }
    }

    #[tokio::test]
    async fn test_missing_secret_still_bootstraps() {
        let app = create_app_with_env(env(&[("APP_ENV", "testing")])).unwrap();
        assert!(app.config().jwt_secret_key.is_none());
        assert!(!app.tokens().has_secret());

        let app = create_app_with_env(env(&[("JWT_SECRET_KEY", "")])).unwrap();
        assert!(app.config().jwt_secret_key.is_none());
    }

    #[tokio::test]
    async fn test_unknown_profile_is_fatal() {
        let err = create_app_with_env(env(&[("APP_ENV", "staging")])).unwrap_err();
        assert!(matches!(err, BootstrapError::UnknownProfile(name) if name == "staging"));
    }

    #[tokio::test]
    async fn test_malformed_database_url_is_fatal() {
        let err =
            create_app_with_env(env(&[("APP_ENV", "testing"), ("TEST_DATABASE_URL", "nope")]))
                .unwrap_err();
        assert!(matches!(err, BootstrapError::Database(_)));
    }

    #[tokio::test]
    async fn test_unusable_pool_and_body_settings_are_config_errors() {
        for (key, value) in [
            ("DATABASE_MAX_CONNECTIONS", "0".to_string()),
            ("BODY_LIMIT_MB", usize::MAX.to_string()),
        ] {
            let err = create_app_with_env(env(&[("APP_ENV", "testing"), (key, value.as_str())]))
                .unwrap_err();
            assert!(matches!(err, BootstrapError::Config(_)), "{key}: {err}");
        }
    }

    #[tokio::test]
    async fn test_router_builds() {
        let app = create_app_with_env(env(&[("APP_ENV", "testing")])).unwrap();
        assert!(app.router().is_ok());
    }
}
