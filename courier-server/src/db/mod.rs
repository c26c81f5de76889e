//! Persistence layer
//!
//! `Database` is the single handle to the connection pool. It is created once
//! during bootstrap and handed to every repository that needs it.

pub mod email;
pub mod user;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Settings;
use crate::error::BootstrapError;

pub use email::{CreateEmail, Email, EmailRepository};
pub use user::{CreateUser, User, UserRepository, UserResponse};

/// Handle to the PostgreSQL pool
#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Build the pool from the profile's pool settings without connecting.
    ///
    /// Connections are opened on first use, so bootstrap does not need a
    /// reachable server. Must be called inside a Tokio runtime.
    pub fn connect_lazy(settings: &Settings) -> Result<Self, BootstrapError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.database_max_connections)
            .min_connections(settings.database_min_connections)
            .acquire_timeout(Duration::from_secs(settings.database_acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(settings.database_idle_timeout_secs))
            .connect_lazy(&settings.database_url)?;

        tracing::info!(
            max_connections = settings.database_max_connections,
            min_connections = settings.database_min_connections,
            "Database pool configured"
        );

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip a trivial query to check the database is reachable
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Whether the error means the server could not be reached at all
pub fn is_connection_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;

    #[tokio::test]
    async fn test_connect_lazy_uses_profile_pool_settings() {
        let settings = Settings::for_profile(Profile::Testing);
        let db = Database::connect_lazy(&settings).unwrap();

        let options = db.pool().options();
        assert_eq!(options.get_max_connections(), settings.database_max_connections);
        assert_eq!(options.get_min_connections(), settings.database_min_connections);
        assert_eq!(
            options.get_acquire_timeout(),
            Duration::from_secs(settings.database_acquire_timeout_secs)
        );
    }

    #[tokio::test]
    async fn test_connect_lazy_rejects_malformed_url() {
        let mut settings = Settings::for_profile(Profile::Testing);
        settings.database_url = "definitely not a url".to_string();

        assert!(matches!(
            Database::connect_lazy(&settings),
            Err(BootstrapError::Database(_))
        ));
    }

    #[test]
    fn test_is_connection_error() {
        assert!(is_connection_error(&sqlx::Error::PoolTimedOut));
        assert!(is_connection_error(&sqlx::Error::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionRefused
        ))));
        assert!(!is_connection_error(&sqlx::Error::RowNotFound));
    }
}
