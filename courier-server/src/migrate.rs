//! Migration tracker
//!
//! Binds the migrations embedded from `./migrations` to the `Database` handle.
//! Reversible migrations (`.up.sql` / `.down.sql`) can be rolled back with
//! [`MigrationTracker::downgrade`].

use std::collections::HashSet;

use sqlx::migrate::{Migrate, Migrator};

pub use sqlx::migrate::MigrateError;

use crate::db::Database;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// One known schema migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationInfo {
    pub version: i64,
    pub description: String,
    pub reversible: bool,
}

/// A known migration and whether the database has applied it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub migration: MigrationInfo,
    pub applied: bool,
}

/// Records and applies schema changes against the persistence handle
#[derive(Clone, Debug)]
pub struct MigrationTracker {
    db: Database,
    migrator: &'static Migrator,
}

impl MigrationTracker {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            migrator: &MIGRATOR,
        }
    }

    /// Every migration shipped with this build, oldest first
    pub fn history(&self) -> Vec<MigrationInfo> {
        self.migrator
            .iter()
            .filter(|m| !m.migration_type.is_down_migration())
            .map(|m| MigrationInfo {
                version: m.version,
                description: m.description.to_string(),
                reversible: self
                    .migrator
                    .iter()
                    .any(|other| other.version == m.version && other.migration_type.is_down_migration()),
            })
            .collect()
    }

    /// Versions recorded as applied in the database
    pub async fn applied(&self) -> Result<Vec<i64>, MigrateError> {
        let mut conn = self.db.pool().acquire().await?;
        conn.ensure_migrations_table().await?;
        let mut versions: Vec<i64> = conn
            .list_applied_migrations()
            .await?
            .into_iter()
            .map(|m| m.version)
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    /// Newest applied version, `None` on an empty database
    pub async fn current(&self) -> Result<Option<i64>, MigrateError> {
        Ok(self.applied().await?.last().copied())
    }

    /// Every known migration with its applied flag
    pub async fn status(&self) -> Result<Vec<MigrationStatus>, MigrateError> {
        let applied: HashSet<i64> = self.applied().await?.into_iter().collect();
        Ok(mark_applied(self.history(), &applied))
    }

    /// Known migrations the database has not applied yet
    pub async fn pending(&self) -> Result<Vec<MigrationInfo>, MigrateError> {
        Ok(self
            .status()
            .await?
            .into_iter()
            .filter(|s| !s.applied)
            .map(|s| s.migration)
            .collect())
    }

    /// Apply every pending migration
    pub async fn upgrade(&self) -> Result<(), MigrateError> {
        tracing::info!("Applying pending migrations");
        self.migrator.run(self.db.pool()).await?;
        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Revert applied migrations newer than `target`
    pub async fn downgrade(&self, target: i64) -> Result<(), MigrateError> {
        tracing::info!(target, "Reverting migrations");
        self.migrator.undo(self.db.pool(), target).await?;
        Ok(())
    }
}

fn mark_applied(history: Vec<MigrationInfo>, applied: &HashSet<i64>) -> Vec<MigrationStatus> {
    history
        .into_iter()
        .map(|migration| MigrationStatus {
            applied: applied.contains(&migration.version),
            migration,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Profile, Settings};

    fn tracker() -> MigrationTracker {
        let db = Database::connect_lazy(&Settings::for_profile(Profile::Testing)).unwrap();
        MigrationTracker::new(db)
    }

    #[tokio::test]
    async fn test_history_lists_up_migrations_in_order() {
        let history = tracker().history();

        assert_eq!(history.len(), 2);
        assert!(history.windows(2).all(|w| w[0].version < w[1].version));
        assert_eq!(history[0].description, "create users");
        assert_eq!(history[1].description, "create emails");
        assert!(history.iter().all(|m| m.reversible));
    }

    #[test]
    fn test_mark_applied() {
        let history = vec![
            MigrationInfo {
                version: 1,
                description: "one".to_string(),
                reversible: true,
            },
            MigrationInfo {
                version: 2,
                description: "two".to_string(),
                reversible: false,
            },
        ];
        let applied: HashSet<i64> = [1].into_iter().collect();

        let status = mark_applied(history, &applied);
        assert!(status[0].applied);
        assert!(!status[1].applied);
    }
}
