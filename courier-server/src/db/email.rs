//! Email entity and repository
//!
//! Emails are owned by a user; every query is scoped to the owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;

use super::Database;

/// Email entity from database
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Email {
    #[schema(example = 12)]
    pub id: i64,
    #[schema(example = 1)]
    pub user_id: i64,
    #[schema(example = "team@example.com")]
    pub recipient: String,
    #[schema(example = "Weekly update")]
    pub subject: String,
    #[schema(example = "Hello team,")]
    pub body: String,
    #[schema(value_type = String, example = "2026-01-08T10:00:00Z")]
    pub created_at: DateTime<Utc>,
}

/// DTO for creating a new email
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEmail {
    #[schema(example = "team@example.com")]
    pub recipient: String,
    #[schema(example = "Weekly update")]
    pub subject: String,
    #[serde(default)]
    #[schema(example = "Hello team,")]
    pub body: String,
}

/// Repository for email database operations
#[derive(Clone, Debug)]
pub struct EmailRepository {
    pool: PgPool,
}

impl EmailRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// All emails of a user, newest first
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Email>, sqlx::Error> {
        sqlx::query_as::<_, Email>(
            r#"
            SELECT id, user_id, recipient, subject, body, created_at
            FROM emails
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find_for_user(&self, id: i64, user_id: i64) -> Result<Option<Email>, sqlx::Error> {
        sqlx::query_as::<_, Email>(
            r#"
            SELECT id, user_id, recipient, subject, body, created_at
            FROM emails
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn create(&self, user_id: i64, input: &CreateEmail) -> Result<Email, sqlx::Error> {
        sqlx::query_as::<_, Email>(
            r#"
            INSERT INTO emails (user_id, recipient, subject, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, recipient, subject, body, created_at
            "#,
        )
        .bind(user_id)
        .bind(&input.recipient)
        .bind(&input.subject)
        .bind(&input.body)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn delete_for_user(&self, id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM emails WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
