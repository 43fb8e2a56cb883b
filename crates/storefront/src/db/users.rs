//! User repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use guidebook_core::{AccountStatus, Email, UserId};

use super::{RepositoryError, UserStore, parse_stored_email};
use crate::models::User;

/// Repository for user database operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct UserRow {
    id: i32,
    email: String,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<AccountStatus>()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        Ok(Self {
            id: UserId::new(row.id),
            email: parse_stored_email(&row.email)?,
            status,
            created_at: row.created_at,
        })
    }
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, status, created_at
            FROM storefront.user
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithHashRow>(
            r"
            SELECT id, email, status, created_at, password_hash
            FROM storefront.user
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let hash = row.password_hash;
        Ok(Some((User::try_from(row.user)?, hash)))
    }

    async fn create(
        &self,
        email: &Email,
        password_hash: &str,
        status: AccountStatus,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO storefront.user (email, password_hash, status)
            VALUES ($1, $2, $3)
            RETURNING id, email, status, created_at
            ",
        )
        .bind(email.as_str())
        .bind(password_hash)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("email already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        User::try_from(row)
    }

    async fn mark_paid(&self, email: &Email) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.user
            SET status = 'paid', updated_at = NOW()
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
